//! Global `tracing` subscriber setup.
//!
//! Every crate logs through `tracing` macros with structured fields; only
//! binaries call [`init_subscriber`]. Output goes to stderr so stdout stays
//! free for JSON responses.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set. With `json = true`
/// each event is written as one JSON object per line; otherwise the compact
/// human-readable format is used. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init fails if a global subscriber is already set
    let _ = if json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.compact().try_init()
    };
}
