//! # dossier-core
//!
//! Shared vocabulary for the Dossier review engine.
//!
//! - **Ids**: [`ids::TraceId`], [`ids::InvocationId`], [`ids::CorrelationId`] as newtypes
//! - **Execution mode**: [`mode::ExecutionMode`] (`fake` / `real`)
//! - **Summaries**: [`summary`] truncation and metadata-only redaction of JSON payloads
//! - **Logging**: [`logging::init_subscriber`] for the global `tracing` subscriber
//! - **Metrics**: [`metrics`] metric name constants shared across crates
//! - **Panics**: [`panic::panic_message`] for `catch_unwind` boundaries
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by: dossier-agents, dossier-skills, dossier-scope,
//! dossier-runtime, dossier.

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod metrics;
pub mod mode;
pub mod panic;
pub mod summary;

pub use ids::{CorrelationId, InvocationId, TraceId};
pub use mode::ExecutionMode;
