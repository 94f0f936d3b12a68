//! # dossier-settings
//!
//! Configuration with layered sources for the Dossier review engine.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`DossierSettings::default()`]
//! 2. **User file**: `~/.dossier/settings.json` or an explicit path (deep-merged over defaults)
//! 3. **Environment variables**: `DOSSIER_*` overrides (highest priority)
//!
//! There is no global cache: the binary loads settings once and hands
//! explicit config values to each component at construction time.
//!
//! # Usage
//!
//! ```no_run
//! use dossier_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("remote skills at {}", settings.skills.remote_base_url);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;
