//! # twinlog-settings
//!
//! Configuration for the twinlog facade, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`LoggerSettings::default()`]
//! 2. **Settings file**: `$TWINLOG_CONFIG` or `./twinlog.json`, deep-merged
//!    over defaults
//! 3. **Environment variables**: `TWINLOG_*` overrides
//!
//! [`ResolvedSettings`] is the immutable view a logger is built from.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, load_settings, load_settings_from_path};
pub use types::*;
