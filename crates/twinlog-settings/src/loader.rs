//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`LoggerSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides for store location and colors
//!
//! Minimum level and verbosity are not overridden here: an explicit file
//! value must win over the environment, so they are resolved later by
//! [`ResolvedSettings::resolve`](crate::ResolvedSettings::resolve).

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{LoggerSettings, StoreSettings};

/// Environment variable pointing at the settings file.
pub const ENV_CONFIG: &str = "TWINLOG_CONFIG";
/// Store directory override; setting it enables persistence.
pub const ENV_DB_DIR: &str = "TWINLOG_DB_DIR";
/// Database name override.
pub const ENV_DB_NAME: &str = "TWINLOG_DB_NAME";
/// Explicit verbose flag, applied only when the file leaves it unset.
pub const ENV_VERBOSE: &str = "TWINLOG_VERBOSE";
/// Any non-empty value disables ANSI colors.
pub const ENV_NO_COLOR: &str = "NO_COLOR";

/// Resolve the settings file path (`$TWINLOG_CONFIG` or `./twinlog.json`).
pub fn settings_path() -> PathBuf {
    read_env_string(ENV_CONFIG).map_or_else(|| PathBuf::from("twinlog.json"), PathBuf::from)
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<LoggerSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or out-of-range values are
/// errors.
pub fn load_settings_from_path(path: &Path) -> Result<LoggerSettings> {
    let defaults = serde_json::to_value(LoggerSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading logger settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "logger settings file not found, using defaults");
        defaults
    };

    let mut settings: LoggerSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment overrides using `env` as the variable lookup.
///
/// Invalid values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut LoggerSettings, env: impl Fn(&str) -> Option<String>) {
    let env = |key: &str| env(key).filter(|v| !v.is_empty());

    if let Some(dir) = env(ENV_DB_DIR) {
        settings
            .store
            .get_or_insert_with(StoreSettings::default)
            .data_dir = dir;
    }
    if let Some(name) = env(ENV_DB_NAME) {
        if let Some(store) = settings.store.as_mut() {
            store.database = name;
        }
    }
    if settings.verbose.is_none() {
        if let Some(raw) = env(ENV_VERBOSE) {
            settings.verbose = parse_bool(&raw);
            if settings.verbose.is_none() {
                tracing::warn!(key = ENV_VERBOSE, value = %raw, "invalid boolean env var, ignoring");
            }
        }
    }
    if env(ENV_NO_COLOR).is_some() {
        settings.colors = false;
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
