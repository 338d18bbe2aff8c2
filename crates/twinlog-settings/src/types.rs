//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so partial
//! JSON is accepted and missing fields get their compiled default.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use twinlog_core::LogLevel;

use crate::errors::{Result, SettingsError};

/// Environment variable overriding the minimum level.
pub const ENV_LEVEL: &str = "TWINLOG_LEVEL";
/// Deployment mode; `development` or `dev` turns verbose diagnostics on.
pub const ENV_MODE: &str = "TWINLOG_ENV";

/// Root settings for a logger.
///
/// ```json
/// {
///   "minLevel": "warn",
///   "store": { "dataDir": "/var/lib/app", "database": "logs" }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerSettings {
    /// Durable store. `None` disables persistence entirely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreSettings>,
    /// Explicit minimum level. Takes priority over the environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_level: Option<LogLevel>,
    /// Explicit verbose diagnostics flag. Takes priority over the environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
    /// Emit ANSI colors on the console.
    pub colors: bool,
    /// Console stream.
    pub stream: ConsoleStream,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            store: None,
            min_level: None,
            verbose: None,
            colors: true,
            stream: ConsoleStream::Stdout,
        }
    }
}

impl LoggerSettings {
    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if let Some(store) = &self.store {
            store.validate()?;
        }
        Ok(())
    }
}

/// Console stream selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
}

/// Durable store location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Directory holding database files.
    pub data_dir: String,
    /// Database name; the file is `<dataDir>/<database>.db`.
    pub database: String,
    /// Connection pool policy.
    pub pool: PoolSettings,
    /// Records that may wait for the writer before new ones are dropped.
    pub write_queue: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_dir: ".twinlog".to_string(),
            database: "logs".to_string(),
            pool: PoolSettings::default(),
            write_queue: 1024,
        }
    }
}

impl StoreSettings {
    /// Store rooted at `data_dir` with default name and pool policy.
    pub fn in_dir(data_dir: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Path of the database file.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(format!("{}.db", self.database))
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.write_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "store.writeQueue must be >= 1".into(),
            ));
        }
        self.pool.validate()
    }
}

/// Connection pool policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolSettings {
    /// Maximum open connections.
    pub max_connections: u32,
    /// Checkouts after which a connection is closed and replaced.
    pub max_uses: u32,
    /// Idle time after which a connection is closed, in milliseconds.
    pub idle_timeout_ms: u64,
    /// Time a pending checkout waits before failing, in milliseconds.
    pub queue_timeout_ms: u64,
    /// `SQLite` busy timeout per statement, in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 3,
            max_uses: 500,
            idle_timeout_ms: 60_000,
            queue_timeout_ms: 5_000,
            busy_timeout_ms: 5_000,
        }
    }
}

impl PoolSettings {
    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(SettingsError::InvalidValue(
                "pool.maxConnections must be >= 1".into(),
            ));
        }
        if self.max_uses == 0 {
            return Err(SettingsError::InvalidValue(
                "pool.maxUses must be >= 1".into(),
            ));
        }
        if self.queue_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "pool.queueTimeoutMs must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Idle timeout as a [`Duration`].
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Queue timeout as a [`Duration`].
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
}

/// Settings after environment and defaults are applied. Immutable for a
/// logger's lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedSettings {
    /// Durable store, if persistence is enabled.
    pub store: Option<StoreSettings>,
    /// Effective minimum level.
    pub min_level: LogLevel,
    /// Code frames and synthetic call-sites enabled.
    pub verbose: bool,
    /// ANSI colors enabled.
    pub colors: bool,
    /// Console stream.
    pub stream: ConsoleStream,
}

impl ResolvedSettings {
    /// Resolve against the process environment.
    pub fn from_env(settings: &LoggerSettings) -> Self {
        Self::resolve(settings, |key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary environment lookup.
    ///
    /// Verbose: explicit value, then [`ENV_MODE`], then off.
    /// Minimum level: explicit value, then [`ENV_LEVEL`], then `debug` when
    /// verbose and `info` otherwise.
    pub fn resolve(settings: &LoggerSettings, env: impl Fn(&str) -> Option<String>) -> Self {
        let verbose = settings
            .verbose
            .or_else(|| env(ENV_MODE).map(|mode| is_development_mode(&mode)))
            .unwrap_or(false);

        let min_level = settings
            .min_level
            .or_else(|| env(ENV_LEVEL).and_then(|v| LogLevel::parse(&v)))
            .unwrap_or(if verbose {
                LogLevel::Debug
            } else {
                LogLevel::Info
            });

        Self {
            store: settings.store.clone(),
            min_level,
            verbose,
            colors: settings.colors,
            stream: settings.stream,
        }
    }
}

/// Whether a deployment mode string names a development environment.
pub fn is_development_mode(mode: &str) -> bool {
    matches!(
        mode.trim().to_lowercase().as_str(),
        "development" | "dev" | "local"
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let settings = LoggerSettings::default();
        assert!(settings.store.is_none());
        assert!(settings.colors);
        assert_eq!(settings.stream, ConsoleStream::Stdout);

        let store = StoreSettings::default();
        assert_eq!(store.database, "logs");
        assert_eq!(store.pool.max_connections, 3);
        assert_eq!(store.pool.queue_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn database_path_joins_name() {
        let store = StoreSettings::in_dir("/var/lib/app");
        assert_eq!(store.database_path(), PathBuf::from("/var/lib/app/logs.db"));
    }

    #[test]
    fn resolve_defaults_to_info() {
        let resolved = ResolvedSettings::resolve(&LoggerSettings::default(), env_of(&[]));
        assert_eq!(resolved.min_level, LogLevel::Info);
        assert!(!resolved.verbose);
    }

    #[test]
    fn development_mode_defaults_to_debug() {
        let resolved = ResolvedSettings::resolve(
            &LoggerSettings::default(),
            env_of(&[(ENV_MODE, "development")]),
        );
        assert!(resolved.verbose);
        assert_eq!(resolved.min_level, LogLevel::Debug);
    }

    #[test]
    fn env_level_overrides_mode_default() {
        let resolved = ResolvedSettings::resolve(
            &LoggerSettings::default(),
            env_of(&[(ENV_MODE, "dev"), (ENV_LEVEL, "warn")]),
        );
        assert_eq!(resolved.min_level, LogLevel::Warn);
    }

    #[test]
    fn explicit_level_beats_env() {
        let settings = LoggerSettings {
            min_level: Some(LogLevel::Error),
            verbose: Some(false),
            ..Default::default()
        };
        let resolved = ResolvedSettings::resolve(
            &settings,
            env_of(&[(ENV_MODE, "development"), (ENV_LEVEL, "debug")]),
        );
        assert_eq!(resolved.min_level, LogLevel::Error);
        assert!(!resolved.verbose);
    }

    #[test]
    fn invalid_env_level_falls_back() {
        let resolved = ResolvedSettings::resolve(
            &LoggerSettings::default(),
            env_of(&[(ENV_LEVEL, "chatty")]),
        );
        assert_eq!(resolved.min_level, LogLevel::Info);
    }

    #[test]
    fn production_mode_is_not_verbose() {
        assert!(!is_development_mode("production"));
        assert!(is_development_mode(" Development "));
    }

    #[test]
    fn pool_validation() {
        let mut pool = PoolSettings::default();
        assert!(pool.validate().is_ok());
        pool.max_uses = 0;
        assert!(matches!(
            pool.validate(),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn store_validation_rejects_empty_write_queue() {
        let mut store = StoreSettings::default();
        assert_eq!(store.write_queue, 1024);
        assert!(store.validate().is_ok());
        store.write_queue = 0;
        assert!(matches!(
            store.validate(),
            Err(SettingsError::InvalidValue(message)) if message.contains("writeQueue")
        ));
    }

    #[test]
    fn serde_camel_case_partial() {
        let settings: LoggerSettings =
            serde_json::from_str(r#"{"minLevel":"warn","store":{"pool":{"maxUses":10}}}"#)
                .unwrap();
        assert_eq!(settings.min_level, Some(LogLevel::Warn));
        let store = settings.store.unwrap();
        assert_eq!(store.database, "logs");
        assert_eq!(store.pool.max_uses, 10);
        assert_eq!(store.pool.max_connections, 3);
    }
}
