//! Error types for the log store.
//!
//! [`StoreError`] never leaves the crate's public write path: the store
//! converts every failure into a console diagnostic. It is public so the
//! lower-level [`schema`](crate::schema) and [`pool`](crate::pool) helpers
//! can be used and tested on their own.

use thiserror::Error;

/// Errors that can occur while opening or writing to the log store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Filesystem error while preparing the data directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Database name is not a plain identifier.
    #[error("invalid database identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Additive column migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Which column failed and why.
        message: String,
    },
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_from_conversion() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Sqlite(_)));
        assert!(err.to_string().starts_with("sqlite error:"));
    }

    #[test]
    fn invalid_identifier_display() {
        let err = StoreError::InvalidIdentifier("logs; DROP".into());
        assert_eq!(
            err.to_string(),
            "invalid database identifier: \"logs; DROP\""
        );
    }

    #[test]
    fn migration_display() {
        let err = StoreError::Migration {
            message: "add column stacktrace: disk full".into(),
        };
        assert_eq!(
            err.to_string(),
            "migration error: add column stacktrace: disk full"
        );
    }

    #[test]
    fn io_error_from_conversion() {
        let err: StoreError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
