//! `SQLite` connection pool with per-connection use limits.
//!
//! Uses `r2d2` with an `r2d2_sqlite` backend wrapped in [`RecyclingManager`],
//! which retires a connection once it has served `max_uses` checkouts. The
//! [`PragmaCustomizer`] sets WAL mode and the busy timeout on each new
//! connection, and [`TransientErrorFilter`] keeps routine contention out of
//! the console while forwarding everything else.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;

use r2d2::{ManageConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, ErrorCode};
use twinlog_core::{DiagnosticSink, LogLevel};
use twinlog_settings::PoolSettings;

use crate::errors::Result;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<RecyclingManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<RecyclingManager>;

/// A connection that counts how many times it was used.
pub struct CountedConnection {
    conn: Connection,
    uses: u32,
}

impl CountedConnection {
    /// Record one checkout.
    pub fn record_use(&mut self) {
        self.uses = self.uses.saturating_add(1);
    }

    /// Checkouts recorded so far.
    pub fn uses(&self) -> u32 {
        self.uses
    }
}

impl Deref for CountedConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl DerefMut for CountedConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

/// Connection manager that discards connections past their use budget.
pub struct RecyclingManager {
    inner: SqliteConnectionManager,
    max_uses: u32,
}

impl RecyclingManager {
    /// Manage connections to the database file at `path`.
    pub fn file(path: &Path, max_uses: u32) -> Self {
        Self {
            inner: SqliteConnectionManager::file(path),
            max_uses,
        }
    }

    /// Manage private in-memory connections (for testing).
    pub fn memory(max_uses: u32) -> Self {
        Self {
            inner: SqliteConnectionManager::memory(),
            max_uses,
        }
    }
}

impl fmt::Debug for RecyclingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecyclingManager")
            .field("max_uses", &self.max_uses)
            .finish_non_exhaustive()
    }
}

impl ManageConnection for RecyclingManager {
    type Connection = CountedConnection;
    type Error = rusqlite::Error;

    fn connect(&self) -> std::result::Result<CountedConnection, rusqlite::Error> {
        Ok(CountedConnection {
            conn: self.inner.connect()?,
            uses: 0,
        })
    }

    fn is_valid(&self, conn: &mut CountedConnection) -> std::result::Result<(), rusqlite::Error> {
        self.inner.is_valid(&mut conn.conn)
    }

    fn has_broken(&self, conn: &mut CountedConnection) -> bool {
        conn.uses >= self.max_uses
    }
}

/// `SQLite` pragma customizer that runs on each new connection.
#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<CountedConnection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut CountedConnection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))?;
        Ok(())
    }
}

/// Pool error handler that drops transient contention errors and forwards
/// the rest to the console diagnostic path.
#[derive(Debug)]
pub struct TransientErrorFilter {
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl TransientErrorFilter {
    /// Forward non-transient errors to `diagnostics`.
    pub fn new(diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self { diagnostics }
    }
}

impl r2d2::HandleError<rusqlite::Error> for TransientErrorFilter {
    fn handle_error(&self, error: rusqlite::Error) {
        if is_transient(&error) {
            tracing::debug!(error = %error, "suppressed transient pool error");
            return;
        }
        self.diagnostics
            .diagnostic(LogLevel::Warn, &format!("log store pool error: {error}"));
    }
}

/// Whether an error is routine contention that resolves on its own.
pub fn is_transient(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::OperationInterrupted
            )
    )
}

/// Create a file-backed connection pool.
pub fn new_file(
    path: &Path,
    settings: &PoolSettings,
    diagnostics: Arc<dyn DiagnosticSink>,
) -> Result<ConnectionPool> {
    build(RecyclingManager::file(path, settings.max_uses), settings, diagnostics)
}

/// Create an in-memory connection pool (for testing).
pub fn new_in_memory(
    settings: &PoolSettings,
    diagnostics: Arc<dyn DiagnosticSink>,
) -> Result<ConnectionPool> {
    build(RecyclingManager::memory(settings.max_uses), settings, diagnostics)
}

fn build(
    manager: RecyclingManager,
    settings: &PoolSettings,
    diagnostics: Arc<dyn DiagnosticSink>,
) -> Result<ConnectionPool> {
    let pool = Pool::builder()
        .max_size(settings.max_connections)
        .min_idle(Some(0))
        .idle_timeout(Some(settings.idle_timeout()))
        .connection_timeout(settings.queue_timeout())
        .error_handler(Box::new(TransientErrorFilter::new(diagnostics)))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: settings.busy_timeout_ms,
        }))
        .build(manager)?;
    Ok(pool)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
