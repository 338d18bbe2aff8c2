//! Database bootstrap, log table schema, and additive column migration.
//!
//! The schema is created with `IF NOT EXISTS` on every start, so it is safe
//! against a database that already holds the table. Columns introduced after
//! the first release are listed in [`ADDITIVE_COLUMNS`] and added to older
//! tables in place.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::{Result, StoreError};

/// Alias used for the target file while the bootstrap connection holds it.
const BOOTSTRAP_ALIAS: &str = "twinlog_target";

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("valid regex"));

const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS logs (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  level      TEXT    NOT NULL,
  message    TEXT    NOT NULL,
  metadata   TEXT,
  stacktrace TEXT,
  timestamp  TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs (timestamp);
CREATE INDEX IF NOT EXISTS idx_logs_level ON logs (level);
";

/// A column added after the original table layout.
#[derive(Clone, Copy, Debug)]
pub struct AdditiveColumn {
    /// Column name.
    pub name: &'static str,
    /// Type and constraints, as written after the name in `ADD COLUMN`.
    pub definition: &'static str,
}

/// Columns that older tables may lack, in the order they were introduced.
pub const ADDITIVE_COLUMNS: &[AdditiveColumn] = &[AdditiveColumn {
    name: "stacktrace",
    definition: "TEXT",
}];

/// Check that `name` is a plain identifier safe to use as a database name.
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_owned()))
    }
}

/// Create the database file at `path` if it is absent.
///
/// Uses a short-lived in-memory connection that attaches the file (which
/// creates it) and detaches again, so nothing is selected as the working
/// database until the pool opens it.
pub fn ensure_database(path: &Path, database: &str) -> Result<()> {
    validate_identifier(database)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    let bootstrap = Connection::open_in_memory()?;
    let target = path.to_string_lossy();
    let _ = bootstrap.execute(
        &format!("ATTACH DATABASE ?1 AS {BOOTSTRAP_ALIAS}"),
        [target.as_ref()],
    )?;
    bootstrap.execute_batch(&format!(
        "PRAGMA {BOOTSTRAP_ALIAS}.journal_mode = WAL; DETACH DATABASE {BOOTSTRAP_ALIAS};"
    ))?;
    bootstrap.close().map_err(|(_, e)| StoreError::Sqlite(e))?;

    debug!(path = %path.display(), database, "log database ready");
    Ok(())
}

/// Create the log table and its indexes if they do not exist.
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_SCHEMA)?;
    Ok(())
}

/// Add any [`ADDITIVE_COLUMNS`] the log table lacks.
///
/// Returns the names of the columns that were added.
pub fn migrate(conn: &Connection) -> Result<Vec<&'static str>> {
    migrate_columns(conn, ADDITIVE_COLUMNS)
}

/// Add whichever of `columns` the log table lacks, stopping at the first
/// failure.
pub fn migrate_columns(
    conn: &Connection,
    columns: &[AdditiveColumn],
) -> Result<Vec<&'static str>> {
    let existing = table_columns(conn, "logs")?;
    let mut added = Vec::new();

    for column in columns {
        if existing.iter().any(|c| c == column.name) {
            continue;
        }
        conn.execute_batch(&format!(
            "ALTER TABLE logs ADD COLUMN {} {}",
            column.name, column.definition
        ))
        .map_err(|e| StoreError::Migration {
            message: format!("add column {}: {e}", column.name),
        })?;
        info!(column = column.name, "added log table column");
        added.push(column.name);
    }

    Ok(added)
}

/// Column names of `table`, in declaration order.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(|e| StoreError::Migration {
            message: format!("read columns of {table}: {e}"),
        })?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
