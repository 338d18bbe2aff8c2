//! Store lifecycle: lazy initialization and the fire-and-forget write path.
//!
//! A [`LogStore`] moves through [`StoreStatus`] states:
//!
//! ```text
//! Uninitialized ──initialize──▶ Initializing ──ok──▶ Ready
//!                                     │
//!                                     └──err──▶ Failed ──initialize──▶ Initializing
//! ```
//!
//! Setup runs as a detached blocking task. Once ready, writes go through a
//! bounded queue to a single writer thread that owns the pool. A full queue
//! drops the record instead of making the caller wait. The caller never
//! sees a write error: failures go to the console diagnostic path only.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use parking_lot::{Condvar, Mutex};
use rusqlite::params;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};
use twinlog_core::{DiagnosticSink, LogLevel, LogRecord};
use twinlog_settings::StoreSettings;

use crate::errors::Result;
use crate::pool::{self, ConnectionPool};
use crate::schema::{self, ADDITIVE_COLUMNS, AdditiveColumn};

const INSERT_SQL: &str = "INSERT INTO logs (level, message, metadata, stacktrace, timestamp) \
                          VALUES (?1, ?2, ?3, ?4, ?5)";

const WRITER_THREAD: &str = "twinlog-store-writer";

/// Observable store lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreStatus {
    /// `initialize` has not been called.
    Uninitialized,
    /// Setup is running.
    Initializing,
    /// Writes are accepted.
    Ready,
    /// Setup failed. Writes are dropped until `initialize` is called again.
    Failed,
}

enum State {
    Uninitialized,
    Initializing,
    Ready(mpsc::Sender<QueuedWrite>),
    Failed,
}

impl State {
    fn status(&self) -> StoreStatus {
        match self {
            Self::Uninitialized => StoreStatus::Uninitialized,
            Self::Initializing => StoreStatus::Initializing,
            Self::Ready(_) => StoreStatus::Ready,
            Self::Failed => StoreStatus::Failed,
        }
    }
}

struct Shared {
    settings: StoreSettings,
    verbose: bool,
    diagnostics: Arc<dyn DiagnosticSink>,
    additive_columns: &'static [AdditiveColumn],
    state: Mutex<State>,
    settled: Condvar,
    writes: Arc<WriteTracker>,
}

/// Durable log sink backed by a pooled `SQLite` database.
///
/// Cheap to clone; clones share one lifecycle.
#[derive(Clone)]
pub struct LogStore {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("path", &self.path())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl LogStore {
    /// Create an uninitialized store.
    ///
    /// With `verbose` set, failed writes are reported to `diagnostics`;
    /// otherwise they are dropped silently.
    pub fn new(settings: StoreSettings, verbose: bool, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self::with_columns(settings, verbose, diagnostics, ADDITIVE_COLUMNS)
    }

    fn with_columns(
        settings: StoreSettings,
        verbose: bool,
        diagnostics: Arc<dyn DiagnosticSink>,
        additive_columns: &'static [AdditiveColumn],
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                settings,
                verbose,
                diagnostics,
                additive_columns,
                state: Mutex::new(State::Uninitialized),
                settled: Condvar::new(),
                writes: Arc::new(WriteTracker::default()),
            }),
        }
    }

    /// Start setup in the background.
    ///
    /// Returns `false` without doing anything when the store is already
    /// ready or a setup is in flight. A failed store may be initialized
    /// again.
    pub fn initialize(&self) -> bool {
        {
            let mut state = self.shared.state.lock();
            match *state {
                State::Ready(_) | State::Initializing => return false,
                State::Uninitialized | State::Failed => *state = State::Initializing,
            }
        }

        let shared = Arc::clone(&self.shared);
        if let Err(err) = spawn_detached("twinlog-store-init", move || shared.setup()) {
            self.shared.finish_setup(Err(err.into()));
        }
        true
    }

    /// Queue `record` for the writer.
    ///
    /// A no-op unless the store is [`StoreStatus::Ready`]. Never blocks: a
    /// record that finds the queue full is dropped.
    pub fn write(&self, record: &LogRecord) {
        let state = self.shared.state.lock();
        let State::Ready(queue) = &*state else {
            return;
        };

        let job = QueuedWrite {
            record: record.clone(),
            _pending: PendingWrite::start(&self.shared.writes),
        };
        match queue.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("log write queue full, record dropped"),
            Err(TrySendError::Closed(_)) => debug!("log writer gone, record dropped"),
        }
    }

    /// Current lifecycle state.
    pub fn status(&self) -> StoreStatus {
        self.shared.state.lock().status()
    }

    /// Block until setup is no longer in flight, or `timeout` elapses.
    pub fn wait_settled(&self, timeout: Duration) -> StoreStatus {
        let mut state = self.shared.state.lock();
        let _ = self.shared.settled.wait_while_for(
            &mut state,
            |s| matches!(s, State::Initializing),
            timeout,
        );
        state.status()
    }

    /// Writes queued or running but not yet finished.
    pub fn pending_writes(&self) -> usize {
        *self.shared.writes.in_flight.lock()
    }

    /// Block until every queued write has finished, or `timeout` elapses.
    ///
    /// Returns `true` when nothing is left in flight.
    pub fn flush(&self, timeout: Duration) -> bool {
        let tracker = &self.shared.writes;
        let mut in_flight = tracker.in_flight.lock();
        let _ = tracker
            .drained
            .wait_while_for(&mut in_flight, |n| *n > 0, timeout);
        *in_flight == 0
    }

    /// Path of the database file.
    pub fn path(&self) -> PathBuf {
        self.shared.settings.database_path()
    }
}

impl Shared {
    fn setup(&self) {
        let result = self.open();
        self.finish_setup(result);
    }

    fn finish_setup(&self, result: Result<mpsc::Sender<QueuedWrite>>) {
        let next = match result {
            Ok(queue) => {
                info!(path = %self.settings.database_path().display(), "log store ready");
                State::Ready(queue)
            }
            Err(err) => {
                self.diagnostics.diagnostic(
                    LogLevel::Error,
                    &format!("log store initialization failed: {err}"),
                );
                State::Failed
            }
        };
        *self.state.lock() = next;
        let _ = self.settled.notify_all();
    }

    fn open(&self) -> Result<mpsc::Sender<QueuedWrite>> {
        let path = self.settings.database_path();
        schema::ensure_database(&path, &self.settings.database)?;

        let pool = pool::new_file(&path, &self.settings.pool, Arc::clone(&self.diagnostics))?;
        let conn = pool.get()?;
        schema::create_schema(&conn)?;
        if let Err(err) = schema::migrate_columns(&conn, self.additive_columns) {
            self.diagnostics
                .diagnostic(LogLevel::Warn, &format!("log table migration skipped: {err}"));
        }
        drop(conn);

        let (queue, jobs) = mpsc::channel(self.settings.write_queue.max(1));
        let writer = Writer {
            pool,
            verbose: self.verbose,
            diagnostics: Arc::clone(&self.diagnostics),
        };
        let _ = std::thread::Builder::new()
            .name(WRITER_THREAD.to_owned())
            .spawn(move || writer.run(jobs))?;
        Ok(queue)
    }
}

/// A record waiting for the writer, holding its in-flight count.
struct QueuedWrite {
    record: LogRecord,
    _pending: PendingWrite,
}

/// Drains the write queue into the pool until every sender is gone.
struct Writer {
    pool: ConnectionPool,
    verbose: bool,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl Writer {
    fn run(self, mut jobs: mpsc::Receiver<QueuedWrite>) {
        while let Some(job) = jobs.blocking_recv() {
            if let Err(err) = insert(&self.pool, &job.record) {
                debug!(error = %err, "dropped log record");
                if self.verbose {
                    self.diagnostics.diagnostic(
                        LogLevel::Warn,
                        &format!("failed to persist log record: {err}"),
                    );
                }
            }
        }
        debug!("log writer stopped");
    }
}

/// Count of writes accepted but not yet finished.
#[derive(Default)]
struct WriteTracker {
    in_flight: Mutex<usize>,
    drained: Condvar,
}

/// In-flight write marker. Dropping it, whether the write ran or not,
/// releases the count.
struct PendingWrite {
    tracker: Arc<WriteTracker>,
}

impl PendingWrite {
    fn start(tracker: &Arc<WriteTracker>) -> Self {
        *tracker.in_flight.lock() += 1;
        Self {
            tracker: Arc::clone(tracker),
        }
    }
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        let mut in_flight = self.tracker.in_flight.lock();
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            let _ = self.tracker.drained.notify_all();
        }
    }
}

fn insert(pool: &ConnectionPool, record: &LogRecord) -> Result<()> {
    let mut conn = pool.get()?;
    conn.record_use();
    let _ = conn.execute(
        INSERT_SQL,
        params![
            record.level().to_string(),
            record.message(),
            record.metadata(),
            record.stacktrace(),
            record
                .timestamp()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        ],
    )?;
    Ok(())
}

/// Run `task` off the caller's thread: on the Tokio blocking pool when a
/// runtime is current, otherwise on a dedicated thread.
fn spawn_detached<F>(name: &str, task: F) -> std::io::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        drop(handle.spawn_blocking(task));
        return Ok(());
    }
    let _ = std::thread::Builder::new()
        .name(name.to_owned())
        .spawn(task)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use assert_matches::assert_matches;
    use rusqlite::Connection;
    use twinlog_core::{Metadata, NullSink};
    use twinlog_settings::PoolSettings;

    use super::*;

    const SETTLE: Duration = Duration::from_secs(10);

    const REJECTED_COLUMN: &[AdditiveColumn] = &[AdditiveColumn {
        name: "fingerprint",
        definition: "TEXT UNIQUE",
    }];

    #[derive(Debug, Default)]
    struct RecordingSink(Mutex<Vec<(LogLevel, String)>>);

    impl RecordingSink {
        fn messages(&self) -> Vec<String> {
            self.0.lock().iter().map(|(_, m)| m.clone()).collect()
        }
    }

    impl DiagnosticSink for RecordingSink {
        fn diagnostic(&self, level: LogLevel, message: &str) {
            self.0.lock().push((level, message.to_owned()));
        }
    }

    fn record(message: &str) -> LogRecord {
        LogRecord::new(LogLevel::Info, message, &Metadata::new(), None)
    }

    fn count_rows(store: &LogStore) -> i64 {
        let conn = Connection::open(store.path()).unwrap();
        conn.query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))
            .unwrap()
    }

    fn store_in(dir: &tempfile::TempDir) -> LogStore {
        LogStore::new(
            StoreSettings::in_dir(dir.path().to_string_lossy()),
            false,
            Arc::new(NullSink),
        )
    }

    // ── initialize ──────────────────────────────────────────────────

    #[test]
    fn starts_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.status(), StoreStatus::Uninitialized);
        assert!(!store.path().exists());
    }

    #[test]
    fn initialize_reaches_ready() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Ready);
        assert!(store.path().exists());
        assert_eq!(count_rows(&store), 0);
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.initialize());
        assert!(!store.initialize(), "second call while initializing");
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Ready);
        assert!(!store.initialize(), "call after ready");
        assert_eq!(store.status(), StoreStatus::Ready);
    }

    #[test]
    fn concurrent_initialize_runs_setup_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let started: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| store.initialize()))
                .collect();
            handles
                .into_iter()
                .map(|h| usize::from(h.join().unwrap()))
                .sum()
        });
        assert_eq!(started, 1);
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Ready);
    }

    #[test]
    fn invalid_identifier_fails_with_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let settings = StoreSettings {
            database: "bad-name".into(),
            ..StoreSettings::in_dir(dir.path().to_string_lossy())
        };
        let store = LogStore::new(settings, false, sink.clone());
        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Failed);

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("initialization failed"));
        assert!(messages[0].contains("bad-name"));
    }

    #[test]
    fn unwritable_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let store = LogStore::new(
            StoreSettings::in_dir(blocker.join("inner").to_string_lossy()),
            false,
            Arc::new(NullSink),
        );
        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Failed);
    }

    #[test]
    fn failed_store_can_be_reinitialized() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("later-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let store = LogStore::new(
            StoreSettings::in_dir(blocker.to_string_lossy()),
            false,
            Arc::new(NullSink),
        );
        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Failed);

        std::fs::remove_file(&blocker).unwrap();
        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Ready);
    }

    #[test]
    fn migrates_legacy_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        {
            let conn = Connection::open(store.path()).unwrap();
            conn.execute_batch(
                "CREATE TABLE logs (
                   id INTEGER PRIMARY KEY AUTOINCREMENT,
                   level TEXT NOT NULL,
                   message TEXT NOT NULL,
                   metadata TEXT,
                   timestamp TEXT NOT NULL
                 );",
            )
            .unwrap();
        }
        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Ready);

        let conn = Connection::open(store.path()).unwrap();
        assert!(
            schema::table_columns(&conn, "logs")
                .unwrap()
                .contains(&"stacktrace".to_string())
        );
    }

    #[test]
    fn migration_failure_is_reported_and_store_still_ready() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let store = LogStore::with_columns(
            StoreSettings::in_dir(dir.path().to_string_lossy()),
            false,
            sink.clone(),
            REJECTED_COLUMN,
        );
        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Ready);

        {
            let seen = sink.0.lock();
            assert_eq!(seen.len(), 1);
            assert_matches!(seen[0].0, LogLevel::Warn);
            assert!(seen[0].1.starts_with("log table migration skipped"));
            assert!(seen[0].1.contains("fingerprint"));
        }

        store.write(&record("after a skipped migration"));
        assert!(store.flush(SETTLE));
        assert_eq!(count_rows(&store), 1);
    }

    // ── write ───────────────────────────────────────────────────────

    #[test]
    fn writes_before_ready_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.write(&record("too early"));
        assert_eq!(store.pending_writes(), 0);

        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Ready);
        assert!(store.flush(SETTLE));
        assert_eq!(count_rows(&store), 0);
    }

    #[test]
    fn writes_after_ready_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Ready);

        let mut metadata = Metadata::new();
        let _ = metadata.insert("user".into(), "ada".into());
        store.write(&LogRecord::new(
            LogLevel::Error,
            "boom",
            &metadata,
            Some("    at src/main.rs:3:5".into()),
        ));
        store.write(&record("second"));
        assert!(store.flush(SETTLE));
        assert_eq!(store.pending_writes(), 0);

        let conn = Connection::open(store.path()).unwrap();
        let (level, message, meta, stack, ts): (String, String, String, Option<String>, String) =
            conn.query_row(
                "SELECT level, message, metadata, stacktrace, timestamp FROM logs WHERE message = 'boom'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .unwrap();
        assert_eq!(level, "error");
        assert_eq!(message, "boom");
        assert_eq!(meta, r#"{"user":"ada"}"#);
        assert_eq!(stack.as_deref(), Some("    at src/main.rs:3:5"));
        assert!(ts.ends_with('Z'));
        assert_eq!(count_rows(&store), 2);
    }

    #[test]
    fn writes_persist_bounded_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Ready);

        store.write(&record(&"é".repeat(5000)));
        assert!(store.flush(SETTLE));

        let conn = Connection::open(store.path()).unwrap();
        let len: i64 = conn
            .query_row("SELECT length(message) FROM logs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(len, 2000);
    }

    #[test]
    fn burst_outside_runtime_persists_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Ready);

        for i in 0..600 {
            store.write(&record(&format!("burst {i}")));
        }
        assert!(store.flush(SETTLE));
        assert_eq!(count_rows(&store), 600);
    }

    #[test]
    fn full_queue_drops_records_without_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings {
            write_queue: 2,
            pool: PoolSettings {
                busy_timeout_ms: 5000,
                ..Default::default()
            },
            ..StoreSettings::in_dir(dir.path().to_string_lossy())
        };
        let store = LogStore::new(settings, false, Arc::new(NullSink));
        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Ready);

        // Hold the write lock so the writer stalls on its first insert.
        let blocker = Connection::open(store.path()).unwrap();
        blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let started = Instant::now();
        for i in 0..50 {
            store.write(&record(&format!("burst {i}")));
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        // At most one record in the writer's hands plus a full queue.
        assert!(store.pending_writes() <= 3);

        blocker.execute_batch("COMMIT").unwrap();
        assert!(store.flush(SETTLE));
        let rows = count_rows(&store);
        assert!((2..=3).contains(&rows), "persisted {rows} rows");
    }

    #[test]
    fn write_failures_are_silent_when_not_verbose() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let store = LogStore::new(
            StoreSettings::in_dir(dir.path().to_string_lossy()),
            false,
            sink.clone(),
        );
        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Ready);

        Connection::open(store.path())
            .unwrap()
            .execute_batch("DROP TABLE logs")
            .unwrap();
        store.write(&record("lost"));
        assert!(store.flush(SETTLE));
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn write_failures_reported_when_verbose() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let store = LogStore::new(
            StoreSettings::in_dir(dir.path().to_string_lossy()),
            true,
            sink.clone(),
        );
        assert!(store.initialize());
        assert_eq!(store.wait_settled(SETTLE), StoreStatus::Ready);

        Connection::open(store.path())
            .unwrap()
            .execute_batch("DROP TABLE logs")
            .unwrap();
        store.write(&record("lost"));
        assert!(store.flush(SETTLE));

        let seen = sink.0.lock();
        assert_eq!(seen.len(), 1);
        assert_matches!(seen[0].0, LogLevel::Warn);
        assert!(seen[0].1.starts_with("failed to persist log record"));
    }

    #[tokio::test]
    async fn works_inside_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.initialize());
        let settled = {
            let store = store.clone();
            tokio::task::spawn_blocking(move || store.wait_settled(SETTLE))
                .await
                .unwrap()
        };
        assert_eq!(settled, StoreStatus::Ready);

        store.write(&record("from task"));
        let flushed = {
            let store = store.clone();
            tokio::task::spawn_blocking(move || store.flush(SETTLE))
                .await
                .unwrap()
        };
        assert!(flushed);
        assert_eq!(count_rows(&store), 1);
    }
}
