//! The logging facade.
//!
//! A [`Logger`] renders every call to the console and, when a store is
//! configured, offers non-debug records to it. Error inputs are enriched
//! first: the cause chain, the first application frame of the stack, and in
//! verbose mode a synthetic call-site and a source code frame.
//!
//! No method returns an error or blocks on the store. The only calls that
//! do not return are [`Logger::terminate`] and the fatal path built on it.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use twinlog_core::{
    DiagnosticSink, ErrorInput, Fault, LogLevel, LogRecord, Metadata, build_code_frame,
    capture_synthetic_callsite, cause_chain, first_application_frame, has_application_frame,
};
use twinlog_settings::{LoggerSettings, ResolvedSettings, load_settings};
use twinlog_store::{LogStore, StoreStatus};

use crate::compat::CompatLogger;
use crate::console::{Console, ConsoleRenderer, Enrichment};

/// Time given to in-flight writes before the process exits.
pub const FLUSH_DELAY: Duration = Duration::from_millis(100);

struct Inner {
    settings: ResolvedSettings,
    console: Arc<Console>,
    store: Option<LogStore>,
}

/// Dual-sink logger handle. Cheap to clone; clones share console and store.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.inner.settings.min_level)
            .field("verbose", &self.inner.settings.verbose)
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Build a logger, resolving level and verbosity against the process
    /// environment.
    pub fn new(settings: LoggerSettings) -> Self {
        Self::from_resolved(ResolvedSettings::from_env(&settings))
    }

    /// Build a logger from the settings file and environment.
    ///
    /// An unreadable or invalid settings file is reported on the console and
    /// replaced by defaults.
    pub fn from_config() -> Self {
        match load_settings() {
            Ok(settings) => Self::new(settings),
            Err(err) => {
                let logger = Self::new(LoggerSettings::default());
                logger.inner.console.diagnostic(
                    LogLevel::Warn,
                    &format!("ignoring logger settings: {err}"),
                );
                logger
            }
        }
    }

    /// Build a logger writing to the configured console stream.
    pub fn from_resolved(settings: ResolvedSettings) -> Self {
        let renderer = ConsoleRenderer::new(settings.min_level, settings.colors);
        let console = Console::new(renderer, settings.stream);
        Self::with_console(settings, console)
    }

    /// Build a logger around an existing console.
    ///
    /// When store settings are present the store starts initializing in
    /// the background immediately.
    pub fn with_console(settings: ResolvedSettings, console: Console) -> Self {
        let console = Arc::new(console);
        let store = settings.store.clone().map(|store_settings| {
            let diagnostics: Arc<dyn DiagnosticSink> = Arc::clone(&console) as _;
            let store = LogStore::new(store_settings, settings.verbose, diagnostics);
            let _ = store.initialize();
            store
        });
        Self {
            inner: Arc::new(Inner {
                settings,
                console,
                store,
            }),
        }
    }

    /// Log at info level.
    pub fn info(&self, message: &str, metadata: impl Into<Option<Metadata>>) {
        self.emit(LogLevel::Info, message, metadata.into(), Enrichment::default(), None);
    }

    /// Log at warn level.
    pub fn warn(&self, message: &str, metadata: impl Into<Option<Metadata>>) {
        self.emit(LogLevel::Warn, message, metadata.into(), Enrichment::default(), None);
    }

    /// Log at debug level. Console only; never persisted.
    pub fn debug(&self, message: &str, metadata: impl Into<Option<Metadata>>) {
        self.emit(LogLevel::Debug, message, metadata.into(), Enrichment::default(), None);
    }

    /// Log an error value or message.
    ///
    /// Structured faults are enriched with their cause chain and stack
    /// location; anything else is logged as its string form.
    pub fn error(&self, input: impl Into<ErrorInput>, metadata: impl Into<Option<Metadata>>) {
        let input = input.into();
        let message = input.message().to_owned();
        self.emit_error(&message, &input, metadata.into());
    }

    /// Log an error with a caller-supplied context. The message is always
    /// `"{context}: {error message}"`.
    pub fn error_enriched(
        &self,
        context: &str,
        error: impl Into<ErrorInput>,
        metadata: impl Into<Option<Metadata>>,
    ) {
        let input = error.into();
        let message = format!("{context}: {}", input.message());
        self.emit_error(&message, &input, metadata.into());
    }

    /// Log at an arbitrary level. `Error` takes the error path with a raw
    /// message.
    pub fn log(&self, level: LogLevel, message: &str, metadata: impl Into<Option<Metadata>>) {
        match level {
            LogLevel::Error => self.error(message, metadata),
            _ => self.emit(level, message, metadata.into(), Enrichment::default(), None),
        }
    }

    /// Report a failure of detached background work that nobody observed.
    /// The process keeps running.
    pub fn report_unhandled_rejection<E>(&self, error: E)
    where
        E: Error + Send + Sync + 'static,
    {
        self.error_enriched(
            "Unhandled rejection",
            Fault::from_error(error),
            fault_metadata("unhandledRejection"),
        );
    }

    /// A handle shaped for framework logger interfaces.
    pub fn compat(&self) -> CompatLogger {
        CompatLogger::new(self.clone())
    }

    /// Store lifecycle state, or `None` when persistence is disabled.
    pub fn store_status(&self) -> Option<StoreStatus> {
        self.inner.store.as_ref().map(LogStore::status)
    }

    /// The store, when persistence is enabled.
    pub fn store(&self) -> Option<&LogStore> {
        self.inner.store.as_ref()
    }

    /// Block until in-flight writes finish or `timeout` elapses. Returns
    /// `true` when nothing is left in flight.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.inner
            .store
            .as_ref()
            .is_none_or(|store| store.flush(timeout))
    }

    /// Give in-flight writes up to [`FLUSH_DELAY`], then exit with `code`.
    pub fn terminate(&self, code: i32) -> ! {
        let _ = self.flush(FLUSH_DELAY);
        std::process::exit(code)
    }

    /// Effective settings.
    pub fn settings(&self) -> &ResolvedSettings {
        &self.inner.settings
    }

    /// Whether two handles share one logger.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn emit_error(&self, message: &str, input: &ErrorInput, metadata: Option<Metadata>) {
        let (enrichment, stacktrace) = match input {
            ErrorInput::Structured(fault) => self.enrich(fault),
            ErrorInput::Raw(_) => (Enrichment::default(), None),
        };
        self.emit(LogLevel::Error, message, metadata, enrichment, stacktrace);
    }

    fn emit(
        &self,
        level: LogLevel,
        message: &str,
        metadata: Option<Metadata>,
        enrichment: Enrichment,
        stacktrace: Option<String>,
    ) {
        if level < self.inner.settings.min_level {
            return;
        }
        let record = LogRecord::new(level, message, &metadata.unwrap_or_default(), stacktrace);
        let _ = self.inner.console.emit(&record, &enrichment);
        if level.is_persisted() {
            if let Some(store) = &self.inner.store {
                store.write(&record);
            }
        }
    }

    /// Diagnose a fault. Returns what the console shows and the stack text
    /// to persist.
    fn enrich(&self, fault: &Fault) -> (Enrichment, Option<String>) {
        let verbose = self.inner.settings.verbose;
        let causes = cause_chain(fault);

        let mut stack = fault.stack().map(str::to_owned);
        if verbose && !stack.as_deref().is_some_and(has_application_frame) {
            let synthetic = capture_synthetic_callsite();
            stack = Some(match stack {
                Some(original) => format!("{original}\n{synthetic}"),
                None => synthetic,
            });
        }

        let location = stack.as_deref().and_then(first_application_frame);
        let code_frame = if verbose {
            location.as_ref().and_then(build_code_frame)
        } else {
            None
        };

        let persisted = persisted_stacktrace(stack.as_deref(), &causes);
        let enrichment = Enrichment {
            location,
            stack,
            causes,
            code_frame,
        };
        (enrichment, persisted)
    }
}

/// Stack text followed by one `Caused by:` line per cause.
fn persisted_stacktrace(stack: Option<&str>, causes: &[String]) -> Option<String> {
    if stack.is_none() && causes.is_empty() {
        return None;
    }
    let mut text = stack.unwrap_or_default().trim_end().to_owned();
    for cause in causes {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str("Caused by: ");
        text.push_str(cause);
    }
    Some(text)
}

pub(crate) fn fault_metadata(kind: &str) -> Metadata {
    let mut metadata = Metadata::new();
    let _ = metadata.insert("fault".to_owned(), Value::String(kind.to_owned()));
    metadata
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
