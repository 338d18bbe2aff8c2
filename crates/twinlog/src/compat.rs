//! Logger surface for frameworks that expect their own logger shape.
//!
//! [`FrameworkLogger`] is object safe, so a framework can hold a
//! `Box<dyn FrameworkLogger>`. [`CompatLogger`] forwards to a [`Logger`]
//! without adding any state of its own.

use twinlog_core::{ErrorInput, Metadata};

use crate::logger::Logger;

/// The logger interface frameworks are written against.
pub trait FrameworkLogger: Send + Sync {
    /// Informational message.
    fn info(&self, message: &str, metadata: Option<Metadata>);

    /// Warning.
    fn warn(&self, message: &str, metadata: Option<Metadata>);

    /// Development detail.
    fn debug(&self, message: &str, metadata: Option<Metadata>);

    /// Error value or message.
    fn error(&self, error: ErrorInput, metadata: Option<Metadata>);

    /// Log at error level, then end the process.
    fn fatal(&self, error: ErrorInput, metadata: Option<Metadata>) -> !;

    /// Finest-grained tracing.
    fn trace(&self, message: &str, metadata: Option<Metadata>);

    /// Logger for a sub-scope. `bindings` are the scope's fields.
    fn child(&self, bindings: Metadata) -> Box<dyn FrameworkLogger>;
}

/// [`FrameworkLogger`] backed by a [`Logger`].
#[derive(Clone, Debug)]
pub struct CompatLogger {
    logger: Logger,
}

impl CompatLogger {
    /// Wrap `logger`.
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// The wrapped logger.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

impl FrameworkLogger for CompatLogger {
    fn info(&self, message: &str, metadata: Option<Metadata>) {
        self.logger.info(message, metadata);
    }

    fn warn(&self, message: &str, metadata: Option<Metadata>) {
        self.logger.warn(message, metadata);
    }

    fn debug(&self, message: &str, metadata: Option<Metadata>) {
        self.logger.debug(message, metadata);
    }

    fn error(&self, error: ErrorInput, metadata: Option<Metadata>) {
        self.logger.error(error, metadata);
    }

    fn fatal(&self, error: ErrorInput, metadata: Option<Metadata>) -> ! {
        self.logger.error(error, metadata);
        self.logger.terminate(1)
    }

    // Trace volume is left to the framework's own tooling.
    fn trace(&self, _message: &str, _metadata: Option<Metadata>) {}

    fn child(&self, _bindings: Metadata) -> Box<dyn FrameworkLogger> {
        Box::new(self.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
