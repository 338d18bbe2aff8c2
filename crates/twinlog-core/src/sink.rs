//! Console-only diagnostic path.

use crate::level::LogLevel;

/// Receives internal failures of the logging subsystem.
///
/// Implementations write to the console and must never persist, so a
/// failing store cannot feed back into itself.
pub trait DiagnosticSink: Send + Sync + std::fmt::Debug {
    /// Report one diagnostic line.
    fn diagnostic(&self, level: LogLevel, message: &str);
}

/// Discards every diagnostic.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn diagnostic(&self, _level: LogLevel, _message: &str) {}
}
