//! Test utilities for asserting on logger output.
//!
//! [`capturing_logger`] builds a [`Logger`] whose console writes into
//! memory and whose level and verbosity ignore the process environment, so
//! tests stay deterministic under any `TWINLOG_*` variables.

use twinlog_settings::{LoggerSettings, ResolvedSettings};

use crate::console::{CapturedConsole, Console, ConsoleRenderer};
use crate::logger::Logger;

/// Resolve `settings` against an empty environment, with colors off.
pub fn resolve_isolated(settings: &LoggerSettings) -> ResolvedSettings {
    let mut resolved = ResolvedSettings::resolve(settings, |_| None);
    resolved.colors = false;
    resolved
}

/// A logger writing plain text into a [`CapturedConsole`].
///
/// A configured store starts initializing immediately, as with
/// [`Logger::new`].
pub fn capturing_logger(settings: LoggerSettings) -> (Logger, CapturedConsole) {
    let resolved = resolve_isolated(&settings);
    let (console, captured) =
        Console::capture(ConsoleRenderer::new(resolved.min_level, resolved.colors));
    (Logger::with_console(resolved, console), captured)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
