//! Human-readable console output.
//!
//! [`ConsoleRenderer`] turns a [`LogRecord`] plus its [`Enrichment`] into a
//! text block; [`Console`] writes that block to stdout, stderr, or an
//! in-memory [`CapturedConsole`]. The console is also the diagnostic path
//! for the store: anything that goes wrong in persistence ends up here and
//! nowhere else.

use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use twinlog_core::{DiagnosticSink, LogLevel, LogRecord, Metadata, StackFrame};
use twinlog_settings::ConsoleStream;

// ANSI color codes for terminal output
const RED: &str = "\x1b[91m";
const YELLOW: &str = "\x1b[93m";
const CYAN: &str = "\x1b[96m";
const MAGENTA: &str = "\x1b[95m";
const BOLD_RED: &str = "\x1b[1m\x1b[91m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Stack lines shown under an error before the block is cut.
pub const MAX_STACK_LINES: usize = 10;

/// Diagnosis attached to a record on the error path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Enrichment {
    /// First application frame, shown as a trailing location hint.
    pub location: Option<StackFrame>,
    /// Stack text (real or synthetic) to show under the line.
    pub stack: Option<String>,
    /// Cause titles, outermost first.
    pub causes: Vec<String>,
    /// Source snippet around `location`.
    pub code_frame: Option<String>,
}

/// Formats records as console text.
#[derive(Clone, Copy, Debug)]
pub struct ConsoleRenderer {
    min_level: LogLevel,
    colors: bool,
}

impl ConsoleRenderer {
    /// Renderer that drops records below `min_level`.
    pub fn new(min_level: LogLevel, colors: bool) -> Self {
        Self { min_level, colors }
    }

    /// Minimum level rendered.
    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Whether a record at `level` passes the filter.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    /// Render `record`, or `None` when it is below the minimum level.
    pub fn render(&self, record: &LogRecord, enrichment: &Enrichment) -> Option<String> {
        self.enabled(record.level())
            .then(|| self.format(record, enrichment))
    }

    /// Render `record` regardless of the minimum level.
    pub fn format(&self, record: &LogRecord, enrichment: &Enrichment) -> String {
        let mut out = String::new();
        let time = record
            .timestamp()
            .with_timezone(&Local)
            .format("%H:%M:%S%.3f");
        let level = record.level();

        let _ = write!(
            out,
            "{} {}",
            self.paint(DIM, &time.to_string()),
            self.paint(level_color(level), &format!("[{}]", level.label()))
        );
        let _ = write!(out, " {}", record.message());
        if record.has_metadata() {
            let _ = write!(out, " {}", self.paint(DIM, record.metadata()));
        }
        if let Some(location) = &enrichment.location {
            let _ = write!(out, " {}", self.paint(DIM, &format!("({location})")));
        }

        if level == LogLevel::Error {
            if let Some(stack) = &enrichment.stack {
                for line in stack.lines().take(MAX_STACK_LINES) {
                    out.push('\n');
                    out.push_str(&self.paint(DIM, line));
                }
            }
            if !enrichment.causes.is_empty() {
                out.push('\n');
                out.push_str(&self.paint(
                    RED,
                    &format!("  ↳ caused by: {}", enrichment.causes.join(" → ")),
                ));
            }
        }

        if let Some(frame) = &enrichment.code_frame {
            out.push('\n');
            out.push_str(frame);
        }
        out
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_owned()
        }
    }
}

fn level_color(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => MAGENTA,
        LogLevel::Info => CYAN,
        LogLevel::Warn => YELLOW,
        LogLevel::Error => BOLD_RED,
    }
}

#[derive(Clone, Debug)]
enum Target {
    Stdout,
    Stderr,
    Capture(CapturedConsole),
}

/// A renderer bound to an output stream.
#[derive(Clone, Debug)]
pub struct Console {
    renderer: ConsoleRenderer,
    target: Target,
}

impl Console {
    /// Console writing to a standard stream.
    pub fn new(renderer: ConsoleRenderer, stream: ConsoleStream) -> Self {
        let target = match stream {
            ConsoleStream::Stdout => Target::Stdout,
            ConsoleStream::Stderr => Target::Stderr,
        };
        Self { renderer, target }
    }

    /// Console writing into memory, with a handle to read what was written.
    pub fn capture(renderer: ConsoleRenderer) -> (Self, CapturedConsole) {
        let captured = CapturedConsole::default();
        let console = Self {
            renderer,
            target: Target::Capture(captured.clone()),
        };
        (console, captured)
    }

    /// The renderer in use.
    pub fn renderer(&self) -> &ConsoleRenderer {
        &self.renderer
    }

    /// Render and write `record`. Returns whether anything was written.
    pub fn emit(&self, record: &LogRecord, enrichment: &Enrichment) -> bool {
        match self.renderer.render(record, enrichment) {
            Some(text) => {
                self.write_block(&text);
                true
            }
            None => false,
        }
    }

    /// Write a pre-rendered block followed by a newline. Write errors are
    /// ignored.
    pub fn write_block(&self, text: &str) {
        match &self.target {
            Target::Stdout => {
                let _ = writeln!(std::io::stdout().lock(), "{text}");
            }
            Target::Stderr => {
                let _ = writeln!(std::io::stderr().lock(), "{text}");
            }
            Target::Capture(captured) => captured.push(text),
        }
    }
}

impl DiagnosticSink for Console {
    fn diagnostic(&self, level: LogLevel, message: &str) {
        let record = LogRecord::new(level, message, &Metadata::new(), None);
        self.write_block(&self.renderer.format(&record, &Enrichment::default()));
    }
}

/// In-memory console output, shared between a [`Console`] and its reader.
#[derive(Clone, Debug, Default)]
pub struct CapturedConsole {
    blocks: Arc<Mutex<Vec<String>>>,
}

impl CapturedConsole {
    fn push(&self, text: &str) {
        self.blocks.lock().push(text.to_owned());
    }

    /// Every block written so far, one entry per log call.
    pub fn blocks(&self) -> Vec<String> {
        self.blocks.lock().clone()
    }

    /// Every output line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.blocks
            .lock()
            .iter()
            .flat_map(|b| b.lines().map(str::to_owned))
            .collect()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.blocks.lock().iter().any(|b| b.contains(needle))
    }

    /// Number of blocks whose first line carries `level`'s label.
    pub fn count_at_level(&self, level: LogLevel) -> usize {
        let tag = format!("[{}]", level.label());
        self.blocks
            .lock()
            .iter()
            .filter(|b| b.lines().next().is_some_and(|l| l.contains(&tag)))
            .count()
    }

    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        self.blocks.lock().is_empty()
    }

    /// Forget everything written so far.
    pub fn clear(&self) {
        self.blocks.lock().clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
