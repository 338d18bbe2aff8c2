//! Stack trace parsing and synthetic call-site capture.
//!
//! A frame is one line in either of two shapes:
//!
//! - parenthesized: `... (FILE:LINE:COLUMN)`
//! - bare: `at FILE:LINE:COLUMN`, optionally indented
//!
//! Only frames pointing at application source count. A path is application
//! source when it is relative or lies under the current working directory,
//! and contains no dependency or toolchain marker.

use std::backtrace::Backtrace;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Maximum frame lines kept in a synthetic call-site.
pub const SYNTHETIC_FRAME_LIMIT: usize = 5;

/// Header line of a synthetic call-site.
pub const SYNTHETIC_HEADER: &str = "Callsite";

static PAREN_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]+?):(\d+):(\d+)\)").expect("valid regex"));

static BARE_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*at\s+(\S+?):(\d+):(\d+)\s*$").expect("valid regex"));

/// Path fragments identifying dependency, toolchain, or generated code.
const DEPENDENCY_MARKERS: &[&str] = &[
    "/.cargo/registry/",
    "/.cargo/git/",
    "/.rustup/",
    "/rustc/",
    "/target/",
    "node_modules",
];

/// Path fragments identifying this logging subsystem's own sources.
const INTERNAL_MARKERS: &[&str] = &["twinlog-core/src/", "twinlog-store/src/", "twinlog/src/"];

/// A resolved source location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    /// Source path, relative to the working directory when under it.
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column, when known.
    pub column: Option<u32>,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(f, "{}:{}:{column}", self.file, self.line),
            None => write!(f, "{}:{}", self.file, self.line),
        }
    }
}

/// Parse one stack line in either accepted shape, regardless of path.
pub fn parse_frame_line(line: &str) -> Option<StackFrame> {
    let caps = PAREN_FRAME
        .captures(line)
        .or_else(|| BARE_FRAME.captures(line))?;
    let line_no: u32 = caps[2].parse().ok().filter(|n| *n >= 1)?;
    let column: u32 = caps[3].parse().ok().filter(|n| *n >= 1)?;
    Some(StackFrame {
        file: caps[1].to_owned(),
        line: line_no,
        column: Some(column),
    })
}

/// First frame that points at application source, with its path made
/// relative to the working directory.
pub fn first_application_frame(stack: &str) -> Option<StackFrame> {
    stack
        .lines()
        .filter_map(parse_frame_line)
        .find(|frame| is_application_path(&frame.file))
        .map(|frame| StackFrame {
            file: relative_path(&frame.file),
            ..frame
        })
}

/// Whether any line of `stack` is an application frame.
pub fn has_application_frame(stack: &str) -> bool {
    first_application_frame(stack).is_some()
}

/// Capture the current call location as stack text.
///
/// Keeps at most [`SYNTHETIC_FRAME_LIMIT`] application frames (excluding this
/// subsystem's own), each normalized to `    at FILE:LINE:COLUMN`, under a
/// [`SYNTHETIC_HEADER`] line. Without debug info the result is the header
/// alone.
pub fn capture_synthetic_callsite() -> String {
    let backtrace = Backtrace::force_capture().to_string();
    let frames: Vec<String> = backtrace
        .lines()
        .filter_map(parse_frame_line)
        .filter(|frame| is_application_path(&frame.file) && !is_internal_path(&frame.file))
        .take(SYNTHETIC_FRAME_LIMIT)
        .map(|frame| {
            let frame = StackFrame {
                file: relative_path(&frame.file),
                ..frame
            };
            format!("    at {frame}")
        })
        .collect();

    let mut out = String::from(SYNTHETIC_HEADER);
    for frame in frames {
        out.push('\n');
        out.push_str(&frame);
    }
    out
}

/// Whether `path` is application source (see module docs).
pub fn is_application_path(path: &str) -> bool {
    if DEPENDENCY_MARKERS.iter().any(|marker| path.contains(marker)) {
        return false;
    }
    let candidate = Path::new(path);
    if candidate.is_relative() {
        return true;
    }
    std::env::current_dir().is_ok_and(|cwd| candidate.starts_with(cwd))
}

fn is_internal_path(path: &str) -> bool {
    INTERNAL_MARKERS.iter().any(|marker| path.contains(marker))
}

/// Render `path` relative to the working directory when it lies under it.
pub fn relative_path(path: &str) -> String {
    let candidate = Path::new(path);
    let relative = std::env::current_dir()
        .ok()
        .and_then(|cwd| candidate.strip_prefix(cwd).ok().map(Path::to_path_buf));
    let rendered = match relative {
        Some(rel) => rel.to_string_lossy().into_owned(),
        None => path.to_owned(),
    };
    match rendered.strip_prefix("./") {
        Some(rest) => rest.to_owned(),
        None => rendered,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
