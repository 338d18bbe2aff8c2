//! Source snippets around a stack frame.
//!
//! Reads the frame's file, so callers only build code frames in verbose
//! mode.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::stack::StackFrame;

/// Lines shown on each side of the culprit line.
pub const CONTEXT_LINES: usize = 2;

/// Read the frame's source file and render the lines around it.
///
/// Returns `None` when the file cannot be read or the line is out of range.
pub fn build_code_frame(frame: &StackFrame) -> Option<String> {
    let source = std::fs::read_to_string(resolve(&frame.file)).ok()?;
    render_code_frame(&source, frame.line, frame.column)
}

/// Render `[line - 2, line + 2]` of `source`, clipped to its bounds.
///
/// The culprit line is marked with `>`; a known column gets a caret on the
/// following line.
pub fn render_code_frame(source: &str, line: u32, column: Option<u32>) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let target = usize::try_from(line).ok()?;
    if target == 0 || target > lines.len() {
        return None;
    }

    let start = target.saturating_sub(CONTEXT_LINES).max(1);
    let end = (target + CONTEXT_LINES).min(lines.len());
    let width = end.to_string().len();

    let mut out = String::new();
    for number in start..=end {
        let text = lines[number - 1];
        let marker = if number == target { '>' } else { ' ' };
        let _ = writeln!(out, "{marker} {number:>width$} | {text}");
        if number == target {
            if let Some(column) = column.and_then(|c| usize::try_from(c).ok()) {
                let pad = " ".repeat(column.saturating_sub(1));
                let _ = writeln!(out, "  {:>width$} | {pad}^", "");
            }
        }
    }
    let _ = out.pop();
    Some(out)
}

fn resolve(file: &str) -> PathBuf {
    let path = PathBuf::from(file);
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
