//! Process-wide fault hooks.
//!
//! [`install_fault_hooks`] replaces the panic hook once per process. A panic
//! is first written raw to stderr, then routed through the logger. What
//! kind of fault it is depends on the panicking thread:
//!
//! - the main thread (including a `#[tokio::main]` body): an uncaught
//!   exception. In-flight writes get up to [`FLUSH_DELAY`] before the hook
//!   returns.
//! - any other thread, Tokio workers included: the panic only fails that
//!   task or thread, so it is reported like an unobserved rejection.
//!
//! The hook never exits the process. Unwinding decides: a panic nobody
//! catches ends the main thread and with it the process, while one caught
//! by `catch_unwind` or observed through a `JoinHandle` does not.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt::Write as _;
use std::panic::PanicHookInfo;
use std::sync::atomic::{AtomicBool, Ordering};

use twinlog_core::Fault;

use crate::logger::{FLUSH_DELAY, Logger, fault_metadata};

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Name the standard library gives the thread running `main`.
const MAIN_THREAD: &str = "main";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PanicKind {
    Uncaught,
    Rejection,
}

impl PanicKind {
    fn of_thread(name: Option<&str>) -> Self {
        if name == Some(MAIN_THREAD) {
            Self::Uncaught
        } else {
            Self::Rejection
        }
    }
}

/// Install the panic hook for `logger`. Returns `false` when hooks were
/// already installed in this process.
pub fn install_fault_hooks(logger: &Logger) -> bool {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return false;
    }
    let logger = logger.clone();
    std::panic::set_hook(Box::new(move |info| on_panic(&logger, info)));
    true
}

/// Whether [`install_fault_hooks`] has run in this process.
pub fn fault_hooks_installed() -> bool {
    INSTALLED.load(Ordering::SeqCst)
}

fn on_panic(logger: &Logger, info: &PanicHookInfo<'_>) {
    let message = panic_message(info);
    let thread = std::thread::current();
    let thread_name = thread.name().unwrap_or("<unnamed>");
    match info.location() {
        Some(location) => {
            eprintln!("[twinlog] thread '{thread_name}' panicked at {location}: {message}");
        }
        None => eprintln!("[twinlog] thread '{thread_name}' panicked: {message}"),
    }

    let fault = Fault::new("Panic", message).with_stack(panic_stack(info));
    match PanicKind::of_thread(thread.name()) {
        PanicKind::Uncaught => {
            logger.error_enriched(
                "Uncaught exception",
                fault,
                fault_metadata("uncaughtException"),
            );
            let _ = logger.flush(FLUSH_DELAY);
        }
        PanicKind::Rejection => logger.report_unhandled_rejection(fault),
    }
}

/// The panic payload as text.
fn panic_message(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_owned()
    }
}

/// Panic location as the first frame, followed by the backtrace when
/// `RUST_BACKTRACE` enables one.
fn panic_stack(info: &PanicHookInfo<'_>) -> String {
    let mut stack = String::from("Panic");
    if let Some(location) = info.location() {
        let _ = write!(
            stack,
            "\n    at {}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        );
    }
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        stack.push('\n');
        stack.push_str(&backtrace.to_string());
    }
    stack
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_thread_panics_are_uncaught() {
        assert_eq!(PanicKind::of_thread(Some("main")), PanicKind::Uncaught);
    }

    #[test]
    fn other_threads_are_rejections() {
        assert_eq!(
            PanicKind::of_thread(Some("tokio-runtime-worker")),
            PanicKind::Rejection
        );
        assert_eq!(
            PanicKind::of_thread(Some("twinlog-store-writer")),
            PanicKind::Rejection
        );
        assert_eq!(PanicKind::of_thread(None), PanicKind::Rejection);
    }
}
