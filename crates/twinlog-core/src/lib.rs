//! # twinlog-core
//!
//! Foundation types and the diagnostic enrichment engine for twinlog.
//!
//! - [`LogLevel`] and [`LogRecord`]: the write-once record produced by each
//!   log call, with bounded message and metadata text
//! - [`Fault`] and [`ErrorInput`]: the tagged union every error input is
//!   reduced to at the facade boundary
//! - [`cause`], [`stack`], [`code_frame`]: cause-chain traversal, stack frame
//!   location, and source snippets used to make error lines actionable
//! - [`DiagnosticSink`]: the console-only path internal failures report to

#![deny(unsafe_code)]

pub mod cause;
pub mod code_frame;
pub mod fault;
pub mod level;
pub mod record;
pub mod sink;
pub mod stack;

pub use cause::cause_chain;
pub use code_frame::build_code_frame;
pub use fault::{ErrorInput, Fault, RawCause};
pub use level::LogLevel;
pub use record::{
    LogRecord, MAX_FIELD_CHARS, Metadata, metadata_from, serialize_metadata, truncate_chars,
};
pub use sink::{DiagnosticSink, NullSink};
pub use stack::{
    StackFrame, capture_synthetic_callsite, first_application_frame, has_application_frame,
};
