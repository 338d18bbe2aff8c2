//! # twinlog
//!
//! Dual-sink logging facade. Every call renders a line on the console and,
//! when a store is configured, is persisted to `SQLite` in the background
//! without ever blocking or failing the caller.
//!
//! - [`Logger`]: `info`/`warn`/`debug`/`error`/`error_enriched`, with cause
//!   chain, stack location, and (in verbose mode) code frames for errors
//! - [`CompatLogger`]: the [`FrameworkLogger`] shape frameworks expect
//! - [`install_fault_hooks`]: routes panics through the logger
//! - [`TwinlogLayer`]: forwards `tracing` events into a logger
//!
//! ```ignore
//! let logger = Logger::new(LoggerSettings {
//!     store: Some(StoreSettings::in_dir("/var/lib/app")),
//!     ..Default::default()
//! });
//! logger.info("server started", None);
//! ```

#![deny(unsafe_code)]

pub mod compat;
pub mod console;
pub mod hooks;
pub mod layer;
pub mod logger;
pub mod test_utils;

pub use compat::{CompatLogger, FrameworkLogger};
pub use console::{CapturedConsole, Console, ConsoleRenderer, Enrichment};
pub use hooks::{fault_hooks_installed, install_fault_hooks};
pub use layer::TwinlogLayer;
pub use logger::{FLUSH_DELAY, Logger};

pub use twinlog_core::{ErrorInput, Fault, LogLevel, Metadata, RawCause, metadata_from};
pub use twinlog_settings::{LoggerSettings, PoolSettings, StoreSettings};
pub use twinlog_store::StoreStatus;
