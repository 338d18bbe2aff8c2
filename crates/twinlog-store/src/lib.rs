//! # twinlog-store
//!
//! Durable sink for twinlog records, backed by `SQLite`.
//!
//! - [`LogStore`]: lazy, idempotent initialization and queued writes that
//!   never block or fail the caller
//! - [`schema`]: database bootstrap, the `logs` table, additive migration
//! - [`pool`]: `r2d2` pool with use-limited connections and a transient
//!   error filter

#![deny(unsafe_code)]

pub mod errors;
pub mod pool;
pub mod schema;
pub mod store;

pub use errors::{Result, StoreError};
pub use store::{LogStore, StoreStatus};
