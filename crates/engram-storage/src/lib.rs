//! # engram-storage
//!
//! SQLite persistence layer: a single write connection with a read-only
//! reader ring under WAL, forward-only migrations, per-concern query
//! modules, and the `StorageEngine` facade implementing the queue
//! executor seam.

pub mod engine;
pub mod legacy;
pub mod migrations;
pub mod pool;
pub mod queries;

pub use engine::StorageEngine;

use engram_core::errors::{EngramError, StorageError};

/// Wrap a low-level SQLite failure into the storage error kind.
pub(crate) fn to_storage_err(message: impl Into<String>) -> EngramError {
    EngramError::Storage(StorageError::Sqlite {
        message: message.into(),
    })
}
