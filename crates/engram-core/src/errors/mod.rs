//! Error taxonomy: one enum per subsystem, aggregated into [`EngramError`].
//!
//! Policy failures are part of the return contract; panics are reserved for
//! programmer errors and unrecoverable corruption.

mod compression_error;
mod engine_error;
mod enhance_error;
mod graph_error;
mod index_error;
mod queue_error;
mod storage_error;

pub use compression_error::CompressionError;
pub use engine_error::EngineError;
pub use enhance_error::EnhanceError;
pub use graph_error::GraphError;
pub use index_error::IndexError;
pub use queue_error::QueueError;
pub use storage_error::StorageError;

/// Crate-wide result alias.
pub type EngramResult<T> = Result<T, EngramError>;

/// Aggregate error for the whole memory core.
#[derive(Debug, thiserror::Error)]
pub enum EngramError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Compression(#[from] CompressionError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Enhance(#[from] EnhanceError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },
}

impl EngramError {
    /// Whether this error aborts engine initialization (no usable store).
    pub fn is_fatal_at_open(&self) -> bool {
        matches!(
            self,
            EngramError::Storage(StorageError::Corrupt { .. })
                | EngramError::Storage(StorageError::MigrationFailed { .. })
        )
    }
}
