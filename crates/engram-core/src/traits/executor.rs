use crate::errors::EngramResult;
use crate::models::WriteOp;

/// Applies a batch of queued write operations inside one transaction.
/// Implemented by the storage engine; the async write queue is generic
/// over this seam.
pub trait QueueExecutor: Send + Sync {
    /// Apply every op or none. A failed batch must leave the store at the
    /// pre-batch snapshot.
    fn apply_batch(&self, ops: &[WriteOp]) -> EngramResult<()>;
}
