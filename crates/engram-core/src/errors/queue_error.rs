/// Async write queue errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("write queue full ({capacity} ops buffered)")]
    Overflow { capacity: usize },

    #[error("queue is shutting down")]
    ShuttingDown,
}
