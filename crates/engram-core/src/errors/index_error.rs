/// Vector index errors.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("duplicate label {label}")]
    DuplicateLabel { label: i64 },

    #[error("index not initialized")]
    NotInitialized,
}
