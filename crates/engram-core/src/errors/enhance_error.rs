/// Ego-graph enhancer errors.
#[derive(Debug, thiserror::Error)]
pub enum EnhanceError {
    #[error("projection weights have wrong shape: {what}")]
    WeightShapeMismatch { what: String },

    #[error("loaded weights failed drift check: {details}")]
    WeightsDrift { details: String },

    #[error("center entry has no embedding: {id}")]
    MissingEmbedding { id: String },
}
