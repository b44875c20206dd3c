/// Provenance and causal graph errors.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("L-Score {l_score:.4} below threshold {threshold:.4}")]
    ProvenanceThreshold { l_score: f64, threshold: f64 },

    #[error("unknown causal relation type: {value}")]
    UnknownRelationType { value: String },

    #[error("parent entry does not exist: {id}")]
    ParentNotFound { id: String },

    #[error("causal relation requires non-empty sources and targets")]
    EmptyEndpoints,
}
