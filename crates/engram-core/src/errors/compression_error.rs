/// Compression tier manager errors.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("unknown tier: {name}")]
    UnknownTier { name: String },

    #[error("codebook not loaded for {tier} encoding")]
    CodebookNotLoaded { tier: String },

    #[error("subvector shape mismatch: dim {dim} not divisible into {subvectors} subvectors of {subvector_dim}")]
    SubvectorShapeMismatch {
        dim: usize,
        subvectors: usize,
        subvector_dim: usize,
    },
}
