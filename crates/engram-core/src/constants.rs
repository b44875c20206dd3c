/// Engram system version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Dimensionality of entry embeddings at the index boundary.
pub const EMBEDDING_DIM: usize = 768;

/// Dimensionality of ego-enhanced embeddings after projection.
pub const PROJECTED_DIM: usize = 1024;

/// Hidden width of the projection MLP.
pub const PROJECTION_HIDDEN_DIM: usize = 512;

/// Unit-norm tolerance enforced at the index boundary.
pub const NORM_TOLERANCE: f32 = 0.01;

/// Number of contiguous subvectors a product quantizer splits a vector into.
pub const PQ_SUBVECTORS: usize = 96;

/// Maximum traversal depth for causal graph queries.
pub const MAX_CAUSAL_TRAVERSAL_DEPTH: usize = 50;

/// Primary database filename inside the data directory.
pub const DB_FILENAME: &str = "engram.db";

/// Legacy vector dump filename probed on first open.
pub const LEGACY_VECTORS_FILENAME: &str = "vectors.json";

/// system_metadata key holding the next free vector label.
pub const META_NEXT_LABEL: &str = "next_label";

/// system_metadata keys for persisted artifacts.
pub const META_PQ8_CODEBOOK: &str = "pq8_codebook";
pub const META_PQ4_CODEBOOK: &str = "pq4_codebook";
pub const META_ENHANCER_WEIGHTS: &str = "enhancer_weights";
