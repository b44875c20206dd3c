//! Engine configuration, composed from per-subsystem configs.
//! Defaults match the documented policy values throughout.

mod compression_config;
mod enhancer_config;
mod provenance_config;
mod queue_config;

pub use compression_config::CompressionConfig;
pub use enhancer_config::{ActivationKind, EnhancerConfig};
pub use provenance_config::ProvenanceConfig;
pub use queue_config::QueueConfig;

use serde::{Deserialize, Serialize};

use crate::constants::EMBEDDING_DIM;

/// Top-level configuration for a `MemoryEngine`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Embedding dimensionality. Fixed for the life of a store.
    pub embedding_dim: usize,
    pub provenance: ProvenanceConfig,
    pub compression: CompressionConfig,
    pub enhancer: EnhancerConfig,
    pub queue: QueueConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embedding_dim: EMBEDDING_DIM,
            provenance: ProvenanceConfig::default(),
            compression: CompressionConfig::default(),
            enhancer: EnhancerConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}
