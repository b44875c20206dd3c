use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tier lifecycle and product-quantizer training parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Minimum spacing between evaluation sweeps.
    #[serde(with = "duration_secs")]
    pub evaluation_interval: Duration,
    /// Sweeps are a no-op below this vector count.
    pub min_vectors_for_compression: usize,
    /// k-means iterations for codebook training.
    pub kmeans_iterations: usize,
    /// Minimum training vectors for full k-means; below this,
    /// random-sample centroid initialization is allowed.
    pub min_training_vectors: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            evaluation_interval: Duration::from_secs(3600),
            min_vectors_for_compression: 1000,
            kmeans_iterations: 10,
            min_training_vectors: 256,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
