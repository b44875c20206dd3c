use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tier::CompressionTier;

/// One tier demotion applied by an evaluation sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierTransition {
    pub entry_id: String,
    pub label: i64,
    pub from: CompressionTier,
    pub to: CompressionTier,
    pub at: DateTime<Utc>,
}

/// Aggregate compression accounting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompressionStats {
    pub total_vectors: usize,
    pub per_tier: HashMap<CompressionTier, usize>,
    pub uncompressed_bytes: u64,
    pub compressed_bytes: u64,
    /// (uncompressed − compressed) / uncompressed; 0 when empty.
    pub memory_saved_ratio: f64,
    pub max_access_count: u64,
    pub last_evaluation_at: Option<DateTime<Utc>>,
}

/// Enhancer pipeline counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnhancerStats {
    pub enhancements: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub avg_neighbor_count: f64,
}

/// Write queue counters, surfaced to callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub applied: u64,
    pub batches: u64,
    pub retries: u64,
    /// Ops discarded by the last-resort queue drop.
    pub dropped_ops: u64,
    pub pending: usize,
}

/// Top-level engine stats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub entry_count: usize,
    pub vector_count: usize,
    pub pending_embeddings: usize,
    pub causal_relation_count: usize,
    pub pattern_count: usize,
    pub compression: CompressionStats,
    pub enhancer: EnhancerStats,
    pub queue: QueueStats,
}
