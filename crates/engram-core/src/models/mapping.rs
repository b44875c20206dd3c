use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tier::CompressionTier;

/// Bidirectional entry-id ↔ vector-label mapping with access stats.
///
/// For every persisted mapping there is exactly one vector in the index
/// with that label, or the entry carries a `pending_embedding` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMapping {
    pub entry_id: String,
    /// Monotonic integer label unique within a store.
    pub label: i64,
    pub access_count: u64,
    pub last_accessed_at: DateTime<Utc>,
    pub tier: CompressionTier,
}

impl VectorMapping {
    pub fn new(entry_id: String, label: i64) -> Self {
        Self {
            entry_id,
            label,
            access_count: 0,
            last_accessed_at: Utc::now(),
            tier: CompressionTier::Hot,
        }
    }
}
