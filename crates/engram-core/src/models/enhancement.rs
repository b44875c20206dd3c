use serde::{Deserialize, Serialize};

/// How neighbor messages are folded into one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    Mean,
    Sum,
    Max,
    Attention,
}

impl Default for AggregationMethod {
    fn default() -> Self {
        AggregationMethod::Mean
    }
}

/// Output of ego-graph enhancement for one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementResult {
    pub entry_id: String,
    /// 1024-dim unit vector after projection.
    pub enhanced: Vec<f32>,
    /// Neighbors with loaded embeddings that contributed messages.
    pub neighbor_count: usize,
    /// Hops actually reached (≤ configured max).
    pub hops_reached: usize,
    pub aggregation: AggregationMethod,
    /// True when served from the enhancement cache.
    pub from_cache: bool,
}
