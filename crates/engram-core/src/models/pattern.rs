use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A typed slot inside a pattern template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSpec {
    pub name: String,
    /// Free-form type tag, e.g. "entity", "date", "number".
    pub slot_type: String,
    #[serde(default)]
    pub required: bool,
}

/// Named text template with typed slots and a rolling success record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternTemplate {
    pub id: String,
    pub name: String,
    pub pattern: String,
    pub slots: Vec<SlotSpec>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

/// Rolling usage stats for a pattern template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternStats {
    pub use_count: u64,
    pub success_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl PatternStats {
    /// Minimum uses before prune eligibility.
    pub const PRUNE_MIN_USES: u64 = 100;
    /// Success rate below which an eligible pattern is pruned.
    pub const PRUNE_SUCCESS_RATE: f64 = 0.4;

    pub fn success_rate(&self) -> f64 {
        if self.use_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.use_count as f64
        }
    }

    /// Auto-prune rule: use_count ≥ 100 AND success_rate < 0.4.
    pub fn should_prune(&self) -> bool {
        self.use_count >= Self::PRUNE_MIN_USES && self.success_rate() < Self::PRUNE_SUCCESS_RATE
    }
}
