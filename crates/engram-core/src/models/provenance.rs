use serde::{Deserialize, Serialize};

/// Quality roll-up recorded for every entry at creation.
///
/// Roots carry `l_score = 1.0` at depth 0. Derived entries carry the
/// confidence/relevance the caller recorded against their parents and the
/// resulting L-Score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub entry_id: String,
    /// 1 + max parent depth; 0 for roots.
    pub lineage_depth: u32,
    /// Confidence in the derivation, in [0, 1].
    pub confidence: f64,
    /// Relevance of the parents to this entry, in [0, 1].
    pub relevance: f64,
    /// Deterministic quality score derived from the parent DAG.
    pub l_score: f64,
}

impl ProvenanceRecord {
    /// Record for an entry with no parents.
    pub fn root(entry_id: String) -> Self {
        Self {
            entry_id,
            lineage_depth: 0,
            confidence: 1.0,
            relevance: 1.0,
            l_score: 1.0,
        }
    }
}
