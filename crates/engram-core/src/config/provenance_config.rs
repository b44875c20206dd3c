use serde::{Deserialize, Serialize};

/// L-Score computation and gating parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceConfig {
    /// Per-generation decay applied as decay^(depth − 1).
    pub depth_decay: f64,
    /// Entries scoring below this are rejected when enforcement is on.
    pub threshold: f64,
    pub enforce_threshold: bool,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            depth_decay: 0.9,
            threshold: 0.3,
            enforce_threshold: true,
        }
    }
}
