//! Deterministic L-Score rollup over the provenance DAG.
//!
//! For a root with no parents, L = 1.0 at depth 0. For a derived entry
//! with per-parent confidence c and relevance r recorded on the child:
//!
//! ```text
//! quality_i     = c_i * r_i
//! aggregate_q   = mean(quality_i)
//! parent_factor = mean(parent.l_score)
//! depth         = 1 + max(parent.depth)
//! L             = aggregate_q * parent_factor * depth_decay^(depth - 1)
//! ```

use engram_core::config::ProvenanceConfig;
use engram_core::errors::{EngramError, EngramResult, GraphError};

/// The slice of a parent's provenance record the rollup needs.
#[derive(Debug, Clone, Copy)]
pub struct ParentLineage {
    pub l_score: f64,
    pub depth: u32,
}

/// Compute (L-Score, lineage depth) for an entry.
///
/// `confidence` and `relevance` are the values the caller records against
/// the parent set; both clamp to [0, 1].
pub fn compute_l_score(
    parents: &[ParentLineage],
    confidence: f64,
    relevance: f64,
    config: &ProvenanceConfig,
) -> (f64, u32) {
    if parents.is_empty() {
        return (1.0, 0);
    }

    let confidence = confidence.clamp(0.0, 1.0);
    let relevance = relevance.clamp(0.0, 1.0);

    // Every parent shares the child's recorded confidence/relevance, so
    // the per-parent quality mean collapses to c * r.
    let aggregate_q = confidence * relevance;
    let parent_factor =
        parents.iter().map(|p| p.l_score).sum::<f64>() / parents.len() as f64;
    let depth = 1 + parents.iter().map(|p| p.depth).max().unwrap_or(0);
    let decay = config.depth_decay.powi(depth as i32 - 1);

    (aggregate_q * parent_factor * decay, depth)
}

/// Threshold gate. Fails before any label or vector is consumed.
pub fn enforce_threshold(l_score: f64, config: &ProvenanceConfig) -> EngramResult<()> {
    if config.enforce_threshold && l_score < config.threshold {
        return Err(EngramError::Graph(GraphError::ProvenanceThreshold {
            l_score,
            threshold: config.threshold,
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProvenanceConfig {
        ProvenanceConfig::default()
    }

    #[test]
    fn root_scores_one_at_depth_zero() {
        assert_eq!(compute_l_score(&[], 0.2, 0.1, &config()), (1.0, 0));
    }

    #[test]
    fn child_of_root_matches_closed_form() {
        let parents = [ParentLineage { l_score: 1.0, depth: 0 }];
        let (l, depth) = compute_l_score(&parents, 0.8, 0.8, &config());
        assert_eq!(depth, 1);
        // 0.64 * 1.0 * 0.9^0
        assert!((l - 0.64).abs() < 1e-9);
    }

    #[test]
    fn grandchild_applies_depth_decay() {
        let parents = [ParentLineage { l_score: 0.64, depth: 1 }];
        let (l, depth) = compute_l_score(&parents, 0.2, 0.2, &config());
        assert_eq!(depth, 2);
        // 0.04 * 0.64 * 0.9^1
        assert!((l - 0.04 * 0.64 * 0.9).abs() < 1e-9);
    }

    #[test]
    fn multiple_parents_average_and_take_max_depth() {
        let parents = [
            ParentLineage { l_score: 1.0, depth: 0 },
            ParentLineage { l_score: 0.5, depth: 3 },
        ];
        let (l, depth) = compute_l_score(&parents, 0.9, 1.0, &config());
        assert_eq!(depth, 4);
        let expected = 0.9 * 0.75 * 0.9f64.powi(3);
        assert!((l - expected).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_inputs_clamp() {
        let parents = [ParentLineage { l_score: 1.0, depth: 0 }];
        let (l, _) = compute_l_score(&parents, 1.5, 2.0, &config());
        assert!((l - 1.0).abs() < 1e-9);
    }

    #[test]
    fn gate_rejects_below_threshold() {
        let err = enforce_threshold(0.2, &config()).unwrap_err();
        match err {
            EngramError::Graph(GraphError::ProvenanceThreshold { l_score, threshold }) => {
                assert!((l_score - 0.2).abs() < 1e-9);
                assert!((threshold - 0.3).abs() < 1e-9);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn gate_passes_when_enforcement_off() {
        let mut cfg = config();
        cfg.enforce_threshold = false;
        enforce_threshold(0.01, &cfg).unwrap();
    }

    #[test]
    fn gate_passes_at_threshold() {
        enforce_threshold(0.3, &config()).unwrap();
    }
}
