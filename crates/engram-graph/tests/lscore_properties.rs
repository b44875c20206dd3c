//! Property tests: L-Score closed-form bounds.

use proptest::prelude::*;

use engram_core::config::ProvenanceConfig;
use engram_graph::{compute_l_score, ParentLineage};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_l_score_never_exceeds_parent_mean(
        parent_scores in prop::collection::vec(0.0f64..=1.0, 1..6),
        confidence in 0.0f64..=1.0,
        relevance in 0.0f64..=1.0,
    ) {
        let parents: Vec<ParentLineage> = parent_scores
            .iter()
            .map(|l| ParentLineage { l_score: *l, depth: 0 })
            .collect();
        let config = ProvenanceConfig::default();
        let (l, depth) = compute_l_score(&parents, confidence, relevance, &config);

        let parent_mean = parent_scores.iter().sum::<f64>() / parent_scores.len() as f64;
        prop_assert!(l <= parent_mean + 1e-12, "quality and decay only attenuate");
        prop_assert!((0.0..=1.0).contains(&l));
        prop_assert_eq!(depth, 1);
    }

    #[test]
    fn prop_depth_is_one_past_deepest_parent(
        depths in prop::collection::vec(0u32..20, 1..6),
    ) {
        let parents: Vec<ParentLineage> = depths
            .iter()
            .map(|d| ParentLineage { l_score: 0.5, depth: *d })
            .collect();
        let config = ProvenanceConfig::default();
        let (_, depth) = compute_l_score(&parents, 1.0, 1.0, &config);
        prop_assert_eq!(depth, depths.iter().max().unwrap() + 1);
    }

    #[test]
    fn prop_deeper_lineage_scores_no_higher(
        depth in 1u32..15,
    ) {
        let config = ProvenanceConfig::default();
        let shallow = [ParentLineage { l_score: 0.8, depth: depth - 1 }];
        let deep = [ParentLineage { l_score: 0.8, depth }];
        let (l_shallow, _) = compute_l_score(&shallow, 0.9, 0.9, &config);
        let (l_deep, _) = compute_l_score(&deep, 0.9, 0.9, &config);
        prop_assert!(l_deep <= l_shallow + 1e-12);
    }
}
