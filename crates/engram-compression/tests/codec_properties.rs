//! Property tests: codec round-trip laws per tier.

use proptest::prelude::*;

use engram_compression::{binary, scalar};
use engram_core::vector;

fn unit_vector_strategy(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-1.0f32..1.0, dim).prop_filter_map("zero vector", |mut v| {
        if vector::l2_norm(&v) < 1e-3 {
            return None;
        }
        vector::normalize(&mut v);
        Some(v)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_warm_elementwise_error_bounded(v in unit_vector_strategy(64)) {
        let decoded = scalar::decode(&scalar::encode(&v));
        for (a, b) in v.iter().zip(decoded.iter()) {
            prop_assert!((a - b).abs() <= 0.01, "{a} vs {b}");
        }
    }

    #[test]
    fn prop_frozen_sign_accuracy(v in unit_vector_strategy(64)) {
        let decoded = binary::decode(&binary::encode(&v), v.len());
        let correct = v
            .iter()
            .zip(decoded.iter())
            .filter(|(a, b)| (**a >= 0.0) == (**b >= 0.0))
            .count();
        // Sign bits are exact, comfortably past the 0.9 floor.
        prop_assert!(correct as f64 / v.len() as f64 >= 0.9);
    }

    #[test]
    fn prop_frozen_output_is_unit_norm(v in unit_vector_strategy(32)) {
        let decoded = binary::decode(&binary::encode(&v), v.len());
        prop_assert!((vector::l2_norm(&decoded) - 1.0).abs() < 1e-5);
    }
}
