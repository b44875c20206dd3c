use serde::{Deserialize, Serialize};

use crate::models::AggregationMethod;

/// Activation between the projection MLP's two layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    Relu,
    Gelu,
    Tanh,
    None,
}

/// Ego-graph extraction, message passing, and projection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancerConfig {
    pub max_hops: usize,
    pub max_neighbors_per_hop: usize,
    /// Per-hop decay applied as decay^(hop − 1).
    pub distance_decay: f32,
    /// Weight of the center embedding in the combine step.
    pub self_loop_weight: f32,
    pub aggregation: AggregationMethod,
    /// Dimensionality of the attention query/key projections.
    pub attention_dim: usize,
    pub activation: ActivationKind,
    /// Add the input's first 768 dims to the projection output.
    pub residual: bool,
    /// L2-normalize the final output.
    pub normalize_output: bool,
    /// Capacity of the per-entry enhancement cache.
    pub cache_capacity: u64,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            max_hops: 2,
            max_neighbors_per_hop: 50,
            distance_decay: 0.7,
            self_loop_weight: 0.5,
            aggregation: AggregationMethod::Mean,
            attention_dim: 64,
            activation: ActivationKind::Gelu,
            residual: true,
            normalize_output: true,
            cache_capacity: 1000,
        }
    }
}
