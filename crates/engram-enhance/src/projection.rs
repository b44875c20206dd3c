//! Projection MLP (768→512→1024) and attention query/key projections.
//!
//! Weights are loadable artifacts; training is out of scope. When no
//! artifact is installed, a deterministic seeded initialization keeps the
//! pipeline usable end to end.

use serde::{Deserialize, Serialize};

use engram_core::config::ActivationKind;
use engram_core::constants::{EMBEDDING_DIM, PROJECTED_DIM, PROJECTION_HIDDEN_DIM};
use engram_core::errors::{EngramError, EngramResult, EnhanceError};
use engram_core::vector;

/// Flat serialization of the two linear layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionWeights {
    /// Row-major `[hidden × in]`.
    pub weights1: Vec<f32>,
    pub bias1: Vec<f32>,
    /// Row-major `[out × hidden]`.
    pub weights2: Vec<f32>,
    pub bias2: Vec<f32>,
}

impl ProjectionWeights {
    /// Deterministic initialization scaled by 1/√fan_in.
    pub fn seeded(seed: u64) -> Self {
        Self {
            weights1: seeded_matrix(seed, PROJECTION_HIDDEN_DIM * EMBEDDING_DIM, EMBEDDING_DIM),
            bias1: vec![0.0; PROJECTION_HIDDEN_DIM],
            weights2: seeded_matrix(
                seed.wrapping_add(1),
                PROJECTED_DIM * PROJECTION_HIDDEN_DIM,
                PROJECTION_HIDDEN_DIM,
            ),
            bias2: vec![0.0; PROJECTED_DIM],
        }
    }

    /// Shape and finiteness checks for loaded artifacts.
    pub fn validate(&self) -> EngramResult<()> {
        let checks = [
            ("weights1", self.weights1.len(), PROJECTION_HIDDEN_DIM * EMBEDDING_DIM),
            ("bias1", self.bias1.len(), PROJECTION_HIDDEN_DIM),
            ("weights2", self.weights2.len(), PROJECTED_DIM * PROJECTION_HIDDEN_DIM),
            ("bias2", self.bias2.len(), PROJECTED_DIM),
        ];
        for (name, actual, expected) in checks {
            if actual != expected {
                return Err(EngramError::Enhance(EnhanceError::WeightShapeMismatch {
                    what: format!("{name}: expected {expected} floats, got {actual}"),
                }));
            }
        }

        let finite = self
            .weights1
            .iter()
            .chain(&self.bias1)
            .chain(&self.weights2)
            .chain(&self.bias2)
            .all(|w| w.is_finite());
        if !finite {
            return Err(EngramError::Enhance(EnhanceError::WeightsDrift {
                details: "non-finite values in projection weights".into(),
            }));
        }
        Ok(())
    }
}

/// Two-layer MLP with optional residual and output normalization.
pub struct ProjectionMlp {
    weights: ProjectionWeights,
    activation: ActivationKind,
    residual: bool,
    normalize_output: bool,
}

impl ProjectionMlp {
    pub fn new(
        weights: ProjectionWeights,
        activation: ActivationKind,
        residual: bool,
        normalize_output: bool,
    ) -> EngramResult<Self> {
        weights.validate()?;
        Ok(Self {
            weights,
            activation,
            residual,
            normalize_output,
        })
    }

    /// Project a 768-dim vector to 1024 dims.
    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        let hidden = linear(
            &self.weights.weights1,
            &self.weights.bias1,
            input,
            PROJECTION_HIDDEN_DIM,
        );
        let hidden: Vec<f32> = hidden.into_iter().map(|x| activate(self.activation, x)).collect();
        let mut out = linear(
            &self.weights.weights2,
            &self.weights.bias2,
            &hidden,
            PROJECTED_DIM,
        );

        if self.residual {
            for (slot, x) in out.iter_mut().zip(input.iter()) {
                *slot += x;
            }
        }
        if self.normalize_output {
            vector::normalize(&mut out);
        }
        out
    }
}

/// Scaled dot-product attention projections for query and key.
pub struct AttentionProjections {
    /// Row-major `[attention_dim × embedding_dim]`.
    query: Vec<f32>,
    key: Vec<f32>,
    attention_dim: usize,
}

impl AttentionProjections {
    pub fn seeded(seed: u64, attention_dim: usize) -> Self {
        Self {
            query: seeded_matrix(seed, attention_dim * EMBEDDING_DIM, EMBEDDING_DIM),
            key: seeded_matrix(seed.wrapping_add(7), attention_dim * EMBEDDING_DIM, EMBEDDING_DIM),
            attention_dim,
        }
    }

    pub fn attention_dim(&self) -> usize {
        self.attention_dim
    }

    pub fn project_query(&self, v: &[f32]) -> Vec<f32> {
        linear(&self.query, &vec![0.0; self.attention_dim], v, self.attention_dim)
    }

    pub fn project_key(&self, v: &[f32]) -> Vec<f32> {
        linear(&self.key, &vec![0.0; self.attention_dim], v, self.attention_dim)
    }
}

fn linear(weights: &[f32], bias: &[f32], input: &[f32], out_dim: usize) -> Vec<f32> {
    let in_dim = input.len();
    (0..out_dim)
        .map(|j| {
            let row = &weights[j * in_dim..(j + 1) * in_dim];
            row.iter().zip(input.iter()).map(|(w, x)| w * x).sum::<f32>() + bias[j]
        })
        .collect()
}

fn activate(kind: ActivationKind, x: f32) -> f32 {
    match kind {
        ActivationKind::Relu => x.max(0.0),
        ActivationKind::Gelu => {
            // tanh approximation
            0.5 * x * (1.0 + (0.797_884_56_f32 * (x + 0.044_715 * x * x * x)).tanh())
        }
        ActivationKind::Tanh => x.tanh(),
        ActivationKind::None => x,
    }
}

fn seeded_matrix(seed: u64, len: usize, fan_in: usize) -> Vec<f32> {
    let scale = 1.0 / (fan_in as f32).sqrt();
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let uniform = ((state >> 33) as f32 / u32::MAX as f32) - 0.5;
            uniform * 2.0 * scale
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_weights_validate() {
        ProjectionWeights::seeded(42).validate().unwrap();
    }

    #[test]
    fn forward_projects_to_1024_unit_norm() {
        let mlp = ProjectionMlp::new(
            ProjectionWeights::seeded(1),
            ActivationKind::Gelu,
            true,
            true,
        )
        .unwrap();
        let mut input = vec![0.1f32; EMBEDDING_DIM];
        vector::normalize(&mut input);
        let out = mlp.forward(&input);
        assert_eq!(out.len(), PROJECTED_DIM);
        assert!((vector::l2_norm(&out) - 1.0).abs() <= 1e-6);
    }

    #[test]
    fn forward_is_deterministic() {
        let mlp = ProjectionMlp::new(
            ProjectionWeights::seeded(9),
            ActivationKind::Relu,
            false,
            true,
        )
        .unwrap();
        let input = vec![0.5f32; EMBEDDING_DIM];
        assert_eq!(mlp.forward(&input), mlp.forward(&input));
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let mut weights = ProjectionWeights::seeded(3);
        weights.bias2.pop();
        let err = weights.validate().unwrap_err();
        assert!(matches!(
            err,
            EngramError::Enhance(EnhanceError::WeightShapeMismatch { .. })
        ));
    }

    #[test]
    fn non_finite_weights_are_drift() {
        let mut weights = ProjectionWeights::seeded(3);
        weights.weights1[0] = f32::NAN;
        let err = weights.validate().unwrap_err();
        assert!(matches!(
            err,
            EngramError::Enhance(EnhanceError::WeightsDrift { .. })
        ));
    }

    #[test]
    fn attention_projects_to_attention_dim() {
        let attn = AttentionProjections::seeded(5, 64);
        let q = attn.project_query(&vec![0.1; EMBEDDING_DIM]);
        assert_eq!(q.len(), 64);
    }

    #[test]
    fn serializes_flat() {
        let weights = ProjectionWeights::seeded(11);
        let json = serde_json::to_string(&weights).unwrap();
        let restored: ProjectionWeights = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.weights1, weights.weights1);
        restored.validate().unwrap();
    }
}
