//! Weighted message passing over ego-graph neighbors.

use engram_core::models::AggregationMethod;

use crate::projection::AttentionProjections;

/// One neighbor's contribution: its embedding and the hop-decayed weight
/// `edge_weight · distance_decay^(hop − 1)`.
#[derive(Debug, Clone)]
pub struct NeighborMessage<'a> {
    pub embedding: &'a [f32],
    pub weight: f32,
}

/// Fold neighbor messages into one vector of the center's dimensionality.
/// Returns a zero vector when there are no messages.
pub fn aggregate(
    method: AggregationMethod,
    center: &[f32],
    messages: &[NeighborMessage<'_>],
    attention: &AttentionProjections,
) -> Vec<f32> {
    let dim = center.len();
    if messages.is_empty() {
        return vec![0.0; dim];
    }

    match method {
        AggregationMethod::Mean => {
            let total: f32 = messages.iter().map(|m| m.weight).sum();
            let mut out = weighted_sum(dim, messages);
            if total > 0.0 {
                for x in out.iter_mut() {
                    *x /= total;
                }
            }
            out
        }
        AggregationMethod::Sum => weighted_sum(dim, messages),
        AggregationMethod::Max => {
            // Element-wise maximum, weights ignored.
            let mut out = vec![f32::NEG_INFINITY; dim];
            for message in messages {
                for (slot, x) in out.iter_mut().zip(message.embedding.iter()) {
                    *slot = slot.max(*x);
                }
            }
            out
        }
        AggregationMethod::Attention => attention_aggregate(center, messages, attention),
    }
}

/// Combine the center with the aggregated neighbor contribution:
/// `out = self_loop_weight · center + (1 − self_loop_weight) · agg`.
pub fn combine(center: &[f32], neighbor_agg: &[f32], self_loop_weight: f32) -> Vec<f32> {
    center
        .iter()
        .zip(neighbor_agg.iter())
        .map(|(c, n)| self_loop_weight * c + (1.0 - self_loop_weight) * n)
        .collect()
}

fn weighted_sum(dim: usize, messages: &[NeighborMessage<'_>]) -> Vec<f32> {
    let mut out = vec![0.0; dim];
    for message in messages {
        for (slot, x) in out.iter_mut().zip(message.embedding.iter()) {
            *slot += message.weight * x;
        }
    }
    out
}

/// Scaled dot-product attention. Logits are multiplied by the hop-decayed
/// edge weight before the softmax.
fn attention_aggregate(
    center: &[f32],
    messages: &[NeighborMessage<'_>],
    attention: &AttentionProjections,
) -> Vec<f32> {
    let query = attention.project_query(center);
    let scale = (attention.attention_dim() as f32).sqrt();

    let logits: Vec<f32> = messages
        .iter()
        .map(|m| {
            let key = attention.project_key(m.embedding);
            let dot: f32 = query.iter().zip(key.iter()).map(|(q, k)| q * k).sum();
            (dot / scale) * m.weight
        })
        .collect();

    // Stable softmax.
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max_logit).exp()).collect();
    let denom: f32 = exps.iter().sum();

    let dim = center.len();
    let mut out = vec![0.0; dim];
    for (alpha, message) in exps.iter().zip(messages.iter()) {
        let alpha = alpha / denom;
        for (slot, x) in out.iter_mut().zip(message.embedding.iter()) {
            *slot += alpha * x;
        }
    }
    out
}
