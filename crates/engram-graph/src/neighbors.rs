//! Unified neighbor listing over causal and provenance edges.
//!
//! The ego-graph enhancer treats both edge families as one undirected
//! neighborhood: causal edges carry their strength, provenance edges a
//! confidence proxy recorded on the child.

use chrono::Utc;

use engram_core::errors::EngramResult;
use engram_core::models::{CausalDirection, CausalRelationType};
use engram_storage::StorageEngine;

/// One adjacent entry with the weight of the connecting edge.
#[derive(Debug, Clone)]
pub struct GraphNeighbor {
    pub entry_id: String,
    /// Causal strength, or the provenance confidence proxy.
    pub edge_weight: f64,
    /// Present for causal edges.
    pub relation_type: Option<CausalRelationType>,
}

/// Neighbors of `entry_id`: the union of causal edges in either direction
/// and provenance edges in either direction. Duplicates keep the
/// strongest edge.
pub fn graph_neighbors(
    storage: &StorageEngine,
    entry_id: &str,
) -> EngramResult<Vec<GraphNeighbor>> {
    let now = Utc::now();
    let mut neighbors: Vec<GraphNeighbor> = Vec::new();

    let mut push = |candidate: GraphNeighbor| {
        if candidate.entry_id == entry_id {
            return;
        }
        match neighbors.iter_mut().find(|n| n.entry_id == candidate.entry_id) {
            Some(existing) if existing.edge_weight < candidate.edge_weight => *existing = candidate,
            Some(_) => {}
            None => neighbors.push(candidate),
        }
    };

    // Causal edges, either direction.
    for relation in storage.causal_relations_touching(entry_id, CausalDirection::Both)? {
        if !relation.active || relation.is_expired(now) {
            continue;
        }
        for other in relation.sources.iter().chain(relation.targets.iter()) {
            push(GraphNeighbor {
                entry_id: other.clone(),
                edge_weight: relation.strength,
                relation_type: Some(relation.relation_type),
            });
        }
    }

    // Provenance edges, either direction. The child's recorded confidence
    // stands in for an edge weight.
    for parent_id in storage.get_parents(entry_id)? {
        let weight = storage
            .get_provenance(entry_id)?
            .map(|p| p.confidence)
            .unwrap_or(1.0);
        push(GraphNeighbor {
            entry_id: parent_id,
            edge_weight: weight,
            relation_type: None,
        });
    }
    for child_id in storage.get_children(entry_id)? {
        let weight = storage
            .get_provenance(&child_id)?
            .map(|p| p.confidence)
            .unwrap_or(1.0);
        push(GraphNeighbor {
            entry_id: child_id,
            edge_weight: weight,
            relation_type: None,
        });
    }

    Ok(neighbors)
}
