//! Ego-graph extraction: the k-hop neighborhood of a center entry.

use std::collections::{HashMap, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};

use engram_core::config::EnhancerConfig;
use engram_core::errors::EngramResult;
use engram_core::models::CausalRelationType;
use engram_graph::graph_neighbors;
use engram_index::VectorIndex;
use engram_storage::StorageEngine;

/// One node of the ego graph.
#[derive(Debug, Clone)]
pub struct EgoNode {
    pub entry_id: String,
    pub hop_distance: usize,
    /// Weight of the edge that first reached this node.
    pub edge_weight: f64,
    pub relation_type: Option<CausalRelationType>,
    /// Loaded embedding, when the index has one for this entry.
    pub embedding: Option<Vec<f32>>,
}

/// The extracted neighborhood around a center entry.
pub struct EgoGraph {
    pub graph: DiGraph<EgoNode, f64>,
    pub center: NodeIndex,
    pub hops_reached: usize,
}

impl EgoGraph {
    /// Non-center nodes with loaded embeddings, the message-passing input.
    pub fn neighbor_nodes(&self) -> impl Iterator<Item = &EgoNode> {
        let center = self.center;
        self.graph
            .node_indices()
            .filter(move |idx| *idx != center)
            .filter_map(|idx| self.graph.node_weight(idx))
            .filter(|node| node.embedding.is_some())
    }
}

/// Breadth-first expansion from the center over the union of causal and
/// provenance edges, capped per hop. Each entry joins the graph once, at
/// its shortest hop distance.
pub fn build_ego_graph(
    storage: &StorageEngine,
    index: &VectorIndex,
    center_id: &str,
    center_embedding: Vec<f32>,
    config: &EnhancerConfig,
) -> EngramResult<EgoGraph> {
    let mut graph = DiGraph::new();
    let center = graph.add_node(EgoNode {
        entry_id: center_id.to_string(),
        hop_distance: 0,
        edge_weight: 1.0,
        relation_type: None,
        embedding: Some(center_embedding),
    });

    let mut seen: HashMap<String, NodeIndex> = HashMap::new();
    seen.insert(center_id.to_string(), center);

    let mut hops_reached = 0;
    let mut frontier = VecDeque::from([center]);

    for hop in 1..=config.max_hops {
        let mut next_frontier = VecDeque::new();
        let mut admitted_this_hop = 0usize;

        while let Some(node_idx) = frontier.pop_front() {
            let from_id = graph[node_idx].entry_id.clone();
            for neighbor in graph_neighbors(storage, &from_id)? {
                if admitted_this_hop >= config.max_neighbors_per_hop {
                    break;
                }
                if seen.contains_key(&neighbor.entry_id) {
                    continue;
                }

                let embedding = load_embedding(storage, index, &neighbor.entry_id)?;
                let idx = graph.add_node(EgoNode {
                    entry_id: neighbor.entry_id.clone(),
                    hop_distance: hop,
                    edge_weight: neighbor.edge_weight,
                    relation_type: neighbor.relation_type,
                    embedding,
                });
                graph.add_edge(node_idx, idx, neighbor.edge_weight);
                seen.insert(neighbor.entry_id, idx);
                next_frontier.push_back(idx);
                admitted_this_hop += 1;
                hops_reached = hop;
            }
        }

        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    Ok(EgoGraph {
        graph,
        center,
        hops_reached,
    })
}

fn load_embedding(
    storage: &StorageEngine,
    index: &VectorIndex,
    entry_id: &str,
) -> EngramResult<Option<Vec<f32>>> {
    match storage.get_mapping(entry_id)? {
        Some(mapping) => index.get_vector(mapping.label),
        None => Ok(None),
    }
}
