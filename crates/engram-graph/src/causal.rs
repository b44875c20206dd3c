//! BFS over causal hyperedges with TTL awareness.
//!
//! Emits one path per first-visited node, which keeps the output finite
//! and linear in nodes visited instead of materializing the crossproduct
//! of all route combinations.

use std::collections::{HashSet, VecDeque};

use chrono::Utc;

use engram_core::constants::MAX_CAUSAL_TRAVERSAL_DEPTH;
use engram_core::errors::EngramResult;
use engram_core::models::{CausalDirection, CausalPath, CausalRelation, CausalRelationType};
use engram_storage::StorageEngine;

/// Bounds for one traversal call.
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    pub direction: CausalDirection,
    pub max_depth: usize,
    /// Restrict to these relation types when set.
    pub relation_types: Option<Vec<CausalRelationType>>,
    /// Hard cap on emitted paths.
    pub max_paths: usize,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            direction: CausalDirection::Forward,
            max_depth: 3,
            relation_types: None,
            max_paths: 1000,
        }
    }
}

/// Breadth-first traversal from `start_ids`, skipping expired or inactive
/// relations. Each node is visited at most once per call.
pub fn query_causal(
    storage: &StorageEngine,
    start_ids: &[String],
    options: &TraversalOptions,
) -> EngramResult<Vec<CausalPath>> {
    let max_depth = options.max_depth.min(MAX_CAUSAL_TRAVERSAL_DEPTH);
    let now = Utc::now();

    let mut visited: HashSet<String> = start_ids.iter().cloned().collect();
    let mut paths = Vec::new();

    // (node, path nodes so far, relations crossed, strength product, depth)
    let mut queue: VecDeque<(String, Vec<String>, Vec<String>, f64, usize)> = start_ids
        .iter()
        .map(|id| (id.clone(), vec![id.clone()], Vec::new(), 1.0, 0))
        .collect();

    while let Some((node, path_nodes, path_relations, strength, depth)) = queue.pop_front() {
        if depth >= max_depth || paths.len() >= options.max_paths {
            continue;
        }

        let relations = storage.causal_relations_touching(&node, options.direction)?;
        for relation in relations {
            if !relation.active || relation.is_expired(now) {
                continue;
            }
            if let Some(types) = &options.relation_types {
                if !types.contains(&relation.relation_type) {
                    continue;
                }
            }

            for neighbor in step_endpoints(&relation, &node, options.direction) {
                if paths.len() >= options.max_paths {
                    break;
                }
                if !visited.insert(neighbor.clone()) {
                    continue;
                }

                let mut nodes = path_nodes.clone();
                nodes.push(neighbor.clone());
                let mut relations_crossed = path_relations.clone();
                relations_crossed.push(relation.id.clone());
                let total_strength = strength * relation.strength;

                paths.push(CausalPath {
                    node_ids: nodes.clone(),
                    relation_ids: relations_crossed.clone(),
                    total_strength,
                    depth: depth + 1,
                });

                if depth + 1 < max_depth {
                    queue.push_back((
                        neighbor,
                        nodes,
                        relations_crossed,
                        total_strength,
                        depth + 1,
                    ));
                }
            }
        }
    }

    Ok(paths)
}

/// Endpoints reachable from `node` across `relation` in `direction`.
/// A hyperedge fans out to every entry on the far side.
fn step_endpoints(
    relation: &CausalRelation,
    node: &str,
    direction: CausalDirection,
) -> Vec<String> {
    let mut out = Vec::new();
    let forward = matches!(direction, CausalDirection::Forward | CausalDirection::Both);
    let backward = matches!(direction, CausalDirection::Backward | CausalDirection::Both);

    if forward && relation.sources.iter().any(|s| s == node) {
        out.extend(relation.targets.iter().cloned());
    }
    if backward && relation.targets.iter().any(|t| t == node) {
        out.extend(relation.sources.iter().cloned());
    }
    out.retain(|id| id != node);
    out
}

/// Mark relations past their expiry inactive. Returns the count.
pub fn expire_relations(storage: &StorageEngine) -> EngramResult<usize> {
    let expired = storage.expire_causal_relations(Utc::now())?;
    if expired > 0 {
        tracing::debug!(expired, "expired causal relations");
    }
    Ok(expired)
}
