//! Integration test: causal BFS over a stored graph.

use chrono::{Duration, Utc};
use engram_core::models::{CausalDirection, CausalRelation, CausalRelationType};
use engram_graph::{query_causal, TraversalOptions};
use engram_storage::StorageEngine;

fn add_edge(
    engine: &StorageEngine,
    src: &str,
    tgt: &str,
    relation_type: CausalRelationType,
    strength: f64,
    ttl_ms: Option<i64>,
) -> String {
    let now = Utc::now();
    let relation = CausalRelation {
        id: uuid::Uuid::new_v4().to_string(),
        relation_type,
        strength,
        sources: vec![src.to_string()],
        targets: vec![tgt.to_string()],
        metadata: None,
        created_at: now,
        ttl_ms,
        expires_at: ttl_ms.map(|ms| now + Duration::milliseconds(ms)),
        active: true,
    };
    engine.add_causal_relation(&relation).unwrap();
    relation.id
}

fn forward(max_depth: usize) -> TraversalOptions {
    TraversalOptions {
        direction: CausalDirection::Forward,
        max_depth,
        ..Default::default()
    }
}

#[test]
fn test_single_hop_carries_strength() {
    let engine = StorageEngine::open_in_memory().unwrap();
    add_edge(&engine, "a", "b", CausalRelationType::Causes, 0.9, None);

    let paths = query_causal(&engine, &["a".to_string()], &forward(1)).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].node_ids, vec!["a", "b"]);
    assert!((paths[0].total_strength - 0.9).abs() < 1e-9);
    assert_eq!(paths[0].depth, 1);
}

#[test]
fn test_multi_hop_multiplies_strengths() {
    let engine = StorageEngine::open_in_memory().unwrap();
    add_edge(&engine, "a", "b", CausalRelationType::Causes, 0.8, None);
    add_edge(&engine, "b", "c", CausalRelationType::Enables, 0.5, None);

    let paths = query_causal(&engine, &["a".to_string()], &forward(2)).unwrap();
    assert_eq!(paths.len(), 2);

    let to_c = paths.iter().find(|p| p.node_ids.last().unwrap() == "c").unwrap();
    assert_eq!(to_c.node_ids, vec!["a", "b", "c"]);
    assert!((to_c.total_strength - 0.4).abs() < 1e-9);
}

#[test]
fn test_cycle_is_visited_once() {
    let engine = StorageEngine::open_in_memory().unwrap();
    add_edge(&engine, "x", "y", CausalRelationType::Causes, 1.0, None);
    add_edge(&engine, "y", "z", CausalRelationType::Causes, 1.0, None);
    add_edge(&engine, "z", "x", CausalRelationType::Causes, 1.0, None);

    let paths = query_causal(&engine, &["x".to_string()], &forward(10)).unwrap();
    // y and z each appear exactly once; the cycle back to x is not re-emitted.
    assert_eq!(paths.len(), 2);
    let terminals: Vec<&str> = paths
        .iter()
        .map(|p| p.node_ids.last().unwrap().as_str())
        .collect();
    assert!(terminals.contains(&"y"));
    assert!(terminals.contains(&"z"));
}

#[test]
fn test_backward_and_both_directions() {
    let engine = StorageEngine::open_in_memory().unwrap();
    add_edge(&engine, "cause", "effect", CausalRelationType::Causes, 0.7, None);

    let backward = query_causal(
        &engine,
        &["effect".to_string()],
        &TraversalOptions {
            direction: CausalDirection::Backward,
            max_depth: 1,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(backward.len(), 1);
    assert_eq!(backward[0].node_ids, vec!["effect", "cause"]);

    let both = query_causal(
        &engine,
        &["effect".to_string()],
        &TraversalOptions {
            direction: CausalDirection::Both,
            max_depth: 1,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(both.len(), 1);
}

#[test]
fn test_relation_type_filter() {
    let engine = StorageEngine::open_in_memory().unwrap();
    add_edge(&engine, "n", "via_causes", CausalRelationType::Causes, 1.0, None);
    add_edge(&engine, "n", "via_prevents", CausalRelationType::Prevents, 1.0, None);

    let options = TraversalOptions {
        direction: CausalDirection::Forward,
        max_depth: 1,
        relation_types: Some(vec![CausalRelationType::Prevents]),
        ..Default::default()
    };
    let paths = query_causal(&engine, &["n".to_string()], &options).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].node_ids, vec!["n", "via_prevents"]);
}

#[test]
fn test_expired_edges_are_skipped() {
    let engine = StorageEngine::open_in_memory().unwrap();
    // Already past its TTL when created in the past; expires_at < now.
    let now = Utc::now();
    let relation = CausalRelation {
        id: uuid::Uuid::new_v4().to_string(),
        relation_type: CausalRelationType::Causes,
        strength: 0.9,
        sources: vec!["src".to_string()],
        targets: vec!["tgt".to_string()],
        metadata: None,
        created_at: now - Duration::milliseconds(500),
        ttl_ms: Some(100),
        expires_at: Some(now - Duration::milliseconds(400)),
        active: true,
    };
    engine.add_causal_relation(&relation).unwrap();

    let paths = query_causal(&engine, &["src".to_string()], &forward(1)).unwrap();
    assert!(paths.is_empty(), "expired edge must not produce a path");
}

#[test]
fn test_hyperedge_fans_out_to_all_targets() {
    let engine = StorageEngine::open_in_memory().unwrap();
    let now = Utc::now();
    let relation = CausalRelation {
        id: uuid::Uuid::new_v4().to_string(),
        relation_type: CausalRelationType::Triggers,
        strength: 0.6,
        sources: vec!["spark".to_string()],
        targets: vec!["fire".to_string(), "smoke".to_string()],
        metadata: None,
        created_at: now,
        ttl_ms: None,
        expires_at: None,
        active: true,
    };
    engine.add_causal_relation(&relation).unwrap();

    let paths = query_causal(&engine, &["spark".to_string()], &forward(1)).unwrap();
    assert_eq!(paths.len(), 2);
    for path in &paths {
        assert!((path.total_strength - 0.6).abs() < 1e-9);
    }
}
