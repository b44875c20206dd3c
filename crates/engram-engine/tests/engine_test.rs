//! End-to-end tests over the public engine surface.

mod common;

use engram_core::errors::{EngineError, EngramError, GraphError};
use engram_core::memory::{EntryPatch, Importance, Source};
use engram_core::models::{
    CausalDirection, CausalRelationType, QueryFilters, QueryOptions, StoreOptions,
};

use common::engine;

fn opts() -> StoreOptions {
    StoreOptions::default()
}

#[tokio::test]
async fn test_threshold_acceptance_chain() {
    let (engine, _) = engine().await;

    let root = engine.store("root fact", opts()).unwrap();

    let middle = engine
        .store(
            "derived conclusion",
            StoreOptions {
                parent_ids: vec![root.id.clone()],
                confidence: Some(0.8),
                relevance: Some(0.8),
                ..Default::default()
            },
        )
        .unwrap();

    // root L = 1.0; middle L = 0.64 ≥ 0.3, persists.
    let stats = engine.get_stats().unwrap();
    assert_eq!(stats.entry_count, 2);
    assert_eq!(stats.vector_count, 2);

    let results = engine
        .query(
            "derived conclusion",
            QueryOptions {
                include_provenance: true,
                ..Default::default()
            },
        )
        .unwrap();
    let hit = results.iter().find(|r| r.entry.id == middle.id).unwrap();
    let prov = hit.provenance.as_ref().unwrap();
    assert!((prov.l_score - 0.64).abs() < 1e-9);
    assert_eq!(prov.lineage_depth, 1);
}

#[tokio::test]
async fn test_threshold_rejection_leaves_no_trace() {
    let (engine, _) = engine().await;

    let root = engine.store("root fact", opts()).unwrap();
    let middle = engine
        .store(
            "middle fact",
            StoreOptions {
                parent_ids: vec![root.id.clone()],
                confidence: Some(0.8),
                relevance: Some(0.8),
                ..Default::default()
            },
        )
        .unwrap();

    let err = engine
        .store(
            "weak leaf",
            StoreOptions {
                parent_ids: vec![middle.id.clone()],
                confidence: Some(0.2),
                relevance: Some(0.2),
                ..Default::default()
            },
        )
        .unwrap_err();

    match err {
        EngramError::Graph(GraphError::ProvenanceThreshold { l_score, threshold }) => {
            assert!(l_score < threshold);
        }
        other => panic!("expected threshold error, got {other}"),
    }

    // The gated write consumed nothing: no entry, no label, no vector.
    let stats = engine.get_stats().unwrap();
    assert_eq!(stats.entry_count, 2);
    assert_eq!(stats.vector_count, 2);
}

#[tokio::test]
async fn test_enforcement_off_persists_low_scores() {
    let mut config = engram_core::EngineConfig::default();
    config.provenance.enforce_threshold = false;
    let (engine, _) = common::engine_with(config).await;

    let root = engine.store("root", opts()).unwrap();
    let weak = engine
        .store(
            "weak but kept",
            StoreOptions {
                parent_ids: vec![root.id.clone()],
                confidence: Some(0.2),
                relevance: Some(0.2),
                ..Default::default()
            },
        )
        .unwrap();

    let results = engine
        .query(
            "weak but kept",
            QueryOptions {
                include_provenance: true,
                ..Default::default()
            },
        )
        .unwrap();
    let hit = results.iter().find(|r| r.entry.id == weak.id).unwrap();
    assert!(hit.provenance.as_ref().unwrap().l_score < 0.3);
}

#[tokio::test]
async fn test_top_k_retrieval_ranks_relevant_first() {
    let (engine, _) = engine().await;

    let unrelated = [
        "grocery shopping list with apples and bread",
        "vacation itinerary through the mountains",
        "birthday reminder next month",
        "compiler optimization notes",
        "sourdough starter feeding schedule",
        "garden watering rotation",
        "workout plan upper body",
        "meeting minutes from standup",
    ];
    for content in unrelated {
        engine.store(content, opts()).unwrap();
    }
    let relevant_a = engine
        .store("quarterly trading analysis for energy markets", opts())
        .unwrap();
    let relevant_b = engine
        .store("weekly trading analysis summary", opts())
        .unwrap();

    let results = engine
        .query(
            "trading analysis",
            QueryOptions {
                top_k: 5,
                min_score: Some(0.4),
                ..Default::default()
            },
        )
        .unwrap();

    assert!(results.len() >= 2);
    let top_two: Vec<&str> = results[..2].iter().map(|r| r.entry.id.as_str()).collect();
    assert!(top_two.contains(&relevant_a.id.as_str()));
    assert!(top_two.contains(&relevant_b.id.as_str()));
    for r in &results {
        assert!(r.score >= 0.4);
    }
}

#[tokio::test]
async fn test_query_filters_apply_post_search() {
    let (engine, _) = engine().await;

    engine
        .store(
            "tagged trading note",
            StoreOptions {
                tags: vec!["finance".into()],
                source: Source::User,
                ..Default::default()
            },
        )
        .unwrap();
    engine
        .store(
            "untagged trading note",
            StoreOptions {
                source: Source::Tool,
                ..Default::default()
            },
        )
        .unwrap();

    let results = engine
        .query(
            "trading note",
            QueryOptions {
                filters: QueryFilters {
                    tags: Some(vec!["finance".into()]),
                    sources: Some(vec![Source::User]),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].entry.tags, vec!["finance"]);
}

#[tokio::test]
async fn test_delete_then_restore_is_a_fresh_entry() {
    let (engine, _) = engine().await;

    let first = engine.store("ephemeral insight", opts()).unwrap();
    engine.delete(&first.id).unwrap();
    assert!(engine.get_entry(&first.id).unwrap().is_none());

    let second = engine.store("ephemeral insight", opts()).unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(engine.get_stats().unwrap().entry_count, 1);
}

#[tokio::test]
async fn test_update_touches_only_mutable_fields() {
    let (engine, _) = engine().await;

    let entry = engine.store("fixed content", opts()).unwrap();
    engine
        .update(
            &entry.id,
            EntryPatch {
                tags: Some(vec!["revised".into()]),
                importance: Some(Importance::new(0.9)),
                context: None,
            },
        )
        .unwrap();

    let got = engine.get_entry(&entry.id).unwrap().unwrap();
    assert_eq!(got.content, "fixed content");
    assert_eq!(got.tags, vec!["revised"]);
    assert!((got.importance.value() - 0.9).abs() < 1e-9);
}

#[tokio::test]
async fn test_causal_ttl_expiry() {
    let (engine, _) = engine().await;

    let src = engine.store("cause entry", opts()).unwrap();
    let tgt = engine.store("effect entry", opts()).unwrap();

    engine
        .add_causal_relation(
            vec![src.id.clone()],
            vec![tgt.id.clone()],
            CausalRelationType::Causes,
            0.9,
            Some(100),
        )
        .unwrap();

    // Well within the TTL: the edge is traversable.
    let paths = engine
        .query_causal(&[src.id.clone()], CausalDirection::Forward, 1, None)
        .unwrap();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].node_ids.contains(&tgt.id));
    assert!((paths[0].total_strength - 0.9).abs() < 1e-9);

    // Past the TTL: gone.
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    let paths = engine
        .query_causal(&[src.id.clone()], CausalDirection::Forward, 1, None)
        .unwrap();
    assert!(paths.is_empty());

    // And the sweep marks it inactive durably.
    assert_eq!(engine.expire_causal().unwrap(), 1);
}

#[tokio::test]
async fn test_enhancement_output_shape() {
    let (engine, _) = engine().await;

    let a = engine.store("first related concept", opts()).unwrap();
    let b = engine.store("second related concept", opts()).unwrap();
    engine
        .add_causal_relation(
            vec![a.id.clone()],
            vec![b.id.clone()],
            CausalRelationType::Correlates,
            0.8,
            None,
        )
        .unwrap();

    let result = engine.enhance_entry(&a.id).unwrap().unwrap();
    assert_eq!(result.enhanced.len(), 1024);
    let norm = engram_core::vector::l2_norm(&result.enhanced);
    assert!((norm - 1.0).abs() <= 1e-6);
    assert_eq!(result.neighbor_count, 1);

    // Unknown ids yield null, not an error.
    assert!(engine
        .enhance_entry(&uuid::Uuid::new_v4().to_string())
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_access_recording_is_durable_after_flush() {
    let (engine, _) = engine().await;

    let entry = engine.store("frequently read", opts()).unwrap();
    for _ in 0..5 {
        engine.record_vector_access(&entry.id).unwrap();
    }
    engine.flush().await;

    let stats = engine.get_queue_stats();
    assert_eq!(stats.pending, 0);
    assert!(stats.applied >= 1);
    assert_eq!(engine.get_compression_stats().max_access_count, 5);
}

#[tokio::test]
async fn test_embedder_unavailable_surfaces() {
    let (engine, embedder) = engine().await;

    embedder.set_available(false);
    let err = engine.store("cannot embed", opts()).unwrap_err();
    assert!(matches!(
        err,
        EngramError::Engine(EngineError::EmbedderUnavailable { .. })
    ));
    assert_eq!(engine.get_stats().unwrap().entry_count, 0);

    embedder.set_available(true);
    engine.store("can embed again", opts()).unwrap();
}

#[tokio::test]
async fn test_malformed_parent_uuid_rejected() {
    let (engine, _) = engine().await;
    let err = engine
        .store(
            "child",
            StoreOptions {
                parent_ids: vec!["not-a-uuid".into()],
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngramError::Engine(EngineError::MalformedUuid { .. })
    ));
}

#[tokio::test]
async fn test_missing_parent_rejected() {
    let (engine, _) = engine().await;
    let ghost = uuid::Uuid::new_v4().to_string();
    let err = engine
        .store(
            "orphan",
            StoreOptions {
                parent_ids: vec![ghost],
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngramError::Graph(GraphError::ParentNotFound { .. })
    ));
}

#[tokio::test]
async fn test_pattern_lifecycle_with_prune() {
    let (engine, _) = engine().await;

    engine
        .register_pattern("greeting", "hello {name}", Vec::new(), 5)
        .unwrap();
    assert_eq!(engine.list_patterns().unwrap().len(), 1);

    // 99 failures: not yet eligible.
    for _ in 0..99 {
        engine.record_pattern_outcome("greeting", false).unwrap();
    }

    // The 100th use crosses the prune rule (rate 0.0 < 0.4).
    let err = engine.record_pattern_outcome("greeting", false).unwrap_err();
    assert!(matches!(
        err,
        EngramError::Engine(EngineError::PatternPruned { .. })
    ));
    assert!(engine.list_patterns().unwrap().is_empty());
}

#[tokio::test]
async fn test_close_rejects_further_operations() {
    let (engine, _) = engine().await;
    engine.store("last words", opts()).unwrap();
    engine.close().await;

    let err = engine.store("too late", opts()).unwrap_err();
    assert!(matches!(err, EngramError::Engine(EngineError::Closed)));
}
