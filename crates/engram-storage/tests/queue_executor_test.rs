//! Integration test: the queue executor seam applies batches atomically.

use chrono::Utc;
use engram_core::memory::{Entry, Importance, Source};
use engram_core::models::{ProvenanceRecord, WriteOp};
use engram_core::traits::QueueExecutor;
use engram_storage::StorageEngine;

fn seed_entry(engine: &StorageEngine, content: &str) -> Entry {
    let entry = Entry::new(content.to_string(), Source::Tool, Importance::default());
    let prov = ProvenanceRecord::root(entry.id.clone());
    engine
        .insert_entry_with_vector(&entry, &prov, &[], Some(&[1.0, 0.0]))
        .unwrap();
    entry
}

#[test]
fn test_access_stat_update_is_monotone() {
    let engine = StorageEngine::open_in_memory().unwrap();
    let entry = seed_entry(&engine, "counted");

    let at = Utc::now();
    let op = WriteOp::update(
        "vector_mappings",
        entry.id.clone(),
        serde_json::json!({
            "access_count": 7,
            "last_accessed_at": at.to_rfc3339(),
        }),
    );
    engine.apply_batch(&[op]).unwrap();
    assert_eq!(engine.get_mapping(&entry.id).unwrap().unwrap().access_count, 7);

    // A stale absolute value never regresses the counter.
    let stale = WriteOp::update(
        "vector_mappings",
        entry.id.clone(),
        serde_json::json!({
            "access_count": 3,
            "last_accessed_at": at.to_rfc3339(),
        }),
    );
    engine.apply_batch(&[stale]).unwrap();
    assert_eq!(engine.get_mapping(&entry.id).unwrap().unwrap().access_count, 7);
}

#[test]
fn test_metadata_insert_via_queue() {
    let engine = StorageEngine::open_in_memory().unwrap();
    // Values in system_metadata are JSON-encoded.
    let op = WriteOp::insert(
        "system_metadata",
        serde_json::json!({"key": "last_sweep", "value": "\"2026-01-01T00:00:00Z\""}),
    );
    engine.apply_batch(&[op]).unwrap();

    let value: Option<String> = engine.get_metadata_json("last_sweep").unwrap();
    assert_eq!(value.as_deref(), Some("2026-01-01T00:00:00Z"));
}

#[test]
fn test_batch_rolls_back_on_failure() {
    let engine = StorageEngine::open_in_memory().unwrap();
    let entry = seed_entry(&engine, "safe");

    let good = WriteOp::update(
        "vector_mappings",
        entry.id.clone(),
        serde_json::json!({
            "access_count": 5,
            "last_accessed_at": Utc::now().to_rfc3339(),
        }),
    );
    let bad = WriteOp::insert("not_a_table", serde_json::json!({"x": 1}));

    assert!(engine.apply_batch(&[good, bad]).is_err());
    assert_eq!(
        engine.get_mapping(&entry.id).unwrap().unwrap().access_count,
        0,
        "failed batch left no partial effects"
    );
}

#[test]
fn test_empty_batch_is_noop() {
    let engine = StorageEngine::open_in_memory().unwrap();
    engine.apply_batch(&[]).unwrap();
}
