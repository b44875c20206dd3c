//! Reopen a file-backed engine and verify rehydration.

mod common;

use anyhow::Result;
use engram_core::models::{QueryOptions, StoreOptions};
use engram_engine::MemoryEngine;

#[tokio::test]
async fn test_reopen_rehydrates_index_and_records() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let embedder = common::HashingEmbedder::new();

    let stored_id;
    {
        let engine = MemoryEngine::new(
            dir.path(),
            engram_core::EngineConfig::default(),
            embedder.clone(),
        )?;
        engine.initialize().await?;

        let entry = engine.store("durable trading analysis", StoreOptions::default())?;
        stored_id = entry.id.clone();
        engine.record_vector_access(&entry.id)?;
        engine.close().await;
    }

    let engine = MemoryEngine::new(
        dir.path(),
        engram_core::EngineConfig::default(),
        embedder.clone(),
    )?;
    engine.initialize().await?;

    let stats = engine.get_stats()?;
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.vector_count, 1);
    assert_eq!(stats.pending_embeddings, 0);
    assert_eq!(stats.compression.max_access_count, 1);

    let results = engine.query("trading analysis", QueryOptions::default())?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].entry.id, stored_id);
    engine.close().await;
    Ok(())
}

#[tokio::test]
async fn test_repair_pending_embeddings_restores_invariant() -> Result<()> {
    let dir = tempfile::tempdir()?;

    // Seed an entry with no vector (pending flag set) straight through
    // the storage layer, the state a quarantined mapping leaves behind.
    let pending_id;
    {
        let storage = engram_storage::StorageEngine::open(dir.path())?;
        let mut entry = engram_core::memory::Entry::new(
            "entry awaiting embedding".into(),
            engram_core::memory::Source::System,
            engram_core::memory::Importance::default(),
        );
        entry.pending_embedding = true;
        pending_id = entry.id.clone();
        let prov = engram_core::models::ProvenanceRecord::root(entry.id.clone());
        storage.insert_entry_with_vector(&entry, &prov, &[], None)?;
    }

    let embedder = common::HashingEmbedder::new();
    let engine = MemoryEngine::new(
        dir.path(),
        engram_core::EngineConfig::default(),
        embedder.clone(),
    )?;
    engine.initialize().await?;

    assert_eq!(engine.get_stats()?.pending_embeddings, 1);
    assert_eq!(engine.get_stats()?.vector_count, 0);

    let repaired = engine.repair_pending_embeddings()?;
    assert_eq!(repaired, 1);

    let stats = engine.get_stats()?;
    assert_eq!(stats.pending_embeddings, 0);
    assert_eq!(stats.vector_count, 1);

    // The repaired entry is searchable.
    let results = engine.query("entry awaiting embedding", QueryOptions::default())?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].entry.id, pending_id);
    engine.close().await;
    Ok(())
}
