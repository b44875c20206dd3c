//! Integration test: readers observe committed snapshots while a writer runs.

use std::sync::Arc;
use std::thread;

use engram_core::memory::{Entry, Importance, Source};
use engram_core::models::ProvenanceRecord;
use engram_storage::StorageEngine;

#[test]
fn test_concurrent_readers_during_writes() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(StorageEngine::open(dir.path()).unwrap());

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 0..50 {
                let entry = Entry::new(
                    format!("concurrent entry {i}"),
                    Source::System,
                    Importance::default(),
                );
                let prov = ProvenanceRecord::root(entry.id.clone());
                engine
                    .insert_entry_with_vector(&entry, &prov, &[], Some(&[1.0, 0.0]))
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut last = 0;
                for _ in 0..100 {
                    let count = engine.count_entries().unwrap();
                    // Counts only grow; no torn state is ever visible.
                    assert!(count >= last);
                    last = count;
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(engine.count_entries().unwrap(), 50);
    assert_eq!(engine.count_mappings().unwrap(), 50);
}
