//! Shared test fixtures: a deterministic bag-of-words embedder.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use engram_core::constants::EMBEDDING_DIM;
use engram_core::errors::EngramResult;
use engram_core::traits::Embedder;
use engram_core::vector;
use engram_engine::MemoryEngine;

/// Hashes tokens into buckets, so texts sharing words land near each
/// other in cosine space. Deterministic across runs.
pub struct HashingEmbedder {
    available: AtomicBool,
}

impl HashingEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            available: AtomicBool::new(true),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> EngramResult<Vec<f32>> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            // FNV-1a
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            v[(hash % EMBEDDING_DIM as u64) as usize] += 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        vector::normalize(&mut v);
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }

    fn name(&self) -> &str {
        "hashing-test"
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }
}

/// An initialized in-memory engine with the default config.
pub async fn engine() -> (MemoryEngine, Arc<HashingEmbedder>) {
    engine_with(engram_core::EngineConfig::default()).await
}

pub async fn engine_with(
    config: engram_core::EngineConfig,
) -> (MemoryEngine, Arc<HashingEmbedder>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let embedder = HashingEmbedder::new();
    let engine = MemoryEngine::new_in_memory(config, embedder.clone()).unwrap();
    engine.initialize().await.unwrap();
    (engine, embedder)
}
