//! The enhancement pipeline: cache → ego graph → message passing →
//! combine → project.

use std::sync::atomic::{AtomicU64, Ordering};

use moka::sync::Cache;

use engram_core::config::EnhancerConfig;
use engram_core::errors::EngramResult;
use engram_core::models::{EnhancementResult, EnhancerStats};
use engram_core::vector;
use engram_index::VectorIndex;
use engram_storage::StorageEngine;

use crate::aggregate::{self, NeighborMessage};
use crate::ego::build_ego_graph;
use crate::projection::{AttentionProjections, ProjectionMlp, ProjectionWeights};

/// Enhances entry embeddings with their graph neighborhood.
///
/// Cache hits short-circuit the whole pipeline. The cache is invalidated
/// per entry on update/delete.
pub struct EgoGraphEnhancer {
    config: EnhancerConfig,
    projection: ProjectionMlp,
    attention: AttentionProjections,
    cache: Cache<String, EnhancementResult>,
    enhancements: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    neighbor_total: AtomicU64,
}

impl EgoGraphEnhancer {
    /// Build with deterministic seeded weights (no artifact installed).
    pub fn new(config: EnhancerConfig) -> EngramResult<Self> {
        let weights = ProjectionWeights::seeded(0x45_47_52_41);
        Self::with_weights(config, weights)
    }

    /// Build with a loaded weight artifact. Shapes and finiteness are
    /// validated before use.
    pub fn with_weights(config: EnhancerConfig, weights: ProjectionWeights) -> EngramResult<Self> {
        let projection = ProjectionMlp::new(
            weights,
            config.activation,
            config.residual,
            config.normalize_output,
        )?;
        let attention = AttentionProjections::seeded(0x45_47_52_41 ^ 0xA77, config.attention_dim);
        let cache = Cache::builder().max_capacity(config.cache_capacity).build();
        Ok(Self {
            config,
            projection,
            attention,
            cache,
            enhancements: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            neighbor_total: AtomicU64::new(0),
        })
    }

    /// Enhance one entry. Returns None when the entry has no embedding.
    pub fn enhance(
        &self,
        storage: &StorageEngine,
        index: &VectorIndex,
        entry_id: &str,
    ) -> EngramResult<Option<EnhancementResult>> {
        if let Some(cached) = self.cache.get(entry_id) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            let mut hit = cached;
            hit.from_cache = true;
            return Ok(Some(hit));
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        let Some(mapping) = storage.get_mapping(entry_id)? else {
            return Ok(None);
        };
        let Some(center) = index.get_vector(mapping.label)? else {
            return Ok(None);
        };

        let ego = build_ego_graph(storage, index, entry_id, center.clone(), &self.config)?;

        let messages: Vec<NeighborMessage<'_>> = ego
            .neighbor_nodes()
            .map(|node| NeighborMessage {
                embedding: node.embedding.as_deref().unwrap_or(&[]),
                weight: node.edge_weight as f32
                    * self
                        .config
                        .distance_decay
                        .powi(node.hop_distance.saturating_sub(1) as i32),
            })
            .collect();
        let neighbor_count = messages.len();

        let agg = aggregate::aggregate(self.config.aggregation, &center, &messages, &self.attention);
        let mut combined = aggregate::combine(&center, &agg, self.config.self_loop_weight);
        if self.config.normalize_output {
            vector::normalize(&mut combined);
        }

        let enhanced = self.projection.forward(&combined);

        let result = EnhancementResult {
            entry_id: entry_id.to_string(),
            enhanced,
            neighbor_count,
            hops_reached: ego.hops_reached,
            aggregation: self.config.aggregation,
            from_cache: false,
        };

        self.enhancements.fetch_add(1, Ordering::Relaxed);
        self.neighbor_total
            .fetch_add(neighbor_count as u64, Ordering::Relaxed);
        self.cache.insert(entry_id.to_string(), result.clone());
        tracing::debug!(
            entry_id = %entry_id,
            neighbors = neighbor_count,
            hops = ego.hops_reached,
            "enhanced entry"
        );
        Ok(Some(result))
    }

    /// Drop the cached enhancement for an entry whose graph or embedding
    /// changed.
    pub fn invalidate(&self, entry_id: &str) {
        self.cache.invalidate(entry_id);
    }

    pub fn stats(&self) -> EnhancerStats {
        let enhancements = self.enhancements.load(Ordering::Relaxed);
        EnhancerStats {
            enhancements,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            avg_neighbor_count: if enhancements == 0 {
                0.0
            } else {
                self.neighbor_total.load(Ordering::Relaxed) as f64 / enhancements as f64
            },
        }
    }
}
