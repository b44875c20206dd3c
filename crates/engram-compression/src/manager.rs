//! Tier lifecycle owner: access tracking, codebooks, demotion sweeps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use engram_core::config::CompressionConfig;
use engram_core::constants::{META_PQ4_CODEBOOK, META_PQ8_CODEBOOK};
use engram_core::errors::{CompressionError, EngramError, EngramResult};
use engram_core::models::{CompressionStats, CompressionTier, TierTransition};
use engram_core::Deadline;
use engram_index::VectorIndex;
use engram_storage::StorageEngine;

use crate::encoded::EncodedVector;
use crate::pq::{Codebook, PqConfig, ProductQuantizer};
use crate::{binary, scalar};

/// Cap on vectors sampled for codebook training.
const MAX_TRAINING_SAMPLE: usize = 2048;

/// Per-entry compression state.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub label: i64,
    pub tier: CompressionTier,
    pub access_count: u64,
    pub last_access: DateTime<Utc>,
    /// Compressed form for non-HOT tiers. HOT vectors live uncompressed
    /// in the index; exactly one of the two holds at any time.
    pub encoded: Option<EncodedVector>,
}

impl AccessRecord {
    fn stored_bytes(&self, dim: usize) -> usize {
        match &self.encoded {
            Some(encoded) => encoded.byte_len(),
            None => dim * 4,
        }
    }
}

/// Result of one evaluation sweep.
#[derive(Debug, Clone, Default)]
pub struct TierSweep {
    pub transitions: Vec<TierTransition>,
    /// Set when the deadline expired mid-sweep; transitions hold the
    /// work completed so far.
    pub cancelled: bool,
}

/// Owns the five-tier lifecycle and the product quantizers.
pub struct CompressionManager {
    config: CompressionConfig,
    dim: usize,
    records: DashMap<String, AccessRecord>,
    max_access: AtomicU64,
    pq8: OnceLock<Arc<ProductQuantizer>>,
    pq4: OnceLock<Arc<ProductQuantizer>>,
    last_evaluation: Mutex<Option<DateTime<Utc>>>,
}

impl CompressionManager {
    pub fn new(config: CompressionConfig, dim: usize) -> Self {
        Self {
            config,
            dim,
            records: DashMap::new(),
            max_access: AtomicU64::new(0),
            pq8: OnceLock::new(),
            pq4: OnceLock::new(),
            last_evaluation: Mutex::new(None),
        }
    }

    /// Register a freshly inserted vector as HOT.
    pub fn register(&self, entry_id: &str, label: i64) {
        self.records.insert(
            entry_id.to_string(),
            AccessRecord {
                label,
                tier: CompressionTier::Hot,
                access_count: 0,
                last_access: Utc::now(),
                encoded: None,
            },
        );
    }

    /// Restore a record from persisted state at open.
    pub fn rehydrate(
        &self,
        entry_id: &str,
        label: i64,
        tier: CompressionTier,
        access_count: u64,
        last_access: DateTime<Utc>,
        encoded: Option<EncodedVector>,
    ) {
        self.records.insert(
            entry_id.to_string(),
            AccessRecord {
                label,
                tier,
                access_count,
                last_access,
                encoded,
            },
        );
        self.max_access.fetch_max(access_count, Ordering::Relaxed);
    }

    /// Drop the record for a deleted entry.
    pub fn forget(&self, entry_id: &str) {
        self.records.remove(entry_id);
    }

    /// Increment the access counter; returns the new count.
    /// Counters only increase between resets.
    pub fn record_access(&self, entry_id: &str) -> Option<u64> {
        let mut record = self.records.get_mut(entry_id)?;
        record.access_count += 1;
        record.last_access = Utc::now();
        let count = record.access_count;
        drop(record);
        self.max_access.fetch_max(count, Ordering::Relaxed);
        Some(count)
    }

    pub fn max_access_count(&self) -> u64 {
        self.max_access.load(Ordering::Relaxed)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn tier_of(&self, entry_id: &str) -> Option<CompressionTier> {
        self.records.get(entry_id).map(|r| r.tier)
    }

    /// Install previously persisted codebooks. Once set they are
    /// immutable for the life of the store.
    pub fn load_codebooks(
        &self,
        pq8: Option<Codebook>,
        pq4: Option<Codebook>,
    ) -> EngramResult<()> {
        if let Some(codebook) = pq8 {
            self.check_codebook(&codebook)?;
            let _ = self.pq8.set(Arc::new(ProductQuantizer::new(codebook)));
        }
        if let Some(codebook) = pq4 {
            self.check_codebook(&codebook)?;
            let _ = self.pq4.set(Arc::new(ProductQuantizer::new(codebook)));
        }
        Ok(())
    }

    fn check_codebook(&self, codebook: &Codebook) -> EngramResult<()> {
        if codebook.config.dim() != self.dim {
            return Err(EngramError::Compression(
                CompressionError::SubvectorShapeMismatch {
                    dim: self.dim,
                    subvectors: codebook.config.num_subvectors,
                    subvector_dim: codebook.config.subvector_dim,
                },
            ));
        }
        Ok(())
    }

    /// Encode a full-precision vector into the representation of `tier`.
    pub fn encode_for_tier(
        &self,
        tier: CompressionTier,
        v: &[f32],
    ) -> EngramResult<EncodedVector> {
        match tier {
            CompressionTier::Hot => Ok(EncodedVector::Hot(v.to_vec())),
            CompressionTier::Warm => Ok(EncodedVector::Warm(scalar::encode(v))),
            CompressionTier::Cool => {
                let pq = self.require_pq8()?;
                Ok(EncodedVector::Cool(pq.encode(v)?))
            }
            CompressionTier::Cold => {
                let pq = self.require_pq4()?;
                Ok(EncodedVector::Cold(pq.encode_packed4(v)?))
            }
            CompressionTier::Frozen => Ok(EncodedVector::Frozen(binary::encode(v))),
        }
    }

    /// Decode any representation back to f32. Lossy below HOT.
    pub fn decode(&self, encoded: &EncodedVector) -> EngramResult<Vec<f32>> {
        match encoded {
            EncodedVector::Hot(v) => Ok(v.clone()),
            EncodedVector::Warm(bits) => Ok(scalar::decode(bits)),
            EncodedVector::Cool(codes) => self.require_pq8()?.decode(codes),
            EncodedVector::Cold(packed) => self.require_pq4()?.decode_packed4(packed),
            EncodedVector::Frozen(packed) => Ok(binary::decode(packed, self.dim)),
        }
    }

    fn require_pq8(&self) -> EngramResult<&Arc<ProductQuantizer>> {
        self.pq8.get().ok_or_else(|| {
            EngramError::Compression(CompressionError::CodebookNotLoaded {
                tier: CompressionTier::Cool.to_string(),
            })
        })
    }

    fn require_pq4(&self) -> EngramResult<&Arc<ProductQuantizer>> {
        self.pq4.get().ok_or_else(|| {
            EngramError::Compression(CompressionError::CodebookNotLoaded {
                tier: CompressionTier::Cold.to_string(),
            })
        })
    }

    /// Evaluate every record against its access frequency and demote where
    /// the target tier has lower precision. Never promotes: decompression
    /// is lossy, so transitions are strictly monotone.
    ///
    /// No-ops when called again within `evaluation_interval` or while the
    /// store holds fewer than `min_vectors_for_compression` vectors.
    pub fn evaluate(
        &self,
        storage: &StorageEngine,
        index: &VectorIndex,
        deadline: Deadline,
    ) -> EngramResult<TierSweep> {
        let now = Utc::now();
        {
            let mut last = self
                .last_evaluation
                .lock()
                .map_err(|_| EngramError::Cancelled)?;
            if let Some(at) = *last {
                let elapsed = (now - at).to_std().unwrap_or_default();
                if elapsed < self.config.evaluation_interval {
                    return Ok(TierSweep::default());
                }
            }
            *last = Some(now);
        }

        if self.records.len() < self.config.min_vectors_for_compression {
            return Ok(TierSweep::default());
        }

        let max_access = self.max_access.load(Ordering::Relaxed).max(1);
        let entry_ids: Vec<String> = self.records.iter().map(|r| r.key().clone()).collect();

        // Train codebooks up front when any demotion will need them.
        let needs_pq = entry_ids.iter().any(|id| {
            self.records
                .get(id)
                .map(|r| {
                    let frequency = r.access_count as f64 / max_access as f64;
                    let target = CompressionTier::for_frequency(frequency);
                    target.order() > r.tier.order()
                        && matches!(target, CompressionTier::Cool | CompressionTier::Cold)
                })
                .unwrap_or(false)
        });
        if needs_pq {
            self.ensure_codebooks(storage, index)?;
        }

        let mut sweep = TierSweep::default();
        for entry_id in entry_ids {
            if deadline.expired() {
                sweep.cancelled = true;
                break;
            }

            let Some(record) = self.records.get(&entry_id).map(|r| r.value().clone()) else {
                continue;
            };
            let frequency = record.access_count as f64 / max_access as f64;
            let target = CompressionTier::for_frequency(frequency);
            if target.order() <= record.tier.order() {
                continue;
            }

            match self.demote(storage, index, &entry_id, &record, target) {
                Ok(transition) => sweep.transitions.push(transition),
                Err(e) => {
                    tracing::warn!(entry_id = %entry_id, error = %e, "demotion failed; skipping");
                }
            }
        }

        tracing::debug!(
            demoted = sweep.transitions.len(),
            cancelled = sweep.cancelled,
            "tier evaluation sweep complete"
        );
        Ok(sweep)
    }

    /// One entry's re-encode. Persist first, then swap the in-memory
    /// forms, so a failure leaves the previous tier intact everywhere.
    fn demote(
        &self,
        storage: &StorageEngine,
        index: &VectorIndex,
        entry_id: &str,
        record: &AccessRecord,
        target: CompressionTier,
    ) -> EngramResult<TierTransition> {
        let full = match &record.encoded {
            None => index
                .get_vector(record.label)?
                .ok_or(EngramError::Index(
                    engram_core::errors::IndexError::NotInitialized,
                ))?,
            Some(encoded) => self.decode(encoded)?,
        };

        let encoded = self.encode_for_tier(target, &full)?;
        storage.persist_tier_change(record.label, target, &encoded.to_bytes())?;

        // The index keeps a search-time decoded copy at the new precision.
        let lossy = self.decode(&encoded)?;
        index.update(record.label, lossy)?;

        if let Some(mut slot) = self.records.get_mut(entry_id) {
            slot.tier = target;
            slot.encoded = Some(encoded);
        }

        Ok(TierTransition {
            entry_id: entry_id.to_string(),
            label: record.label,
            from: record.tier,
            to: target,
            at: Utc::now(),
        })
    }

    /// Train and persist both codebooks from the current index contents
    /// when they are not loaded yet.
    fn ensure_codebooks(
        &self,
        storage: &StorageEngine,
        index: &VectorIndex,
    ) -> EngramResult<()> {
        if self.pq8.get().is_some() && self.pq4.get().is_some() {
            return Ok(());
        }

        let mut sample = Vec::new();
        for record in self.records.iter() {
            if sample.len() >= MAX_TRAINING_SAMPLE {
                break;
            }
            if let Some(v) = index.get_vector(record.label)? {
                sample.push(v);
            }
        }

        if self.pq8.get().is_none() {
            let pq = ProductQuantizer::train(
                PqConfig::pq8(self.dim),
                &sample,
                self.config.kmeans_iterations,
                self.config.min_training_vectors,
            )?;
            storage.set_metadata_json(META_PQ8_CODEBOOK, pq.codebook())?;
            let _ = self.pq8.set(Arc::new(pq));
        }
        if self.pq4.get().is_none() {
            let pq = ProductQuantizer::train(
                PqConfig::pq4(self.dim),
                &sample,
                self.config.kmeans_iterations,
                self.config.min_training_vectors,
            )?;
            storage.set_metadata_json(META_PQ4_CODEBOOK, pq.codebook())?;
            let _ = self.pq4.set(Arc::new(pq));
        }
        tracing::info!(sample = sample.len(), "trained product quantizer codebooks");
        Ok(())
    }

    /// Aggregate accounting across all records.
    pub fn stats(&self) -> CompressionStats {
        let mut stats = CompressionStats {
            total_vectors: self.records.len(),
            max_access_count: self.max_access.load(Ordering::Relaxed),
            last_evaluation_at: self.last_evaluation.lock().ok().and_then(|l| *l),
            ..Default::default()
        };

        for record in self.records.iter() {
            *stats.per_tier.entry(record.tier).or_insert(0) += 1;
            stats.uncompressed_bytes += (self.dim * 4) as u64;
            stats.compressed_bytes += record.stored_bytes(self.dim) as u64;
        }
        if stats.uncompressed_bytes > 0 {
            stats.memory_saved_ratio = (stats.uncompressed_bytes - stats.compressed_bytes) as f64
                / stats.uncompressed_bytes as f64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dim: usize) -> CompressionManager {
        CompressionManager::new(CompressionConfig::default(), dim)
    }

    #[test]
    fn register_and_access_tracking() {
        let m = manager(4);
        m.register("e1", 0);
        m.register("e2", 1);

        assert_eq!(m.record_access("e1"), Some(1));
        assert_eq!(m.record_access("e1"), Some(2));
        assert_eq!(m.record_access("e2"), Some(1));
        assert_eq!(m.max_access_count(), 2);
        assert_eq!(m.record_access("missing"), None);
    }

    #[test]
    fn hot_and_warm_encode_without_codebooks() {
        let m = manager(4);
        let v = vec![0.5f32, -0.5, 0.5, -0.5];
        let hot = m.encode_for_tier(CompressionTier::Hot, &v).unwrap();
        assert_eq!(m.decode(&hot).unwrap(), v);

        let warm = m.encode_for_tier(CompressionTier::Warm, &v).unwrap();
        let decoded = m.decode(&warm).unwrap();
        for (a, b) in v.iter().zip(decoded.iter()) {
            assert!((a - b).abs() <= 0.01);
        }
    }

    #[test]
    fn cool_without_codebook_is_an_error() {
        let m = manager(4);
        let err = m
            .encode_for_tier(CompressionTier::Cool, &[0.0; 4])
            .unwrap_err();
        assert!(matches!(
            err,
            EngramError::Compression(CompressionError::CodebookNotLoaded { .. })
        ));
    }

    #[test]
    fn frozen_round_trip_preserves_signs() {
        let m = manager(8);
        let v = vec![0.3f32, -0.2, 0.1, -0.4, 0.5, -0.6, 0.7, -0.8];
        let frozen = m.encode_for_tier(CompressionTier::Frozen, &v).unwrap();
        assert_eq!(frozen.byte_len(), 1);
        let decoded = m.decode(&frozen).unwrap();
        for (a, b) in v.iter().zip(decoded.iter()) {
            assert_eq!(a.is_sign_negative(), *b < 0.0);
        }
    }

    #[test]
    fn stats_account_for_mixed_tiers() {
        let m = manager(768);
        m.register("hot", 0);
        m.rehydrate(
            "frozen",
            1,
            CompressionTier::Frozen,
            0,
            Utc::now(),
            Some(EncodedVector::Frozen(vec![0; 96])),
        );

        let stats = m.stats();
        assert_eq!(stats.total_vectors, 2);
        assert_eq!(stats.uncompressed_bytes, 2 * 3072);
        assert_eq!(stats.compressed_bytes, 3072 + 96);
        assert!(stats.memory_saved_ratio > 0.0);
        assert_eq!(stats.per_tier[&CompressionTier::Hot], 1);
        assert_eq!(stats.per_tier[&CompressionTier::Frozen], 1);
    }
}
