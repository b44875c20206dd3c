//! MemoryEngine — wires the subsystems together behind one handle.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};

use engram_compression::{CompressionManager, EncodedVector, TierSweep};
use engram_core::config::EngineConfig;
use engram_core::constants::{META_ENHANCER_WEIGHTS, META_PQ4_CODEBOOK, META_PQ8_CODEBOOK};
use engram_core::errors::{EngineError, EngramError, EngramResult, GraphError, IndexError, QueueError};
use engram_core::memory::{Entry, EntryPatch};
use engram_core::models::{
    CausalDirection, CausalPath, CausalRelation, CausalRelationType, CompressionStats,
    EnhancementResult, EnhancerStats, MemoryStats, PatternStats, PatternTemplate, ProvenanceRecord,
    QueryOptions, QueryResult, QueueStats, SlotSpec, StoreOptions, TierTransition, WriteOp,
};
use engram_core::traits::Embedder;
use engram_core::vector;
use engram_core::Deadline;
use engram_enhance::{EgoGraphEnhancer, ProjectionWeights};
use engram_graph::{provenance, query_causal, ParentLineage, TraversalOptions};
use engram_index::VectorIndex;
use engram_queue::AsyncWriteQueue;
use engram_storage::StorageEngine;

/// Over-sampling factor applied to top-k before post-filtering.
const SEARCH_OVERSAMPLE: usize = 4;

/// Blend applied when re-ranking by provenance: final ordering uses
/// `score · (0.7 + 0.3 · l_score)` so un-provenanced entries are damped,
/// not zeroed.
const RERANK_FLOOR: f64 = 0.7;

/// The persistent semantic-memory core. Single handle per store; no
/// process-global state.
pub struct MemoryEngine {
    config: EngineConfig,
    storage: Arc<StorageEngine>,
    index: Arc<VectorIndex>,
    compression: Arc<CompressionManager>,
    enhancer: EgoGraphEnhancer,
    queue: AsyncWriteQueue,
    embedder: Arc<dyn Embedder>,
    closed: AtomicBool,
}

impl MemoryEngine {
    /// Open a file-backed engine rooted at `data_dir`.
    pub fn new(
        data_dir: &Path,
        config: EngineConfig,
        embedder: Arc<dyn Embedder>,
    ) -> EngramResult<Self> {
        let storage = Arc::new(StorageEngine::open(data_dir)?);
        Self::assemble(storage, config, embedder)
    }

    /// Open an in-memory engine (for testing).
    pub fn new_in_memory(
        config: EngineConfig,
        embedder: Arc<dyn Embedder>,
    ) -> EngramResult<Self> {
        let storage = Arc::new(StorageEngine::open_in_memory()?);
        Self::assemble(storage, config, embedder)
    }

    fn assemble(
        storage: Arc<StorageEngine>,
        config: EngineConfig,
        embedder: Arc<dyn Embedder>,
    ) -> EngramResult<Self> {
        if embedder.dimensions() != config.embedding_dim {
            return Err(EngramError::Index(IndexError::DimensionMismatch {
                expected: config.embedding_dim,
                actual: embedder.dimensions(),
            }));
        }

        let index = Arc::new(VectorIndex::new(config.embedding_dim));
        let compression = Arc::new(CompressionManager::new(
            config.compression.clone(),
            config.embedding_dim,
        ));

        // Persisted artifacts: codebooks and projection weights.
        compression.load_codebooks(
            storage.get_metadata_json(META_PQ8_CODEBOOK)?,
            storage.get_metadata_json(META_PQ4_CODEBOOK)?,
        )?;
        let enhancer = match storage.get_metadata_json::<ProjectionWeights>(META_ENHANCER_WEIGHTS)? {
            Some(weights) => EgoGraphEnhancer::with_weights(config.enhancer.clone(), weights)?,
            None => EgoGraphEnhancer::new(config.enhancer.clone())?,
        };

        let queue = AsyncWriteQueue::new(
            Arc::clone(&storage) as Arc<dyn engram_core::traits::QueueExecutor>,
            config.queue.clone(),
        );

        Ok(Self {
            config,
            storage,
            index,
            compression,
            enhancer,
            queue,
            embedder,
            closed: AtomicBool::new(false),
        })
    }

    /// Rehydrate the index and compression records from the store, then
    /// start the background flush worker. Must run inside a tokio runtime.
    pub async fn initialize(&self) -> EngramResult<()> {
        for mapping in self.storage.all_mappings()? {
            let Some(bytes) = self.storage.get_vector_bytes(mapping.label)? else {
                tracing::warn!(entry_id = %mapping.entry_id, "mapping without vector bytes; quarantining");
                self.storage.quarantine_mapping(&mapping.entry_id)?;
                continue;
            };

            let encoded = EncodedVector::from_bytes(mapping.tier, &bytes);
            match self.compression.decode(&encoded) {
                Ok(full) => {
                    self.index.load(vec![(mapping.label, full)])?;
                    let stored = match mapping.tier {
                        engram_core::models::CompressionTier::Hot => None,
                        _ => Some(encoded),
                    };
                    self.compression.rehydrate(
                        &mapping.entry_id,
                        mapping.label,
                        mapping.tier,
                        mapping.access_count,
                        mapping.last_accessed_at,
                        stored,
                    );
                }
                Err(e) => {
                    // Unreadable blob: fall back to re-embed via the
                    // pending flag rather than failing open.
                    tracing::warn!(
                        entry_id = %mapping.entry_id,
                        error = %e,
                        "undecodable vector; quarantining for re-embed"
                    );
                    self.storage.quarantine_mapping(&mapping.entry_id)?;
                }
            }
        }

        self.queue.start();
        tracing::info!(
            vectors = self.index.count()?,
            entries = self.storage.count_entries()?,
            "memory engine initialized"
        );
        Ok(())
    }

    // --- Store / update / delete ---

    /// Store a new entry. The provenance gate runs before any label or
    /// vector is consumed; a gated write leaves no trace.
    pub fn store(&self, content: &str, opts: StoreOptions) -> EngramResult<Entry> {
        self.ensure_open()?;

        for parent_id in &opts.parent_ids {
            if uuid::Uuid::parse_str(parent_id).is_err() {
                return Err(EngramError::Engine(EngineError::MalformedUuid {
                    value: parent_id.clone(),
                }));
            }
        }

        // Resolve parents; they must pre-exist.
        let mut lineages = Vec::with_capacity(opts.parent_ids.len());
        for parent_id in &opts.parent_ids {
            let record = self.storage.get_provenance(parent_id)?.ok_or_else(|| {
                EngramError::Graph(GraphError::ParentNotFound {
                    id: parent_id.clone(),
                })
            })?;
            lineages.push(ParentLineage {
                l_score: record.l_score,
                depth: record.lineage_depth,
            });
        }

        let confidence = opts.confidence.unwrap_or(1.0);
        let relevance = opts.relevance.unwrap_or(1.0);
        let (l_score, depth) =
            provenance::compute_l_score(&lineages, confidence, relevance, &self.config.provenance);
        provenance::enforce_threshold(l_score, &self.config.provenance)?;

        let embedding = self.embed(content)?;

        let mut entry = Entry::new(
            content.to_string(),
            opts.source,
            opts.importance.unwrap_or_default(),
        );
        entry.tags = opts.tags;
        entry.session_id = opts.session_id;
        entry.agent_id = opts.agent_id;
        entry.context = opts.context;

        let record = ProvenanceRecord {
            entry_id: entry.id.clone(),
            lineage_depth: depth,
            confidence,
            relevance,
            l_score,
        };

        let label = self
            .storage
            .insert_entry_with_vector(&entry, &record, &opts.parent_ids, Some(&embedding))?
            .ok_or_else(|| {
                EngramError::Storage(engram_core::errors::StorageError::ConstraintViolation {
                    what: "no label assigned for stored vector".into(),
                })
            })?;
        self.index.add(label, embedding)?;
        self.compression.register(&entry.id, label);

        // Parents gained a child edge; their neighborhoods changed.
        for parent_id in &opts.parent_ids {
            self.enhancer.invalidate(parent_id);
        }

        tracing::debug!(entry_id = %entry.id, label, l_score, "stored entry");
        Ok(entry)
    }

    /// Update mutable fields (tags, importance, context). Content is
    /// immutable.
    pub fn update(&self, id: &str, patch: EntryPatch) -> EngramResult<()> {
        self.ensure_open()?;
        if patch.is_empty() {
            return Ok(());
        }
        self.storage.patch_entry(id, &patch)?;
        self.enhancer.invalidate(id);
        Ok(())
    }

    /// Delete an entry, its tag/provenance/mapping rows, and its vector.
    pub fn delete(&self, id: &str) -> EngramResult<()> {
        self.ensure_open()?;
        let label = self.storage.delete_entry_full(id)?;
        if let Some(label) = label {
            self.index.delete(label)?;
        }
        self.compression.forget(id);
        self.enhancer.invalidate(id);
        Ok(())
    }

    // --- Query ---

    /// Vector search with post-filters and optional provenance re-rank.
    pub fn query(&self, text: &str, opts: QueryOptions) -> EngramResult<Vec<QueryResult>> {
        self.ensure_open()?;
        if opts.top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embed(text)?;
        let candidate_k = opts.top_k.saturating_mul(SEARCH_OVERSAMPLE);
        let hits = self.index.search(&embedding, candidate_k)?;

        // Resolve labels to entry ids, preserving search order.
        let mut ids = Vec::with_capacity(hits.len());
        let mut by_id = std::collections::HashMap::new();
        for hit in &hits {
            if let Some(mapping) = self.storage.get_mapping_by_label(hit.label)? {
                ids.push(mapping.entry_id.clone());
                by_id.insert(mapping.entry_id, *hit);
            }
        }

        let entries = self.storage.filter_entries(&ids, &opts.filters)?;

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let hit = by_id[&entry.id];
            let score = hit.score as f64;
            if let Some(min) = opts.min_score {
                if score < min {
                    continue;
                }
            }

            let provenance = if opts.include_provenance {
                self.storage.get_provenance(&entry.id)?
            } else {
                None
            };
            let trace = if opts.include_provenance && opts.trace_depth > 0 {
                self.trace_ancestry(&entry.id, opts.trace_depth)?
            } else {
                Vec::new()
            };

            results.push(QueryResult {
                label: hit.label,
                score,
                distance: hit.distance as f64,
                entry,
                provenance,
                trace,
            });
        }

        if opts.include_provenance {
            results.sort_by(|a, b| {
                let rank = |r: &QueryResult| {
                    let l = r.provenance.as_ref().map(|p| p.l_score).unwrap_or(0.0);
                    r.score * (RERANK_FLOOR + (1.0 - RERANK_FLOOR) * l)
                };
                rank(b).partial_cmp(&rank(a)).unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        results.truncate(opts.top_k);
        Ok(results)
    }

    /// Ancestor provenance records, nearest generation first.
    fn trace_ancestry(&self, entry_id: &str, max_depth: usize) -> EngramResult<Vec<ProvenanceRecord>> {
        let mut trace = Vec::new();
        let mut frontier = vec![entry_id.to_string()];
        let mut seen = std::collections::HashSet::new();

        for _ in 0..max_depth {
            let mut next = Vec::new();
            for id in &frontier {
                for parent_id in self.storage.get_parents(id)? {
                    if seen.insert(parent_id.clone()) {
                        if let Some(record) = self.storage.get_provenance(&parent_id)? {
                            trace.push(record);
                        }
                        next.push(parent_id);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        Ok(trace)
    }

    // --- Causal graph ---

    pub fn add_causal_relation(
        &self,
        sources: Vec<String>,
        targets: Vec<String>,
        relation_type: CausalRelationType,
        strength: f64,
        ttl_ms: Option<i64>,
    ) -> EngramResult<CausalRelation> {
        self.ensure_open()?;
        if sources.is_empty() || targets.is_empty() {
            return Err(EngramError::Graph(GraphError::EmptyEndpoints));
        }

        let now = Utc::now();
        let relation = CausalRelation {
            id: uuid::Uuid::new_v4().to_string(),
            relation_type,
            strength: strength.clamp(0.0, 1.0),
            sources,
            targets,
            metadata: None,
            created_at: now,
            ttl_ms,
            expires_at: ttl_ms.map(|ms| now + ChronoDuration::milliseconds(ms)),
            active: true,
        };
        self.storage.add_causal_relation(&relation)?;

        // Endpoint neighborhoods changed.
        for id in relation.sources.iter().chain(relation.targets.iter()) {
            self.enhancer.invalidate(id);
        }
        Ok(relation)
    }

    pub fn query_causal(
        &self,
        start_ids: &[String],
        direction: CausalDirection,
        max_depth: usize,
        relation_types: Option<Vec<CausalRelationType>>,
    ) -> EngramResult<Vec<CausalPath>> {
        self.ensure_open()?;
        let options = TraversalOptions {
            direction,
            max_depth,
            relation_types,
            ..Default::default()
        };
        query_causal(&self.storage, start_ids, &options)
    }

    /// Mark relations past their expiry inactive. Returns the count.
    pub fn expire_causal(&self) -> EngramResult<usize> {
        self.ensure_open()?;
        engram_graph::causal::expire_relations(&self.storage)
    }

    // --- Enhancement ---

    pub fn enhance_entry(&self, id: &str) -> EngramResult<Option<EnhancementResult>> {
        self.ensure_open()?;
        self.enhancer.enhance(&self.storage, &self.index, id)
    }

    // --- Compression ---

    /// Run an evaluation sweep with no deadline.
    pub fn evaluate_tiers(&self) -> EngramResult<Vec<TierTransition>> {
        Ok(self.evaluate_tiers_with_deadline(Deadline::NONE)?.transitions)
    }

    /// Deadline-aware sweep; partial results carry the cancelled marker.
    pub fn evaluate_tiers_with_deadline(&self, deadline: Deadline) -> EngramResult<TierSweep> {
        self.ensure_open()?;
        self.compression
            .evaluate(&self.storage, &self.index, deadline)
    }

    /// Record one access against an entry's vector. The in-memory counter
    /// updates immediately; durability rides the write queue, falling
    /// back to a synchronous write when the queue is full.
    pub fn record_vector_access(&self, id: &str) -> EngramResult<()> {
        self.ensure_open()?;
        let Some(count) = self.compression.record_access(id) else {
            return Ok(());
        };

        let at = Utc::now();
        let op = WriteOp::update(
            "vector_mappings",
            id,
            serde_json::json!({
                "access_count": count,
                "last_accessed_at": at.to_rfc3339(),
            }),
        );
        match self.queue.write(op) {
            Ok(()) => Ok(()),
            Err(EngramError::Queue(QueueError::Overflow { .. })) => {
                self.storage.record_access(id, at)
            }
            Err(e) => Err(e),
        }
    }

    // --- Patterns ---

    pub fn register_pattern(
        &self,
        name: &str,
        pattern: &str,
        slots: Vec<SlotSpec>,
        priority: i32,
    ) -> EngramResult<PatternTemplate> {
        self.ensure_open()?;
        let template = PatternTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            pattern: pattern.to_string(),
            slots,
            priority,
            created_at: Utc::now(),
        };
        self.storage.register_pattern(&template)?;
        Ok(template)
    }

    /// Record a pattern use. When the rolling stats cross the prune rule
    /// the template is removed and the policy outcome surfaces as
    /// `PatternPruned`.
    pub fn record_pattern_outcome(&self, name: &str, success: bool) -> EngramResult<PatternStats> {
        self.ensure_open()?;
        let template = self.storage.get_pattern_by_name(name)?.ok_or_else(|| {
            EngramError::Storage(engram_core::errors::StorageError::NotFound {
                id: name.to_string(),
            })
        })?;
        let (stats, pruned) = self.storage.record_pattern_use(&template.id, success)?;
        if pruned {
            return Err(EngramError::Engine(EngineError::PatternPruned {
                name: name.to_string(),
                use_count: stats.use_count,
                success_rate: stats.success_rate(),
            }));
        }
        Ok(stats)
    }

    pub fn list_patterns(&self) -> EngramResult<Vec<PatternTemplate>> {
        self.ensure_open()?;
        self.storage.list_patterns()
    }

    // --- Recovery ---

    /// Re-embed entries flagged `pending_embedding`, restoring the
    /// mapping-XOR-pending invariant. Returns how many were repaired.
    pub fn repair_pending_embeddings(&self) -> EngramResult<usize> {
        self.ensure_open()?;
        let mut repaired = 0;
        for id in self.storage.pending_embedding_ids()? {
            let Some(entry) = self.storage.get_entry(&id)? else {
                continue;
            };
            let embedding = self.embed(&entry.content)?;
            let label = self.storage.attach_vector(&id, &embedding)?;
            self.index.add(label, embedding)?;
            self.compression.register(&id, label);
            repaired += 1;
        }
        if repaired > 0 {
            tracing::info!(repaired, "re-embedded pending entries");
        }
        Ok(repaired)
    }

    // --- Stats ---

    pub fn get_compression_stats(&self) -> CompressionStats {
        self.compression.stats()
    }

    pub fn get_enhancer_stats(&self) -> EnhancerStats {
        self.enhancer.stats()
    }

    pub fn get_queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn get_stats(&self) -> EngramResult<MemoryStats> {
        Ok(MemoryStats {
            entry_count: self.storage.count_entries()?,
            vector_count: self.index.count()?,
            pending_embeddings: self.storage.pending_embedding_ids()?.len(),
            causal_relation_count: self.storage.count_active_causal_relations()?,
            pattern_count: self.storage.count_patterns()?,
            compression: self.get_compression_stats(),
            enhancer: self.get_enhancer_stats(),
            queue: self.get_queue_stats(),
        })
    }

    /// Direct entry read (tags included).
    pub fn get_entry(&self, id: &str) -> EngramResult<Option<Entry>> {
        self.ensure_open()?;
        self.storage.get_entry(id)
    }

    /// Await durability of everything queued so far.
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    /// Flush the queue and stop background work. The engine rejects
    /// operations afterwards.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.shutdown().await;
        tracing::info!("memory engine closed");
    }

    // --- Internals ---

    fn ensure_open(&self) -> EngramResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngramError::Engine(EngineError::Closed));
        }
        Ok(())
    }

    /// Embed text and enforce the dimension/norm boundary.
    fn embed(&self, text: &str) -> EngramResult<Vec<f32>> {
        if !self.embedder.is_available() {
            return Err(EngramError::Engine(EngineError::EmbedderUnavailable {
                name: self.embedder.name().to_string(),
            }));
        }
        let mut v = self.embedder.embed(text)?;
        if v.len() != self.config.embedding_dim {
            return Err(EngramError::Index(IndexError::DimensionMismatch {
                expected: self.config.embedding_dim,
                actual: v.len(),
            }));
        }
        vector::ensure_unit_norm(&mut v);
        Ok(v)
    }
}
