use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::{Entry, Importance, Source};

use super::provenance::ProvenanceRecord;

/// Options accepted by `MemoryEngine::store`.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub tags: Vec<String>,
    pub source: Source,
    pub importance: Option<Importance>,
    /// Parents must pre-exist; the provenance graph stays a DAG by
    /// construction.
    pub parent_ids: Vec<String>,
    /// Confidence recorded against the parents, in [0, 1]. Defaults to 1.0.
    pub confidence: Option<f64>,
    /// Relevance recorded against the parents, in [0, 1]. Defaults to 1.0.
    pub relevance: Option<f64>,
    pub session_id: Option<String>,
    pub agent_id: Option<String>,
    pub context: Option<String>,
}

/// Post-search filters. All are conjunctive and applied after the
/// vector search.
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub sources: Option<Vec<Source>>,
    pub tags: Option<Vec<String>>,
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub min_importance: Option<Importance>,
    pub session_id: Option<String>,
    pub agent_id: Option<String>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.sources.is_none()
            && self.tags.is_none()
            && self.date_range.is_none()
            && self.min_importance.is_none()
            && self.session_id.is_none()
            && self.agent_id.is_none()
    }
}

/// Options accepted by `MemoryEngine::query`.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub top_k: usize,
    /// Minimum similarity score (1 − cosine distance) to keep a result.
    pub min_score: Option<f64>,
    pub filters: QueryFilters,
    /// Attach provenance records and re-rank by L-Score.
    pub include_provenance: bool,
    /// Hops of ancestry to attach when provenance is included.
    pub trace_depth: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_score: None,
            filters: QueryFilters::default(),
            include_provenance: false,
            trace_depth: 1,
        }
    }
}

/// One retrieval hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub entry: Entry,
    /// Similarity score = 1 − cosine distance.
    pub score: f64,
    pub distance: f64,
    pub label: i64,
    pub provenance: Option<ProvenanceRecord>,
    /// Ancestor chain, nearest first, when tracing was requested.
    #[serde(default)]
    pub trace: Vec<ProvenanceRecord>,
}
