use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::importance::Importance;
use super::source::Source;

/// A stored unit of memory. Content is immutable after creation;
/// tags, importance, and context are mutable via explicit update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// UUID v4 identifier.
    pub id: String,
    /// UTF-8 content. Immutable once stored.
    pub content: String,
    /// Origin of the entry.
    pub source: Source,
    /// Importance in [0, 1].
    pub importance: Importance,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Owning session, if any.
    pub session_id: Option<String>,
    /// Owning agent, if any.
    pub agent_id: Option<String>,
    /// Free-form context string attached at store time.
    pub context: Option<String>,
    /// True while the entry has no vector in the index.
    /// Exactly one of {mapping exists, pending_embedding} holds.
    pub pending_embedding: bool,
    /// blake3 hash of content for dedup and cache keys.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    /// Build a fresh entry with a new UUID and current timestamps.
    pub fn new(content: String, source: Source, importance: Importance) -> Self {
        let now = Utc::now();
        let content_hash = Self::compute_content_hash(&content);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            source,
            importance,
            tags: Vec::new(),
            session_id: None,
            agent_id: None,
            context: None,
            pending_embedding: false,
            content_hash,
            created_at: now,
            updated_at: now,
        }
    }

    /// Compute the blake3 content hash.
    pub fn compute_content_hash(content: &str) -> String {
        blake3::hash(content.as_bytes()).to_hex().to_string()
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Mutable fields of an entry. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryPatch {
    pub tags: Option<Vec<String>>,
    pub importance: Option<Importance>,
    pub context: Option<Option<String>>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.tags.is_none() && self.importance.is_none() && self.context.is_none()
    }
}
