use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::GraphError;

/// Typed causal relation kind. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CausalRelationType {
    Causes,
    Enables,
    Prevents,
    Correlates,
    Precedes,
    Triggers,
}

impl CausalRelationType {
    pub fn as_str(self) -> &'static str {
        match self {
            CausalRelationType::Causes => "causes",
            CausalRelationType::Enables => "enables",
            CausalRelationType::Prevents => "prevents",
            CausalRelationType::Correlates => "correlates",
            CausalRelationType::Precedes => "precedes",
            CausalRelationType::Triggers => "triggers",
        }
    }
}

impl fmt::Display for CausalRelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CausalRelationType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "causes" => Ok(CausalRelationType::Causes),
            "enables" => Ok(CausalRelationType::Enables),
            "prevents" => Ok(CausalRelationType::Prevents),
            "correlates" => Ok(CausalRelationType::Correlates),
            "precedes" => Ok(CausalRelationType::Precedes),
            "triggers" => Ok(CausalRelationType::Triggers),
            other => Err(GraphError::UnknownRelationType {
                value: other.to_string(),
            }),
        }
    }
}

/// A typed hyperedge from a set of source entries to a set of target
/// entries. Expires automatically once `now > expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalRelation {
    pub id: String,
    pub relation_type: CausalRelationType,
    /// Strength in [0, 1].
    pub strength: f64,
    pub sources: Vec<String>,
    pub targets: Vec<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    /// Time-to-live in milliseconds, if bounded.
    pub ttl_ms: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Cleared by expiry sweeps; expired relations are skipped by traversal.
    pub active: bool,
}

impl CausalRelation {
    /// Whether the relation is expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now > at,
            None => false,
        }
    }
}

/// Traversal direction for causal queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CausalDirection {
    Forward,
    Backward,
    Both,
}

/// One path discovered by causal traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalPath {
    /// Entry ids from a start node to the terminal node, in visit order.
    pub node_ids: Vec<String>,
    /// Relations crossed, parallel to the hops in `node_ids`.
    pub relation_ids: Vec<String>,
    /// Product of edge strengths along the path.
    pub total_strength: f64,
    pub depth: usize,
}
