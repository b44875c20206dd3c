use serde::{Deserialize, Serialize};

/// Kind of a queued write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

/// One deferred write applied off the hot path by the async queue.
/// `data` carries column→value pairs; `id` targets a primary key for
/// update/delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteOp {
    pub kind: WriteKind,
    pub table: String,
    pub data: serde_json::Value,
    pub id: Option<String>,
}

impl WriteOp {
    pub fn insert(table: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: WriteKind::Insert,
            table: table.into(),
            data,
            id: None,
        }
    }

    pub fn update(table: impl Into<String>, id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: WriteKind::Update,
            table: table.into(),
            data,
            id: Some(id.into()),
        }
    }

    pub fn delete(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: WriteKind::Delete,
            table: table.into(),
            data: serde_json::Value::Null,
            id: Some(id.into()),
        }
    }
}
