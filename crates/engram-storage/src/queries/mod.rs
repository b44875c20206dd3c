//! One query module per concern.

pub mod causal_ops;
pub mod entry_crud;
pub mod entry_query;
pub mod mapping_ops;
pub mod metadata_ops;
pub mod pattern_ops;
pub mod provenance_ops;

use engram_core::errors::EngramResult;

/// Helper trait to make `query_row` return `Option` on not-found.
pub(crate) trait OptionalRow<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalRow<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Parse an RFC3339 timestamp from a TEXT column.
pub(crate) fn parse_dt(s: &str) -> EngramResult<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| crate::to_storage_err(format!("parse datetime '{s}': {e}")))
}
