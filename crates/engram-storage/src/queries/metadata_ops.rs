//! Key/value rows in system_metadata; JSON-encoded artifacts live here.

use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;

use engram_core::constants::META_NEXT_LABEL;
use engram_core::errors::EngramResult;

use super::OptionalRow;
use crate::to_storage_err;

/// Raw value for a key.
pub fn get_meta(conn: &Connection, key: &str) -> EngramResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM system_metadata WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Upsert a value for a key.
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> EngramResult<()> {
    conn.execute(
        "INSERT INTO system_metadata (key, value, updated_at)
         VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at",
        params![key, value],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// JSON-decode the value for a key.
pub fn get_json<T: DeserializeOwned>(conn: &Connection, key: &str) -> EngramResult<Option<T>> {
    match get_meta(conn, key)? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .map_err(|e| to_storage_err(format!("parse metadata '{key}': {e}")))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// JSON-encode a value into a key.
pub fn set_json<T: Serialize>(conn: &Connection, key: &str, value: &T) -> EngramResult<()> {
    let raw = serde_json::to_string(value).map_err(|e| to_storage_err(e.to_string()))?;
    set_meta(conn, key, &raw)
}

/// Claim the next free vector label and bump the counter.
/// Callers own the enclosing transaction; the bump commits with the
/// mapping row so labels stay monotonic and never reuse.
pub fn next_label(conn: &Connection) -> EngramResult<i64> {
    let current: i64 = get_meta(conn, META_NEXT_LABEL)?
        .map(|raw| {
            raw.parse()
                .map_err(|e| to_storage_err(format!("parse next_label '{raw}': {e}")))
        })
        .transpose()?
        .unwrap_or(0);
    set_meta(conn, META_NEXT_LABEL, &(current + 1).to_string())?;
    Ok(current)
}
