//! Vector mappings, vector blobs, and access counters.
//!
//! A mapping row and its vector blob always commit in the same
//! transaction; the in-memory index mirrors this table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use engram_core::errors::EngramResult;
use engram_core::models::{CompressionTier, VectorMapping};

use super::{parse_dt, OptionalRow};
use crate::to_storage_err;

/// Insert a mapping row plus the vector bytes for its label.
/// Callers own the enclosing transaction.
pub fn insert_mapping(
    conn: &Connection,
    mapping: &VectorMapping,
    vector_bytes: &[u8],
) -> EngramResult<()> {
    conn.execute(
        "INSERT INTO vector_mappings (entry_id, label, access_count, last_accessed_at, compression_tier)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            mapping.entry_id,
            mapping.label,
            mapping.access_count,
            mapping.last_accessed_at.to_rfc3339(),
            mapping.tier.as_str(),
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    conn.execute(
        "INSERT INTO vectors (label, embedding) VALUES (?1, ?2)",
        params![mapping.label, vector_bytes],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Mapping for an entry id.
pub fn get_mapping(conn: &Connection, entry_id: &str) -> EngramResult<Option<VectorMapping>> {
    query_mapping(
        conn,
        "SELECT entry_id, label, access_count, last_accessed_at, compression_tier
         FROM vector_mappings WHERE entry_id = ?1",
        params![entry_id],
    )
}

/// Mapping for a label.
pub fn get_mapping_by_label(conn: &Connection, label: i64) -> EngramResult<Option<VectorMapping>> {
    query_mapping(
        conn,
        "SELECT entry_id, label, access_count, last_accessed_at, compression_tier
         FROM vector_mappings WHERE label = ?1",
        params![label],
    )
}

/// Delete the mapping and vector for an entry. Returns the freed label.
pub fn delete_mapping(conn: &Connection, entry_id: &str) -> EngramResult<Option<i64>> {
    let label: Option<i64> = conn
        .query_row(
            "SELECT label FROM vector_mappings WHERE entry_id = ?1",
            params![entry_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    if let Some(label) = label {
        conn.execute(
            "DELETE FROM vector_mappings WHERE entry_id = ?1",
            params![entry_id],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
        conn.execute("DELETE FROM vectors WHERE label = ?1", params![label])
            .map_err(|e| to_storage_err(e.to_string()))?;
    }
    Ok(label)
}

/// Increment the access counter and stamp the access time.
pub fn record_access(conn: &Connection, entry_id: &str, at: DateTime<Utc>) -> EngramResult<()> {
    conn.execute(
        "UPDATE vector_mappings
         SET access_count = access_count + 1, last_accessed_at = ?2
         WHERE entry_id = ?1",
        params![entry_id, at.to_rfc3339()],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Set absolute access stats (used by the write queue's deferred updates).
pub fn set_access_stats(
    conn: &Connection,
    entry_id: &str,
    access_count: u64,
    at: DateTime<Utc>,
) -> EngramResult<()> {
    conn.execute(
        "UPDATE vector_mappings
         SET access_count = MAX(access_count, ?2), last_accessed_at = ?3
         WHERE entry_id = ?1",
        params![entry_id, access_count, at.to_rfc3339()],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Persist a tier change together with the re-encoded vector bytes.
pub fn update_tier(
    conn: &Connection,
    label: i64,
    tier: CompressionTier,
    vector_bytes: &[u8],
) -> EngramResult<()> {
    conn.execute(
        "UPDATE vector_mappings SET compression_tier = ?2 WHERE label = ?1",
        params![label, tier.as_str()],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute(
        "UPDATE vectors SET embedding = ?2 WHERE label = ?1",
        params![label, vector_bytes],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// All mappings in label order.
pub fn all_mappings(conn: &Connection) -> EngramResult<Vec<VectorMapping>> {
    let mut stmt = conn
        .prepare(
            "SELECT entry_id, label, access_count, last_accessed_at, compression_tier
             FROM vector_mappings ORDER BY label",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], row_to_mapping)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut mappings = Vec::new();
    for row in rows {
        mappings.push(
            row.map_err(|e| to_storage_err(e.to_string()))?
                .map_err(|e| to_storage_err(e.to_string()))?,
        );
    }
    Ok(mappings)
}

/// Raw vector bytes for a label.
pub fn get_vector_bytes(conn: &Connection, label: i64) -> EngramResult<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT embedding FROM vectors WHERE label = ?1",
        params![label],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| to_storage_err(e.to_string()))
}

/// All (label, bytes) pairs in label order.
pub fn all_vector_bytes(conn: &Connection) -> EngramResult<Vec<(i64, Vec<u8>)>> {
    let mut stmt = conn
        .prepare("SELECT label, embedding FROM vectors ORDER BY label")
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(rows)
}

/// Number of mapped vectors.
pub fn count_mappings(conn: &Connection) -> EngramResult<usize> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM vector_mappings", [], |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(count as usize)
}

/// Highest access count across all mappings.
pub fn max_access_count(conn: &Connection) -> EngramResult<u64> {
    let max: Option<i64> = conn
        .query_row(
            "SELECT MAX(access_count) FROM vector_mappings",
            [],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(max.unwrap_or(0) as u64)
}

/// Convert f32 slice to bytes (little-endian).
pub fn f32_vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert bytes back to f32 vec.
pub fn bytes_to_f32_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn query_mapping(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> EngramResult<Option<VectorMapping>> {
    let row = conn
        .query_row(sql, params, row_to_mapping)
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    match row {
        Some(Ok(mapping)) => Ok(Some(mapping)),
        Some(Err(e)) => Err(to_storage_err(e.to_string())),
        None => Ok(None),
    }
}

fn row_to_mapping(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<engram_core::errors::EngramResult<VectorMapping>> {
    let last_accessed_str: String = row.get(3)?;
    let tier_str: String = row.get(4)?;
    let entry_id: String = row.get(0)?;
    let label: i64 = row.get(1)?;
    let access_count: i64 = row.get(2)?;

    Ok((|| {
        Ok(VectorMapping {
            entry_id,
            label,
            access_count: access_count as u64,
            last_accessed_at: parse_dt(&last_accessed_str)?,
            tier: tier_str
                .parse::<CompressionTier>()
                .map_err(engram_core::errors::EngramError::Compression)?,
        })
    })())
}
