//! Provenance records and parent links.
//!
//! The parent set of an entry is fixed at creation and parents must
//! pre-exist, so the graph is a DAG by construction.

use rusqlite::{params, Connection};

use engram_core::errors::EngramResult;
use engram_core::models::ProvenanceRecord;

use super::OptionalRow;
use crate::to_storage_err;

/// Insert a provenance record plus its parent links.
/// Callers own the enclosing transaction.
pub fn insert_provenance(
    conn: &Connection,
    record: &ProvenanceRecord,
    parent_ids: &[String],
) -> EngramResult<()> {
    conn.execute(
        "INSERT INTO provenance (entry_id, lineage_depth, confidence, relevance, l_score)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.entry_id,
            record.lineage_depth,
            record.confidence,
            record.relevance,
            record.l_score,
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    for parent_id in parent_ids {
        conn.execute(
            "INSERT OR IGNORE INTO provenance_links (child_id, parent_id) VALUES (?1, ?2)",
            params![record.entry_id, parent_id],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    }
    Ok(())
}

/// Get the provenance record for an entry.
pub fn get_provenance(conn: &Connection, entry_id: &str) -> EngramResult<Option<ProvenanceRecord>> {
    conn.query_row(
        "SELECT entry_id, lineage_depth, confidence, relevance, l_score
         FROM provenance WHERE entry_id = ?1",
        params![entry_id],
        |row| {
            Ok(ProvenanceRecord {
                entry_id: row.get(0)?,
                lineage_depth: row.get(1)?,
                confidence: row.get(2)?,
                relevance: row.get(3)?,
                l_score: row.get(4)?,
            })
        },
    )
    .optional()
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Get provenance records for several entries, skipping missing ones.
pub fn get_provenance_bulk(
    conn: &Connection,
    entry_ids: &[String],
) -> EngramResult<Vec<ProvenanceRecord>> {
    let mut records = Vec::with_capacity(entry_ids.len());
    for id in entry_ids {
        if let Some(record) = get_provenance(conn, id)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Parent ids of an entry.
pub fn get_parents(conn: &Connection, child_id: &str) -> EngramResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT parent_id FROM provenance_links WHERE child_id = ?1")
        .map_err(|e| to_storage_err(e.to_string()))?;
    let ids = stmt
        .query_map(params![child_id], |row| row.get::<_, String>(0))
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(ids)
}

/// Child ids of an entry.
pub fn get_children(conn: &Connection, parent_id: &str) -> EngramResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT child_id FROM provenance_links WHERE parent_id = ?1")
        .map_err(|e| to_storage_err(e.to_string()))?;
    let ids = stmt
        .query_map(params![parent_id], |row| row.get::<_, String>(0))
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(ids)
}
