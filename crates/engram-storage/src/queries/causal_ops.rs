//! Causal hyperedges: relations with source/target link tables.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use engram_core::errors::EngramResult;
use engram_core::models::{CausalDirection, CausalRelation};

use super::{parse_dt, OptionalRow};
use crate::to_storage_err;

/// Insert a relation plus its endpoint links.
/// Callers own the enclosing transaction.
pub fn insert_relation(conn: &Connection, relation: &CausalRelation) -> EngramResult<()> {
    let metadata_json = relation
        .metadata
        .as_ref()
        .map(|m| serde_json::to_string(m))
        .transpose()
        .map_err(|e| to_storage_err(e.to_string()))?;

    conn.execute(
        "INSERT INTO causal_relations (id, relation_type, strength, metadata, created_at, ttl_ms, expires_at, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            relation.id,
            relation.relation_type.as_str(),
            relation.strength,
            metadata_json,
            relation.created_at.to_rfc3339(),
            relation.ttl_ms,
            relation.expires_at.map(|t| t.to_rfc3339()),
            relation.active as i32,
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    for entry_id in &relation.sources {
        conn.execute(
            "INSERT OR IGNORE INTO causal_sources (relation_id, entry_id) VALUES (?1, ?2)",
            params![relation.id, entry_id],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    }
    for entry_id in &relation.targets {
        conn.execute(
            "INSERT OR IGNORE INTO causal_targets (relation_id, entry_id) VALUES (?1, ?2)",
            params![relation.id, entry_id],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    }
    Ok(())
}

/// Fetch one relation with its endpoints.
pub fn get_relation(conn: &Connection, id: &str) -> EngramResult<Option<CausalRelation>> {
    let row = conn
        .query_row(
            "SELECT id, relation_type, strength, metadata, created_at, ttl_ms, expires_at, active
             FROM causal_relations WHERE id = ?1",
            params![id],
            row_to_relation,
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    match row {
        Some(Ok(mut relation)) => {
            load_endpoints(conn, &mut relation)?;
            Ok(Some(relation))
        }
        Some(Err(e)) => Err(to_storage_err(e.to_string())),
        None => Ok(None),
    }
}

/// Active relations that have `entry_id` as an endpoint on the side implied
/// by `direction` (Forward: among sources; Backward: among targets; Both:
/// either).
pub fn relations_touching(
    conn: &Connection,
    entry_id: &str,
    direction: CausalDirection,
) -> EngramResult<Vec<CausalRelation>> {
    let sql = match direction {
        CausalDirection::Forward => {
            "SELECT r.id, r.relation_type, r.strength, r.metadata, r.created_at, r.ttl_ms, r.expires_at, r.active
             FROM causal_relations r
             JOIN causal_sources s ON s.relation_id = r.id
             WHERE s.entry_id = ?1 AND r.active = 1"
        }
        CausalDirection::Backward => {
            "SELECT r.id, r.relation_type, r.strength, r.metadata, r.created_at, r.ttl_ms, r.expires_at, r.active
             FROM causal_relations r
             JOIN causal_targets t ON t.relation_id = r.id
             WHERE t.entry_id = ?1 AND r.active = 1"
        }
        CausalDirection::Both => {
            "SELECT DISTINCT r.id, r.relation_type, r.strength, r.metadata, r.created_at, r.ttl_ms, r.expires_at, r.active
             FROM causal_relations r
             LEFT JOIN causal_sources s ON s.relation_id = r.id
             LEFT JOIN causal_targets t ON t.relation_id = r.id
             WHERE (s.entry_id = ?1 OR t.entry_id = ?1) AND r.active = 1"
        }
    };

    let mut stmt = conn.prepare(sql).map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![entry_id], row_to_relation)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut relations = Vec::new();
    for row in rows {
        let mut relation = row
            .map_err(|e| to_storage_err(e.to_string()))?
            .map_err(|e| to_storage_err(e.to_string()))?;
        load_endpoints(conn, &mut relation)?;
        relations.push(relation);
    }
    Ok(relations)
}

/// Mark relations past their expiry as inactive. Returns the count.
pub fn expire_relations(conn: &Connection, now: DateTime<Utc>) -> EngramResult<usize> {
    let rows = conn
        .execute(
            "UPDATE causal_relations SET active = 0
             WHERE active = 1 AND expires_at IS NOT NULL AND expires_at < ?1",
            params![now.to_rfc3339()],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(rows)
}

/// Count of active relations.
pub fn count_active(conn: &Connection) -> EngramResult<usize> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM causal_relations WHERE active = 1",
            [],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(count as usize)
}

fn load_endpoints(conn: &Connection, relation: &mut CausalRelation) -> EngramResult<()> {
    let mut stmt = conn
        .prepare("SELECT entry_id FROM causal_sources WHERE relation_id = ?1")
        .map_err(|e| to_storage_err(e.to_string()))?;
    relation.sources = stmt
        .query_map(params![relation.id], |row| row.get::<_, String>(0))
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut stmt = conn
        .prepare("SELECT entry_id FROM causal_targets WHERE relation_id = ?1")
        .map_err(|e| to_storage_err(e.to_string()))?;
    relation.targets = stmt
        .query_map(params![relation.id], |row| row.get::<_, String>(0))
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Parse a relation row; endpoints are loaded separately.
fn row_to_relation(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<EngramResult<CausalRelation>> {
    let relation_type_str: String = row.get(1)?;
    let metadata_json: Option<String> = row.get(3)?;
    let created_at_str: String = row.get(4)?;
    let expires_at_str: Option<String> = row.get(6)?;

    Ok((|| {
        let relation_type = relation_type_str
            .parse()
            .map_err(engram_core::errors::EngramError::Graph)?;
        let metadata = metadata_json
            .map(|m| serde_json::from_str(&m))
            .transpose()
            .map_err(|e| to_storage_err(format!("parse causal metadata: {e}")))?;
        Ok(CausalRelation {
            id: row.get(0).map_err(|e| to_storage_err(e.to_string()))?,
            relation_type,
            strength: row.get(2).map_err(|e| to_storage_err(e.to_string()))?,
            metadata,
            created_at: parse_dt(&created_at_str)?,
            ttl_ms: row.get(5).map_err(|e| to_storage_err(e.to_string()))?,
            expires_at: expires_at_str.as_deref().map(parse_dt).transpose()?,
            active: row.get::<_, i32>(7).map_err(|e| to_storage_err(e.to_string()))? != 0,
            sources: Vec::new(),
            targets: Vec::new(),
        })
    })())
}
