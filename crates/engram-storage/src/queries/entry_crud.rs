//! Insert, get, patch, delete for entries and their tags.

use rusqlite::{params, Connection};

use engram_core::errors::{EngramError, StorageError};
use engram_core::errors::EngramResult;
use engram_core::memory::{Entry, EntryPatch, Importance};

use super::{parse_dt, OptionalRow};
use crate::to_storage_err;

/// Insert an entry row and its tags. Callers own the enclosing transaction.
pub fn insert_entry(conn: &Connection, entry: &Entry) -> EngramResult<()> {
    conn.execute(
        "INSERT INTO entries (
            id, content, source, importance, session_id, agent_id, context,
            pending_embedding, content_hash, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            entry.id,
            entry.content,
            entry.source.as_str(),
            entry.importance.value(),
            entry.session_id,
            entry.agent_id,
            entry.context,
            entry.pending_embedding as i32,
            entry.content_hash,
            entry.created_at.to_rfc3339(),
            entry.updated_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    insert_tags(conn, &entry.id, &entry.tags)?;
    Ok(())
}

/// Insert tags for an entry, ignoring duplicates.
pub fn insert_tags(conn: &Connection, entry_id: &str, tags: &[String]) -> EngramResult<()> {
    for tag in tags {
        conn.execute(
            "INSERT OR IGNORE INTO entry_tags (entry_id, tag) VALUES (?1, ?2)",
            params![entry_id, tag],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    }
    Ok(())
}

/// Get a single entry by id, including tags.
pub fn get_entry(conn: &Connection, id: &str) -> EngramResult<Option<Entry>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, content, source, importance, session_id, agent_id, context,
                    pending_embedding, content_hash, created_at, updated_at
             FROM entries WHERE id = ?1",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    let result = stmt
        .query_row(params![id], |row| Ok(row_to_entry(row)))
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    match result {
        Some(Ok(mut entry)) => {
            entry.tags = load_tags(conn, &entry.id)?;
            Ok(Some(entry))
        }
        Some(Err(e)) => Err(e),
        None => Ok(None),
    }
}

/// Whether an entry exists.
pub fn entry_exists(conn: &Connection, id: &str) -> EngramResult<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM entries WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(count > 0)
}

/// Apply a patch to the mutable fields (tags, importance, context).
/// Content is immutable and never touched here.
pub fn patch_entry(conn: &Connection, id: &str, patch: &EntryPatch) -> EngramResult<()> {
    if !entry_exists(conn, id)? {
        return Err(EngramError::Storage(StorageError::NotFound {
            id: id.to_string(),
        }));
    }

    if let Some(importance) = patch.importance {
        conn.execute(
            "UPDATE entries SET importance = ?2,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?1",
            params![id, importance.value()],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    }

    if let Some(context) = &patch.context {
        conn.execute(
            "UPDATE entries SET context = ?2,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?1",
            params![id, context],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    }

    if let Some(tags) = &patch.tags {
        conn.execute("DELETE FROM entry_tags WHERE entry_id = ?1", params![id])
            .map_err(|e| to_storage_err(e.to_string()))?;
        insert_tags(conn, id, tags)?;
        conn.execute(
            "UPDATE entries SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?1",
            params![id],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    }

    Ok(())
}

/// Set or clear the pending_embedding flag.
pub fn set_pending_embedding(conn: &Connection, id: &str, pending: bool) -> EngramResult<()> {
    conn.execute(
        "UPDATE entries SET pending_embedding = ?2 WHERE id = ?1",
        params![id, pending as i32],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Delete an entry row, its tags, and its provenance rows.
/// Mapping/vector cleanup lives in mapping_ops; callers own the transaction.
pub fn delete_entry(conn: &Connection, id: &str) -> EngramResult<()> {
    conn.execute("DELETE FROM entry_tags WHERE entry_id = ?1", params![id])
        .map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute("DELETE FROM provenance WHERE entry_id = ?1", params![id])
        .map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute(
        "DELETE FROM provenance_links WHERE child_id = ?1 OR parent_id = ?1",
        params![id],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = conn
        .execute("DELETE FROM entries WHERE id = ?1", params![id])
        .map_err(|e| to_storage_err(e.to_string()))?;
    if rows == 0 {
        return Err(EngramError::Storage(StorageError::NotFound {
            id: id.to_string(),
        }));
    }
    Ok(())
}

/// Total entry count.
pub fn count_entries(conn: &Connection) -> EngramResult<usize> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(count as usize)
}

/// Ids of entries flagged pending_embedding.
pub fn pending_embedding_ids(conn: &Connection) -> EngramResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT id FROM entries WHERE pending_embedding = 1")
        .map_err(|e| to_storage_err(e.to_string()))?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(ids)
}

/// Load tags for an entry.
pub fn load_tags(conn: &Connection, entry_id: &str) -> EngramResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT tag FROM entry_tags WHERE entry_id = ?1 ORDER BY tag")
        .map_err(|e| to_storage_err(e.to_string()))?;
    let tags = stmt
        .query_map(params![entry_id], |row| row.get::<_, String>(0))
        .map_err(|e| to_storage_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(tags)
}

/// Parse a row from the entries table into an Entry (tags not loaded).
pub(crate) fn row_to_entry(row: &rusqlite::Row<'_>) -> EngramResult<Entry> {
    let source_str: String = row.get(2).map_err(|e| to_storage_err(e.to_string()))?;
    let source = source_str
        .parse()
        .map_err(|e: String| to_storage_err(format!("parse source: {e}")))?;

    let created_at_str: String = row.get(9).map_err(|e| to_storage_err(e.to_string()))?;
    let updated_at_str: String = row.get(10).map_err(|e| to_storage_err(e.to_string()))?;

    Ok(Entry {
        id: row.get(0).map_err(|e| to_storage_err(e.to_string()))?,
        content: row.get(1).map_err(|e| to_storage_err(e.to_string()))?,
        source,
        importance: Importance::new(row.get(3).map_err(|e| to_storage_err(e.to_string()))?),
        tags: Vec::new(),
        session_id: row.get(4).map_err(|e| to_storage_err(e.to_string()))?,
        agent_id: row.get(5).map_err(|e| to_storage_err(e.to_string()))?,
        context: row.get(6).map_err(|e| to_storage_err(e.to_string()))?,
        pending_embedding: row
            .get::<_, i32>(7)
            .map_err(|e| to_storage_err(e.to_string()))?
            != 0,
        content_hash: row.get(8).map_err(|e| to_storage_err(e.to_string()))?,
        created_at: parse_dt(&created_at_str)?,
        updated_at: parse_dt(&updated_at_str)?,
    })
}
