//! v001: entries, entry_tags, provenance, provenance_links, system_metadata.

use rusqlite::Connection;

use engram_core::errors::EngramResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> EngramResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS entries (
            id                 TEXT PRIMARY KEY,
            content            TEXT NOT NULL,
            source             TEXT NOT NULL DEFAULT 'system',
            importance         REAL NOT NULL DEFAULT 0.5,
            session_id         TEXT,
            agent_id           TEXT,
            context            TEXT,
            pending_embedding  INTEGER NOT NULL DEFAULT 0,
            content_hash       TEXT NOT NULL,
            created_at         TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at         TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_entries_session ON entries(session_id);
        CREATE INDEX IF NOT EXISTS idx_entries_agent ON entries(agent_id);
        CREATE INDEX IF NOT EXISTS idx_entries_created ON entries(created_at);

        CREATE TABLE IF NOT EXISTS entry_tags (
            entry_id  TEXT NOT NULL,
            tag       TEXT NOT NULL,
            PRIMARY KEY (entry_id, tag)
        );

        CREATE INDEX IF NOT EXISTS idx_entry_tags_tag ON entry_tags(tag);

        CREATE TABLE IF NOT EXISTS provenance (
            entry_id       TEXT PRIMARY KEY,
            lineage_depth  INTEGER NOT NULL DEFAULT 0,
            confidence     REAL NOT NULL DEFAULT 1.0,
            relevance      REAL NOT NULL DEFAULT 1.0,
            l_score        REAL NOT NULL DEFAULT 1.0
        );

        CREATE TABLE IF NOT EXISTS provenance_links (
            child_id   TEXT NOT NULL,
            parent_id  TEXT NOT NULL,
            PRIMARY KEY (child_id, parent_id)
        );

        CREATE INDEX IF NOT EXISTS idx_prov_links_parent ON provenance_links(parent_id);

        CREATE TABLE IF NOT EXISTS system_metadata (
            key         TEXT PRIMARY KEY,
            value       TEXT NOT NULL,
            updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
