//! v002: causal_relations, causal_sources, causal_targets.

use rusqlite::Connection;

use engram_core::errors::EngramResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> EngramResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS causal_relations (
            id             TEXT PRIMARY KEY,
            relation_type  TEXT NOT NULL,
            strength       REAL NOT NULL DEFAULT 1.0,
            metadata       TEXT,
            created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            ttl_ms         INTEGER,
            expires_at     TEXT,
            active         INTEGER NOT NULL DEFAULT 1
        );

        CREATE INDEX IF NOT EXISTS idx_causal_expires ON causal_relations(expires_at)
            WHERE expires_at IS NOT NULL;

        CREATE TABLE IF NOT EXISTS causal_sources (
            relation_id  TEXT NOT NULL,
            entry_id     TEXT NOT NULL,
            PRIMARY KEY (relation_id, entry_id)
        );

        CREATE INDEX IF NOT EXISTS idx_causal_sources_entry ON causal_sources(entry_id);

        CREATE TABLE IF NOT EXISTS causal_targets (
            relation_id  TEXT NOT NULL,
            entry_id     TEXT NOT NULL,
            PRIMARY KEY (relation_id, entry_id)
        );

        CREATE INDEX IF NOT EXISTS idx_causal_targets_entry ON causal_targets(entry_id);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
