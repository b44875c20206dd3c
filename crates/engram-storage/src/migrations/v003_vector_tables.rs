//! v003: vector_mappings, vectors.
//!
//! Vector bytes commit in the same transaction as their mapping row so the
//! index and the store can never disagree about a label.

use rusqlite::Connection;

use engram_core::errors::EngramResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> EngramResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS vector_mappings (
            entry_id          TEXT PRIMARY KEY,
            label             INTEGER NOT NULL UNIQUE,
            access_count      INTEGER NOT NULL DEFAULT 0,
            last_accessed_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            compression_tier  TEXT NOT NULL DEFAULT 'hot'
        );

        CREATE INDEX IF NOT EXISTS idx_mappings_label ON vector_mappings(label);

        CREATE TABLE IF NOT EXISTS vectors (
            label      INTEGER PRIMARY KEY,
            embedding  BLOB NOT NULL
        );
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
