//! v004: pattern_templates, pattern_stats.

use rusqlite::Connection;

use engram_core::errors::EngramResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> EngramResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pattern_templates (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            pattern     TEXT NOT NULL,
            slots       TEXT NOT NULL DEFAULT '[]',
            priority    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS pattern_stats (
            pattern_id     TEXT PRIMARY KEY,
            use_count      INTEGER NOT NULL DEFAULT 0,
            success_count  INTEGER NOT NULL DEFAULT 0,
            last_used_at   TEXT
        );
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
