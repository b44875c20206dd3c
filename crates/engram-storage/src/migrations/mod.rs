//! Forward-only schema migrations tracked via `PRAGMA user_version`.
//!
//! Migrations only add tables and columns; data is never dropped.

mod v001_entries;
mod v002_causal_tables;
mod v003_vector_tables;
mod v004_pattern_tables;

use rusqlite::Connection;

use engram_core::errors::{EngramError, StorageError};

use crate::to_storage_err;

/// Ordered list of (version, migration). A database at user_version N has
/// every migration ≤ N applied.
const MIGRATIONS: &[(u32, fn(&Connection) -> engram_core::errors::EngramResult<()>)] = &[
    (1, v001_entries::migrate),
    (2, v002_causal_tables::migrate),
    (3, v003_vector_tables::migrate),
    (4, v004_pattern_tables::migrate),
];

/// Current schema version.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|(v, _)| *v).unwrap_or(0)
}

/// Apply all pending migrations. Each migration commits individually so a
/// failure leaves the store at the last good version.
pub fn run_migrations(conn: &Connection) -> engram_core::errors::EngramResult<()> {
    let current: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;

    for (version, migrate) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        migrate(conn).map_err(|e| {
            EngramError::Storage(StorageError::MigrationFailed {
                version: *version,
                reason: e.to_string(),
            })
        })?;
        conn.pragma_update(None, "user_version", version)
            .map_err(|e| {
                EngramError::Storage(StorageError::MigrationFailed {
                    version: *version,
                    reason: e.to_string(),
                })
            })?;
        tracing::debug!(version, "applied migration");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered_and_dense() {
        for (i, (version, _)) in MIGRATIONS.iter().enumerate() {
            assert_eq!(*version, i as u32 + 1);
        }
    }

    #[test]
    fn run_twice_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, latest_version());
    }
}
