//! SQLite connections: one writer, a ring of read-only readers.
//!
//! All mutations serialize through the write connection; WAL mode keeps
//! readers unblocked while a write transaction is open. In-memory pools
//! carry no readers at all — separate in-memory connections would be
//! isolated databases — so reads route through the writer instead.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};

use engram_core::errors::EngramResult;

use crate::to_storage_err;

/// Read connections opened alongside a file-backed writer.
const READER_RING_SIZE: usize = 4;

/// Owns every connection to one database.
#[derive(Debug)]
pub struct ConnectionPool {
    writer: Mutex<Connection>,
    /// Empty in in-memory mode.
    readers: Vec<Mutex<Connection>>,
    next_reader: AtomicUsize,
}

impl ConnectionPool {
    /// Open the writer plus the reader ring for a database file.
    pub fn open(db_path: &Path) -> EngramResult<Self> {
        let writer = Connection::open(db_path)
            .map_err(|e| to_storage_err(format!("open writer: {e}")))?;
        configure_writer(&writer)?;

        let readers = (0..READER_RING_SIZE)
            .map(|_| {
                let conn = Connection::open_with_flags(
                    db_path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
                .map_err(|e| to_storage_err(format!("open reader: {e}")))?;
                configure_reader(&conn)?;
                Ok(Mutex::new(conn))
            })
            .collect::<EngramResult<Vec<_>>>()?;

        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            next_reader: AtomicUsize::new(0),
        })
    }

    /// Open a readerless in-memory pool (for testing).
    pub fn open_in_memory() -> EngramResult<Self> {
        let writer = Connection::open_in_memory()
            .map_err(|e| to_storage_err(format!("open in-memory writer: {e}")))?;
        configure_writer(&writer)?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            next_reader: AtomicUsize::new(0),
        })
    }

    /// Run a mutation while holding the write connection.
    pub fn with_writer<F, T>(&self, f: F) -> EngramResult<T>
    where
        F: FnOnce(&Connection) -> EngramResult<T>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|_| to_storage_err("write connection poisoned"))?;
        f(&conn)
    }

    /// Run a read on the next reader in the ring, or on the writer when
    /// the pool has no readers.
    pub fn with_reader<F, T>(&self, f: F) -> EngramResult<T>
    where
        F: FnOnce(&Connection) -> EngramResult<T>,
    {
        if self.readers.is_empty() {
            return self.with_writer(f);
        }
        let slot = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[slot]
            .lock()
            .map_err(|_| to_storage_err("read connection poisoned"))?;
        f(&conn)
    }

    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }
}

/// Writer setup: WAL journaling, NORMAL sync, 5s busy wait, foreign keys,
/// incremental vacuum, 32MB page cache.
fn configure_writer(conn: &Connection) -> EngramResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA foreign_keys = ON;
         PRAGMA auto_vacuum = INCREMENTAL;
         PRAGMA cache_size = -32000;",
    )
    .map_err(|e| to_storage_err(format!("writer pragmas: {e}")))?;

    // In-memory databases legitimately report `memory` here; anything
    // else must be WAL or concurrent readers would block on the writer.
    let journal_mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(|e| to_storage_err(format!("journal_mode query: {e}")))?;
    if !journal_mode.eq_ignore_ascii_case("wal") && !journal_mode.eq_ignore_ascii_case("memory") {
        tracing::warn!(%journal_mode, "WAL mode not active; reads may contend with writes");
    }
    Ok(())
}

/// Reader setup: short lock waits only; journaling is the writer's job.
fn configure_reader(conn: &Connection) -> EngramResult<()> {
    conn.execute_batch(
        "PRAGMA busy_timeout = 5000;
         PRAGMA foreign_keys = ON;",
    )
    .map_err(|e| to_storage_err(format!("reader pragmas: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_pool_has_no_readers() {
        let pool = ConnectionPool::open_in_memory().unwrap();
        assert_eq!(pool.reader_count(), 0);
    }

    #[test]
    fn in_memory_reads_see_writes() {
        let pool = ConnectionPool::open_in_memory().unwrap();
        pool.with_writer(|conn| {
            conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7);")
                .map_err(|e| crate::to_storage_err(e.to_string()))
        })
        .unwrap();

        let x: i64 = pool
            .with_reader(|conn| {
                conn.query_row("SELECT x FROM t", [], |row| row.get(0))
                    .map_err(|e| crate::to_storage_err(e.to_string()))
            })
            .unwrap();
        assert_eq!(x, 7);
    }

    #[test]
    fn file_pool_opens_reader_ring() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(&dir.path().join("pool.db")).unwrap();
        assert_eq!(pool.reader_count(), 4);

        pool.with_writer(|conn| {
            conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")
                .map_err(|e| crate::to_storage_err(e.to_string()))
        })
        .unwrap();

        let count: i64 = pool
            .with_reader(|conn| {
                conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
                    .map_err(|e| crate::to_storage_err(e.to_string()))
            })
            .unwrap();
        assert_eq!(count, 1);
    }
}
