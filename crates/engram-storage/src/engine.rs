//! StorageEngine — owns the ConnectionPool, exposes composite transactional
//! operations, runs migrations and the legacy vector import on open, and
//! implements the write queue's executor seam.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use engram_core::constants::{DB_FILENAME, LEGACY_VECTORS_FILENAME};
use engram_core::errors::{EngramError, EngramResult, StorageError};
use engram_core::memory::{Entry, EntryPatch};
use engram_core::models::{
    CausalDirection, CausalRelation, CompressionTier, PatternStats, PatternTemplate,
    ProvenanceRecord, QueryFilters, VectorMapping, WriteKind, WriteOp,
};
use engram_core::traits::QueueExecutor;

use crate::pool::ConnectionPool;
use crate::queries::{
    causal_ops, entry_crud, entry_query, mapping_ops, metadata_ops, pattern_ops, provenance_ops,
};
use crate::{legacy, migrations, to_storage_err};

/// The main storage engine. Owns the connection pool and provides the
/// persistence surface the memory core builds on.
#[derive(Debug)]
pub struct StorageEngine {
    pool: ConnectionPool,
    data_dir: Option<PathBuf>,
}

impl StorageEngine {
    /// Open a storage engine inside the given data directory.
    /// Creates the directory, runs migrations, and imports a legacy vector
    /// dump when one is present and the vectors table is empty.
    pub fn open(data_dir: &Path) -> EngramResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| {
            EngramError::Storage(StorageError::Corrupt {
                details: format!("cannot create data dir: {e}"),
            })
        })?;
        let engine = Self {
            pool: ConnectionPool::open(&data_dir.join(DB_FILENAME))?,
            data_dir: Some(data_dir.to_path_buf()),
        };
        engine.initialize()?;
        Ok(engine)
    }

    /// Open an in-memory storage engine (for testing).
    pub fn open_in_memory() -> EngramResult<Self> {
        let engine = Self {
            pool: ConnectionPool::open_in_memory()?,
            data_dir: None,
        };
        engine.initialize()?;
        Ok(engine)
    }

    /// Run migrations, then the one-time legacy vector import.
    fn initialize(&self) -> EngramResult<()> {
        self.pool.with_writer(migrations::run_migrations)?;
        self.import_legacy_dump()?;
        Ok(())
    }

    /// Import `<data_dir>/vectors.json` if present and the vectors table is
    /// empty. All rows insert in one transaction; the file is renamed on
    /// success. Labels with no mapping row get no mapping here — the
    /// owning entries are flagged pending by the repair pass.
    fn import_legacy_dump(&self) -> EngramResult<()> {
        let Some(dir) = &self.data_dir else {
            return Ok(());
        };
        let dump_path = dir.join(LEGACY_VECTORS_FILENAME);
        let Some(pairs) = legacy::read_dump_file(&dump_path)? else {
            return Ok(());
        };

        let imported = self.pool.with_writer(|conn| {
            let existing: i64 = conn
                .query_row("SELECT COUNT(*) FROM vectors", [], |row| row.get(0))
                .map_err(|e| to_storage_err(e.to_string()))?;
            if existing > 0 {
                tracing::warn!(
                    existing,
                    "legacy dump present but vectors table is non-empty; skipping import"
                );
                return Ok(false);
            }

            let tx = conn
                .unchecked_transaction()
                .map_err(|e| to_storage_err(format!("legacy import begin: {e}")))?;
            for (label, vector) in &pairs {
                tx.execute(
                    "INSERT OR IGNORE INTO vectors (label, embedding) VALUES (?1, ?2)",
                    rusqlite::params![label, mapping_ops::f32_vec_to_bytes(vector)],
                )
                .map_err(|e| to_storage_err(e.to_string()))?;
            }
            // Future labels must never collide with imported ones.
            if let Some(max_label) = pairs.iter().map(|(label, _)| *label).max() {
                let current: i64 = metadata_ops::get_meta(&tx, engram_core::constants::META_NEXT_LABEL)?
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(0);
                metadata_ops::set_meta(
                    &tx,
                    engram_core::constants::META_NEXT_LABEL,
                    &current.max(max_label + 1).to_string(),
                )?;
            }
            tx.commit()
                .map_err(|e| to_storage_err(format!("legacy import commit: {e}")))?;
            Ok(true)
        })?;

        if imported {
            legacy::mark_migrated(&dump_path)?;
            tracing::info!(count = pairs.len(), "imported legacy vector dump");
        }
        Ok(())
    }

    /// Execute a read-only query on the best available connection.
    fn with_reader<F, T>(&self, f: F) -> EngramResult<T>
    where
        F: FnOnce(&Connection) -> EngramResult<T>,
    {
        self.pool.with_reader(f)
    }

    // --- Composite transactional operations ---

    /// Persist a new entry atomically: entry row, tags, provenance,
    /// label claim, mapping row, and vector bytes all commit together.
    /// Returns the assigned label, or None for a pending entry.
    pub fn insert_entry_with_vector(
        &self,
        entry: &Entry,
        provenance: &ProvenanceRecord,
        parent_ids: &[String],
        vector: Option<&[f32]>,
    ) -> EngramResult<Option<i64>> {
        self.pool.with_writer(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| to_storage_err(format!("insert_entry begin: {e}")))?;

            let label = match (|| {
                entry_crud::insert_entry(&tx, entry)?;
                provenance_ops::insert_provenance(&tx, provenance, parent_ids)?;
                match vector {
                    Some(v) => {
                        let label = metadata_ops::next_label(&tx)?;
                        let mapping = VectorMapping::new(entry.id.clone(), label);
                        mapping_ops::insert_mapping(&tx, &mapping, &mapping_ops::f32_vec_to_bytes(v))?;
                        Ok(Some(label))
                    }
                    None => Ok(None),
                }
            })() {
                Ok(label) => label,
                Err(e) => {
                    let _ = tx.rollback();
                    return Err(e);
                }
            };

            tx.commit()
                .map_err(|e| to_storage_err(format!("insert_entry commit: {e}")))?;
            Ok(label)
        })
    }

    /// Delete an entry and every row that hangs off it.
    /// Returns the freed label, if the entry had a vector.
    pub fn delete_entry_full(&self, id: &str) -> EngramResult<Option<i64>> {
        self.pool.with_writer(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| to_storage_err(format!("delete_entry begin: {e}")))?;

            let label = match (|| {
                let label = mapping_ops::delete_mapping(&tx, id)?;
                entry_crud::delete_entry(&tx, id)?;
                Ok(label)
            })() {
                Ok(label) => label,
                Err(e) => {
                    let _ = tx.rollback();
                    return Err(e);
                }
            };

            tx.commit()
                .map_err(|e| to_storage_err(format!("delete_entry commit: {e}")))?;
            Ok(label)
        })
    }

    /// Attach a vector to an entry that was pending: label claim, mapping,
    /// vector bytes, and the flag clear all commit together.
    pub fn attach_vector(&self, entry_id: &str, vector: &[f32]) -> EngramResult<i64> {
        self.pool.with_writer(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| to_storage_err(format!("attach_vector begin: {e}")))?;

            let label = match (|| {
                let label = metadata_ops::next_label(&tx)?;
                let mapping = VectorMapping::new(entry_id.to_string(), label);
                mapping_ops::insert_mapping(&tx, &mapping, &mapping_ops::f32_vec_to_bytes(vector))?;
                entry_crud::set_pending_embedding(&tx, entry_id, false)?;
                Ok(label)
            })() {
                Ok(label) => label,
                Err(e) => {
                    let _ = tx.rollback();
                    return Err(e);
                }
            };

            tx.commit()
                .map_err(|e| to_storage_err(format!("attach_vector commit: {e}")))?;
            Ok(label)
        })
    }

    /// Drop an unreadable mapping and flag its entry for re-embedding.
    /// Keeps the mapping-XOR-pending invariant intact.
    pub fn quarantine_mapping(&self, entry_id: &str) -> EngramResult<()> {
        self.pool.with_writer(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| to_storage_err(format!("quarantine begin: {e}")))?;
            let result = (|| {
                mapping_ops::delete_mapping(&tx, entry_id)?;
                entry_crud::set_pending_embedding(&tx, entry_id, true)?;
                Ok(())
            })();
            match result {
                Ok(()) => tx
                    .commit()
                    .map_err(|e| to_storage_err(format!("quarantine commit: {e}"))),
                Err(e) => {
                    let _ = tx.rollback();
                    Err(e)
                }
            }
        })
    }

    /// Persist a demotion: tier tag and re-encoded bytes in one transaction.
    pub fn persist_tier_change(
        &self,
        label: i64,
        tier: CompressionTier,
        encoded: &[u8],
    ) -> EngramResult<()> {
        self.pool.with_writer(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| to_storage_err(format!("tier change begin: {e}")))?;
            if let Err(e) = mapping_ops::update_tier(&tx, label, tier, encoded) {
                let _ = tx.rollback();
                return Err(e);
            }
            tx.commit()
                .map_err(|e| to_storage_err(format!("tier change commit: {e}")))?;
            Ok(())
        })
    }

    // --- Entry reads and mutations ---

    pub fn get_entry(&self, id: &str) -> EngramResult<Option<Entry>> {
        self.with_reader(|conn| entry_crud::get_entry(conn, id))
    }

    pub fn entry_exists(&self, id: &str) -> EngramResult<bool> {
        self.with_reader(|conn| entry_crud::entry_exists(conn, id))
    }

    pub fn patch_entry(&self, id: &str, patch: &EntryPatch) -> EngramResult<()> {
        self.pool.with_writer(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| to_storage_err(format!("patch_entry begin: {e}")))?;
            if let Err(e) = entry_crud::patch_entry(&tx, id, patch) {
                let _ = tx.rollback();
                return Err(e);
            }
            tx.commit()
                .map_err(|e| to_storage_err(format!("patch_entry commit: {e}")))?;
            Ok(())
        })
    }

    pub fn set_pending_embedding(&self, id: &str, pending: bool) -> EngramResult<()> {
        self.pool.with_writer(|conn| entry_crud::set_pending_embedding(conn, id, pending))
    }

    pub fn count_entries(&self) -> EngramResult<usize> {
        self.with_reader(entry_crud::count_entries)
    }

    pub fn pending_embedding_ids(&self) -> EngramResult<Vec<String>> {
        self.with_reader(entry_crud::pending_embedding_ids)
    }

    pub fn filter_entries(
        &self,
        ids: &[String],
        filters: &QueryFilters,
    ) -> EngramResult<Vec<Entry>> {
        self.with_reader(|conn| entry_query::filter_entries(conn, ids, filters))
    }

    // --- Provenance ---

    pub fn get_provenance(&self, entry_id: &str) -> EngramResult<Option<ProvenanceRecord>> {
        self.with_reader(|conn| provenance_ops::get_provenance(conn, entry_id))
    }

    pub fn get_provenance_bulk(&self, ids: &[String]) -> EngramResult<Vec<ProvenanceRecord>> {
        self.with_reader(|conn| provenance_ops::get_provenance_bulk(conn, ids))
    }

    pub fn get_parents(&self, child_id: &str) -> EngramResult<Vec<String>> {
        self.with_reader(|conn| provenance_ops::get_parents(conn, child_id))
    }

    pub fn get_children(&self, parent_id: &str) -> EngramResult<Vec<String>> {
        self.with_reader(|conn| provenance_ops::get_children(conn, parent_id))
    }

    // --- Causal ---

    pub fn add_causal_relation(&self, relation: &CausalRelation) -> EngramResult<()> {
        self.pool.with_writer(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| to_storage_err(format!("add_relation begin: {e}")))?;
            if let Err(e) = causal_ops::insert_relation(&tx, relation) {
                let _ = tx.rollback();
                return Err(e);
            }
            tx.commit()
                .map_err(|e| to_storage_err(format!("add_relation commit: {e}")))?;
            Ok(())
        })
    }

    pub fn get_causal_relation(&self, id: &str) -> EngramResult<Option<CausalRelation>> {
        self.with_reader(|conn| causal_ops::get_relation(conn, id))
    }

    pub fn causal_relations_touching(
        &self,
        entry_id: &str,
        direction: CausalDirection,
    ) -> EngramResult<Vec<CausalRelation>> {
        self.with_reader(|conn| causal_ops::relations_touching(conn, entry_id, direction))
    }

    pub fn expire_causal_relations(&self, now: DateTime<Utc>) -> EngramResult<usize> {
        self.pool.with_writer(|conn| causal_ops::expire_relations(conn, now))
    }

    pub fn count_active_causal_relations(&self) -> EngramResult<usize> {
        self.with_reader(causal_ops::count_active)
    }

    // --- Vector mappings ---

    pub fn get_mapping(&self, entry_id: &str) -> EngramResult<Option<VectorMapping>> {
        self.with_reader(|conn| mapping_ops::get_mapping(conn, entry_id))
    }

    pub fn get_mapping_by_label(&self, label: i64) -> EngramResult<Option<VectorMapping>> {
        self.with_reader(|conn| mapping_ops::get_mapping_by_label(conn, label))
    }

    pub fn all_mappings(&self) -> EngramResult<Vec<VectorMapping>> {
        self.with_reader(mapping_ops::all_mappings)
    }

    pub fn all_vector_bytes(&self) -> EngramResult<Vec<(i64, Vec<u8>)>> {
        self.with_reader(mapping_ops::all_vector_bytes)
    }

    pub fn get_vector_bytes(&self, label: i64) -> EngramResult<Option<Vec<u8>>> {
        self.with_reader(|conn| mapping_ops::get_vector_bytes(conn, label))
    }

    pub fn count_mappings(&self) -> EngramResult<usize> {
        self.with_reader(mapping_ops::count_mappings)
    }

    pub fn max_access_count(&self) -> EngramResult<u64> {
        self.with_reader(mapping_ops::max_access_count)
    }

    pub fn record_access(&self, entry_id: &str, at: DateTime<Utc>) -> EngramResult<()> {
        self.pool.with_writer(|conn| mapping_ops::record_access(conn, entry_id, at))
    }

    // --- Patterns ---

    pub fn register_pattern(&self, template: &PatternTemplate) -> EngramResult<()> {
        self.pool.with_writer(|conn| pattern_ops::insert_template(conn, template))
    }

    pub fn get_pattern_by_name(&self, name: &str) -> EngramResult<Option<PatternTemplate>> {
        self.with_reader(|conn| pattern_ops::get_by_name(conn, name))
    }

    pub fn list_patterns(&self) -> EngramResult<Vec<PatternTemplate>> {
        self.with_reader(pattern_ops::list_templates)
    }

    pub fn get_pattern_stats(&self, pattern_id: &str) -> EngramResult<Option<PatternStats>> {
        self.with_reader(|conn| pattern_ops::get_stats(conn, pattern_id))
    }

    /// Record a pattern use; prunes the template when the rolling stats
    /// cross the prune rule. Returns the stats and whether the prune fired.
    pub fn record_pattern_use(
        &self,
        pattern_id: &str,
        success: bool,
    ) -> EngramResult<(PatternStats, bool)> {
        self.pool.with_writer(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| to_storage_err(format!("record_use begin: {e}")))?;
            let result = match pattern_ops::record_use(&tx, pattern_id, success) {
                Ok(r) => r,
                Err(e) => {
                    let _ = tx.rollback();
                    return Err(e);
                }
            };
            tx.commit()
                .map_err(|e| to_storage_err(format!("record_use commit: {e}")))?;
            Ok(result)
        })
    }

    pub fn count_patterns(&self) -> EngramResult<usize> {
        self.with_reader(pattern_ops::count_templates)
    }

    // --- Metadata ---

    pub fn get_metadata_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> EngramResult<Option<T>> {
        self.with_reader(|conn| metadata_ops::get_json(conn, key))
    }

    pub fn set_metadata_json<T: serde::Serialize>(&self, key: &str, value: &T) -> EngramResult<()> {
        self.pool.with_writer(|conn| metadata_ops::set_json(conn, key, value))
    }
}

impl QueueExecutor for StorageEngine {
    /// Apply a queue batch inside one transaction: all ops or none.
    fn apply_batch(&self, ops: &[WriteOp]) -> EngramResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        self.pool.with_writer(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| to_storage_err(format!("batch begin: {e}")))?;
            for op in ops {
                if let Err(e) = apply_op(&tx, op) {
                    let _ = tx.rollback();
                    return Err(e);
                }
            }
            tx.commit()
                .map_err(|e| to_storage_err(format!("batch commit: {e}")))?;
            Ok(())
        })
    }
}

/// Primary key column for queue-writable tables.
fn primary_key_for(table: &str) -> EngramResult<&'static str> {
    match table {
        "entries" => Ok("id"),
        "entry_tags" => Ok("entry_id"),
        "vector_mappings" => Ok("entry_id"),
        "pattern_stats" => Ok("pattern_id"),
        "system_metadata" => Ok("key"),
        other => Err(EngramError::Storage(StorageError::ConstraintViolation {
            what: format!("table '{other}' is not queue-writable"),
        })),
    }
}

/// Apply one queued op on the open transaction.
fn apply_op(conn: &Connection, op: &WriteOp) -> EngramResult<()> {
    let pk = primary_key_for(&op.table)?;

    // Access-stat updates need monotone counters, not plain assignment.
    if op.table == "vector_mappings" && op.kind == WriteKind::Update {
        if let Some(obj) = op.data.as_object() {
            if let (Some(count), Some(at), Some(id)) = (
                obj.get("access_count").and_then(|v| v.as_u64()),
                obj.get("last_accessed_at").and_then(|v| v.as_str()),
                op.id.as_deref(),
            ) {
                return mapping_ops::set_access_stats(
                    conn,
                    id,
                    count,
                    crate::queries::parse_dt(at)?,
                );
            }
        }
    }

    match op.kind {
        WriteKind::Insert => {
            let obj = op.data.as_object().ok_or_else(|| {
                EngramError::Storage(StorageError::ConstraintViolation {
                    what: "insert op data must be an object".into(),
                })
            })?;
            let columns: Vec<&str> = obj.keys().map(String::as_str).collect();
            let placeholders: Vec<String> =
                (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
                op.table,
                columns.join(", "),
                placeholders.join(", "),
            );
            let params: Vec<rusqlite::types::Value> =
                obj.values().map(json_to_sql_value).collect();
            conn.execute(&sql, rusqlite::params_from_iter(params))
                .map_err(|e| to_storage_err(e.to_string()))?;
        }
        WriteKind::Update => {
            let obj = op.data.as_object().ok_or_else(|| {
                EngramError::Storage(StorageError::ConstraintViolation {
                    what: "update op data must be an object".into(),
                })
            })?;
            let id = op.id.as_deref().ok_or_else(|| {
                EngramError::Storage(StorageError::ConstraintViolation {
                    what: "update op requires an id".into(),
                })
            })?;
            let assignments: Vec<String> = obj
                .keys()
                .enumerate()
                .map(|(i, col)| format!("{col} = ?{}", i + 1))
                .collect();
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?{}",
                op.table,
                assignments.join(", "),
                pk,
                obj.len() + 1,
            );
            let mut params: Vec<rusqlite::types::Value> =
                obj.values().map(json_to_sql_value).collect();
            params.push(rusqlite::types::Value::Text(id.to_string()));
            conn.execute(&sql, rusqlite::params_from_iter(params))
                .map_err(|e| to_storage_err(e.to_string()))?;
        }
        WriteKind::Delete => {
            let id = op.id.as_deref().ok_or_else(|| {
                EngramError::Storage(StorageError::ConstraintViolation {
                    what: "delete op requires an id".into(),
                })
            })?;
            let sql = format!("DELETE FROM {} WHERE {} = ?1", op.table, pk);
            conn.execute(&sql, rusqlite::params![id])
                .map_err(|e| to_storage_err(e.to_string()))?;
        }
    }
    Ok(())
}

/// Map a JSON value to a SQLite value. Arrays and nested objects are
/// stored as JSON text.
fn json_to_sql_value(value: &serde_json::Value) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(*b as i64),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                Value::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}
