//! Pattern templates and their rolling usage stats.

use chrono::Utc;
use rusqlite::{params, Connection};

use engram_core::errors::EngramResult;
use engram_core::models::{PatternStats, PatternTemplate, SlotSpec};

use super::{parse_dt, OptionalRow};
use crate::to_storage_err;

/// Register a template with zeroed stats.
pub fn insert_template(conn: &Connection, template: &PatternTemplate) -> EngramResult<()> {
    let slots_json =
        serde_json::to_string(&template.slots).map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute(
        "INSERT INTO pattern_templates (id, name, pattern, slots, priority, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            template.id,
            template.name,
            template.pattern,
            slots_json,
            template.priority,
            template.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute(
        "INSERT OR IGNORE INTO pattern_stats (pattern_id, use_count, success_count) VALUES (?1, 0, 0)",
        params![template.id],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Fetch a template by name.
pub fn get_by_name(conn: &Connection, name: &str) -> EngramResult<Option<PatternTemplate>> {
    let row = conn
        .query_row(
            "SELECT id, name, pattern, slots, priority, created_at
             FROM pattern_templates WHERE name = ?1",
            params![name],
            row_to_template,
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    match row {
        Some(Ok(t)) => Ok(Some(t)),
        Some(Err(e)) => Err(to_storage_err(e.to_string())),
        None => Ok(None),
    }
}

/// All templates ordered by priority descending.
pub fn list_templates(conn: &Connection) -> EngramResult<Vec<PatternTemplate>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, pattern, slots, priority, created_at
             FROM pattern_templates ORDER BY priority DESC, name",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], row_to_template)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut templates = Vec::new();
    for row in rows {
        templates.push(
            row.map_err(|e| to_storage_err(e.to_string()))?
                .map_err(|e| to_storage_err(e.to_string()))?,
        );
    }
    Ok(templates)
}

/// Stats for one pattern.
pub fn get_stats(conn: &Connection, pattern_id: &str) -> EngramResult<Option<PatternStats>> {
    let row = conn
        .query_row(
            "SELECT use_count, success_count, last_used_at
             FROM pattern_stats WHERE pattern_id = ?1",
            params![pattern_id],
            |row| {
                let use_count: i64 = row.get(0)?;
                let success_count: i64 = row.get(1)?;
                let last_used: Option<String> = row.get(2)?;
                Ok((use_count, success_count, last_used))
            },
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    match row {
        Some((use_count, success_count, last_used)) => Ok(Some(PatternStats {
            use_count: use_count as u64,
            success_count: success_count as u64,
            last_used_at: last_used.as_deref().map(parse_dt).transpose()?,
        })),
        None => Ok(None),
    }
}

/// Record one use and whether it succeeded. When the rolling stats cross
/// the prune rule (use_count ≥ 100 AND success rate < 0.4), the template
/// and its stats are deleted in the same transaction; returns the stats
/// and whether the prune fired.
pub fn record_use(
    conn: &Connection,
    pattern_id: &str,
    success: bool,
) -> EngramResult<(PatternStats, bool)> {
    conn.execute(
        "UPDATE pattern_stats
         SET use_count = use_count + 1,
             success_count = success_count + ?2,
             last_used_at = ?3
         WHERE pattern_id = ?1",
        params![pattern_id, success as i64, Utc::now().to_rfc3339()],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    let stats = get_stats(conn, pattern_id)?.unwrap_or_default();
    let pruned = stats.should_prune();
    if pruned {
        delete_template(conn, pattern_id)?;
    }
    Ok((stats, pruned))
}

/// Remove a template and its stats.
pub fn delete_template(conn: &Connection, pattern_id: &str) -> EngramResult<()> {
    conn.execute(
        "DELETE FROM pattern_stats WHERE pattern_id = ?1",
        params![pattern_id],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute(
        "DELETE FROM pattern_templates WHERE id = ?1",
        params![pattern_id],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Number of registered templates.
pub fn count_templates(conn: &Connection) -> EngramResult<usize> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM pattern_templates", [], |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(count as usize)
}

fn row_to_template(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<engram_core::errors::EngramResult<PatternTemplate>> {
    let slots_json: String = row.get(3)?;
    let created_at_str: String = row.get(5)?;
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let pattern: String = row.get(2)?;
    let priority: i32 = row.get(4)?;

    Ok((|| {
        let slots: Vec<SlotSpec> = serde_json::from_str(&slots_json)
            .map_err(|e| to_storage_err(format!("parse slots: {e}")))?;
        Ok(PatternTemplate {
            id,
            name,
            pattern,
            slots,
            priority,
            created_at: parse_dt(&created_at_str)?,
        })
    })())
}
