//! Post-search filtering of candidate entries.
//!
//! Vector search produces candidate labels; these helpers resolve them to
//! entries and apply the conjunctive filters.

use rusqlite::Connection;

use engram_core::errors::EngramResult;
use engram_core::memory::Entry;
use engram_core::models::QueryFilters;

use super::entry_crud;

/// Resolve candidate ids to entries, applying filters. Preserves input
/// order; missing ids are skipped.
pub fn filter_entries(
    conn: &Connection,
    ids: &[String],
    filters: &QueryFilters,
) -> EngramResult<Vec<Entry>> {
    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(entry) = entry_crud::get_entry(conn, id)? {
            if matches_filters(&entry, filters) {
                results.push(entry);
            }
        }
    }
    Ok(results)
}

/// Whether one entry passes all configured filters.
pub fn matches_filters(entry: &Entry, filters: &QueryFilters) -> bool {
    if let Some(sources) = &filters.sources {
        if !sources.contains(&entry.source) {
            return false;
        }
    }
    if let Some(tags) = &filters.tags {
        // Any-of semantics: at least one requested tag must be present.
        if !tags.iter().any(|t| entry.tags.contains(t)) {
            return false;
        }
    }
    if let Some((from, to)) = &filters.date_range {
        if entry.created_at < *from || entry.created_at > *to {
            return false;
        }
    }
    if let Some(min) = filters.min_importance {
        if entry.importance < min {
            return false;
        }
    }
    if let Some(session) = &filters.session_id {
        if entry.session_id.as_deref() != Some(session.as_str()) {
            return false;
        }
    }
    if let Some(agent) = &filters.agent_id {
        if entry.agent_id.as_deref() != Some(agent.as_str()) {
            return false;
        }
    }
    true
}
