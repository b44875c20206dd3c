//! One-time import of the legacy JSON vector dump.
//!
//! Three historical layouts are recognized; anything else fails loudly
//! rather than guessing:
//!
//! 1. bare array: `[{"label": 7, "vector": [..]}, ..]`
//! 2. wrapper object: `{"dim": 768, "vectors": [{"label": 7, "vector": [..]}, ..]}`
//! 3. label map: `{"7": [..], "8": [..]}`

use std::fs;
use std::path::Path;

use engram_core::errors::{EngramError, EngramResult, StorageError};
use engram_core::vector;

/// Parse a legacy dump into (label, normalized vector) pairs.
pub fn parse_legacy_dump(raw: &str) -> EngramResult<Vec<(i64, Vec<f32>)>> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
        EngramError::Storage(StorageError::LegacyFormatUnrecognized {
            details: format!("not JSON: {e}"),
        })
    })?;

    let mut pairs = match &value {
        serde_json::Value::Array(items) => parse_labeled_array(items)?,
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::Array(items)) = map.get("vectors") {
                parse_labeled_array(items)?
            } else if map.values().all(|v| v.is_array()) && !map.is_empty() {
                parse_label_map(map)?
            } else {
                return Err(unrecognized("object without 'vectors' array or label map"));
            }
        }
        _ => return Err(unrecognized("top level is neither array nor object")),
    };

    for (_, v) in pairs.iter_mut() {
        vector::ensure_unit_norm(v);
    }
    pairs.sort_by_key(|(label, _)| *label);
    Ok(pairs)
}

/// Read, parse, and rename a dump file. Returns None when no file exists.
/// The rename happens only after the caller reports a successful import.
pub fn read_dump_file(path: &Path) -> EngramResult<Option<Vec<(i64, Vec<f32>)>>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        EngramError::Storage(StorageError::Corrupt {
            details: format!("legacy dump unreadable: {e}"),
        })
    })?;
    parse_legacy_dump(&raw).map(Some)
}

/// Rename the dump after successful import so it never re-imports.
pub fn mark_migrated(path: &Path) -> EngramResult<()> {
    let mut renamed = path.as_os_str().to_owned();
    renamed.push(".migrated");
    fs::rename(path, &renamed).map_err(|e| {
        EngramError::Storage(StorageError::Corrupt {
            details: format!("failed to rename legacy dump: {e}"),
        })
    })
}

fn parse_labeled_array(items: &[serde_json::Value]) -> EngramResult<Vec<(i64, Vec<f32>)>> {
    items
        .iter()
        .map(|item| {
            let obj = item
                .as_object()
                .ok_or_else(|| unrecognized("array item is not an object"))?;
            let label = obj
                .get("label")
                .and_then(|l| l.as_i64())
                .ok_or_else(|| unrecognized("item missing integer 'label'"))?;
            let vector = obj
                .get("vector")
                .and_then(|v| v.as_array())
                .ok_or_else(|| unrecognized("item missing 'vector' array"))?;
            Ok((label, parse_floats(vector)?))
        })
        .collect()
}

fn parse_label_map(
    map: &serde_json::Map<String, serde_json::Value>,
) -> EngramResult<Vec<(i64, Vec<f32>)>> {
    map.iter()
        .map(|(key, value)| {
            let label: i64 = key
                .parse()
                .map_err(|_| unrecognized(&format!("non-integer label key '{key}'")))?;
            let vector = value
                .as_array()
                .ok_or_else(|| unrecognized("map value is not an array"))?;
            Ok((label, parse_floats(vector)?))
        })
        .collect()
}

fn parse_floats(values: &[serde_json::Value]) -> EngramResult<Vec<f32>> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| unrecognized("non-numeric vector component"))
        })
        .collect()
}

fn unrecognized(details: &str) -> EngramError {
    EngramError::Storage(StorageError::LegacyFormatUnrecognized {
        details: details.to_string(),
    })
}
