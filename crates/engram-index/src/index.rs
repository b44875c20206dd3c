//! Label → vector map with brute-force cosine search.

use std::collections::HashMap;
use std::sync::RwLock;

use rayon::prelude::*;

use engram_core::errors::{EngramError, EngramResult, IndexError};
use engram_core::vector;

/// Vector counts above this use rayon for the scoring scan.
const PARALLEL_SCAN_THRESHOLD: usize = 2048;

/// One search result. `score = 1 − distance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub label: i64,
    pub distance: f32,
    pub score: f32,
}

/// In-place collection of (label → unit vector) pairs.
///
/// The dimension is fixed at construction and never changes for the life
/// of a store. Mutations take the write lock; searches take the read lock.
pub struct VectorIndex {
    dim: usize,
    vectors: RwLock<HashMap<i64, Vec<f32>>>,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dim` dimensions.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: RwLock::new(HashMap::new()),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Insert a vector. Re-normalizes when outside the norm tolerance.
    /// Fails on a duplicate label or wrong dimension.
    pub fn add(&self, label: i64, mut v: Vec<f32>) -> EngramResult<()> {
        self.check_dim(&v)?;
        vector::ensure_unit_norm(&mut v);
        let mut vectors = self.write_lock()?;
        if vectors.contains_key(&label) {
            return Err(EngramError::Index(IndexError::DuplicateLabel { label }));
        }
        vectors.insert(label, v);
        Ok(())
    }

    /// Atomically replace the vector at `label`.
    /// Returns false when the label is absent.
    pub fn update(&self, label: i64, mut v: Vec<f32>) -> EngramResult<bool> {
        self.check_dim(&v)?;
        vector::ensure_unit_norm(&mut v);
        let mut vectors = self.write_lock()?;
        match vectors.get_mut(&label) {
            Some(slot) => {
                *slot = v;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove the vector at `label`. Returns whether it existed.
    pub fn delete(&self, label: i64) -> EngramResult<bool> {
        Ok(self.write_lock()?.remove(&label).is_some())
    }

    pub fn has(&self, label: i64) -> EngramResult<bool> {
        Ok(self.read_lock()?.contains_key(&label))
    }

    pub fn get_vector(&self, label: i64) -> EngramResult<Option<Vec<f32>>> {
        Ok(self.read_lock()?.get(&label).cloned())
    }

    pub fn count(&self) -> EngramResult<usize> {
        Ok(self.read_lock()?.len())
    }

    /// Top-k nearest vectors by cosine distance, ascending; distance ties
    /// break toward the smaller label.
    pub fn search(&self, query: &[f32], k: usize) -> EngramResult<Vec<SearchHit>> {
        self.check_dim(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut normalized;
        let query = if vector::is_unit_norm(query) {
            query
        } else {
            normalized = query.to_vec();
            vector::normalize(&mut normalized);
            &normalized[..]
        };

        let vectors = self.read_lock()?;
        let score = |(label, v): (&i64, &Vec<f32>)| {
            let distance = vector::cosine_distance(query, v);
            SearchHit {
                label: *label,
                distance,
                score: 1.0 - distance,
            }
        };

        let mut hits: Vec<SearchHit> = if vectors.len() >= PARALLEL_SCAN_THRESHOLD {
            vectors.par_iter().map(score).collect()
        } else {
            vectors.iter().map(score).collect()
        };

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Bulk-load (label, vector) pairs, replacing existing entries.
    /// Used when rehydrating from the store on open.
    pub fn load(&self, pairs: Vec<(i64, Vec<f32>)>) -> EngramResult<()> {
        for (_, v) in &pairs {
            self.check_dim(v)?;
        }
        let mut vectors = self.write_lock()?;
        for (label, mut v) in pairs {
            vector::ensure_unit_norm(&mut v);
            vectors.insert(label, v);
        }
        Ok(())
    }

    fn check_dim(&self, v: &[f32]) -> EngramResult<()> {
        if v.len() != self.dim {
            return Err(EngramError::Index(IndexError::DimensionMismatch {
                expected: self.dim,
                actual: v.len(),
            }));
        }
        Ok(())
    }

    fn read_lock(&self) -> EngramResult<std::sync::RwLockReadGuard<'_, HashMap<i64, Vec<f32>>>> {
        self.vectors
            .read()
            .map_err(|_| EngramError::Index(IndexError::NotInitialized))
    }

    fn write_lock(&self) -> EngramResult<std::sync::RwLockWriteGuard<'_, HashMap<i64, Vec<f32>>>> {
        self.vectors
            .write()
            .map_err(|_| EngramError::Index(IndexError::NotInitialized))
    }
}
