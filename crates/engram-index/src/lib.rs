//! # engram-index
//!
//! Dense-vector container with cosine-similarity k-NN search.
//! Enforces the embedding dimension and unit-norm invariant at the
//! boundary. Memory-resident; durability is owned by the storage layer,
//! which commits vector bytes alongside their mapping rows.

mod index;

pub use index::{SearchHit, VectorIndex};
