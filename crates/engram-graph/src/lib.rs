//! # engram-graph
//!
//! Provenance quality rollup (L-Score) and causal hyperedge traversal.
//!
//! Provenance is a DAG by construction: parents must pre-exist and the
//! parent set is fixed at creation. Causal graphs may contain cycles, so
//! traversal carries a visited set and never revisits a node.

pub mod causal;
pub mod neighbors;
pub mod provenance;

pub use causal::{query_causal, TraversalOptions};
pub use neighbors::{graph_neighbors, GraphNeighbor};
pub use provenance::{compute_l_score, enforce_threshold, ParentLineage};
