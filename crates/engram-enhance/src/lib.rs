//! # engram-enhance
//!
//! Ego-graph enhancement: extract the 2-hop neighborhood of an entry over
//! causal + provenance edges, aggregate neighbor embeddings by weighted
//! message passing, and project 768→1024 for richer retrieval.

pub mod aggregate;
pub mod ego;
pub mod enhancer;
pub mod projection;

pub use aggregate::NeighborMessage;
pub use ego::{build_ego_graph, EgoGraph, EgoNode};
pub use enhancer::EgoGraphEnhancer;
pub use projection::{AttentionProjections, ProjectionMlp, ProjectionWeights};
