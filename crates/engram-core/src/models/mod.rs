//! Shared model structs crossing crate boundaries.

mod causal;
mod enhancement;
mod mapping;
mod pattern;
mod provenance;
mod query;
mod stats;
mod tier;
mod write_op;

pub use causal::{CausalDirection, CausalPath, CausalRelation, CausalRelationType};
pub use enhancement::{AggregationMethod, EnhancementResult};
pub use mapping::VectorMapping;
pub use pattern::{PatternStats, PatternTemplate, SlotSpec};
pub use provenance::ProvenanceRecord;
pub use query::{QueryFilters, QueryOptions, QueryResult, StoreOptions};
pub use stats::{CompressionStats, EnhancerStats, MemoryStats, QueueStats, TierTransition};
pub use tier::CompressionTier;
pub use write_op::{WriteKind, WriteOp};
