//! # engram-compression
//!
//! Access-frequency-driven tiered vector compression.
//!
//! Five tiers trade precision for space: HOT (f32), WARM (f16),
//! COOL (PQ 8-bit), COLD (PQ 4-bit), FROZEN (sign bits). Transitions are
//! strictly demote-only because every step below HOT is lossy.

pub mod binary;
pub mod encoded;
pub mod manager;
pub mod pq;
pub mod scalar;

pub use encoded::EncodedVector;
pub use manager::{AccessRecord, CompressionManager, TierSweep};
pub use pq::{Codebook, PqConfig, ProductQuantizer};
