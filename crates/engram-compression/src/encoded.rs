//! Tier-tagged encoded vector representations.

use engram_core::models::CompressionTier;

/// One vector in its stored representation. Tier dispatch is a match,
/// not virtual dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedVector {
    Hot(Vec<f32>),
    Warm(Vec<u16>),
    Cool(Vec<u8>),
    Cold(Vec<u8>),
    Frozen(Vec<u8>),
}

impl EncodedVector {
    pub fn tier(&self) -> CompressionTier {
        match self {
            EncodedVector::Hot(_) => CompressionTier::Hot,
            EncodedVector::Warm(_) => CompressionTier::Warm,
            EncodedVector::Cool(_) => CompressionTier::Cool,
            EncodedVector::Cold(_) => CompressionTier::Cold,
            EncodedVector::Frozen(_) => CompressionTier::Frozen,
        }
    }

    /// Stored size in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            EncodedVector::Hot(v) => v.len() * 4,
            EncodedVector::Warm(v) => v.len() * 2,
            EncodedVector::Cool(v) | EncodedVector::Cold(v) | EncodedVector::Frozen(v) => v.len(),
        }
    }

    /// Serialize to the bytes persisted in the vectors table.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            EncodedVector::Hot(v) => v.iter().flat_map(|f| f.to_le_bytes()).collect(),
            EncodedVector::Warm(v) => v.iter().flat_map(|b| b.to_le_bytes()).collect(),
            EncodedVector::Cool(v) | EncodedVector::Cold(v) | EncodedVector::Frozen(v) => v.clone(),
        }
    }

    /// Reconstruct from persisted bytes given the tier tag stored on the
    /// mapping row.
    pub fn from_bytes(tier: CompressionTier, bytes: &[u8]) -> Self {
        match tier {
            CompressionTier::Hot => EncodedVector::Hot(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            CompressionTier::Warm => EncodedVector::Warm(
                bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            CompressionTier::Cool => EncodedVector::Cool(bytes.to_vec()),
            CompressionTier::Cold => EncodedVector::Cold(bytes.to_vec()),
            CompressionTier::Frozen => EncodedVector::Frozen(bytes.to_vec()),
        }
    }
}
