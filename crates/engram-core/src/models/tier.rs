use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::CompressionError;

/// Vector storage precision tier. Transitions are demote-only because
/// every step below HOT is lossy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionTier {
    Hot,
    Warm,
    Cool,
    Cold,
    Frozen,
}

impl CompressionTier {
    /// Precision order: 0 (full precision) to 4 (binary).
    pub fn order(self) -> u8 {
        match self {
            CompressionTier::Hot => 0,
            CompressionTier::Warm => 1,
            CompressionTier::Cool => 2,
            CompressionTier::Cold => 3,
            CompressionTier::Frozen => 4,
        }
    }

    /// Stored bytes for a vector of `dim` dimensions in this tier.
    pub fn bytes_per_vector(self, dim: usize) -> usize {
        match self {
            CompressionTier::Hot => dim * 4,
            CompressionTier::Warm => dim * 2,
            // One 8-bit code per 8-dim subvector.
            CompressionTier::Cool => dim / 2,
            // One packed 4-bit code per 8-dim subvector.
            CompressionTier::Cold => dim / 4,
            // One sign bit per dimension.
            CompressionTier::Frozen => dim.div_ceil(8),
        }
    }

    /// Target tier for an access frequency (fraction of max access count).
    pub fn for_frequency(frequency: f64) -> Self {
        if frequency > 0.80 {
            CompressionTier::Hot
        } else if frequency >= 0.40 {
            CompressionTier::Warm
        } else if frequency >= 0.10 {
            CompressionTier::Cool
        } else if frequency > 0.01 {
            CompressionTier::Cold
        } else {
            CompressionTier::Frozen
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompressionTier::Hot => "hot",
            CompressionTier::Warm => "warm",
            CompressionTier::Cool => "cool",
            CompressionTier::Cold => "cold",
            CompressionTier::Frozen => "frozen",
        }
    }
}

impl fmt::Display for CompressionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionTier {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hot" => Ok(CompressionTier::Hot),
            "warm" => Ok(CompressionTier::Warm),
            "cool" => Ok(CompressionTier::Cool),
            "cold" => Ok(CompressionTier::Cold),
            "frozen" => Ok(CompressionTier::Frozen),
            other => Err(CompressionError::UnknownTier {
                name: other.to_string(),
            }),
        }
    }
}
