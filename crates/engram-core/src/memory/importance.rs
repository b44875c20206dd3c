use std::fmt;

use serde::{Deserialize, Serialize};

/// Importance score clamped to [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Importance(f64);

impl Importance {
    /// Entries at or above this are kept out of aggressive pruning.
    pub const HIGH: f64 = 0.8;
    /// Baseline importance for entries stored without an explicit value.
    pub const DEFAULT: f64 = 0.5;

    /// Create a new Importance, clamping to [0.0, 1.0].
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    /// Get the raw f64 value.
    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_high(self) -> bool {
        self.0 >= Self::HIGH
    }
}

impl Default for Importance {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

impl From<f64> for Importance {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Importance> for f64 {
    fn from(i: Importance) -> Self {
        i.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range() {
        assert_eq!(Importance::new(1.5).value(), 1.0);
        assert_eq!(Importance::new(-0.2).value(), 0.0);
    }

    #[test]
    fn default_is_midpoint() {
        assert_eq!(Importance::default().value(), 0.5);
    }
}
