//! FROZEN tier: one sign bit per dimension, packed LSB-first.
//!
//! Decoding expands each bit to ±0.1 and re-normalizes, so every
//! component lands at ±1/√dim. Similarity on FROZEN vectors is
//! approximate and should be treated as a coarse ranking signal only.

use engram_core::vector;

/// Magnitude assigned to each component before re-normalization.
const DECODE_MAGNITUDE: f32 = 0.1;

/// Pack sign bits: bit set ⇔ component ≥ 0.
pub fn encode(v: &[f32]) -> Vec<u8> {
    let mut packed = vec![0u8; v.len().div_ceil(8)];
    for (i, x) in v.iter().enumerate() {
        if *x >= 0.0 {
            packed[i / 8] |= 1 << (i % 8);
        }
    }
    packed
}

/// Expand sign bits to a unit vector with uniform magnitudes.
pub fn decode(packed: &[u8], dim: usize) -> Vec<f32> {
    let mut v: Vec<f32> = (0..dim)
        .map(|i| {
            if packed[i / 8] & (1 << (i % 8)) != 0 {
                DECODE_MAGNITUDE
            } else {
                -DECODE_MAGNITUDE
            }
        })
        .collect();
    vector::normalize(&mut v);
    v
}
