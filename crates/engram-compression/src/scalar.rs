//! WARM tier: IEEE half-precision per element.

use half::f16;

/// Encode to f16 bit patterns.
pub fn encode(v: &[f32]) -> Vec<u16> {
    v.iter().map(|x| f16::from_f32(*x).to_bits()).collect()
}

/// Decode f16 bit patterns back to f32.
pub fn decode(bits: &[u16]) -> Vec<f32> {
    bits.iter().map(|b| f16::from_bits(*b).to_f32()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_error_is_small_on_unit_components() {
        // Unit-vector components are within [-1, 1] where f16 has plenty
        // of mantissa; elementwise error stays under 0.01.
        let v: Vec<f32> = (0..768)
            .map(|i| ((i as f32 * 0.37).sin()) / 27.7)
            .collect();
        let decoded = decode(&encode(&v));
        for (a, b) in v.iter().zip(decoded.iter()) {
            assert!((a - b).abs() <= 0.01, "{a} vs {b}");
        }
    }

    #[test]
    fn preserves_sign_and_zero() {
        let v = vec![0.0f32, -0.5, 0.5, -1.0, 1.0];
        let decoded = decode(&encode(&v));
        assert_eq!(decoded[0], 0.0);
        assert!(decoded[1] < 0.0 && decoded[3] < 0.0);
        assert!(decoded[2] > 0.0 && decoded[4] > 0.0);
    }
}
