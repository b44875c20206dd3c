//! Product quantization: split a vector into contiguous subvectors and
//! encode each by its nearest centroid in a trained codebook.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use engram_core::constants::PQ_SUBVECTORS;
use engram_core::errors::{CompressionError, EngramError, EngramResult};

/// Geometry and size of a product quantizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PqConfig {
    pub num_subvectors: usize,
    pub num_centroids: usize,
    pub subvector_dim: usize,
}

impl PqConfig {
    /// 8-bit codes: 96 subvectors × 256 centroids for a 768-dim vector.
    pub fn pq8(dim: usize) -> Self {
        Self {
            num_subvectors: PQ_SUBVECTORS,
            num_centroids: 256,
            subvector_dim: dim / PQ_SUBVECTORS,
        }
    }

    /// 4-bit codes: 96 subvectors × 16 centroids, two codes per byte.
    pub fn pq4(dim: usize) -> Self {
        Self {
            num_subvectors: PQ_SUBVECTORS,
            num_centroids: 16,
            subvector_dim: dim / PQ_SUBVECTORS,
        }
    }

    pub fn dim(&self) -> usize {
        self.num_subvectors * self.subvector_dim
    }
}

/// Trained centroids plus provenance of the training run. Serializable;
/// loaded codebooks are immutable for the life of a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Codebook {
    pub config: PqConfig,
    /// `num_subvectors × num_centroids × subvector_dim` floats, row-major.
    pub centroids: Vec<f32>,
    pub trained_at: DateTime<Utc>,
    pub training_size: usize,
}

impl Codebook {
    /// Centroid `c` of subvector position `s`.
    fn centroid(&self, s: usize, c: usize) -> &[f32] {
        let stride = self.config.subvector_dim;
        let offset = (s * self.config.num_centroids + c) * stride;
        &self.centroids[offset..offset + stride]
    }
}

/// Encoder/decoder around one codebook.
pub struct ProductQuantizer {
    codebook: Codebook,
}

impl ProductQuantizer {
    pub fn new(codebook: Codebook) -> Self {
        Self { codebook }
    }

    pub fn codebook(&self) -> &Codebook {
        &self.codebook
    }

    /// Train a codebook with k-means over the given vectors.
    ///
    /// Runs `iterations` rounds of assign/update per subvector position,
    /// parallelized across positions. With fewer than `min_training`
    /// vectors, centroids fall back to a deterministic sample of the
    /// training data.
    pub fn train(
        config: PqConfig,
        vectors: &[Vec<f32>],
        iterations: usize,
        min_training: usize,
    ) -> EngramResult<Self> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != config.dim()) {
            return Err(shape_mismatch(&config, bad.len()));
        }

        let full_kmeans = vectors.len() >= min_training;
        let iterations = if full_kmeans { iterations } else { 0 };

        let centroids: Vec<f32> = (0..config.num_subvectors)
            .into_par_iter()
            .flat_map(|s| {
                let slices: Vec<&[f32]> = vectors
                    .iter()
                    .map(|v| {
                        let offset = s * config.subvector_dim;
                        &v[offset..offset + config.subvector_dim]
                    })
                    .collect();
                train_subspace(&slices, config.num_centroids, config.subvector_dim, iterations)
            })
            .collect();

        Ok(Self {
            codebook: Codebook {
                config,
                centroids,
                trained_at: Utc::now(),
                training_size: vectors.len(),
            },
        })
    }

    /// Encode to one code per subvector (u8 for ≤256 centroids).
    pub fn encode(&self, v: &[f32]) -> EngramResult<Vec<u8>> {
        let config = &self.codebook.config;
        if v.len() != config.dim() {
            return Err(shape_mismatch(config, v.len()));
        }

        let codes = (0..config.num_subvectors)
            .map(|s| {
                let offset = s * config.subvector_dim;
                let sub = &v[offset..offset + config.subvector_dim];
                self.nearest_centroid(s, sub) as u8
            })
            .collect();
        Ok(codes)
    }

    /// Encode and pack two 4-bit codes per byte (even subvector in the
    /// low nibble). Only valid for ≤16 centroids.
    pub fn encode_packed4(&self, v: &[f32]) -> EngramResult<Vec<u8>> {
        let codes = self.encode(v)?;
        let mut packed = vec![0u8; codes.len().div_ceil(2)];
        for (i, code) in codes.iter().enumerate() {
            let nibble = code & 0x0F;
            if i % 2 == 0 {
                packed[i / 2] |= nibble;
            } else {
                packed[i / 2] |= nibble << 4;
            }
        }
        Ok(packed)
    }

    /// Decode one-code-per-subvector bytes.
    pub fn decode(&self, codes: &[u8]) -> EngramResult<Vec<f32>> {
        let config = &self.codebook.config;
        if codes.len() != config.num_subvectors {
            return Err(shape_mismatch(config, codes.len()));
        }
        let mut out = Vec::with_capacity(config.dim());
        for (s, code) in codes.iter().enumerate() {
            out.extend_from_slice(self.codebook.centroid(s, *code as usize));
        }
        Ok(out)
    }

    /// Decode packed 4-bit codes.
    pub fn decode_packed4(&self, packed: &[u8]) -> EngramResult<Vec<f32>> {
        let config = &self.codebook.config;
        let mut codes = Vec::with_capacity(config.num_subvectors);
        for i in 0..config.num_subvectors {
            let byte = packed[i / 2];
            let code = if i % 2 == 0 { byte & 0x0F } else { byte >> 4 };
            codes.push(code);
        }
        self.decode(&codes)
    }

    fn nearest_centroid(&self, s: usize, sub: &[f32]) -> usize {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for c in 0..self.codebook.config.num_centroids {
            let centroid = self.codebook.centroid(s, c);
            let dist: f32 = sub
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            if dist < best_dist {
                best_dist = dist;
                best = c;
            }
        }
        best
    }
}

/// k-means for one subvector position. Deterministic stride sampling for
/// initialization keeps training reproducible without an RNG.
fn train_subspace(
    slices: &[&[f32]],
    num_centroids: usize,
    subvector_dim: usize,
    iterations: usize,
) -> Vec<f32> {
    let mut centroids: Vec<Vec<f32>> = (0..num_centroids)
        .map(|c| {
            if slices.is_empty() {
                vec![0.0; subvector_dim]
            } else {
                slices[(c * slices.len().max(1) / num_centroids.max(1)) % slices.len()].to_vec()
            }
        })
        .collect();

    for _ in 0..iterations {
        let mut sums = vec![vec![0.0f32; subvector_dim]; num_centroids];
        let mut counts = vec![0usize; num_centroids];

        for slice in slices {
            let nearest = nearest_of(&centroids, slice);
            counts[nearest] += 1;
            for (acc, x) in sums[nearest].iter_mut().zip(slice.iter()) {
                *acc += x;
            }
        }

        for (c, centroid) in centroids.iter_mut().enumerate() {
            if counts[c] > 0 {
                for (slot, sum) in centroid.iter_mut().zip(sums[c].iter()) {
                    *slot = sum / counts[c] as f32;
                }
            }
            // Empty clusters keep their previous centroid.
        }
    }

    centroids.into_iter().flatten().collect()
}

fn nearest_of(centroids: &[Vec<f32>], slice: &[f32]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let dist: f32 = slice
            .iter()
            .zip(centroid.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    best
}

fn shape_mismatch(config: &PqConfig, actual: usize) -> EngramError {
    let _ = actual;
    EngramError::Compression(CompressionError::SubvectorShapeMismatch {
        dim: config.dim(),
        subvectors: config.num_subvectors,
        subvector_dim: config.subvector_dim,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training_vectors(count: usize, dim: usize) -> Vec<Vec<f32>> {
        (0..count)
            .map(|i| {
                (0..dim)
                    .map(|d| ((i * 31 + d * 7) as f32 * 0.61).sin())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn pq8_geometry_at_768() {
        let config = PqConfig::pq8(768);
        assert_eq!(config.num_subvectors, 96);
        assert_eq!(config.subvector_dim, 8);
        assert_eq!(config.dim(), 768);
    }

    #[test]
    fn encode_emits_one_code_per_subvector() {
        let config = PqConfig {
            num_subvectors: 8,
            num_centroids: 16,
            subvector_dim: 2,
        };
        let vectors = training_vectors(300, 16);
        let pq = ProductQuantizer::train(config, &vectors, 5, 256).unwrap();
        let codes = pq.encode(&vectors[0]).unwrap();
        assert_eq!(codes.len(), 8);
    }

    #[test]
    fn decode_reconstructs_approximately() {
        let config = PqConfig {
            num_subvectors: 4,
            num_centroids: 16,
            subvector_dim: 2,
        };
        let vectors = training_vectors(400, 8);
        let pq = ProductQuantizer::train(config, &vectors, 10, 256).unwrap();

        let original = &vectors[13];
        let decoded = pq.decode(&pq.encode(original).unwrap()).unwrap();
        assert_eq!(decoded.len(), 8);
        let err: f32 = original
            .iter()
            .zip(decoded.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max);
        assert!(err < 0.5, "max elementwise error {err} too large");
    }

    #[test]
    fn packed4_round_trips_codes() {
        let config = PqConfig {
            num_subvectors: 4,
            num_centroids: 16,
            subvector_dim: 2,
        };
        let vectors = training_vectors(100, 8);
        let pq = ProductQuantizer::train(config, &vectors, 3, 256).unwrap();

        let packed = pq.encode_packed4(&vectors[0]).unwrap();
        assert_eq!(packed.len(), 2, "two codes per byte");
        let via_packed = pq.decode_packed4(&packed).unwrap();
        let direct = pq.decode(&pq.encode(&vectors[0]).unwrap()).unwrap();
        assert_eq!(via_packed, direct);
    }

    #[test]
    fn small_training_set_falls_back_to_sampling() {
        let config = PqConfig {
            num_subvectors: 2,
            num_centroids: 4,
            subvector_dim: 2,
        };
        let vectors = training_vectors(8, 4);
        let pq = ProductQuantizer::train(config, &vectors, 10, 256).unwrap();
        assert_eq!(pq.codebook().training_size, 8);
        // Still functional: encode/decode shapes hold.
        let codes = pq.encode(&vectors[0]).unwrap();
        assert_eq!(codes.len(), 2);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let config = PqConfig {
            num_subvectors: 2,
            num_centroids: 4,
            subvector_dim: 2,
        };
        let vectors = training_vectors(10, 4);
        let pq = ProductQuantizer::train(config, &vectors, 1, 256).unwrap();
        assert!(pq.encode(&[0.0; 5]).is_err());
        assert!(ProductQuantizer::train(config, &training_vectors(3, 6), 1, 256).is_err());
    }

    #[test]
    fn codebook_serializes() {
        let config = PqConfig {
            num_subvectors: 2,
            num_centroids: 4,
            subvector_dim: 2,
        };
        let vectors = training_vectors(10, 4);
        let pq = ProductQuantizer::train(config, &vectors, 1, 256).unwrap();

        let json = serde_json::to_string(pq.codebook()).unwrap();
        let restored: Codebook = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.config, config);
        assert_eq!(restored.centroids, pq.codebook().centroids);
    }
}
