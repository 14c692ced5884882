//! Deterministic point noise for synthetic datasets.
//!
//! Samples are a pure function of `(seed, frame, point)` built on SplitMix64,
//! so datasets do not change across platforms or RNG crate versions.

use crate::{Real, Vec2};

/// Uniform per-axis noise in `[-amplitude, +amplitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UniformPointNoise {
    pub seed: u64,
    pub amplitude: Real,
}

impl UniformPointNoise {
    pub fn new(seed: u64, amplitude: Real) -> Self {
        Self { seed, amplitude }
    }

    /// Noise vector for point `point` of frame `frame`.
    pub fn sample(&self, frame: usize, point: usize) -> Vec2 {
        let amplitude = self.amplitude.abs();
        if amplitude == 0.0 {
            return Vec2::zeros();
        }
        let key = stream_key(self.seed, frame, point);
        let u = unit_interval(splitmix64(key));
        let v = unit_interval(splitmix64(!key));
        Vec2::new((2.0 * u - 1.0) * amplitude, (2.0 * v - 1.0) * amplitude)
    }
}

fn stream_key(seed: u64, frame: usize, point: usize) -> u64 {
    let f = (frame as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let p = (point as u64).wrapping_add(1).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    seed.rotate_left(17) ^ f ^ p.rotate_left(31)
}

fn splitmix64(state: u64) -> u64 {
    let mut z = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// Top 53 bits mapped to [0, 1).
fn unit_interval(bits: u64) -> Real {
    (bits >> 11) as Real / (1u64 << 53) as Real
}
