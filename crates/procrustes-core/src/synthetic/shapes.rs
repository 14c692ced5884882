//! Synthetic reference shapes and rigid motions.

use crate::math::rotation_matrix;
use crate::shape::{stack_frames, ShapeError};
use crate::synthetic::noise::UniformPointNoise;
use crate::{PointSet, Real, ShapeMatrix, Vec2};
use std::f64::consts::TAU;

/// Ground-truth rigid motion of one frame: `p_obs = Rot(angle) * p_ref + translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidMotion2 {
    pub angle: Real,
    pub translation: Vec2,
}

impl RigidMotion2 {
    pub fn new(angle: Real, translation: Vec2) -> Self {
        Self { angle, translation }
    }

    /// Apply the motion to every column of `points`.
    pub fn apply(&self, points: &PointSet) -> PointSet {
        let mut moved = rotation_matrix(self.angle) * points;
        for mut col in moved.column_iter_mut() {
            col += self.translation;
        }
        moved
    }
}

/// `n` points evenly spaced on a circle of `radius`, starting on the +x axis.
pub fn regular_polygon(n: usize, radius: Real) -> PointSet {
    PointSet::from_fn(n, |r, c| {
        let phi = TAU * c as Real / n as Real;
        if r == 0 {
            radius * phi.cos()
        } else {
            radius * phi.sin()
        }
    })
}

/// A star with `spikes` outer tips, alternating `inner` and `outer` radii.
///
/// The result has `2 * spikes` points. Angular spacing is slightly uneven so
/// the shape has no rotational symmetry.
pub fn star(spikes: usize, inner: Real, outer: Real) -> PointSet {
    let n = 2 * spikes;
    PointSet::from_fn(n, |r, c| {
        let radius = if c % 2 == 0 { outer } else { inner };
        let phi = TAU * (c as Real + 0.15 * (c % 3) as Real) / n as Real;
        if r == 0 {
            radius * phi.cos()
        } else {
            radius * phi.sin()
        }
    })
}

/// Linearly varying motions: frame `k` gets `angle0 + k * dangle` and
/// `t0 + k * dt`.
pub fn motion_sweep(
    frames: usize,
    angle0: Real,
    dangle: Real,
    t0: [Real; 2],
    dt: [Real; 2],
) -> Vec<RigidMotion2> {
    (0..frames)
        .map(|k| {
            let k = k as Real;
            RigidMotion2::new(
                angle0 + k * dangle,
                Vec2::new(t0[0] + k * dt[0], t0[1] + k * dt[1]),
            )
        })
        .collect()
}

/// Build an observation matrix with row `n = Rot(angle_n) * reference + t_n + noise`.
pub fn observe(
    reference: &PointSet,
    motions: &[RigidMotion2],
    noise: UniformPointNoise,
) -> Result<ShapeMatrix, ShapeError> {
    let frames: Vec<PointSet> = motions
        .iter()
        .enumerate()
        .map(|(frame, motion)| {
            let mut points = motion.apply(reference);
            for (point, mut col) in points.column_iter_mut().enumerate() {
                col += noise.sample(frame, point);
            }
            points
        })
        .collect();
    stack_frames(&frames)
}
