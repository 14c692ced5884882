//! Parameter arena for joint rigid-motion estimation.
//!
//! Three logically distinct groups live side by side:
//! - translations: `N x 2`, row `n` is frame `n`'s translation,
//! - rotations: length `N`, one angle in radians per frame,
//! - reference shape: `2 x P`, column `i` is reference point `i`.
//!
//! Backends address every frame translation, frame rotation and reference
//! point as its own named block.

use anyhow::{anyhow, ensure, Result};
use nalgebra::{DMatrix, DVector};
use procrustes_core::{PointSet, Real, ShapeLayout, Vec2};
use std::collections::HashMap;

pub const TRANSLATION_DIM: usize = 2;
pub const ROTATION_DIM: usize = 1;
pub const POINT_DIM: usize = 2;

/// Block name of frame `frame`'s translation.
pub fn translation_key(frame: usize) -> String {
    format!("translation/{}", frame)
}

/// Block name of frame `frame`'s rotation angle.
pub fn rotation_key(frame: usize) -> String {
    format!("rotation/{}", frame)
}

/// Block name of reference point `point`.
pub fn reference_key(point: usize) -> String {
    format!("reference/{}", point)
}

/// Translations, rotations and reference shape of a rigid-motion model.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidMotionParams {
    pub translations: DMatrix<Real>,
    pub rotations: DVector<Real>,
    pub reference: PointSet,
}

impl RigidMotionParams {
    /// All-zero parameters for `num_frames` frames of `num_points` points.
    pub fn zeros(num_frames: usize, num_points: usize) -> Self {
        Self {
            translations: DMatrix::zeros(num_frames, TRANSLATION_DIM),
            rotations: DVector::zeros(num_frames),
            reference: PointSet::zeros(num_points),
        }
    }

    pub fn num_frames(&self) -> usize {
        self.rotations.len()
    }

    pub fn num_points(&self) -> usize {
        self.reference.ncols()
    }

    /// Translation of frame `frame`.
    pub fn translation(&self, frame: usize) -> Vec2 {
        Vec2::new(self.translations[(frame, 0)], self.translations[(frame, 1)])
    }

    /// Check that the arena matches an observation layout.
    pub fn check_layout(&self, layout: &ShapeLayout) -> Result<()> {
        ensure!(
            self.translations.nrows() == layout.num_frames
                && self.translations.ncols() == TRANSLATION_DIM,
            "translations must be {}x{}, got {}x{}",
            layout.num_frames,
            TRANSLATION_DIM,
            self.translations.nrows(),
            self.translations.ncols()
        );
        ensure!(
            self.rotations.len() == layout.num_frames,
            "rotations must have {} entries, got {}",
            layout.num_frames,
            self.rotations.len()
        );
        ensure!(
            self.reference.ncols() == layout.num_points,
            "reference shape must have {} points, got {}",
            layout.num_points,
            self.reference.ncols()
        );
        ensure!(
            self.translations.iter().all(|v| v.is_finite())
                && self.rotations.iter().all(|v| v.is_finite())
                && self.reference.iter().all(|v| v.is_finite()),
            "initial parameters must be finite"
        );
        Ok(())
    }

    /// Split the arena into named parameter blocks.
    pub fn to_param_map(&self) -> HashMap<String, DVector<f64>> {
        let mut map = HashMap::with_capacity(2 * self.num_frames() + self.num_points());
        for n in 0..self.num_frames() {
            let t = self.translation(n);
            map.insert(translation_key(n), nalgebra::dvector![t.x, t.y]);
            map.insert(rotation_key(n), nalgebra::dvector![self.rotations[n]]);
        }
        for (i, p) in self.reference.column_iter().enumerate() {
            map.insert(reference_key(i), nalgebra::dvector![p[0], p[1]]);
        }
        map
    }

    /// Gather named parameter blocks back into an arena.
    pub fn from_param_map(
        map: &HashMap<String, DVector<f64>>,
        num_frames: usize,
        num_points: usize,
    ) -> Result<Self> {
        let mut params = Self::zeros(num_frames, num_points);
        for n in 0..num_frames {
            let t = block(map, &translation_key(n), TRANSLATION_DIM)?;
            params.translations[(n, 0)] = t[0];
            params.translations[(n, 1)] = t[1];
            params.rotations[n] = block(map, &rotation_key(n), ROTATION_DIM)?[0];
        }
        for i in 0..num_points {
            let p = block(map, &reference_key(i), POINT_DIM)?;
            params.reference[(0, i)] = p[0];
            params.reference[(1, i)] = p[1];
        }
        Ok(params)
    }
}

fn block<'a>(
    map: &'a HashMap<String, DVector<f64>>,
    key: &str,
    dim: usize,
) -> Result<&'a DVector<f64>> {
    let v = map
        .get(key)
        .ok_or_else(|| anyhow!("missing parameter block {} in solution", key))?;
    ensure!(
        v.len() == dim,
        "parameter block {} has dimension {}, expected {}",
        key,
        v.len(),
        dim
    );
    Ok(v)
}
