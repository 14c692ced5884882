//! Rigid point residual.
//!
//! For an observed point `o` of frame `n` and reference index `i`:
//!
//! ```text
//! r = Rot(alpha_n) * s_i + t_n - o
//! ```
//!
//! with `Rot(a) = [[cos a, -sin a], [sin a, cos a]]`. Partial derivatives:
//!
//! ```text
//! dr/dt     = I
//! dr/dalpha = Rot'(alpha) * s_i
//! dr/ds_i   = Rot(alpha)
//! ```

use nalgebra::{DVectorView, RealField, SVector};
use procrustes_core::{rotation_matrix, rotation_matrix_derivative, Mat2, Real, Vec2};

/// Generic rigid point residual for backend adapters.
///
/// Parameter blocks: `translation = [tx, ty]`, `rotation = [alpha]`,
/// `point = [sx, sy]`.
pub(crate) fn rigid_point_residual_generic<T: RealField>(
    translation: DVectorView<'_, T>,
    rotation: DVectorView<'_, T>,
    point: DVectorView<'_, T>,
    observed: [f64; 2],
) -> SVector<T, 2> {
    debug_assert_eq!(translation.len(), 2, "translation must have 2 params");
    debug_assert_eq!(rotation.len(), 1, "rotation must have 1 param");
    debug_assert_eq!(point.len(), 2, "reference point must have 2 params");

    let q = rotation_matrix(rotation[0].clone());
    let s = SVector::<T, 2>::new(point[0].clone(), point[1].clone());
    let t = SVector::<T, 2>::new(translation[0].clone(), translation[1].clone());
    let obs = SVector::<T, 2>::new(
        T::from_f64(observed[0]).unwrap(),
        T::from_f64(observed[1]).unwrap(),
    );

    q * s + t - obs
}

/// Rigid point residual at `f64` values.
pub fn rigid_point_residual(translation: Vec2, angle: Real, point: Vec2, observed: Vec2) -> Vec2 {
    rotation_matrix(angle) * point + translation - observed
}

/// Closed-form partial derivatives of the rigid point residual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidPointJacobian {
    /// `dr/dt`, always the identity.
    pub d_translation: Mat2,
    /// `dr/dalpha`.
    pub d_rotation: Vec2,
    /// `dr/ds`, the rotation matrix.
    pub d_point: Mat2,
}

/// Jacobian of the rigid point residual.
///
/// Independent of the translation and of the observation.
pub fn rigid_point_jacobian(angle: Real, point: Vec2) -> RigidPointJacobian {
    RigidPointJacobian {
        d_translation: Mat2::identity(),
        d_rotation: rotation_matrix_derivative(angle) * point,
        d_point: rotation_matrix(angle),
    }
}
