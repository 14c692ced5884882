//! Residual factor implementations.
//!
//! Factors compute the difference between a prediction built from parameter
//! blocks and a fixed measurement. Each factor has:
//!
//! - a generic residual over [`nalgebra::RealField`], so autodiff backends can
//!   evaluate it with dual numbers,
//! - a closed-form Jacobian per parameter block, for backends that take
//!   analytic derivatives.
//!
//! [`evaluate_factor`] and [`factor_jacobians`] dispatch on
//! [`FactorKind`](crate::ir::FactorKind) with `f64` parameters.
//!
//! # Available Factors
//!
//! - [`rigid_point`] - rotated and translated reference point vs. observation

pub mod rigid_point;

use crate::ir::FactorKind;
use nalgebra::{DMatrix, DVector, DVectorView};

/// Evaluate a factor's residual at `f64` parameter values.
pub fn evaluate_factor(factor: &FactorKind, params: &[DVectorView<'_, f64>]) -> DVector<f64> {
    match factor {
        FactorKind::RigidPoint2 { observed } => {
            debug_assert_eq!(params.len(), 3, "expected [translation, rotation, point]");
            let r = rigid_point::rigid_point_residual_generic(
                params[0], params[1], params[2], *observed,
            );
            DVector::from_column_slice(r.as_slice())
        }
    }
}

/// Jacobian of a factor's residual with respect to each parameter block.
///
/// Block `k` of the result has `residual_dim` rows and as many columns as
/// parameter block `k`.
pub fn factor_jacobians(
    factor: &FactorKind,
    params: &[DVectorView<'_, f64>],
) -> Vec<DMatrix<f64>> {
    match factor {
        FactorKind::RigidPoint2 { .. } => {
            debug_assert_eq!(params.len(), 3, "expected [translation, rotation, point]");
            let j = rigid_point::rigid_point_jacobian(
                params[1][0],
                nalgebra::Vector2::new(params[2][0], params[2][1]),
            );
            vec![
                DMatrix::from_column_slice(2, 2, j.d_translation.as_slice()),
                DMatrix::from_column_slice(2, 1, j.d_rotation.as_slice()),
                DMatrix::from_column_slice(2, 2, j.d_point.as_slice()),
            ]
        }
    }
}
