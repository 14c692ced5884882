use nalgebra::{DMatrix, DVector};
use procrustes_core::Real;

/// Non-linear least squares problem over a dense parameter vector.
///
/// Implemented by backends that hand a dense residual/Jacobian pair to a
/// general-purpose solver.
pub trait NllsProblem {
    /// Number of parameters in the optimization vector.
    fn num_params(&self) -> usize;
    /// Number of residual rows in the problem.
    fn num_residuals(&self) -> usize;

    /// Residuals for the current parameters.
    fn residuals(&self, x: &DVector<Real>) -> DVector<Real>;
    /// Jacobian of [`NllsProblem::residuals`], `num_residuals x num_params`.
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real>;
}
