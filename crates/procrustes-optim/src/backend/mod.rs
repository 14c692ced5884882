//! Backend adapters that compile the IR into solver-specific problems.
//!
//! Backends translate the IR into solver-native problems, apply fixed masks,
//! run the solver and return a solved parameter map together with a small
//! summary the caller uses to decide whether the solution is usable.

mod dense;
mod lm_backend;
mod tiny_solver_backend;

use anyhow::{anyhow, ensure, Result};
use nalgebra::{DVector, DVectorView};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::factors::evaluate_factor;
use crate::ir::ProblemIR;

pub use lm_backend::LevenbergMarquardtBackend;
pub use tiny_solver_backend::TinySolverBackend;

/// Backend-agnostic solver options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSolveOptions {
    /// Maximum number of iterations for the optimizer.
    pub max_iters: usize,
    /// Verbosity level (backend-specific).
    pub verbosity: usize,
    /// Optional linear solver selection.
    pub linear_solver: Option<LinearSolverKind>,
    /// Absolute error decrease threshold for early termination.
    pub min_abs_decrease: Option<f64>,
    /// Relative error decrease threshold for early termination.
    pub min_rel_decrease: Option<f64>,
    /// Error threshold for early termination.
    pub min_error: Option<f64>,
}

impl Default for BackendSolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            verbosity: 0,
            linear_solver: Some(LinearSolverKind::SparseCholesky),
            min_abs_decrease: Some(1e-5),
            min_rel_decrease: Some(1e-5),
            min_error: Some(1e-10),
        }
    }
}

/// Linear solver selection (backend-agnostic).
///
/// Ignored by backends that only have a dense solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinearSolverKind {
    /// Sparse Cholesky decomposition.
    SparseCholesky,
    /// Sparse QR decomposition.
    SparseQR,
}

/// Solver output from a backend.
///
/// The `params` map uses the IR parameter block names. When `usable` is
/// `false` the map holds the initial values.
#[derive(Debug, Clone)]
pub struct BackendSolution {
    /// Optimized parameter vectors keyed by block name.
    pub params: HashMap<String, DVector<f64>>,
    /// `0.5 * ||r||^2` at the initial values.
    pub initial_cost: f64,
    /// `0.5 * ||r||^2` at the returned values.
    pub final_cost: f64,
    /// Iterations or function evaluations, if the backend reports them.
    pub iterations: Option<usize>,
    /// Whether a convergence criterion was met, if the backend reports it.
    pub converged: Option<bool>,
    /// Whether the returned parameters are numerically usable.
    pub usable: bool,
    /// Backend-specific termination description.
    pub termination: String,
}

/// Backend interface implemented by solver adapters.
pub trait OptimBackend {
    /// Solve a compiled IR with the provided initial parameters.
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution>;
}

/// Supported solver backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// tiny-solver Levenberg-Marquardt with automatic differentiation.
    ///
    /// Its optimizer stops on the first rejected step, so the adapter
    /// restarts it while the cost keeps dropping and reports convergence
    /// from a first-order optimality check.
    TinySolver,
    /// Dense MINPACK-style Levenberg-Marquardt with analytic Jacobians.
    #[default]
    LevenbergMarquardt,
}

/// Solve a problem using the selected backend.
///
/// This is the main backend-agnostic entry point used by problems.
pub fn solve_with_backend(
    backend: BackendKind,
    ir: &ProblemIR,
    initial: &HashMap<String, DVector<f64>>,
    opts: &BackendSolveOptions,
) -> Result<BackendSolution> {
    match backend {
        BackendKind::TinySolver => TinySolverBackend.solve(ir, initial, opts),
        BackendKind::LevenbergMarquardt => LevenbergMarquardtBackend.solve(ir, initial, opts),
    }
}

/// Collect parameter values in IR block order, checking dimensions.
pub(crate) fn gather_blocks(
    ir: &ProblemIR,
    values: &HashMap<String, DVector<f64>>,
) -> Result<Vec<DVector<f64>>> {
    ir.params
        .iter()
        .map(|param| {
            let v = values.get(&param.name).ok_or_else(|| {
                anyhow!(
                    "initial values missing parameter {} (id {:?})",
                    param.name,
                    param.id
                )
            })?;
            ensure!(
                v.len() == param.dim,
                "dimension mismatch for {}: expected {}, got {}",
                param.name,
                param.dim,
                v.len()
            );
            Ok(v.clone())
        })
        .collect()
}

/// Stack all residual blocks for parameter values given in IR block order.
pub(crate) fn stacked_residuals(ir: &ProblemIR, blocks: &[DVector<f64>]) -> DVector<f64> {
    let mut out = DVector::zeros(ir.num_residual_rows());
    let mut row = 0;
    for residual in &ir.residuals {
        let views: Vec<DVectorView<'_, f64>> = residual
            .params
            .iter()
            .map(|id| blocks[id.0].as_view())
            .collect();
        let r = evaluate_factor(&residual.factor, &views);
        out.rows_mut(row, residual.residual_dim).copy_from(&r);
        row += residual.residual_dim;
    }
    out
}

/// Evaluate the stacked residual vector of `ir` at named parameter values.
pub fn evaluate_residuals(
    ir: &ProblemIR,
    values: &HashMap<String, DVector<f64>>,
) -> Result<DVector<f64>> {
    let blocks = gather_blocks(ir, values)?;
    Ok(stacked_residuals(ir, &blocks))
}

/// Cost `0.5 * ||r||^2` of `ir` at named parameter values.
pub fn evaluate_cost(ir: &ProblemIR, values: &HashMap<String, DVector<f64>>) -> Result<f64> {
    Ok(0.5 * evaluate_residuals(ir, values)?.norm_squared())
}
