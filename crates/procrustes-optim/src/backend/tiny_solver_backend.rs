use crate::backend::dense::DenseProblem;
use crate::backend::{
    evaluate_cost, gather_blocks, BackendSolution, BackendSolveOptions, LinearSolverKind,
    OptimBackend,
};
use crate::factors::rigid_point::rigid_point_residual_generic;
use crate::ir::{FactorKind, ProblemIR, ResidualBlock};
use anyhow::Result;
use log::debug;
use nalgebra::DVector;
use std::collections::HashMap;
use tiny_solver::factors::Factor;
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::{linear::sparse::LinearSolverType, LevenbergMarquardtOptimizer};

/// tiny-solver backend adapter.
///
/// Residuals are differentiated automatically with dual numbers.
#[derive(Debug, Clone, Copy)]
pub struct TinySolverBackend;

impl TinySolverBackend {
    fn compile(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
    ) -> Result<(Problem, HashMap<String, DVector<f64>>)> {
        ir.validate()?;
        // Checks presence and dimension of every block.
        gather_blocks(ir, initial)?;

        let mut problem = Problem::new();

        for param in &ir.params {
            for idx in param.fixed.iter() {
                problem.fix_variable(&param.name, idx);
            }
        }

        for residual in &ir.residuals {
            let factor = compile_factor(residual);
            let param_names: Vec<String> = residual
                .params
                .iter()
                .map(|id| ir.params[id.0].name.clone())
                .collect();
            let param_refs: Vec<&str> = param_names.iter().map(|s| s.as_str()).collect();
            problem.add_residual_block(residual.residual_dim, &param_refs, factor, None);
        }

        Ok((problem, initial.clone()))
    }
}

/// Upper bound on optimizer runs per solve.
const MAX_RUNS: usize = 20;
/// Relative decrease below which another run is not attempted.
const DEFAULT_REL_DECREASE: f64 = 1e-10;

impl OptimBackend for TinySolverBackend {
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution> {
        let (problem, initial_map) = self.compile(ir, initial)?;
        let initial_cost = evaluate_cost(ir, &initial_map)?;
        debug!(
            "tiny-solver: {} param blocks, {} residual blocks, initial cost {:.6e}",
            ir.params.len(),
            ir.residuals.len(),
            initial_cost
        );

        let optimizer = LevenbergMarquardtOptimizer::default();
        let rel_decrease = opts.min_rel_decrease.unwrap_or(DEFAULT_REL_DECREASE);
        let min_error = opts.min_error.unwrap_or(0.0);

        // A run ends on its first rejected step, which may be far from the
        // minimum. Restart from the last accepted point while the cost drops.
        let mut params = initial_map;
        let mut cost = initial_cost;
        let mut runs = 0;
        while runs < MAX_RUNS {
            let options = to_optimizer_options(opts);
            let Some(solution) = optimizer.optimize(&problem, &params, Some(options)) else {
                if runs == 0 {
                    return Ok(BackendSolution {
                        params,
                        initial_cost,
                        final_cost: initial_cost,
                        iterations: None,
                        converged: None,
                        usable: false,
                        termination: "tiny-solver failed to converge".to_string(),
                    });
                }
                break;
            };
            runs += 1;

            let mut candidate = params.clone();
            candidate.extend(solution);
            let candidate_cost = evaluate_cost(ir, &candidate)?;
            if !candidate_cost.is_finite() || candidate_cost >= cost {
                break;
            }
            let decrease = cost - candidate_cost;
            params = candidate;
            cost = candidate_cost;
            debug!("tiny-solver run {}: cost {:.6e}", runs, cost);
            if cost <= min_error || decrease <= rel_decrease * (cost + decrease) {
                break;
            }
        }

        let gradient = DenseProblem::new(ir, &params)?.gradient_norm_inf();
        let converged =
            cost <= min_error || gradient <= rel_decrease.sqrt() * (1.0 + (2.0 * cost).sqrt());

        Ok(BackendSolution {
            params,
            initial_cost,
            final_cost: cost,
            iterations: None,
            converged: Some(converged),
            usable: cost.is_finite(),
            termination: format!(
                "tiny-solver: {} run(s), gradient max-norm {:.3e}",
                runs, gradient
            ),
        })
    }
}

/// Map backend options onto tiny-solver's.
///
/// tiny-solver compares the error before and after every iteration, including
/// iterations whose step was rejected. The absolute and relative decrease
/// thresholds therefore also stop a run on its first rejected step.
fn to_optimizer_options(opts: &BackendSolveOptions) -> OptimizerOptions {
    let mut options = OptimizerOptions {
        max_iteration: opts.max_iters,
        verbosity_level: opts.verbosity,
        ..OptimizerOptions::default()
    };
    if let Some(solver) = opts.linear_solver {
        options.linear_solver_type = match solver {
            LinearSolverKind::SparseCholesky => LinearSolverType::SparseCholesky,
            LinearSolverKind::SparseQR => LinearSolverType::SparseQR,
        };
    }
    if let Some(v) = opts.min_abs_decrease {
        options.min_abs_error_decrease_threshold = v;
    }
    if let Some(v) = opts.min_rel_decrease {
        options.min_rel_error_decrease_threshold = v;
    }
    if let Some(v) = opts.min_error {
        options.min_error_threshold = v;
    }
    options
}

type CompiledFactor = Box<dyn tiny_solver::factors::FactorImpl + Send>;

fn compile_factor(residual: &ResidualBlock) -> CompiledFactor {
    match &residual.factor {
        FactorKind::RigidPoint2 { observed } => Box::new(TinyRigidPointFactor {
            observed: *observed,
        }),
    }
}

#[derive(Debug, Clone)]
struct TinyRigidPointFactor {
    observed: [f64; 2],
}

impl<T: nalgebra::RealField> Factor<T> for TinyRigidPointFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        debug_assert_eq!(
            params.len(),
            3,
            "expected [translation, rotation, point] parameter blocks"
        );
        let r = rigid_point_residual_generic(
            params[0].as_view(),
            params[1].as_view(),
            params[2].as_view(),
            self.observed,
        );
        DVector::from_row_slice(r.as_slice())
    }
}
