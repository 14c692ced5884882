use crate::backend::dense::DenseProblem;
use crate::backend::{BackendSolution, BackendSolveOptions, OptimBackend};
use crate::ir::ProblemIR;
use crate::traits::NllsProblem;
use anyhow::Result;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use log::debug;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use procrustes_core::Real;
use std::collections::HashMap;

const DEFAULT_FTOL: Real = 1e-10;
const GTOL: Real = 1e-15;

/// Dense Levenberg-Marquardt backend (MINPACK port) with analytic Jacobians.
///
/// Fixed parameter indices are removed from the optimization vector and keep
/// their initial values. `linear_solver` and `min_error` are ignored.
#[derive(Debug, Clone, Copy)]
pub struct LevenbergMarquardtBackend;

struct LmWrapper<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<Real>,
}

impl<P: NllsProblem> LeastSquaresProblem<Real, Dyn, Dyn> for LmWrapper<'_, P> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        Some(self.problem.residuals(&self.params))
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        Some(self.problem.jacobian(&self.params))
    }
}

/// Whether the parameters left by a run with this termination can be used.
///
/// Running out of evaluations keeps the best parameters found so far.
fn termination_is_usable(termination: &TerminationReason) -> bool {
    termination.was_successful() || matches!(termination, TerminationReason::LostPatience)
}

impl OptimBackend for LevenbergMarquardtBackend {
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<Real>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution> {
        let dense = DenseProblem::new(ir, initial)?;
        let x0 = dense.x0();
        let initial_cost = 0.5 * dense.residuals(&x0).norm_squared();
        debug!(
            "levenberg-marquardt: {} free params, {} residual rows, initial cost {:.6e}",
            dense.num_params(),
            dense.num_residuals(),
            initial_cost
        );

        let ftol = opts.min_rel_decrease.unwrap_or(DEFAULT_FTOL);
        let lm = LevenbergMarquardt::new()
            .with_ftol(ftol)
            .with_xtol(ftol)
            .with_gtol(GTOL)
            .with_patience(opts.max_iters.max(1));

        let (wrapper, report) = lm.minimize(LmWrapper {
            problem: &dense,
            params: x0,
        });

        let solved_cost = 0.5 * dense.residuals(&wrapper.params).norm_squared();
        let usable = termination_is_usable(&report.termination) && solved_cost.is_finite();
        let (params, final_cost) = if usable {
            (dense.param_map(&wrapper.params), solved_cost)
        } else {
            (initial.clone(), initial_cost)
        };

        Ok(BackendSolution {
            params,
            initial_cost,
            final_cost,
            iterations: Some(report.number_of_evaluations),
            converged: Some(report.termination.was_successful()),
            usable,
            termination: format!("{:?}", report.termination),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dense::tests::single_point_ir;
    use crate::ir::FixedMask;
    use procrustes_core::{rotation_matrix, Vec2};

    #[test]
    fn usable_terminations() {
        assert!(termination_is_usable(&TerminationReason::ResidualsZero));
        assert!(termination_is_usable(&TerminationReason::Converged {
            ftol: true,
            xtol: false
        }));
        assert!(termination_is_usable(&TerminationReason::LostPatience));

        assert!(!termination_is_usable(&TerminationReason::NoParameters));
        assert!(!termination_is_usable(&TerminationReason::Numerical(
            "jacobian"
        )));
    }

    #[test]
    fn solves_translation_with_fixed_point() {
        let (ir, initial) = single_point_ir(true, true);
        let solution = LevenbergMarquardtBackend
            .solve(&ir, &initial, &BackendSolveOptions::default())
            .unwrap();
        assert!(solution.usable, "termination: {}", solution.termination);
        assert_eq!(solution.converged, Some(true));
        assert!(solution.final_cost < 1e-16);

        // Fixed blocks come back untouched.
        assert_eq!(solution.params["a"][0], 0.3);
        assert_eq!(solution.params["s"].as_slice(), &[1.0, 0.0]);

        let expected = Vec2::new(2.0, 3.0) - rotation_matrix(0.3) * Vec2::new(1.0, 0.0);
        let t = &solution.params["t"];
        assert!((t[0] - expected.x).abs() < 1e-8 && (t[1] - expected.y).abs() < 1e-8);
    }

    #[test]
    fn exhausted_evaluations_stay_usable_but_unconverged() {
        // Only the rotation is free and (2, 3) is off the unit circle, so the
        // minimum has a non-zero residual and needs several evaluations.
        let (mut ir, initial) = single_point_ir(false, true);
        ir.params[0].fixed = FixedMask::all_fixed(2);
        let opts = BackendSolveOptions {
            max_iters: 1,
            min_rel_decrease: Some(1e-15),
            ..Default::default()
        };
        let solution = LevenbergMarquardtBackend.solve(&ir, &initial, &opts).unwrap();

        assert_eq!(solution.termination, "LostPatience");
        assert!(solution.usable);
        assert_eq!(solution.converged, Some(false));
        assert!(solution.final_cost.is_finite());
        assert_eq!(solution.params["t"].as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn nothing_to_optimize_is_not_usable() {
        let (mut ir, initial) = single_point_ir(true, true);
        ir.params[0].fixed = FixedMask::all_fixed(2);
        let solution = LevenbergMarquardtBackend
            .solve(&ir, &initial, &BackendSolveOptions::default())
            .unwrap();

        assert!(!solution.usable);
        assert_eq!(solution.converged, Some(false));
        assert_eq!(solution.params, initial);
        assert_eq!(solution.final_cost, solution.initial_cost);
    }
}
