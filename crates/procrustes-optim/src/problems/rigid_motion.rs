//! Joint rigid-motion and reference-shape estimation (generalized Procrustes).
//!
//! Given `N` observed frames of `P` 2D points each, estimates per-frame
//! rotation angles `alpha_n`, per-frame translations `t_n` and one shared
//! reference shape `S` such that
//!
//! ```text
//! Y[n] ~ Rot(alpha_n) * S + t_n
//! ```
//!
//! in the least-squares sense. Every (frame, point) pair contributes one
//! 2D residual block; all translations, rotations and reference points are
//! refined jointly.
//!
//! The estimator is a typestate: [`RigidMotionEstimator<Initialized>`] holds
//! the seeded parameters, [`RigidMotionEstimator<Fitted>`] is only produced
//! by a usable solve and is the only state exposing normalized observations.
//!
//! ```no_run
//! use procrustes_optim::rigid_motion::{estimate_rigid_motion, RigidMotionSolveOptions};
//! use procrustes_core::ShapeMatrix;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let y = ShapeMatrix::from_row_slice(2, 6, &[
//!     0.0, 0.0, 1.0, 0.0, 0.0, 1.0,
//!     5.0, 5.0, 5.0, 6.0, 4.0, 5.0,
//! ]);
//! let fitted = estimate_rigid_motion(y, &RigidMotionSolveOptions::default())?;
//! let normalized = fitted.normalised_observations();
//! println!("{}", fitted.summary().brief_report());
//! # let _ = normalized;
//! # Ok(())
//! # }
//! ```

use crate::backend::{
    solve_with_backend, BackendKind, BackendSolution, BackendSolveOptions, LinearSolverKind,
};
use crate::ir::{FactorKind, FixedMask, ParamId, ProblemIR, ResidualBlock};
use crate::params::rigid_motion::{
    reference_key, rotation_key, translation_key, RigidMotionParams, POINT_DIM, ROTATION_DIM,
    TRANSLATION_DIM,
};
use anyhow::{ensure, Result};
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use procrustes_core::{
    centroid, frame_points, iso2_from_angle, rotation_matrix, set_frame_points, Iso2, Mat2,
    PointSet, Real, ShapeError, ShapeLayout, ShapeMatrix, Vec2,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by rigid-motion estimation.
#[derive(Debug, Error)]
pub enum RigidMotionError {
    /// The observation matrix violates a precondition. Nothing was computed.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ShapeError),
    /// Solver options are inconsistent. The solve was not started.
    #[error("invalid solver configuration: {0}")]
    InvalidConfiguration(String),
    /// The backend did not return a numerically usable solution.
    #[error("solver did not produce a usable solution: {0}")]
    SolverDivergence(String),
    /// The optimization problem could not be assembled or unpacked.
    #[error("rigid motion problem error: {0}")]
    Problem(anyhow::Error),
}

/// Solve options for rigid-motion estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidMotionSolveOptions {
    /// Solver backend.
    pub backend: BackendKind,
    /// Relative cost change below which the solve stops.
    pub function_tolerance: f64,
    /// Iteration cap. Reaching it is not a failure.
    pub max_iters: usize,
    /// Backend verbosity level.
    pub verbosity: usize,
    /// Sparse linear solver used by backends that support a choice.
    pub linear_solver: LinearSolverKind,
    /// Frames whose rotation and translation stay at their initial values.
    ///
    /// Empty by default: the problem keeps its global rotation/translation
    /// gauge freedom and the damped solver picks a solution.
    pub fix_frames: Vec<usize>,
}

impl Default for RigidMotionSolveOptions {
    fn default() -> Self {
        Self {
            backend: BackendKind::LevenbergMarquardt,
            function_tolerance: 1e-9,
            max_iters: 500,
            verbosity: 0,
            linear_solver: LinearSolverKind::SparseCholesky,
            fix_frames: Vec::new(),
        }
    }
}

/// Cost below which a fit is treated as exact.
const MIN_COST: f64 = 1e-24;

impl RigidMotionSolveOptions {
    /// Check the options against a problem with `num_frames` frames.
    pub fn validate(&self, num_frames: usize) -> Result<(), RigidMotionError> {
        if !self.function_tolerance.is_finite()
            || self.function_tolerance <= 0.0
            || self.function_tolerance >= 1.0
        {
            return Err(RigidMotionError::InvalidConfiguration(format!(
                "function_tolerance must be in (0, 1), got {}",
                self.function_tolerance
            )));
        }
        if self.max_iters == 0 {
            return Err(RigidMotionError::InvalidConfiguration(
                "max_iters must be positive".to_string(),
            ));
        }
        if let Some(&frame) = self.fix_frames.iter().find(|&&f| f >= num_frames) {
            return Err(RigidMotionError::InvalidConfiguration(format!(
                "fixed frame index {} out of range ({} frames)",
                frame, num_frames
            )));
        }
        Ok(())
    }

    /// Backend options implied by these settings.
    pub fn backend_options(&self) -> BackendSolveOptions {
        BackendSolveOptions {
            max_iters: self.max_iters,
            verbosity: self.verbosity,
            linear_solver: Some(self.linear_solver),
            min_abs_decrease: Some(MIN_COST),
            min_rel_decrease: Some(self.function_tolerance),
            min_error: Some(MIN_COST),
        }
    }
}

/// Outcome of a rigid-motion solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveSummary {
    pub backend: BackendKind,
    /// `0.5 * sum ||r||^2` before the solve.
    pub initial_cost: f64,
    /// `0.5 * sum ||r||^2` after the solve.
    pub final_cost: f64,
    pub iterations: Option<usize>,
    pub converged: Option<bool>,
    pub termination: String,
}

impl SolveSummary {
    /// One-line report of the solve.
    pub fn brief_report(&self) -> String {
        let iterations = self
            .iterations
            .map_or_else(|| "n/a".to_string(), |n| n.to_string());
        format!(
            "{:?}: initial cost {:.6e}, final cost {:.6e}, iterations {}, termination: {}",
            self.backend, self.initial_cost, self.final_cost, iterations, self.termination
        )
    }
}

/// Estimator state before a solve: parameters are seeded, not fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Initialized;

/// Estimator state after a usable solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Fitted {
    summary: SolveSummary,
}

/// Joint estimator of per-frame rigid motions and a shared reference shape.
#[derive(Debug, Clone)]
pub struct RigidMotionEstimator<S = Fitted> {
    y: ShapeMatrix,
    layout: ShapeLayout,
    params: RigidMotionParams,
    state: S,
}

/// Construct, initialize and solve in one call.
pub fn estimate_rigid_motion(
    y: ShapeMatrix,
    opts: &RigidMotionSolveOptions,
) -> Result<RigidMotionEstimator<Fitted>, RigidMotionError> {
    RigidMotionEstimator::new(y)?.solve(opts)
}

/// Seed parameters: zero rotation, per-frame centroid translation and the
/// mean of the centred frames as reference shape.
pub fn initial_rigid_motion_params(y: &ShapeMatrix, layout: &ShapeLayout) -> RigidMotionParams {
    let mut params = RigidMotionParams::zeros(layout.num_frames, layout.num_points);
    let mut sum = PointSet::zeros(layout.num_points);

    for n in 0..layout.num_frames {
        let points = frame_points(y, n);
        let c = centroid(&points);
        params.translations[(n, 0)] = c.x;
        params.translations[(n, 1)] = c.y;
        for (mut acc, p) in sum.column_iter_mut().zip(points.column_iter()) {
            acc += p - c;
        }
    }

    params.reference = sum / layout.num_frames as Real;
    params
}

/// Build the IR for joint rigid-motion estimation.
///
/// One residual block per (frame, point) pair, each depending on the frame's
/// translation, the frame's rotation and the matching reference point.
pub fn build_rigid_motion_ir(
    y: &ShapeMatrix,
    initial: &RigidMotionParams,
    opts: &RigidMotionSolveOptions,
) -> Result<(ProblemIR, HashMap<String, DVector<f64>>)> {
    let layout = ShapeLayout::from_matrix(y)?;
    initial.check_layout(&layout)?;
    for &frame in &opts.fix_frames {
        ensure!(
            frame < layout.num_frames,
            "fixed frame index {} out of range ({} frames)",
            frame,
            layout.num_frames
        );
    }

    let mut ir = ProblemIR::new();

    let mut frame_ids = Vec::with_capacity(layout.num_frames);
    for n in 0..layout.num_frames {
        let fixed = opts.fix_frames.contains(&n);
        let mask = |dim| {
            if fixed {
                FixedMask::all_fixed(dim)
            } else {
                FixedMask::all_free()
            }
        };
        let t = ir.add_param_block(translation_key(n), TRANSLATION_DIM, mask(TRANSLATION_DIM));
        let r = ir.add_param_block(rotation_key(n), ROTATION_DIM, mask(ROTATION_DIM));
        frame_ids.push((t, r));
    }

    let point_ids: Vec<ParamId> = (0..layout.num_points)
        .map(|i| ir.add_param_block(reference_key(i), POINT_DIM, FixedMask::all_free()))
        .collect();

    for (n, &(t, r)) in frame_ids.iter().enumerate() {
        for (i, &p) in point_ids.iter().enumerate() {
            ir.add_residual_block(ResidualBlock::new(
                vec![t, r, p],
                FactorKind::RigidPoint2 {
                    observed: [y[(n, 2 * i)], y[(n, 2 * i + 1)]],
                },
            ));
        }
    }

    ir.validate()?;
    Ok((ir, initial.to_param_map()))
}

impl RigidMotionEstimator<Initialized> {
    /// Validate `y` and seed the parameters.
    pub fn new(y: ShapeMatrix) -> Result<Self, RigidMotionError> {
        let layout = ShapeLayout::from_matrix(&y)?;
        let params = initial_rigid_motion_params(&y, &layout);
        Ok(Self {
            y,
            layout,
            params,
            state: Initialized,
        })
    }

    /// Validate `y` and start from caller-provided parameters.
    pub fn with_initial_params(
        y: ShapeMatrix,
        params: RigidMotionParams,
    ) -> Result<Self, RigidMotionError> {
        let layout = ShapeLayout::from_matrix(&y)?;
        params
            .check_layout(&layout)
            .map_err(RigidMotionError::Problem)?;
        Ok(Self {
            y,
            layout,
            params,
            state: Initialized,
        })
    }

    /// Refine all translations, rotations and reference points jointly.
    pub fn solve(
        self,
        opts: &RigidMotionSolveOptions,
    ) -> Result<RigidMotionEstimator<Fitted>, RigidMotionError> {
        opts.validate(self.layout.num_frames)?;

        let (ir, initial) = build_rigid_motion_ir(&self.y, &self.params, opts)
            .map_err(RigidMotionError::Problem)?;
        debug!(
            "rigid motion: {} frames x {} points, {} residual blocks, {} free params",
            self.layout.num_frames,
            self.layout.num_points,
            ir.residuals.len(),
            ir.num_free_params()
        );

        let solution = solve_with_backend(opts.backend, &ir, &initial, &opts.backend_options())
            .map_err(RigidMotionError::Problem)?;
        let solution = require_usable(solution)?;

        let params = RigidMotionParams::from_param_map(
            &solution.params,
            self.layout.num_frames,
            self.layout.num_points,
        )
        .map_err(RigidMotionError::Problem)?;

        let summary = SolveSummary {
            backend: opts.backend,
            initial_cost: solution.initial_cost,
            final_cost: solution.final_cost,
            iterations: solution.iterations,
            converged: solution.converged,
            termination: solution.termination,
        };
        info!("rigid motion solve: {}", summary.brief_report());
        if summary.converged == Some(false) {
            warn!(
                "rigid motion solve stopped before reaching tolerance {:e} ({})",
                opts.function_tolerance, summary.termination
            );
        }

        Ok(RigidMotionEstimator {
            y: self.y,
            layout: self.layout,
            params,
            state: Fitted { summary },
        })
    }
}

fn require_usable(solution: BackendSolution) -> Result<BackendSolution, RigidMotionError> {
    if solution.usable {
        Ok(solution)
    } else {
        Err(RigidMotionError::SolverDivergence(solution.termination))
    }
}

impl<S> RigidMotionEstimator<S> {
    /// The observation matrix `Y`.
    pub fn observations(&self) -> &ShapeMatrix {
        &self.y
    }

    pub fn layout(&self) -> ShapeLayout {
        self.layout
    }

    pub fn num_frames(&self) -> usize {
        self.layout.num_frames
    }

    pub fn num_points(&self) -> usize {
        self.layout.num_points
    }

    pub fn params(&self) -> &RigidMotionParams {
        &self.params
    }

    /// Translations, `N x 2`.
    pub fn translations(&self) -> &DMatrix<Real> {
        &self.params.translations
    }

    /// Rotation angles in radians, one per frame.
    pub fn rotations(&self) -> &DVector<Real> {
        &self.params.rotations
    }

    /// Reference shape, `2 x P`.
    pub fn reference_shape(&self) -> &PointSet {
        &self.params.reference
    }

    pub fn translation(&self, frame: usize) -> Vec2 {
        self.params.translation(frame)
    }

    pub fn rotation_matrix(&self, frame: usize) -> Mat2 {
        rotation_matrix(self.params.rotations[frame])
    }

    /// Rigid transform mapping reference coordinates into frame `frame`.
    pub fn frame_transform(&self, frame: usize) -> Iso2 {
        iso2_from_angle(self.params.rotations[frame], self.translation(frame))
    }

    /// Model prediction `Rot(alpha_n) * S + t_n` for every frame, in the layout of `Y`.
    pub fn reconstruct(&self) -> ShapeMatrix {
        let mut out = ShapeMatrix::zeros(self.layout.num_frames, self.layout.dim());
        for n in 0..self.layout.num_frames {
            let mut points = self.rotation_matrix(n) * &self.params.reference;
            let t = self.translation(n);
            for mut col in points.column_iter_mut() {
                col += t;
            }
            set_frame_points(&mut out, n, &points);
        }
        out
    }

    /// Per-coordinate residuals `reconstruct() - Y`.
    pub fn residuals(&self) -> ShapeMatrix {
        self.reconstruct() - &self.y
    }

    /// Plain sum of squared residual norms over all blocks.
    pub fn residual_sum_of_squares(&self) -> Real {
        self.residuals().norm_squared()
    }
}

impl RigidMotionEstimator<Fitted> {
    /// Map every observed frame back into the reference frame:
    /// `U[n] = Rot(alpha_n)^T * (Y[n] - t_n)`.
    ///
    /// A direct recomputation from the fitted state; repeated calls return
    /// identical results.
    pub fn normalised_observations(&self) -> ShapeMatrix {
        let mut u = ShapeMatrix::zeros(self.layout.num_frames, self.layout.dim());
        for n in 0..self.layout.num_frames {
            let mut points = frame_points(&self.y, n);
            let t = self.translation(n);
            for mut col in points.column_iter_mut() {
                col -= t;
            }
            let unrotated = self.rotation_matrix(n).transpose() * points;
            set_frame_points(&mut u, n, &unrotated);
        }
        u
    }

    /// Root-mean-square point residual of each frame.
    pub fn frame_rms_residuals(&self) -> DVector<Real> {
        let residuals = self.residuals();
        let num_points = self.layout.num_points as Real;
        DVector::from_fn(self.layout.num_frames, |n, _| {
            (residuals.row(n).norm_squared() / num_points).sqrt()
        })
    }

    pub fn summary(&self) -> &SolveSummary {
        &self.state.summary
    }

    /// Consume the estimator and keep only the fitted parameters.
    pub fn into_params(self) -> RigidMotionParams {
        self.params
    }
}
