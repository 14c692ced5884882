//! Stateful generalized Procrustes analyzer.
//!
//! Wraps [`RigidMotionEstimator`](procrustes_optim::RigidMotionEstimator)
//! behind a set-input / solve / read-results workflow. After a successful
//! [`GeneralizedProcrustesAnalyzer::solve`] every accessor reads from the
//! same fitted estimator, so normalized shapes, rotations and translations
//! are always mutually consistent.

use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use procrustes_core::{PointSet, Real, ShapeError, ShapeMatrix};
use procrustes_optim::{
    estimate_rigid_motion, RigidMotionError, RigidMotionSolveOptions, SolveSummary,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("no input shapes set")]
    MissingInput,
    #[error("invalid input shapes: {0}")]
    Input(#[from] ShapeError),
    #[error("invalid contour: {0}")]
    Contour(String),
    #[error(transparent)]
    Estimation(#[from] RigidMotionError),
}

/// Results of one analysis, extracted from a fitted estimator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcrustesFit {
    /// Observations mapped into the reference frame, `N x D`.
    pub normalized_shapes: ShapeMatrix,
    /// Rotation angle per frame, radians.
    pub rotations: DVector<Real>,
    /// Translation per frame, `N x 2`.
    pub translations: DMatrix<Real>,
    /// Fitted reference shape, `2 x P`.
    pub reference_shape: PointSet,
    pub summary: SolveSummary,
}

#[derive(Debug, Clone, Default)]
pub struct GeneralizedProcrustesAnalyzer {
    input: Option<ShapeMatrix>,
    options: RigidMotionSolveOptions,
    fit: Option<ProcrustesFit>,
}

impl GeneralizedProcrustesAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RigidMotionSolveOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &RigidMotionSolveOptions {
        &self.options
    }

    /// Replace the solve options. Previous results are dropped.
    pub fn set_options(&mut self, options: RigidMotionSolveOptions) {
        self.options = options;
        self.fit = None;
    }

    /// Set the observation matrix (one frame per row). Previous results are dropped.
    pub fn set_mat(&mut self, y: ShapeMatrix) {
        self.input = Some(y);
        self.fit = None;
    }

    /// Set the observations from equally long rows of interleaved coordinates.
    pub fn set_rows(&mut self, rows: &[Vec<Real>]) -> Result<(), AnalyzerError> {
        let first = rows.first().ok_or(ShapeError::Empty)?;
        let dim = first.len();
        if dim % 2 != 0 {
            return Err(ShapeError::OddColumnCount(dim).into());
        }
        if let Some((frame, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
            return Err(ShapeError::PointCountMismatch {
                frame,
                expected: dim / 2,
                found: row.len() / 2,
            }
            .into());
        }
        let y = ShapeMatrix::from_fn(rows.len(), dim, |r, c| rows[r][c]);
        self.set_mat(y);
        Ok(())
    }

    pub fn input(&self) -> Option<&ShapeMatrix> {
        self.input.as_ref()
    }

    /// Fit the estimator to the current input and cache its results.
    pub fn solve(&mut self) -> Result<&ProcrustesFit, AnalyzerError> {
        let y = self.input.clone().ok_or(AnalyzerError::MissingInput)?;
        debug!(
            "procrustes analysis of {} shapes with {} coordinates",
            y.nrows(),
            y.ncols()
        );

        let fitted = estimate_rigid_motion(y, &self.options)?;
        let fit = ProcrustesFit {
            normalized_shapes: fitted.normalised_observations(),
            rotations: fitted.rotations().clone(),
            translations: fitted.translations().clone(),
            reference_shape: fitted.reference_shape().clone(),
            summary: fitted.summary().clone(),
        };
        info!(
            "procrustes analysis done, final cost {:.6e}",
            fit.summary.final_cost
        );

        Ok(self.fit.insert(fit))
    }

    /// Results of the last successful solve.
    pub fn fit(&self) -> Option<&ProcrustesFit> {
        self.fit.as_ref()
    }

    pub fn normalized_shapes(&self) -> Option<&ShapeMatrix> {
        self.fit.as_ref().map(|f| &f.normalized_shapes)
    }

    pub fn rotations(&self) -> Option<&DVector<Real>> {
        self.fit.as_ref().map(|f| &f.rotations)
    }

    pub fn translations(&self) -> Option<&DMatrix<Real>> {
        self.fit.as_ref().map(|f| &f.translations)
    }

    pub fn reference_shape(&self) -> Option<&PointSet> {
        self.fit.as_ref().map(|f| &f.reference_shape)
    }
}
