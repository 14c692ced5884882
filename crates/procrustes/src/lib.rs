//! Generalized Procrustes analysis of 2D point configurations.
//!
//! Aligns `N` observed shapes of `P` corresponding points by estimating one
//! rigid motion per shape and a shared reference shape, then maps every
//! observation into the reference frame.
//!
//! ```no_run
//! use procrustes::{GeneralizedProcrustesAnalyzer, core::ShapeMatrix};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut gpa = GeneralizedProcrustesAnalyzer::new();
//! gpa.set_mat(ShapeMatrix::from_row_slice(2, 6, &[
//!     0.0, 0.0, 2.0, 0.0, 1.0, 2.0,
//!     5.0, 5.0, 5.0, 7.0, 3.0, 6.0,
//! ]));
//! let fit = gpa.solve()?;
//! println!("rotations: {}", fit.rotations.transpose());
//! # Ok(())
//! # }
//! ```
//!
//! Closed contours (last point repeating the first) go through
//! [`contour::procrustes_analyze`].

pub mod analyzer;
pub mod contour;

pub use analyzer::{AnalyzerError, GeneralizedProcrustesAnalyzer, ProcrustesFit};
pub use contour::{procrustes_analyze, SplineNode};

/// Math aliases, shape layout helpers and synthetic data.
pub mod core {
    pub use procrustes_core::*;
}

/// Problem IR, solver backends and the rigid-motion estimator.
pub mod optim {
    pub use procrustes_optim::*;
}

/// Convenient re-exports for common use cases.
pub mod prelude {
    pub use crate::analyzer::{AnalyzerError, GeneralizedProcrustesAnalyzer, ProcrustesFit};
    pub use procrustes_core::{Pt2, Real, ShapeMatrix};
    pub use procrustes_optim::{
        estimate_rigid_motion, BackendKind, RigidMotionEstimator, RigidMotionSolveOptions,
    };
}
