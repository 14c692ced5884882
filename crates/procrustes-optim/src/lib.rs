//! Non-linear least-squares estimation of shared shapes under per-frame rigid motion.
//!
//! Problems are described in a backend-agnostic IR ([`ir`]) of parameter and
//! residual blocks, then compiled and solved by one of the backends in
//! [`backend`]:
//!
//! - [`backend::LevenbergMarquardtBackend`]: dense MINPACK-style
//!   Levenberg-Marquardt using the analytic factor Jacobians (default).
//! - [`backend::TinySolverBackend`]: sparse Levenberg-Marquardt with automatic
//!   differentiation, restarted after each early stop.
//!
//! The main entry point is [`rigid_motion::RigidMotionEstimator`].

pub mod backend;
pub mod factors;
pub mod ir;
pub mod params;
pub mod problems;
pub mod traits;

pub use crate::backend::{BackendKind, BackendSolveOptions, LinearSolverKind};
pub use crate::params::rigid_motion::RigidMotionParams;
pub use crate::problems::rigid_motion;
pub use crate::problems::rigid_motion::{
    estimate_rigid_motion, Fitted, Initialized, RigidMotionError, RigidMotionEstimator,
    RigidMotionSolveOptions, SolveSummary,
};
