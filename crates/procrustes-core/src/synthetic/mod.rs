//! Deterministic synthetic data generation helpers.
//!
//! Small building blocks for constructing alignment problems with known
//! ground truth, used by tests across the workspace:
//! - reference shapes (`shapes::regular_polygon`, `shapes::star`),
//! - per-frame rigid motions (`shapes::RigidMotion2`, `shapes::motion_sweep`),
//! - observation matrices built as `Rot(theta_n) * S + t_n`,
//! - deterministic pseudo-random point noise (`noise::UniformPointNoise`).
//!
//! # Example
//!
//! ```
//! use procrustes_core::synthetic::{noise::UniformPointNoise, shapes};
//!
//! let reference = shapes::star(5, 1.0, 2.5);
//! let motions = shapes::motion_sweep(4, -0.2, 0.15, [3.0, -1.0], [0.5, 0.25]);
//! let y = shapes::observe(&reference, &motions, UniformPointNoise::default()).unwrap();
//! assert_eq!((y.nrows(), y.ncols()), (4, 20));
//! ```

pub mod noise;
pub mod shapes;
