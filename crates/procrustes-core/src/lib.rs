//! Core math and shape primitives for `procrustes-rs`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt2`, `Mat2`, ...),
//! - planar rotation helpers that are generic over [`nalgebra::RealField`]
//!   so they can be evaluated with dual numbers,
//! - the observation-matrix layout shared by every estimator (`shape`),
//! - deterministic synthetic data generators (`synthetic`).
//!
//! Observation layout:
//! `Y[n] = (x0, y0, x1, y1, ..., x_{P-1}, y_{P-1})`, one row per frame.

/// Linear algebra type aliases and planar rotation helpers.
pub mod math;
/// Observation-matrix layout, validation and per-frame point views.
pub mod shape;
/// Deterministic synthetic shapes, rigid frames and noise.
pub mod synthetic;

pub use math::*;
pub use shape::*;
