//! Parameter block definitions.
//!
//! Parameter blocks are the variables being optimized. Each parameter type
//! provides its block dimensions, stable block names and conversion to/from
//! the `name -> DVector` maps that backends consume.
//!
//! # Available Parameters
//!
//! - [`rigid_motion::RigidMotionParams`] - per-frame translations and rotation
//!   angles plus the shared reference shape

pub mod rigid_motion;
