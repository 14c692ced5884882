//! Problem builders and typed estimators on top of the IR.

pub mod rigid_motion;
