//! Backend-agnostic optimization IR.
//!
//! Problems describe their parameter blocks and residual blocks here; backends
//! compile the IR into solver-native structures.

mod types;

pub use types::*;
