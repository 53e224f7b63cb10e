//! Kinetic model implementations.
//!
//! The model is a pair of small, pure functions (value and gradient) so the
//! solver and the plotting code can share them.

pub mod model;

pub use model::*;
