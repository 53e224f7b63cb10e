//! Exchange-rate fitting.
//!
//! Responsibilities:
//!
//! - deterministic seeding (heuristic + log-spaced grid, evaluated in parallel)
//! - Levenberg–Marquardt refinement of `(k₁₂, k₂₁)`
//! - covariance, standard errors and `K_ex` error propagation

pub mod fitter;
pub mod seed;

pub use fitter::*;
pub use seed::*;
