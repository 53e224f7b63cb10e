//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observed samples (`Sample`) and weighting modes
//! - fit outputs (`ExchangeFit`, `FitQuality`, `SampleResidual`)
//! - run configuration and the JSON export schema

pub mod types;

pub use types::*;
