//! Input/output helpers.
//!
//! - text ingest + validation (`ingest`)
//! - JSON export of a fit (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
