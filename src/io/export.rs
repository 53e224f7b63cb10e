//! JSON export of a completed fit.
//!
//! The export is the portable record of a run:
//! - the samples as read
//! - the fitted rates, errors, covariance and diagnostics
//! - a precomputed curve grid for replotting elsewhere
//!
//! The schema is defined by `domain::ExportFile`.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::domain::{CurveGrid, ExchangeFit, ExportFile};
use crate::error::{AppError, EXIT_OUTPUT};
use crate::io::ingest::IngestedData;

/// Build the export record for a fit.
pub fn build_export(ingest: &IngestedData, fit: &ExchangeFit, curve_points: usize) -> ExportFile {
    let (mixing_time, ratio) = fit.curve_samples(curve_points).unzip();
    ExportFile {
        tool: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        input: ingest.source.clone(),
        samples: ingest.samples.clone(),
        fit: fit.clone(),
        grid: CurveGrid { mixing_time, ratio },
    }
}

/// Write the export record as pretty JSON.
pub fn write_fit_json(
    path: &Path,
    ingest: &IngestedData,
    fit: &ExchangeFit,
    curve_points: usize,
) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(
            EXIT_OUTPUT,
            format!("Failed to create export '{}': {e}", path.display()),
        )
    })?;

    let export = build_export(ingest, fit, curve_points);
    serde_json::to_writer_pretty(BufWriter::new(file), &export)
        .map_err(|e| AppError::new(EXIT_OUTPUT, format!("Failed to write export JSON: {e}")))?;

    tracing::info!(path = %path.display(), "wrote fit export");
    Ok(())
}
