//! The fit pipeline: ingest -> fit -> residuals.
//!
//! Rendering and printing stay in `app`; this module only computes.

use crate::domain::{ExchangeFit, RunConfig, SampleResidual};
use crate::error::AppError;
use crate::fit::ExchangeFitter;
use crate::io::ingest::{IngestedData, load_samples};

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub fit: ExchangeFit,
    pub residuals: Vec<SampleResidual>,
}

/// Execute the fitting pipeline and return the computed outputs.
pub fn run_fit(config: &RunConfig) -> Result<RunOutput, AppError> {
    let ingest = load_samples(&config.input)?;

    let fitter = ExchangeFitter::new(config.fit.clone());
    let fit = fitter.fit(&ingest.samples)?;
    tracing::info!(
        k_12 = fit.k_12,
        k_21 = fit.k_21,
        iterations = fit.iterations,
        status = fit.status.describe(),
        "fit complete"
    );

    let residuals = crate::report::compute_residuals(&ingest.samples, &fit)?;

    Ok(RunOutput {
        ingest,
        fit,
        residuals,
    })
}
