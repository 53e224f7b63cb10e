//! Reporting utilities: residuals and formatted terminal output.

use crate::domain::{ExchangeFit, Sample, SampleResidual};
use crate::error::{AppError, EXIT_FIT};

pub mod format;

pub use format::*;

/// Compute fitted values and residuals for each sample, in input order.
pub fn compute_residuals(samples: &[Sample], fit: &ExchangeFit) -> Result<Vec<SampleResidual>, AppError> {
    let mut out = Vec::with_capacity(samples.len());
    for s in samples {
        let fitted = fit.predict(s.mixing_time);
        if !fitted.is_finite() {
            return Err(AppError::new(
                EXIT_FIT,
                "Non-finite model prediction during residual computation.",
            ));
        }
        let residual = s.ratio - fitted;
        out.push(SampleResidual {
            sample: *s,
            fitted,
            residual,
            normalized: s.ratio_error.map(|e| residual / e),
        });
    }
    Ok(out)
}
