//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON
//! - handed to the report and plot layers without conversion

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::fit::FitOptions;
use crate::math::SolveStatus;
use crate::models::exchange_ratio;

/// One observed EXSY measurement.
///
/// `mixing_time` is in ms, so fitted rates come out in ms⁻¹.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub mixing_time: f64,
    /// Cross-peak over diagonal-peak intensity (I12/I11).
    pub ratio: f64,
    /// One-sigma error of `ratio`, when the input provides one.
    pub ratio_error: Option<f64>,
}

impl Sample {
    pub fn new(mixing_time: f64, ratio: f64, ratio_error: Option<f64>) -> Self {
        Self {
            mixing_time,
            ratio,
            ratio_error,
        }
    }
}

/// How per-sample errors enter the fit objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WeightMode {
    /// Weight by `1/σ²` when every sample has an error, unweighted when none
    /// has one. A mixture is rejected.
    Auto,
    /// Ignore errors for the fit (they are still drawn as error bars).
    Uniform,
}

/// Weighting actually applied after resolving `WeightMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    Unweighted,
    InverseVariance,
}

impl Weighting {
    pub fn display_name(self) -> &'static str {
        match self {
            Weighting::Unweighted => "unweighted",
            Weighting::InverseVariance => "1/σ² (per-sample errors)",
        }
    }
}

/// Goodness-of-fit summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub n: usize,
    /// Degrees of freedom (`n - 2`).
    pub dof: usize,
    /// Unweighted sum of squared residuals.
    pub sse: f64,
    pub rmse: f64,
    /// Weighted SSE divided by `dof` (NaN when `dof == 0`).
    pub reduced_chi2: f64,
}

/// Result of fitting the two-site exchange model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeFit {
    pub k_12: f64,
    pub k_21: f64,
    pub k_12_err: f64,
    pub k_21_err: f64,
    /// `k_12 / k_21`.
    pub k_ex: f64,
    pub k_ex_err: f64,
    /// Parameter covariance, ordered `(k_12, k_21)`.
    pub covariance: [[f64; 2]; 2],
    pub quality: FitQuality,
    pub weighting: Weighting,
    pub status: SolveStatus,
    pub iterations: usize,
    /// Observed mixing-time range.
    pub t_min: f64,
    pub t_max: f64,
}

impl ExchangeFit {
    /// Model ratio at mixing time `t` for the fitted rates.
    pub fn predict(&self, t: f64) -> f64 {
        exchange_ratio(t, self.k_12, self.k_21)
    }

    /// `n` evenly spaced `(t, ratio)` pairs over `[t_min, t_max]`.
    ///
    /// The first pair is at `t_min` and the last at exactly `t_max`.
    /// `n` is raised to 2 if smaller.
    pub fn curve_samples(&self, n: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
        let n = n.max(2);
        let last = n - 1;
        let span = self.t_max - self.t_min;
        (0..n).map(move |i| {
            let t = if i == last {
                self.t_max
            } else {
                self.t_min + span * (i as f64 / last as f64)
            };
            (t, self.predict(t))
        })
    }

    /// Correlation coefficient between `k_12` and `k_21`.
    pub fn correlation(&self) -> f64 {
        let denom = (self.covariance[0][0] * self.covariance[1][1]).sqrt();
        if denom > 0.0 {
            self.covariance[0][1] / denom
        } else {
            f64::NAN
        }
    }

    /// Rates are physical only when both are non-negative.
    pub fn is_physical(&self) -> bool {
        self.k_12 >= 0.0 && self.k_21 >= 0.0
    }
}

/// Fitted value and residual for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleResidual {
    pub sample: Sample,
    pub fitted: f64,
    pub residual: f64,
    /// Residual divided by the sample error, when the sample has one.
    pub normalized: Option<f64>,
}

/// Run configuration derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    /// Output path without extension; the plot goes to `<prefix>.pdf`.
    pub output_prefix: PathBuf,
    /// Raw `--style` value, resolved at the rendering boundary.
    pub style: Option<String>,
    pub fit: FitOptions,
    pub curve_points: usize,
    pub preview: bool,
    pub preview_width: usize,
    pub preview_height: usize,
    pub export: Option<PathBuf>,
}

impl RunConfig {
    pub fn plot_path(&self) -> PathBuf {
        // Append rather than `with_extension`: the prefix may itself contain dots.
        let mut path = self.output_prefix.clone().into_os_string();
        path.push(".pdf");
        PathBuf::from(path)
    }
}

/// JSON export of a run: samples, fit, and the fitted curve grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportFile {
    pub tool: String,
    pub version: String,
    pub input: PathBuf,
    pub samples: Vec<Sample>,
    pub fit: ExchangeFit,
    pub grid: CurveGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub mixing_time: Vec<f64>,
    pub ratio: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit_with(k_12: f64, k_21: f64, t_min: f64, t_max: f64) -> ExchangeFit {
        ExchangeFit {
            k_12,
            k_21,
            k_12_err: 0.0,
            k_21_err: 0.0,
            k_ex: k_12 / k_21,
            k_ex_err: 0.0,
            covariance: [[4.0, 1.0], [1.0, 1.0]],
            quality: FitQuality {
                n: 3,
                dof: 1,
                sse: 0.0,
                rmse: 0.0,
                reduced_chi2: 0.0,
            },
            weighting: Weighting::Unweighted,
            status: SolveStatus::ConvergedStep,
            iterations: 1,
            t_min,
            t_max,
        }
    }

    #[test]
    fn curve_samples_span_observed_range() {
        let fit = fit_with(0.04, 0.09, 2.0, 200.0);
        let curve: Vec<(f64, f64)> = fit.curve_samples(7).collect();
        assert_eq!(curve.len(), 7);
        assert_eq!(curve[0].0, 2.0);
        assert_eq!(curve[6].0, 200.0);
        assert!(curve.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn curve_samples_clamps_count() {
        let fit = fit_with(0.04, 0.09, 1.0, 3.0);
        let curve: Vec<(f64, f64)> = fit.curve_samples(0).collect();
        assert_eq!(curve, vec![(1.0, fit.predict(1.0)), (3.0, fit.predict(3.0))]);
    }

    #[test]
    fn correlation_and_physicality() {
        let fit = fit_with(0.04, 0.09, 1.0, 3.0);
        assert!((fit.correlation() - 0.5).abs() < 1e-12);
        assert!(fit.is_physical());
        assert!(!fit_with(-0.01, 0.09, 1.0, 3.0).is_physical());
    }

    #[test]
    fn plot_path_uses_pdf_extension() {
        let config = RunConfig {
            input: PathBuf::from("data.txt"),
            output_prefix: PathBuf::from("out/exsy"),
            style: None,
            fit: FitOptions::default(),
            curve_points: 500,
            preview: false,
            preview_width: 72,
            preview_height: 20,
            export: None,
        };
        assert_eq!(config.plot_path(), PathBuf::from("out/exsy.pdf"));
    }
}
