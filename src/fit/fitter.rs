//! Exchange-rate fitting.
//!
//! Given samples `(tᵢ, yᵢ, σᵢ)` we minimize
//!
//! ```text
//! Σ wᵢ (yᵢ - ratio(tᵢ; k₁₂, k₂₁))²     wᵢ = 1/σᵢ² or 1
//! ```
//!
//! with Levenberg–Marquardt, starting from a deterministic seed
//! (see [`crate::fit::seed`]). The parameter covariance is `(JᵀWJ)⁻¹`, scaled
//! by the reduced chi-square unless absolute sigmas are requested, and
//! `K_ex = k₁₂/k₂₁` gets its error from the full covariance (the two rates are
//! fitted jointly and correlated).

use nalgebra::DMatrix;

use crate::domain::{ExchangeFit, FitQuality, Sample, WeightMode, Weighting};
use crate::error::FitError;
use crate::fit::seed::{best_seed, heuristic_seed, seed_grid};
use crate::math::{Problem, SolverOptions, gram_inverse, solve};
use crate::models::{exchange_gradient, exchange_ratio};

/// Number of free parameters (k₁₂, k₂₁).
pub const N_PARAMS: usize = 2;

/// Reciprocal condition number below which the covariance is declared singular.
const COVARIANCE_RCOND: f64 = 1e-12;

/// Options that affect how the model is fitted.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub weighting: WeightMode,
    /// Use `(JᵀWJ)⁻¹` as is instead of scaling it by the reduced chi-square.
    ///
    /// Only meaningful when the errors are true one-sigma values.
    pub absolute_sigma: bool,
    pub solver: SolverOptions,
    /// Seed grid resolution per axis.
    pub seed_steps: usize,
    /// Seed grid spans `[guess / span, guess · span]` per axis.
    pub seed_span: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            weighting: WeightMode::Auto,
            absolute_sigma: false,
            solver: SolverOptions::default(),
            seed_steps: 21,
            seed_span: 20.0,
        }
    }
}

/// Fits the two-site exchange model to a sample sequence.
#[derive(Debug, Clone, Default)]
pub struct ExchangeFitter {
    options: FitOptions,
}

impl ExchangeFitter {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    /// Fit `(k₁₂, k₂₁)` and derive `K_ex` with propagated errors.
    ///
    /// The result is a pure function of `samples` and the options.
    pub fn fit(&self, samples: &[Sample]) -> Result<ExchangeFit, FitError> {
        if samples.len() < N_PARAMS {
            return Err(FitError::InsufficientData {
                found: samples.len(),
                required: N_PARAMS,
            });
        }
        validate_samples(samples)?;
        let weighting = resolve_weighting(samples, self.options.weighting)?;

        let inv_sigma: Option<Vec<f64>> = match weighting {
            Weighting::InverseVariance => Some(
                samples
                    .iter()
                    .map(|s| s.ratio_error.map_or(1.0, |e| 1.0 / e))
                    .collect(),
            ),
            Weighting::Unweighted => None,
        };

        let center = heuristic_seed(samples);
        let grid = seed_grid(center, self.options.seed_span, self.options.seed_steps);
        let seed = best_seed(samples, inv_sigma.as_deref(), &grid).unwrap_or([center.0, center.1]);
        tracing::debug!(
            heuristic_k_12 = center.0,
            heuristic_k_21 = center.1,
            seed_k_12 = seed[0],
            seed_k_21 = seed[1],
            candidates = grid.len(),
            "seeded exchange fit"
        );

        let problem = ExchangeProblem {
            samples,
            inv_sigma: inv_sigma.as_deref(),
        };
        let mut x = seed;
        let stats = solve(&problem, &mut x, &self.options.solver);
        let [k_12, k_21] = x;
        tracing::debug!(
            status = ?stats.status,
            iterations = stats.iterations,
            cost = stats.cost,
            k_12,
            k_21,
            "levenberg-marquardt finished"
        );

        let fail = |reason: String| FitError::FitConvergence { k_12, k_21, reason };

        if !stats.status.is_converged() {
            return Err(fail(format!(
                "{} after {} iterations",
                stats.status.describe(),
                stats.iterations
            )));
        }
        if !(k_12.is_finite() && k_21.is_finite()) || k_21 == 0.0 {
            return Err(fail("non-finite or zero rate constants".to_string()));
        }

        let n = samples.len();
        let dof = n - N_PARAMS;
        let chi2 = 2.0 * stats.cost;
        let reduced_chi2 = if dof > 0 { chi2 / dof as f64 } else { f64::NAN };

        let mut jac = DMatrix::<f64>::zeros(n, N_PARAMS);
        problem.jacobian(&x, &mut jac);
        let gram_inv = gram_inverse(&jac, COVARIANCE_RCOND).map_err(|rcond| {
            fail(format!(
                "singular covariance matrix (rcond={rcond:.3e}); the data do not constrain both rates"
            ))
        })?;

        let scale = if self.options.absolute_sigma {
            1.0
        } else if dof > 0 {
            reduced_chi2
        } else {
            return Err(fail(
                "covariance undefined with zero degrees of freedom (use --absolute-sigma with per-sample errors)"
                    .to_string(),
            ));
        };

        let covariance = [
            [gram_inv[(0, 0)] * scale, gram_inv[(0, 1)] * scale],
            [gram_inv[(1, 0)] * scale, gram_inv[(1, 1)] * scale],
        ];
        if covariance.iter().flatten().any(|v| !v.is_finite()) {
            return Err(fail("non-finite covariance matrix".to_string()));
        }

        let k_ex = k_12 / k_21;
        let k_ex_err = ratio_error(k_12, k_21, &covariance);

        let sse: f64 = samples
            .iter()
            .map(|s| {
                let r = s.ratio - exchange_ratio(s.mixing_time, k_12, k_21);
                r * r
            })
            .sum();

        let (t_min, t_max) = time_range(samples);

        let fit = ExchangeFit {
            k_12,
            k_21,
            k_12_err: covariance[0][0].max(0.0).sqrt(),
            k_21_err: covariance[1][1].max(0.0).sqrt(),
            k_ex,
            k_ex_err,
            covariance,
            quality: FitQuality {
                n,
                dof,
                sse,
                rmse: (sse / n as f64).sqrt(),
                reduced_chi2,
            },
            weighting,
            status: stats.status,
            iterations: stats.iterations,
            t_min,
            t_max,
        };

        if !fit.is_physical() {
            tracing::warn!(k_12, k_21, "fitted rate constant is negative; the data may be poorly conditioned");
        }
        Ok(fit)
    }
}

/// Convenience wrapper: fit with the given options.
pub fn fit_exchange(samples: &[Sample], options: &FitOptions) -> Result<ExchangeFit, FitError> {
    ExchangeFitter::new(options.clone()).fit(samples)
}

/// First-order error of `K = k₁₂/k₂₁` using the full covariance:
///
/// ```text
/// var(K) = a² var₁₂ + b² var₂₁ + 2ab cov      a = 1/k₂₁, b = -k₁₂/k₂₁²
/// ```
pub fn ratio_error(k_12: f64, k_21: f64, covariance: &[[f64; 2]; 2]) -> f64 {
    let a = 1.0 / k_21;
    let b = -k_12 / (k_21 * k_21);
    let var = a * a * covariance[0][0] + b * b * covariance[1][1] + 2.0 * a * b * covariance[0][1];
    var.max(0.0).sqrt()
}

struct ExchangeProblem<'a> {
    samples: &'a [Sample],
    inv_sigma: Option<&'a [f64]>,
}

impl ExchangeProblem<'_> {
    fn weight(&self, i: usize) -> f64 {
        self.inv_sigma.map_or(1.0, |inv| inv[i])
    }
}

impl Problem for ExchangeProblem<'_> {
    fn n_residuals(&self) -> usize {
        self.samples.len()
    }

    fn n_params(&self) -> usize {
        N_PARAMS
    }

    fn residuals(&self, x: &[f64], out: &mut [f64]) {
        for (i, s) in self.samples.iter().enumerate() {
            out[i] = (exchange_ratio(s.mixing_time, x[0], x[1]) - s.ratio) * self.weight(i);
        }
    }

    fn jacobian(&self, x: &[f64], out: &mut DMatrix<f64>) {
        for (i, s) in self.samples.iter().enumerate() {
            let (g12, g21) = exchange_gradient(s.mixing_time, x[0], x[1]);
            let w = self.weight(i);
            out[(i, 0)] = g12 * w;
            out[(i, 1)] = g21 * w;
        }
    }
}

fn validate_samples(samples: &[Sample]) -> Result<(), FitError> {
    for (i, s) in samples.iter().enumerate() {
        let idx = i + 1;
        if !s.mixing_time.is_finite() || s.mixing_time <= 0.0 {
            return Err(FitError::InvalidInput(format!(
                "sample {idx}: mixing time must be positive and finite, got {}",
                s.mixing_time
            )));
        }
        if !s.ratio.is_finite() {
            return Err(FitError::InvalidInput(format!(
                "sample {idx}: intensity ratio must be finite, got {}",
                s.ratio
            )));
        }
        if let Some(err) = s.ratio_error {
            if !err.is_finite() || err <= 0.0 {
                return Err(FitError::InvalidInput(format!(
                    "sample {idx}: ratio error must be positive and finite, got {err}"
                )));
            }
        }
    }
    Ok(())
}

/// All-or-nothing weighting: a partial set of errors is rejected under `Auto`.
fn resolve_weighting(samples: &[Sample], mode: WeightMode) -> Result<Weighting, FitError> {
    match mode {
        WeightMode::Uniform => Ok(Weighting::Unweighted),
        WeightMode::Auto => {
            let missing = samples.iter().filter(|s| s.ratio_error.is_none()).count();
            if missing == 0 {
                Ok(Weighting::InverseVariance)
            } else if missing == samples.len() {
                Ok(Weighting::Unweighted)
            } else {
                Err(FitError::InconsistentWeighting {
                    missing,
                    total: samples.len(),
                })
            }
        }
    }
}

fn time_range(samples: &[Sample]) -> (f64, f64) {
    samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
        (lo.min(s.mixing_time), hi.max(s.mixing_time))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::SolveStatus;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    const TIMES: [f64; 11] = [2.0, 5.0, 10.0, 20.0, 30.0, 50.0, 75.0, 100.0, 125.0, 150.0, 200.0];

    fn exact_samples(k_12: f64, k_21: f64, error: Option<f64>) -> Vec<Sample> {
        TIMES
            .iter()
            .map(|&t| Sample::new(t, exchange_ratio(t, k_12, k_21), error))
            .collect()
    }

    fn rel_err(a: f64, b: f64) -> f64 {
        (a - b).abs() / b.abs()
    }

    #[test]
    fn recovers_exact_parameters_unweighted() {
        let samples = exact_samples(0.0405, 0.0905, None);
        let fit = ExchangeFitter::default().fit(&samples).unwrap();

        assert_eq!(fit.weighting, Weighting::Unweighted);
        assert!(fit.status.is_converged());
        assert!(rel_err(fit.k_12, 0.0405) < 1e-6, "k_12={}", fit.k_12);
        assert!(rel_err(fit.k_21, 0.0905) < 1e-6, "k_21={}", fit.k_21);
        assert!(fit.k_ex_err < 1e-9, "k_ex_err={}", fit.k_ex_err);
        assert!(fit.quality.sse < 1e-20);
    }

    #[test]
    fn recovers_exact_parameters_weighted() {
        let samples = exact_samples(0.25, 0.05, Some(0.01));
        let fit = ExchangeFitter::default().fit(&samples).unwrap();

        assert_eq!(fit.weighting, Weighting::InverseVariance);
        assert!(rel_err(fit.k_12, 0.25) < 1e-6, "k_12={}", fit.k_12);
        assert!(rel_err(fit.k_21, 0.05) < 1e-6, "k_21={}", fit.k_21);
        assert!(fit.k_ex_err < 1e-9);
    }

    #[test]
    fn k_ex_is_ratio_of_rates() {
        let samples = exact_samples(0.0405, 0.0905, None);
        let fit = ExchangeFitter::default().fit(&samples).unwrap();
        assert_eq!(fit.k_ex, fit.k_12 / fit.k_21);
    }

    #[test]
    fn fitting_twice_is_bit_identical() {
        let mut rng = StdRng::seed_from_u64(11);
        let noise = Normal::new(0.0, 0.01).unwrap();
        let samples: Vec<Sample> = exact_samples(0.04, 0.09, Some(0.01))
            .into_iter()
            .map(|s| Sample::new(s.mixing_time, s.ratio + noise.sample(&mut rng), s.ratio_error))
            .collect();

        let fitter = ExchangeFitter::default();
        let a = fitter.fit(&samples).unwrap();
        let b = fitter.fit(&samples).unwrap();
        assert_eq!(a.k_12.to_bits(), b.k_12.to_bits());
        assert_eq!(a.k_21.to_bits(), b.k_21.to_bits());
        assert_eq!(a.k_ex_err.to_bits(), b.k_ex_err.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn noisy_data_recovers_rates_within_errors() {
        let (k_12, k_21) = (0.04, 0.09);
        let sigma = 0.005;
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, sigma).unwrap();
        let samples: Vec<Sample> = (1..=40)
            .map(|i| {
                let t = i as f64 * 5.0;
                Sample::new(t, exchange_ratio(t, k_12, k_21) + noise.sample(&mut rng), Some(sigma))
            })
            .collect();

        let fit = ExchangeFitter::default().fit(&samples).unwrap();
        assert!(fit.k_12_err > 0.0 && fit.k_21_err > 0.0);
        assert!((fit.k_12 - k_12).abs() < 5.0 * fit.k_12_err, "{fit:?}");
        assert!((fit.k_21 - k_21).abs() < 5.0 * fit.k_21_err, "{fit:?}");
        assert!((fit.k_ex - k_12 / k_21).abs() < 5.0 * fit.k_ex_err, "{fit:?}");
        assert!(fit.quality.reduced_chi2 > 0.3 && fit.quality.reduced_chi2 < 3.0);
        assert!(fit.correlation().abs() <= 1.0);
    }

    #[test]
    fn ratio_error_uses_covariance() {
        let k_12 = 0.04;
        let k_21 = 0.08;
        let independent = [[1e-6, 0.0], [0.0, 1e-6]];
        let correlated = [[1e-6, 0.9e-6], [0.9e-6, 1e-6]];
        // Positive covariance between numerator and denominator shrinks the ratio error.
        assert!(ratio_error(k_12, k_21, &correlated) < ratio_error(k_12, k_21, &independent));

        let expected = (independent[0][0] / (k_21 * k_21)
            + independent[1][1] * (k_12 / (k_21 * k_21)).powi(2))
        .sqrt();
        assert!((ratio_error(k_12, k_21, &independent) - expected).abs() < 1e-15);
    }

    #[test]
    fn fewer_than_two_samples_is_insufficient() {
        let fitter = ExchangeFitter::default();
        assert_eq!(
            fitter.fit(&[]).unwrap_err(),
            FitError::InsufficientData { found: 0, required: 2 }
        );
        assert_eq!(
            fitter.fit(&[Sample::new(5.0, 0.1, None)]).unwrap_err(),
            FitError::InsufficientData { found: 1, required: 2 }
        );
    }

    #[test]
    fn non_positive_mixing_time_is_invalid() {
        let fitter = ExchangeFitter::default();
        for t in [0.0, -3.0] {
            let samples = vec![Sample::new(t, 0.0, None), Sample::new(10.0, 0.2, None)];
            assert!(matches!(fitter.fit(&samples), Err(FitError::InvalidInput(_))));
        }
    }

    #[test]
    fn non_positive_error_is_invalid() {
        let samples = vec![Sample::new(5.0, 0.1, Some(0.0)), Sample::new(10.0, 0.2, Some(0.01))];
        assert!(matches!(
            ExchangeFitter::default().fit(&samples),
            Err(FitError::InvalidInput(_))
        ));
    }

    #[test]
    fn mixed_errors_are_inconsistent() {
        let mut samples = exact_samples(0.04, 0.09, Some(0.01));
        samples[3].ratio_error = None;
        samples[7].ratio_error = None;
        assert_eq!(
            ExchangeFitter::default().fit(&samples).unwrap_err(),
            FitError::InconsistentWeighting { missing: 2, total: 11 }
        );
    }

    #[test]
    fn uniform_mode_ignores_partial_errors() {
        let mut samples = exact_samples(0.04, 0.09, Some(0.01));
        samples[3].ratio_error = None;
        let options = FitOptions {
            weighting: WeightMode::Uniform,
            ..FitOptions::default()
        };
        let fit = fit_exchange(&samples, &options).unwrap();
        assert_eq!(fit.weighting, Weighting::Unweighted);
        assert!(rel_err(fit.k_12, 0.04) < 1e-6);
    }

    #[test]
    fn exhausted_budget_is_a_convergence_error() {
        let mut rng = StdRng::seed_from_u64(3);
        let noise = Normal::new(0.0, 0.02).unwrap();
        let samples: Vec<Sample> = exact_samples(0.04, 0.09, None)
            .into_iter()
            .map(|s| Sample::new(s.mixing_time, s.ratio + noise.sample(&mut rng), None))
            .collect();
        let options = FitOptions {
            solver: SolverOptions {
                max_iters: 1,
                ..SolverOptions::default()
            },
            ..FitOptions::default()
        };

        match fit_exchange(&samples, &options) {
            Err(FitError::FitConvergence { k_12, k_21, reason }) => {
                assert!(k_12.is_finite() && k_21.is_finite());
                assert!(reason.contains(SolveStatus::MaxIterations.describe()), "{reason}");
            }
            other => panic!("expected convergence failure, got {other:?}"),
        }
    }

    #[test]
    fn single_mixing_time_gives_singular_covariance() {
        let samples = vec![
            Sample::new(10.0, 0.20, None),
            Sample::new(10.0, 0.25, None),
            Sample::new(10.0, 0.30, None),
        ];
        assert!(matches!(
            ExchangeFitter::default().fit(&samples),
            Err(FitError::FitConvergence { .. })
        ));
    }

    #[test]
    fn two_samples_need_absolute_sigma() {
        let samples = vec![
            Sample::new(10.0, exchange_ratio(10.0, 0.04, 0.09), Some(0.01)),
            Sample::new(100.0, exchange_ratio(100.0, 0.04, 0.09), Some(0.01)),
        ];
        assert!(matches!(
            ExchangeFitter::default().fit(&samples),
            Err(FitError::FitConvergence { .. })
        ));

        let options = FitOptions {
            absolute_sigma: true,
            ..FitOptions::default()
        };
        let fit = fit_exchange(&samples, &options).unwrap();
        assert_eq!(fit.quality.dof, 0);
        assert!(rel_err(fit.k_12, 0.04) < 1e-6, "k_12={}", fit.k_12);
        assert!(fit.k_12_err > 0.0);
    }
}
