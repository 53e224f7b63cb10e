//! Deterministic initial guess for `(k₁₂, k₂₁)`.
//!
//! The exchange model has two easy-to-read features:
//! - the initial slope `ratio'(0) = k₁₂`
//! - the plateau `ratio(∞) = k₁₂ / k₂₁`
//!
//! The heuristic reads both from the data, then a log-spaced grid around it is
//! scanned and the lowest-SSE candidate seeds Levenberg–Marquardt. The grid is
//! deterministic given the same inputs, so repeated runs start from the same
//! point.

use rayon::prelude::*;

use crate::domain::Sample;
use crate::models::exchange_ratio;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
///
/// Returns `None` unless `0 < min < max` (both finite) and `steps >= 2`.
pub fn log_space(min: f64, max: f64, steps: usize) -> Option<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > min) || steps < 2 {
        return None;
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Some(out)
}

/// Heuristic `(k₁₂, k₂₁)` read off the earliest sample and the plateau.
///
/// `samples` must be non-empty with positive mixing times.
pub fn heuristic_seed(samples: &[Sample]) -> (f64, f64) {
    let t_max = samples
        .iter()
        .map(|s| s.mixing_time)
        .fold(f64::NEG_INFINITY, f64::max);
    let fallback = if t_max.is_finite() && t_max > 0.0 { 1.0 / t_max } else { 1.0 };

    // Earliest sample; ties keep the first in input order.
    let mut earliest = &samples[0];
    for s in &samples[1..] {
        if s.mixing_time < earliest.mixing_time {
            earliest = s;
        }
    }

    let slope = earliest.ratio / earliest.mixing_time;
    let k_12 = if slope.is_finite() && slope > 0.0 { slope } else { fallback };

    let plateau = samples.iter().map(|s| s.ratio).fold(f64::NEG_INFINITY, f64::max);
    let k_21 = if plateau.is_finite() && plateau > 0.0 {
        k_12 / plateau
    } else {
        fallback
    };

    (k_12, k_21)
}

/// Candidate grid: the center itself, then `steps × steps` log-spaced points
/// spanning `[center / span, center · span]` on each axis.
///
/// The center comes first so the best candidate is never worse than the
/// heuristic seed, and wins ties against grid points.
pub fn seed_grid(center: (f64, f64), span: f64, steps: usize) -> Vec<[f64; 2]> {
    let span = span.max(1.0 + 1e-9);
    let (Some(k12s), Some(k21s)) = (
        log_space(center.0 / span, center.0 * span, steps),
        log_space(center.1 / span, center.1 * span, steps),
    ) else {
        return vec![[center.0, center.1]];
    };

    let mut out = Vec::with_capacity(steps * steps + 1);
    out.push([center.0, center.1]);
    for &k_12 in &k12s {
        for &k_21 in &k21s {
            out.push([k_12, k_21]);
        }
    }
    out
}

/// Weighted SSE of the model at `(k₁₂, k₂₁)`.
///
/// `inv_sigma` holds `1/σᵢ` per sample, or is `None` for an unweighted sum.
pub fn weighted_sse(samples: &[Sample], inv_sigma: Option<&[f64]>, k_12: f64, k_21: f64) -> f64 {
    samples
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let r = s.ratio - exchange_ratio(s.mixing_time, k_12, k_21);
            let w = inv_sigma.map_or(1.0, |inv| inv[i]);
            let rw = r * w;
            rw * rw
        })
        .sum()
}

/// Evaluate every grid candidate (parallel) and return the lowest-SSE one.
///
/// Ties are broken by grid index so the choice does not depend on thread
/// scheduling. Returns `None` when no candidate has a finite SSE.
pub fn best_seed(samples: &[Sample], inv_sigma: Option<&[f64]>, grid: &[[f64; 2]]) -> Option<[f64; 2]> {
    let scored: Vec<(usize, f64)> = grid
        .par_iter()
        .enumerate()
        .filter_map(|(idx, k)| {
            let sse = weighted_sse(samples, inv_sigma, k[0], k[1]);
            sse.is_finite().then_some((idx, sse))
        })
        .collect();

    let (first, rest) = scored.split_first()?;
    let mut best = *first;
    for &(idx, sse) in rest {
        if sse < best.1 || (sse == best.1 && idx < best.0) {
            best = (idx, sse);
        }
    }
    Some(grid[best.0])
}
