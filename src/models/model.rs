//! Two-site chemical exchange model.
//!
//! For a mixing time `t` and rates `k₁₂`, `k₂₁` the cross/diagonal intensity
//! ratio is (eq. 3 of the SI to J. Phys. Chem. Lett. 2019, 10, 1514–1519):
//!
//! ```text
//! E(t)     = exp(-(k₁₂ + k₂₁) t)
//! ratio(t) = k₁₂ (1 - E) / (k₂₁ + k₁₂ E)
//! ```
//!
//! Limits: `ratio(0) = 0`, `ratio'(0) = k₁₂` and `ratio(∞) = k₁₂ / k₂₁`.
//!
//! Numerical notes:
//! - `1 - E` is computed as `-expm1(-x)` to avoid cancellation at short
//!   mixing times.
//! - Nothing here guards against `k₂₁ + k₁₂ E = 0`; callers treat non-finite
//!   values as a rejected parameter set.

/// Predicted intensity ratio at mixing time `t`.
pub fn exchange_ratio(t: f64, k_12: f64, k_21: f64) -> f64 {
    let x = (k_12 + k_21) * t;
    let e = (-x).exp();
    let one_minus_e = -(-x).exp_m1();
    k_12 * one_minus_e / (k_21 + k_12 * e)
}

/// Partial derivatives `(∂ratio/∂k₁₂, ∂ratio/∂k₂₁)` at mixing time `t`.
pub fn exchange_gradient(t: f64, k_12: f64, k_21: f64) -> (f64, f64) {
    let x = (k_12 + k_21) * t;
    let e = (-x).exp();
    let one_minus_e = -(-x).exp_m1();

    // ratio = N / D with dE/dk = -t E for both rates.
    let n = k_12 * one_minus_e;
    let d = k_21 + k_12 * e;
    let te = t * e;

    let dn_12 = one_minus_e + k_12 * te;
    let dn_21 = k_12 * te;
    let dd_12 = e - k_12 * te;
    let dd_21 = 1.0 - k_12 * te;

    let d2 = d * d;
    ((dn_12 * d - n * dd_12) / d2, (dn_21 * d - n * dd_21) / d2)
}
