//! SVD-based least squares helpers.
//!
//! Two operations are needed by the fitter:
//!
//! ```text
//! minimize ‖A p - b‖²          (each damped Levenberg–Marquardt step)
//! (JᵀJ)⁻¹ = V Σ⁻² Vᵀ           (parameter covariance)
//! ```
//!
//! Both go through a thin SVD so that tall, nearly rank-deficient systems are
//! handled without forming the normal equations. (Nalgebra's `QR::solve` is
//! intended for square systems and will panic for non-square matrices.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-14, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Inverse of the Gram matrix `XᵀX`, computed from the SVD of `X`.
///
/// Fails with the reciprocal condition number `σ_min / σ_max` of `X` when it
/// is below `rcond` (the columns are numerically dependent).
pub fn gram_inverse(x: &DMatrix<f64>, rcond: f64) -> Result<DMatrix<f64>, f64> {
    let p = x.ncols();
    let svd = x.clone().svd(false, true);
    let Some(v_t) = svd.v_t.as_ref() else {
        return Err(0.0);
    };

    let sv = &svd.singular_values;
    let s_max = sv.iter().copied().fold(0.0, f64::max);
    let s_min = sv.iter().copied().fold(f64::INFINITY, f64::min);
    let ratio = if s_max > 0.0 { s_min / s_max } else { 0.0 };
    if sv.len() < p || !ratio.is_finite() || ratio < rcond {
        return Err(if ratio.is_finite() { ratio } else { 0.0 });
    }

    let mut out = DMatrix::<f64>::zeros(p, p);
    for i in 0..p {
        for j in 0..p {
            let mut sum = 0.0;
            for k in 0..sv.len() {
                sum += v_t[(k, i)] * v_t[(k, j)] / (sv[k] * sv[k]);
            }
            out[(i, j)] = sum;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn gram_inverse_matches_direct_inverse() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let direct = (x.transpose() * &x).try_inverse().unwrap();
        let via_svd = gram_inverse(&x, 1e-12).unwrap();
        for (a, b) in direct.iter().zip(via_svd.iter()) {
            assert!((a - b).abs() < 1e-12, "{a} vs {b}");
        }
    }

    #[test]
    fn gram_inverse_rejects_dependent_columns() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        let rcond = gram_inverse(&x, 1e-12).unwrap_err();
        assert!(rcond < 1e-12);
    }
}
