//! Dense Levenberg–Marquardt solver for small nonlinear least squares problems.
//!
//! Minimizes `0.5 · ‖r(x)‖²` for a residual vector `r` with an analytic
//! Jacobian `J`. Each iteration solves the damped, column-scaled system
//!
//! ```text
//! [ J      ]       [ -r ]
//! [ √λ · D ] p  =  [  0 ]      D = diag(‖J_j‖)
//! ```
//!
//! by SVD least squares, accepts the step when the actual reduction is
//! positive, and adapts `λ` from the gain ratio `ρ`.
//!
//! Convergence tests (any one ends the solve):
//! - scaled gradient: `max_j |J_jᵀ r| / (‖J_j‖ ‖r‖) <= gtol`
//! - step size: `‖p‖ <= xtol · (‖x‖ + xtol)`
//! - cost: accepted reduction `<= ftol · cost`

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::math::solve_least_squares;

/// Nonlinear least squares problem with residuals r(x) and Jacobian J(x).
pub trait Problem {
    fn n_residuals(&self) -> usize;
    fn n_params(&self) -> usize;
    /// Fill residuals r(x).
    fn residuals(&self, x: &[f64], out: &mut [f64]);
    /// Fill the `n_residuals × n_params` Jacobian ∂r/∂x.
    fn jacobian(&self, x: &[f64], out: &mut DMatrix<f64>);
}

/// Options controlling the Levenberg–Marquardt solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub max_iters: usize,
    pub gtol: f64,
    pub xtol: f64,
    pub ftol: f64,
    /// Initial damping parameter.
    pub lambda_init: f64,
    pub lambda_min: f64,
    pub lambda_max: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iters: 200,
            gtol: 1e-10,
            xtol: 1e-12,
            ftol: 1e-14,
            lambda_init: 1e-3,
            lambda_min: 1e-12,
            lambda_max: 1e16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    ConvergedGradient,
    ConvergedStep,
    ConvergedCost,
    MaxIterations,
    NumericalFailure,
}

impl SolveStatus {
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            SolveStatus::ConvergedGradient | SolveStatus::ConvergedStep | SolveStatus::ConvergedCost
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            SolveStatus::ConvergedGradient => "converged (gradient)",
            SolveStatus::ConvergedStep => "converged (step size)",
            SolveStatus::ConvergedCost => "converged (cost reduction)",
            SolveStatus::MaxIterations => "iteration budget exhausted",
            SolveStatus::NumericalFailure => "non-finite residuals or Jacobian",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolverStats {
    pub status: SolveStatus,
    pub iterations: usize,
    /// Final `0.5 · ‖r‖²`.
    pub cost: f64,
    pub grad_scaled: f64,
    pub step_norm: f64,
    pub lambda: f64,
}

/// Solve for `x` in place. `x` holds the initial guess on entry and the last
/// accepted iterate on return, whatever the status.
pub fn solve(problem: &impl Problem, x: &mut [f64], options: &SolverOptions) -> SolverStats {
    let m = problem.n_residuals();
    let n = problem.n_params();
    debug_assert_eq!(x.len(), n);

    let mut lambda = clamp_lambda(options.lambda_init, options);
    let mut r = DVector::<f64>::zeros(m);
    let mut r_trial = DVector::<f64>::zeros(m);
    let mut jac = DMatrix::<f64>::zeros(m, n);
    let mut x_trial = vec![0.0; n];

    problem.residuals(x, r.as_mut_slice());
    let mut cost = 0.5 * r.norm_squared();
    let mut stats = SolverStats {
        status: SolveStatus::NumericalFailure,
        iterations: 0,
        cost,
        grad_scaled: f64::INFINITY,
        step_norm: f64::INFINITY,
        lambda,
    };
    if !cost.is_finite() {
        return stats;
    }
    problem.jacobian(x, &mut jac);

    for iter in 0..options.max_iters {
        stats.iterations = iter;
        stats.cost = cost;
        stats.lambda = lambda;

        if jac.iter().any(|v| !v.is_finite()) {
            stats.status = SolveStatus::NumericalFailure;
            return stats;
        }

        let grad = jac.tr_mul(&r);
        let col_norms: Vec<f64> = (0..n).map(|j| jac.column(j).norm()).collect();
        let grad_scaled = scaled_gradient(&grad, &col_norms, r.norm());
        stats.grad_scaled = grad_scaled;
        if grad_scaled <= options.gtol {
            stats.status = SolveStatus::ConvergedGradient;
            return stats;
        }

        // Damped system [J; √λ D] p = [-r; 0].
        let mut a = DMatrix::<f64>::zeros(m + n, n);
        a.view_mut((0, 0), (m, n)).copy_from(&jac);
        let sqrt_lambda = lambda.sqrt();
        for j in 0..n {
            a[(m + j, j)] = sqrt_lambda * col_norms[j].max(f64::EPSILON);
        }
        let mut rhs = DVector::<f64>::zeros(m + n);
        for i in 0..m {
            rhs[i] = -r[i];
        }

        let Some(step) = solve_least_squares(&a, &rhs) else {
            if lambda >= options.lambda_max {
                stats.status = SolveStatus::NumericalFailure;
                return stats;
            }
            lambda = clamp_lambda(lambda * 2.0, options);
            continue;
        };

        let step_norm = step.norm();
        stats.step_norm = step_norm;
        let x_norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        if step_norm <= options.xtol * (x_norm + options.xtol) {
            stats.status = SolveStatus::ConvergedStep;
            return stats;
        }

        // Predicted reduction from the linear model, actual from the trial point.
        let linear = &r + &jac * &step;
        let predicted = cost - 0.5 * linear.norm_squared();

        for j in 0..n {
            x_trial[j] = x[j] + step[j];
        }
        problem.residuals(&x_trial, r_trial.as_mut_slice());
        let trial_cost = 0.5 * r_trial.norm_squared();
        let actual = cost - trial_cost;

        let rho = if predicted > 0.0 && actual.is_finite() {
            actual / predicted
        } else {
            0.0
        };
        let accepted = trial_cost.is_finite() && rho > 0.0;

        tracing::trace!(iter, cost, trial_cost, rho, lambda, step_norm, grad_scaled, accepted, "lm iteration");

        if accepted {
            x.copy_from_slice(&x_trial);
            std::mem::swap(&mut r, &mut r_trial);
            let previous = cost;
            cost = trial_cost;
            lambda = clamp_lambda(update_lambda(lambda, rho), options);
            problem.jacobian(x, &mut jac);

            if cost == 0.0 || actual <= options.ftol * previous {
                stats.status = SolveStatus::ConvergedCost;
                stats.iterations = iter + 1;
                stats.cost = cost;
                stats.lambda = lambda;
                return stats;
            }
        } else {
            lambda = clamp_lambda(lambda * 2.0, options);
        }
    }

    stats.status = SolveStatus::MaxIterations;
    stats.iterations = options.max_iters;
    stats.cost = cost;
    stats.lambda = lambda;
    stats
}

fn scaled_gradient(grad: &DVector<f64>, col_norms: &[f64], r_norm: f64) -> f64 {
    if r_norm == 0.0 {
        return 0.0;
    }
    let mut max = 0.0_f64;
    for (g, &norm) in grad.iter().zip(col_norms) {
        if norm > 0.0 {
            max = max.max((g / (norm * r_norm)).abs());
        }
    }
    max
}

fn clamp_lambda(lambda: f64, options: &SolverOptions) -> f64 {
    lambda
        .max(options.lambda_min)
        .min(options.lambda_max)
        .max(f64::MIN_POSITIVE)
}

fn update_lambda(lambda: f64, rho: f64) -> f64 {
    if rho > 0.0 {
        let t = 1.0 - (2.0 * rho - 1.0).powi(3);
        lambda * t.max(1.0 / 3.0)
    } else {
        lambda * 2.0
    }
}
