//! Formatted terminal output.
//!
//! Formatting lives in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{ExchangeFit, RunConfig, SampleResidual, Weighting};
use crate::io::ingest::IngestedData;

/// Format the run summary: dataset stats, fit diagnostics and the fitted rates.
pub fn format_run_summary(ingest: &IngestedData, fit: &ExchangeFit, config: &RunConfig) -> String {
    let stats = &ingest.stats;
    let q = &fit.quality;
    let mut out = String::new();

    out.push_str("=== eaxy - EXSY two-site exchange fit ===\n");
    out.push_str(&format!(
        "Input: {} ({} lines)\n",
        ingest.source.display(),
        ingest.lines_read
    ));
    out.push_str(&format!(
        "Samples: n={} (with error: {}) | t=[{}, {}] ms | I12/I11=[{:.4}, {:.4}]\n",
        stats.n_samples,
        stats.n_with_error,
        fmt_num(stats.t_min),
        fmt_num(stats.t_max),
        stats.ratio_min,
        stats.ratio_max,
    ));
    out.push_str(&format!(
        "Weighting: {}{}\n",
        fit.weighting.display_name(),
        if config.fit.absolute_sigma { " (absolute sigma)" } else { "" },
    ));

    out.push_str("\nFit diagnostics:\n");
    out.push_str(&format!(
        "- solver: {} after {} iteration(s)\n",
        fit.status.describe(),
        fit.iterations
    ));
    // Without weights SSE/dof is the residual variance, not a chi-square.
    let (scale_label, scale) = match fit.weighting {
        Weighting::Unweighted => ("s²", format!("{:.4e}", q.reduced_chi2)),
        Weighting::InverseVariance => ("chi2_red", format!("{:.4}", q.reduced_chi2)),
    };
    let scale = if q.reduced_chi2.is_finite() { scale } else { "n/a".to_string() };
    out.push_str(&format!(
        "- SSE={:.6e} RMSE={:.6e} {scale_label}={scale} dof={}\n",
        q.sse, q.rmse, q.dof
    ));
    let corr = fit.correlation();
    if corr.is_finite() {
        out.push_str(&format!("- corr(k_12, k_21) = {corr:.4}\n"));
    }

    out.push_str("\nExchange rates:\n");
    out.push_str(&format_rate("k_12", fit.k_12, fit.k_12_err));
    out.push_str(&format_rate("k_21", fit.k_21, fit.k_21_err));
    out.push_str(&format!("K_ex = {:.3} ± {:.3}\n", fit.k_ex, fit.k_ex_err));

    if !fit.is_physical() {
        out.push_str("\nWarning: negative rate constant; the two-site model may not describe this data.\n");
    }

    out
}

fn format_rate(name: &str, value: f64, err: f64) -> String {
    format!(
        "{name} = {value:.3} ± {err:.3} ms⁻¹ ({:.1} ± {:.1} s⁻¹)\n",
        value * 1e3,
        err * 1e3
    )
}

/// Format the per-sample residual table.
pub fn format_residuals(rows: &[SampleResidual]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>10} {:>12} {:>12} {:>12} {:>12} {:>8}\n",
            "t(ms)", "ratio", "error", "fitted", "residual", "z"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<10} {:-<12} {:-<12} {:-<12} {:-<12} {:-<8}\n",
            "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in rows {
        let s = &r.sample;
        out.push_str(
            format!(
                "{:>10} {:>12.6} {:>12} {:>12.6} {:>12.6} {:>8}\n",
                fmt_num(s.mixing_time),
                s.ratio,
                s.ratio_error.map_or("-".to_string(), |e| format!("{e:.6}")),
                r.fitted,
                r.residual,
                r.normalized.map_or("-".to_string(), |z| format!("{z:.2}")),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Integers print without decimals, everything else with three.
fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e12 {
        format!("{v:.0}")
    } else {
        format!("{v:.3}")
    }
}
