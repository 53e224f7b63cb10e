//! Command-line parsing for the EXSY exchange fitter.
//!
//! Argument parsing stays separate from the fitting code; `app` turns the
//! parsed [`Cli`] into a `RunConfig`.

use std::path::PathBuf;

use clap::Parser;

use crate::domain::WeightMode;

/// Fit EXSY intensity ratios to extract exchange rates.
#[derive(Debug, Parser, Clone)]
#[command(name = "eaxy", version, about = "Fit EXSY intensity ratios to extract exchange rates")]
pub struct Cli {
    /// Text file with columns: mixing_time(ms) I12/I11 [I12/I11_err].
    pub input: PathBuf,

    /// Prefix for the output plot (any extension is dropped; `.pdf` is appended).
    #[arg(short = 'o', long = "output", default_value = "exsy")]
    pub output: PathBuf,

    /// Plot style: a style file (.json or .mplstyle) or a built-in name
    /// (default, classic, dark, print).
    #[arg(long)]
    pub style: Option<String>,

    /// How per-sample errors weight the fit.
    #[arg(long, value_enum, default_value_t = WeightMode::Auto)]
    pub weighting: WeightMode,

    /// Treat errors as absolute (do not rescale the covariance by reduced chi-square).
    #[arg(long)]
    pub absolute_sigma: bool,

    /// Iteration budget for the Levenberg–Marquardt solver.
    #[arg(long = "max-iter", default_value_t = 200)]
    pub max_iter: usize,

    /// Number of points on the fitted curve.
    #[arg(long, default_value_t = 500)]
    pub curve_points: usize,

    /// Export samples, fit and curve grid to JSON.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Terminal plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Terminal plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Log level for diagnostics on stderr (error, warn, info, debug, trace).
    #[arg(long, default_value = "warn")]
    pub log_level: tracing::Level,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_values() {
        let cli = Cli::try_parse_from(["eaxy", "ratios.txt"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("ratios.txt"));
        assert_eq!(cli.output, PathBuf::from("exsy"));
        assert_eq!(cli.style, None);
        assert_eq!(cli.weighting, WeightMode::Auto);
        assert_eq!(cli.max_iter, 200);
        assert_eq!(cli.log_level, tracing::Level::WARN);
    }

    #[test]
    fn parses_all_flags() {
        let cli = Cli::try_parse_from([
            "eaxy", "ratios.txt", "-o", "out/run1.pdf", "--style", "dark", "--weighting",
            "uniform", "--absolute-sigma", "--max-iter", "50", "--curve-points", "80",
            "--export", "fit.json", "--no-plot", "--log-level", "debug",
        ])
        .unwrap();
        assert_eq!(cli.output, PathBuf::from("out/run1.pdf"));
        assert_eq!(cli.style.as_deref(), Some("dark"));
        assert_eq!(cli.weighting, WeightMode::Uniform);
        assert!(cli.absolute_sigma && cli.no_plot);
        assert_eq!((cli.max_iter, cli.curve_points), (50, 80));
        assert_eq!(cli.export, Some(PathBuf::from("fit.json")));
        assert_eq!(cli.log_level, tracing::Level::DEBUG);
    }

    #[test]
    fn input_is_required() {
        assert!(Cli::try_parse_from(["eaxy"]).is_err());
    }
}
