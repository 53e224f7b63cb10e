//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves the plot style (before any fitting)
//! - runs the fit pipeline
//! - prints the summary and terminal preview
//! - writes the PDF plot and optional JSON export

use std::path::PathBuf;

use clap::Parser;

use crate::cli::Cli;
use crate::domain::RunConfig;
use crate::error::AppError;
use crate::fit::FitOptions;
use crate::math::SolverOptions;

pub mod pipeline;

/// Entry point for the `eaxy` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = run_config_from_args(&cli);
    let style = crate::plot::load_style(config.style.as_deref())?;

    let run = pipeline::run_fit(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.ingest, &run.fit, &config)
    );
    println!("{}", crate::report::format_residuals(&run.residuals));

    if config.preview {
        let plot = crate::plot::render_ascii_preview(
            &run.ingest.samples,
            &run.fit,
            config.preview_width,
            config.preview_height,
        );
        println!("{plot}");
    }

    let plot_path = config.plot_path();
    crate::plot::render_fit_pdf(
        &plot_path,
        &run.ingest.samples,
        &run.fit,
        &style,
        config.curve_points,
    )?;
    println!("Saved plot to: {}", plot_path.display());

    if let Some(path) = &config.export {
        crate::io::export::write_fit_json(path, &run.ingest, &run.fit, config.curve_points)?;
        println!("Saved fit to: {}", path.display());
    }

    Ok(())
}

pub fn run_config_from_args(args: &Cli) -> RunConfig {
    RunConfig {
        input: args.input.clone(),
        output_prefix: output_prefix(&args.output),
        style: args.style.clone(),
        fit: FitOptions {
            weighting: args.weighting,
            absolute_sigma: args.absolute_sigma,
            solver: SolverOptions {
                max_iters: args.max_iter,
                ..SolverOptions::default()
            },
            ..FitOptions::default()
        },
        curve_points: args.curve_points,
        preview: !args.no_plot,
        preview_width: args.width,
        preview_height: args.height,
        export: args.export.clone(),
    }
}

/// Drop the last extension: `out/run1.pdf` -> `out/run1`, `exsy` -> `exsy`.
fn output_prefix(output: &std::path::Path) -> PathBuf {
    output.with_extension("")
}
