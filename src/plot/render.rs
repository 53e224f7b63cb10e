//! PDF figure of the fit: observed ratios with error bars plus the fitted curve.

use std::fmt::Display;
use std::path::Path;

use plotters::prelude::*;

use crate::domain::{ExchangeFit, Sample};
use crate::error::{AppError, EXIT_OUTPUT};
use crate::plot::pdf::PdfBackend;
use crate::plot::style::PlotStyle;

type DrawResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Render the fit figure to `path` as PDF.
///
/// The document is drawn into a temporary file next to `path` and renamed
/// into place once complete, so a failed render never leaves a truncated
/// file behind and never clobbers an existing one.
pub fn render_fit_pdf(
    path: &Path,
    samples: &[Sample],
    fit: &ExchangeFit,
    style: &PlotStyle,
    curve_points: usize,
) -> Result<(), AppError> {
    let fail = |e: &dyn Display| {
        AppError::new(
            EXIT_OUTPUT,
            format!("Failed to render plot '{}': {e}", path.display()),
        )
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .prefix(".eaxy-")
        .suffix(".pdf.part")
        .tempfile_in(dir)
        .map_err(|e| fail(&e))?;

    draw(staged.path(), samples, fit, style, curve_points).map_err(|e| fail(&e))?;
    staged.persist(path).map_err(|e| fail(&e.error))?;

    tracing::info!(path = %path.display(), "saved plot");
    Ok(())
}

fn draw(
    path: &Path,
    samples: &[Sample],
    fit: &ExchangeFit,
    style: &PlotStyle,
    curve_points: usize,
) -> DrawResult<()> {
    let curve: Vec<(f64, f64)> = fit.curve_samples(curve_points).collect();
    let (x_range, y_range) = bounds(samples, &curve);

    let background = rgb(style.background);
    let foreground = rgb(style.foreground);
    let data_color = rgb(style.data_color);
    let fit_color = rgb(style.fit_color);

    let font = FontDesc::new(
        FontFamily::from(style.font_family.as_str()),
        f64::from(style.font_size),
        FontStyle::Normal,
    );

    let root = PdfBackend::new(path, (style.width, style.height), style.background).into_drawing_area();
    root.fill(&background)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(15)
        .x_label_area_size(style.font_size * 3)
        .y_label_area_size(style.font_size * 4)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)?;

    let mut mesh = chart.configure_mesh();
    mesh.x_desc(style.x_label.as_str())
        .y_desc(style.y_label.as_str())
        .x_labels(6)
        .y_labels(6)
        .label_style(font.clone().color(&foreground))
        .axis_desc_style(font.color(&foreground))
        .axis_style(foreground)
        .bold_line_style(foreground.mix(0.15))
        .light_line_style(foreground.mix(0.05));
    if !style.show_grid {
        mesh.disable_mesh();
    }
    mesh.draw()?;

    chart.draw_series(LineSeries::new(
        curve.iter().copied(),
        fit_color.stroke_width(style.line_width),
    ))?;

    let bar_style = data_color.stroke_width(style.line_width.max(1));
    chart.draw_series(samples.iter().filter_map(|s| {
        s.ratio_error.map(|e| {
            ErrorBar::new_vertical(
                s.mixing_time,
                s.ratio - e,
                s.ratio,
                s.ratio + e,
                bar_style,
                style.cap_size,
            )
        })
    }))?;

    chart.draw_series(
        samples
            .iter()
            .map(|s| Circle::new((s.mixing_time, s.ratio), style.marker_size, data_color.filled())),
    )?;

    root.present()?;
    Ok(())
}

fn rgb(c: [u8; 3]) -> RGBColor {
    RGBColor(c[0], c[1], c[2])
}

/// Axis ranges: x from 0 past the last mixing time, y covering data, error bars and curve.
fn bounds(samples: &[Sample], curve: &[(f64, f64)]) -> ((f64, f64), (f64, f64)) {
    let mut x_max = 0.0_f64;
    let mut y_min = 0.0_f64;
    let mut y_max = f64::NEG_INFINITY;

    for s in samples {
        let e = s.ratio_error.unwrap_or(0.0).abs();
        x_max = x_max.max(s.mixing_time);
        y_min = y_min.min(s.ratio - e);
        y_max = y_max.max(s.ratio + e);
    }
    for &(t, y) in curve {
        x_max = x_max.max(t);
        if y.is_finite() {
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }

    let x_max = if x_max > 0.0 { x_max * 1.1 } else { 1.0 };
    let (y_min, y_max) = if y_max.is_finite() && y_max > y_min {
        let pad = 0.05 * (y_max - y_min);
        (if y_min < 0.0 { y_min - pad } else { 0.0 }, y_max + pad)
    } else {
        (y_min - 0.5, y_min + 0.5)
    };
    ((0.0, x_max), (y_min, y_max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::ExchangeFitter;
    use crate::models::exchange_ratio;

    fn samples() -> Vec<Sample> {
        [2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0]
            .iter()
            .map(|&t| Sample::new(t, exchange_ratio(t, 0.04, 0.09), Some(0.01)))
            .collect()
    }

    fn entries(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn writes_pdf_document() {
        let data = samples();
        let fit = ExchangeFitter::default().fit(&data).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exsy.pdf");

        render_fit_pdf(&path, &data, &fit, &PlotStyle::default(), 100).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(bytes.len() > 1000);
        // Only the finished document is left in the directory.
        assert_eq!(entries(dir.path()), vec!["exsy.pdf".to_string()]);
    }

    #[test]
    fn unwritable_path_is_an_output_error() {
        let data = samples();
        let fit = ExchangeFitter::default().fit(&data).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/exsy.pdf");

        let err = render_fit_pdf(&path, &data, &fit, &PlotStyle::default(), 10).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_OUTPUT);
        assert!(!path.exists());
    }

    #[test]
    fn failed_render_leaves_no_partial_file() {
        let data = samples();
        let fit = ExchangeFitter::default().fit(&data).unwrap();
        let dir = tempfile::tempdir().unwrap();
        // A directory in the way makes the final rename fail after drawing.
        let path = dir.path().join("exsy.pdf");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep.txt"), "x").unwrap();

        let err = render_fit_pdf(&path, &data, &fit, &PlotStyle::default(), 10).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_OUTPUT);
        assert_eq!(entries(dir.path()), vec!["exsy.pdf".to_string()]);
        assert!(path.is_dir());
        assert_eq!(entries(&path), vec!["keep.txt".to_string()]);
    }

    #[test]
    fn rerender_replaces_previous_figure() {
        let data = samples();
        let fit = ExchangeFitter::default().fit(&data).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exsy.pdf");
        std::fs::write(&path, "stale").unwrap();

        render_fit_pdf(&path, &data, &fit, &PlotStyle::default(), 50).unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF-"));
        assert_eq!(entries(dir.path()), vec!["exsy.pdf".to_string()]);
    }

    #[test]
    fn bounds_start_at_zero_and_cover_error_bars() {
        let data = vec![
            Sample::new(10.0, 0.2, Some(0.05)),
            Sample::new(100.0, 0.5, Some(0.1)),
        ];
        let ((x0, x1), (y0, y1)) = bounds(&data, &[(10.0, 0.19), (100.0, 0.52)]);
        assert_eq!(x0, 0.0);
        assert!((x1 - 110.0).abs() < 1e-12);
        assert_eq!(y0, 0.0);
        assert!(y1 > 0.6);
    }
}
