//! ASCII plotting for terminal output.
//!
//! A fixed-size character grid, meant for:
//! - a quick visual check of the fit without opening the PDF
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed ratios: `o`
//! - fitted curve: `-` line

use crate::domain::{ExchangeFit, Sample};

/// Render observed samples over the fitted curve.
pub fn render_ascii_preview(
    samples: &[Sample],
    fit: &ExchangeFit,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let curve: Vec<(f64, f64)> = fit.curve_samples(width * 2).collect();

    let (t_min, t_max) = if fit.t_max > fit.t_min {
        (fit.t_min, fit.t_max)
    } else {
        (fit.t_min - 0.5, fit.t_min + 0.5)
    };
    render_plot(samples, &curve, t_min, t_max, width, height)
}

fn render_plot(
    samples: &[Sample],
    curve: &[(f64, f64)],
    t_min: f64,
    t_max: f64,
    width: usize,
    height: usize,
) -> String {
    let (y_min, y_max) = y_range(samples, curve).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first so points overlay it.
    draw_curve(&mut grid, curve, t_min, t_max, y_min, y_max);

    for s in samples {
        let x = map_x(s.mixing_time, t_min, t_max, width);
        let y = map_y(s.ratio, y_min, y_max, height);
        grid[y][x] = 'o';
    }

    let mut out = format!("Plot: t=[{t_min:.3}, {t_max:.3}] ms | I12/I11=[{y_min:.4}, {y_max:.4}]\n");
    for row in grid {
        out.extend(row);
        out.push('\n');
    }
    out
}

fn y_range(samples: &[Sample], curve: &[(f64, f64)]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    let ys = samples.iter().map(|s| s.ratio).chain(curve.iter().map(|&(_, y)| y));
    for y in ys.filter(|y| y.is_finite()) {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    // NaN clamps to NaN; `as usize` saturates it to 0.
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Row 0 is the top (largest ratio).
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], t_min: f64, t_max: f64, y_min: f64, y_max: f64) {
    let height = grid.len();
    let width = grid.first().map_or(0, Vec::len);
    if curve.len() < 2 || width == 0 {
        return;
    }

    let mut prev = None;
    for &(t, y) in curve.iter().filter(|(_, y)| y.is_finite()) {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        match prev {
            Some((x0, y0)) => draw_line(grid, x0, y0, x, yy, '-'),
            None => grid[yy][x] = '-',
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if let Some(cell) = grid
            .get_mut(y0 as usize)
            .and_then(|row| row.get_mut(x0 as usize))
        {
            if *cell == ' ' {
                *cell = ch;
            }
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_drawing_fills_gaps() {
        let mut grid = vec![vec![' '; 5]; 3];
        draw_line(&mut grid, 0, 2, 4, 0, '-');
        let rows: Vec<String> = grid.into_iter().map(|r| r.into_iter().collect()).collect();
        assert_eq!(rows, vec!["   --", " --  ", "-    "]);
    }

    #[test]
    fn plot_golden_snapshot_small() {
        // Flat curve at 0.5 from t=1 to t=10, one point on it and one above.
        let samples = vec![Sample::new(1.0, 0.5, None), Sample::new(10.0, 0.6, None)];
        let curve = vec![(1.0, 0.5), (10.0, 0.5)];

        let txt = render_plot(&samples, &curve, 1.0, 10.0, 10, 5);
        let expected = concat!(
            "Plot: t=[1.000, 10.000] ms | I12/I11=[0.4950, 0.6050]\n",
            "         o\n",
            "          \n",
            "          \n",
            "          \n",
            "o---------\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn preview_has_requested_size() {
        use crate::models::exchange_ratio;
        let samples: Vec<_> = [2.0, 10.0, 40.0, 100.0]
            .iter()
            .map(|&t| Sample::new(t, exchange_ratio(t, 0.05, 0.1), None))
            .collect();
        let fit = crate::fit::ExchangeFitter::default().fit(&samples).unwrap();

        let txt = render_ascii_preview(&samples, &fit, 40, 12);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines.len(), 13);
        assert!(lines[1..].iter().all(|l| l.chars().count() == 40));
        let points: usize = lines[1..].iter().map(|l| l.matches('o').count()).sum();
        assert_eq!(points, 4);
    }
}
