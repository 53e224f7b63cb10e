//! Plot styles.
//!
//! `--style` accepts either a path to a style file or the name of a built-in
//! style. The choice is resolved once into a [`StyleSource`] and loaded into a
//! concrete [`PlotStyle`] at the rendering boundary; fitting never sees it.
//!
//! Style files come in two flavours, picked by extension:
//! - `.json`: a serialized `PlotStyle` (missing keys keep their defaults)
//! - anything else: matplotlib-style `key: value` lines, of which a small
//!   subset is understood (figure size/dpi, colors, line width, marker size,
//!   font, error bar caps, grid). Unknown keys are ignored.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, EXIT_INPUT};

/// Where a plot style comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleSource {
    Named(BuiltinStyle),
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinStyle {
    Default,
    Classic,
    Dark,
    Print,
}

impl BuiltinStyle {
    pub const ALL: [BuiltinStyle; 4] = [
        BuiltinStyle::Default,
        BuiltinStyle::Classic,
        BuiltinStyle::Dark,
        BuiltinStyle::Print,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinStyle::Default => "default",
            BuiltinStyle::Classic => "classic",
            BuiltinStyle::Dark => "dark",
            BuiltinStyle::Print => "print",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn style(self) -> PlotStyle {
        let base = PlotStyle::default();
        match self {
            BuiltinStyle::Default => base,
            BuiltinStyle::Classic => PlotStyle {
                data_color: [0, 0, 255],
                fit_color: [0, 128, 0],
                font_family: "serif".to_string(),
                show_grid: false,
                ..base
            },
            BuiltinStyle::Dark => PlotStyle {
                background: [30, 30, 30],
                foreground: [230, 230, 230],
                data_color: [0, 200, 255],
                fit_color: [255, 170, 0],
                ..base
            },
            BuiltinStyle::Print => PlotStyle {
                width: 1200,
                height: 900,
                data_color: [0, 0, 0],
                fit_color: [80, 80, 80],
                line_width: 3,
                marker_size: 6,
                font_size: 28,
                show_grid: false,
                ..base
            },
        }
    }
}

/// Concrete drawing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotStyle {
    /// Image size in pixels.
    pub width: u32,
    pub height: u32,
    pub background: [u8; 3],
    /// Axes, labels and text.
    pub foreground: [u8; 3],
    pub data_color: [u8; 3],
    pub fit_color: [u8; 3],
    pub marker_size: u32,
    pub line_width: u32,
    /// Error bar cap width in pixels.
    pub cap_size: u32,
    pub font_family: String,
    pub font_size: u32,
    pub show_grid: bool,
    pub x_label: String,
    pub y_label: String,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            background: [255, 255, 255],
            foreground: [0, 0, 0],
            data_color: [31, 119, 180],
            fit_color: [31, 119, 180],
            marker_size: 4,
            line_width: 2,
            cap_size: 6,
            font_family: "sans-serif".to_string(),
            font_size: 16,
            show_grid: true,
            x_label: "t(m): Mixing Time (ms)".to_string(),
            y_label: "I12/I11".to_string(),
        }
    }
}

impl StyleSource {
    /// Resolve a `--style` value: an existing path wins over a built-in name.
    pub fn resolve(value: &str) -> Result<Self, AppError> {
        let path = Path::new(value);
        if path.is_file() {
            return Ok(StyleSource::File(path.to_path_buf()));
        }
        if let Some(builtin) = BuiltinStyle::from_name(value) {
            return Ok(StyleSource::Named(builtin));
        }
        let names: Vec<&str> = BuiltinStyle::ALL.iter().map(|s| s.name()).collect();
        Err(AppError::new(
            EXIT_INPUT,
            format!(
                "Unknown style '{value}': not a file and not one of: {}",
                names.join(", ")
            ),
        ))
    }

    pub fn load(&self) -> Result<PlotStyle, AppError> {
        match self {
            StyleSource::Named(builtin) => Ok(builtin.style()),
            StyleSource::File(path) => load_style_file(path),
        }
    }
}

/// Resolve and load an optional `--style` value (default style when absent).
pub fn load_style(value: Option<&str>) -> Result<PlotStyle, AppError> {
    match value {
        Some(value) => StyleSource::resolve(value)?.load(),
        None => Ok(PlotStyle::default()),
    }
}

fn load_style_file(path: &Path) -> Result<PlotStyle, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to read style '{}': {e}", path.display()),
        )
    })?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let parsed = if is_json {
        serde_json::from_str(&text).map_err(|e| e.to_string())
    } else {
        parse_mplstyle(&text)
    };
    parsed.map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Invalid style '{}': {e}", path.display()),
        )
    })
}

/// Parse the supported subset of matplotlib style sheets.
pub fn parse_mplstyle(text: &str) -> Result<PlotStyle, String> {
    let mut style = PlotStyle::default();
    let mut figsize: Option<(f64, f64)> = None;
    let mut dpi = 100.0;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(format!("line {line_no}: expected `key: value`"));
        };
        let key = key.trim();
        // `#` opens a hex color at the start of a value, a comment elsewhere.
        let value = value.trim();
        let value = match value.find(" #") {
            Some(pos) => &value[..pos],
            None => value,
        };
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        let err = |what: &str| format!("line {line_no}: invalid {what} '{value}' for `{key}`");

        match key {
            "figure.figsize" => {
                let parts: Vec<f64> = value
                    .split(',')
                    .map(|p| p.trim().parse::<f64>())
                    .collect::<Result<_, _>>()
                    .map_err(|_| err("size"))?;
                let [w, h] = parts[..] else {
                    return Err(err("size"));
                };
                figsize = Some((w, h));
            }
            "figure.dpi" | "savefig.dpi" => {
                dpi = value.parse::<f64>().map_err(|_| err("dpi"))?;
            }
            "figure.facecolor" | "savefig.facecolor" | "axes.facecolor" => {
                style.background = parse_color(value).ok_or_else(|| err("color"))?;
            }
            "axes.edgecolor" | "axes.labelcolor" | "text.color" | "xtick.color" | "ytick.color" => {
                style.foreground = parse_color(value).ok_or_else(|| err("color"))?;
            }
            "lines.color" => {
                let c = parse_color(value).ok_or_else(|| err("color"))?;
                style.data_color = c;
                style.fit_color = c;
            }
            "lines.linewidth" => style.line_width = parse_px(value).ok_or_else(|| err("width"))?,
            "lines.markersize" => style.marker_size = parse_px(value).ok_or_else(|| err("size"))?,
            "errorbar.capsize" => style.cap_size = parse_px(value).ok_or_else(|| err("size"))?,
            "font.size" => style.font_size = parse_px(value).ok_or_else(|| err("size"))?,
            "font.family" => {
                let family = value.split(',').next().unwrap_or(value).trim();
                style.font_family = family.to_string();
            }
            "axes.grid" => style.show_grid = parse_bool(value).ok_or_else(|| err("flag"))?,
            _ => tracing::debug!(key, "ignoring unsupported style key"),
        }
    }

    if let Some((w, h)) = figsize {
        let (w, h) = ((w * dpi).round(), (h * dpi).round());
        if !(w >= 1.0 && h >= 1.0 && w.is_finite() && h.is_finite()) {
            return Err("figure size must be positive".to_string());
        }
        style.width = w as u32;
        style.height = h as u32;
    }
    Ok(style)
}

fn parse_px(value: &str) -> Option<u32> {
    let v = value.parse::<f64>().ok()?;
    (v.is_finite() && v >= 0.0).then(|| v.round() as u32)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `#rrggbb`, `rrggbb` or one of a few color names.
pub fn parse_color(value: &str) -> Option<[u8; 3]> {
    let v = value.trim().to_ascii_lowercase();
    let named = match v.as_str() {
        "black" | "k" => Some([0, 0, 0]),
        "white" | "w" => Some([255, 255, 255]),
        "red" | "r" => Some([255, 0, 0]),
        "green" | "g" => Some([0, 128, 0]),
        "blue" | "b" => Some([0, 0, 255]),
        "gray" | "grey" => Some([128, 128, 128]),
        "tab:blue" => Some([31, 119, 180]),
        "tab:orange" => Some([255, 127, 14]),
        "tab:green" => Some([44, 160, 44]),
        "tab:red" => Some([214, 39, 40]),
        _ => None,
    };
    if named.is_some() {
        return named;
    }

    let hex = v.strip_prefix('#').unwrap_or(&v);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([byte(0)?, byte(2)?, byte(4)?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_builtin_names() {
        assert_eq!(
            StyleSource::resolve("dark").unwrap(),
            StyleSource::Named(BuiltinStyle::Dark)
        );
        assert_eq!(
            StyleSource::resolve("Print").unwrap(),
            StyleSource::Named(BuiltinStyle::Print)
        );
    }

    #[test]
    fn unknown_style_is_an_input_error() {
        let err = StyleSource::resolve("does-not-exist").unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert!(err.to_string().contains("default, classic, dark, print"));
    }

    #[test]
    fn existing_file_wins_over_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dark");
        std::fs::write(&path, "lines.linewidth: 5\n").unwrap();

        let source = StyleSource::resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(source, StyleSource::File(path.clone()));
        assert_eq!(source.load().unwrap().line_width, 5);
    }

    #[test]
    fn loads_json_style_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "width": 800, "fit_color": [255, 0, 0] }}"#).unwrap();

        let style = StyleSource::File(file.path().to_path_buf()).load().unwrap();
        assert_eq!(style.width, 800);
        assert_eq!(style.fit_color, [255, 0, 0]);
        assert_eq!(style.height, PlotStyle::default().height);
    }

    #[test]
    fn parses_mplstyle_subset() {
        let text = "\
# A matplotlib style sheet
figure.figsize : 6.0, 4.0
figure.dpi     : 150
axes.facecolor : #202020   # dark background
text.color     : white
lines.linewidth: 1.5
lines.markersize: 7
font.family    : serif, DejaVu Serif
axes.grid      : False
axes.prop_cycle: cycler('color', ['1f77b4'])
";
        let style = parse_mplstyle(text).unwrap();
        assert_eq!((style.width, style.height), (900, 600));
        assert_eq!(style.background, [0x20, 0x20, 0x20]);
        assert_eq!(style.foreground, [255, 255, 255]);
        assert_eq!(style.line_width, 2);
        assert_eq!(style.marker_size, 7);
        assert_eq!(style.font_family, "serif");
        assert!(!style.show_grid);
    }

    #[test]
    fn mplstyle_reports_bad_values() {
        let err = parse_mplstyle("lines.linewidth: thick\n").unwrap_err();
        assert!(err.contains("line 1"), "{err}");
        assert!(parse_mplstyle("no colon here\n").is_err());
    }

    #[test]
    fn parses_colors() {
        assert_eq!(parse_color("#1f77b4"), Some([31, 119, 180]));
        assert_eq!(parse_color("FF0000"), Some([255, 0, 0]));
        assert_eq!(parse_color("tab:orange"), Some([255, 127, 14]));
        assert_eq!(parse_color("#12345"), None);
    }
}
