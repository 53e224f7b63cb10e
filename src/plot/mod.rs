//! Rendering of fitted results.
//!
//! - `render`: the PDF figure written next to the output prefix
//! - `pdf`: the plotters backend behind it
//! - `ascii`: terminal preview
//! - `style`: built-in and file-based plot styles

pub mod ascii;
pub mod pdf;
pub mod render;
pub mod style;

pub use ascii::render_ascii_preview;
pub use render::render_fit_pdf;
pub use style::{BuiltinStyle, PlotStyle, StyleSource, load_style};
