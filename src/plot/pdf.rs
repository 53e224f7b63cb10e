//! A plotters drawing backend that writes a vector PDF through `printpdf`.
//!
//! One backend pixel maps to one PDF point, with the y axis flipped so the
//! origin sits at the top-left like every other plotters backend. Text uses
//! the PDF base-14 fonts, so no system font lookup is involved.

use std::f64::consts::TAU;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use plotters_backend::text_anchor::{HPos, VPos};
use plotters_backend::{
    BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend, DrawingErrorKind,
    FontFamily, FontStyle, FontTransform,
};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Polygon, Pt, Rgb, TextMatrix,
};

/// Segments used to approximate circle markers.
const CIRCLE_SEGMENTS: usize = 32;
/// Cap height of the base-14 faces, as a fraction of the font size.
const ASCENT: f64 = 0.72;

#[derive(Debug, thiserror::Error)]
pub enum PdfBackendError {
    #[error("PDF error: {0}")]
    Pdf(#[from] printpdf::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document was already written")]
    Finished,
}

type BackendResult = Result<(), DrawingErrorKind<PdfBackendError>>;

pub struct PdfBackend {
    path: PathBuf,
    size: (u32, u32),
    paper: (u8, u8, u8),
    doc: Option<PdfDocumentReference>,
    layer: PdfLayerReference,
    fonts: Vec<(BuiltinFont, IndirectFontRef)>,
}

impl PdfBackend {
    /// A single-page document of `size` points, saved to `path` on `present`.
    ///
    /// `paper` is the color translucent strokes are blended against; PDF 1.3
    /// has no alpha channel.
    pub fn new(path: &Path, size: (u32, u32), paper: [u8; 3]) -> Self {
        let (w, h) = (size.0.max(1), size.1.max(1));
        let (doc, page, layer) = PdfDocument::new(
            "eaxy",
            Mm::from(Pt(w as f32)),
            Mm::from(Pt(h as f32)),
            "figure",
        );
        let layer = doc.get_page(page).get_layer(layer);
        Self {
            path: path.to_path_buf(),
            size: (w, h),
            paper: (paper[0], paper[1], paper[2]),
            doc: Some(doc),
            layer,
            fonts: Vec::new(),
        }
    }

    fn point(&self, (x, y): BackendCoord) -> Point {
        self.point_f(f64::from(x), f64::from(y))
    }

    fn point_f(&self, x: f64, y: f64) -> Point {
        Point {
            x: Pt(x as f32),
            y: Pt((f64::from(self.size.1) - y) as f32),
        }
    }

    /// PDF 1.3 has no transparency: composite onto the paper color instead.
    fn color(&self, c: BackendColor) -> Color {
        let a = c.alpha.clamp(0.0, 1.0);
        let blend = |fg: u8, bg: u8| ((a * f64::from(fg) + (1.0 - a) * f64::from(bg)) / 255.0) as f32;
        Color::Rgb(Rgb::new(
            blend(c.rgb.0, self.paper.0),
            blend(c.rgb.1, self.paper.1),
            blend(c.rgb.2, self.paper.2),
            None,
        ))
    }

    fn font(&mut self, face: BuiltinFont) -> Result<IndirectFontRef, DrawingErrorKind<PdfBackendError>> {
        if let Some((_, font)) = self.fonts.iter().find(|(f, _)| *f == face) {
            return Ok(font.clone());
        }
        let doc = self.doc.as_ref().ok_or(DrawingErrorKind::DrawingError(PdfBackendError::Finished))?;
        let font = doc
            .add_builtin_font(face)
            .map_err(|e| DrawingErrorKind::DrawingError(e.into()))?;
        self.fonts.push((face, font.clone()));
        Ok(font)
    }

    fn stroke(&self, points: Vec<Point>, closed: bool, color: BackendColor, width: u32) {
        self.layer.set_outline_color(self.color(color));
        self.layer.set_outline_thickness(width as f32);
        self.layer.add_line(Line {
            points: points.into_iter().map(|p| (p, false)).collect(),
            is_closed: closed,
        });
    }

    fn fill(&self, points: Vec<Point>, color: BackendColor) {
        self.layer.set_fill_color(self.color(color));
        self.layer.add_polygon(Polygon {
            rings: vec![points.into_iter().map(|p| (p, false)).collect()],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
    }
}

/// Map a plotters family and style onto one of the base-14 faces.
fn builtin_face(family: FontFamily, style: FontStyle) -> BuiltinFont {
    let bold = matches!(style, FontStyle::Bold);
    let slanted = matches!(style, FontStyle::Italic | FontStyle::Oblique);
    match family {
        FontFamily::Serif => match (bold, slanted) {
            (true, _) => BuiltinFont::TimesBold,
            (_, true) => BuiltinFont::TimesItalic,
            _ => BuiltinFont::TimesRoman,
        },
        FontFamily::Monospace => match (bold, slanted) {
            (true, _) => BuiltinFont::CourierBold,
            (_, true) => BuiltinFont::CourierOblique,
            _ => BuiltinFont::Courier,
        },
        _ => match (bold, slanted) {
            (true, _) => BuiltinFont::HelveticaBold,
            (_, true) => BuiltinFont::HelveticaOblique,
            _ => BuiltinFont::Helvetica,
        },
    }
}

/// Approximate advance width per character, in ems.
fn char_width(face: BuiltinFont) -> f64 {
    match face {
        BuiltinFont::Courier
        | BuiltinFont::CourierBold
        | BuiltinFont::CourierOblique
        | BuiltinFont::CourierBoldOblique => 0.6,
        BuiltinFont::TimesRoman
        | BuiltinFont::TimesBold
        | BuiltinFont::TimesItalic
        | BuiltinFont::TimesBoldItalic => 0.5,
        _ => 0.55,
    }
}

fn text_extent<S: BackendTextStyle>(text: &str, style: &S) -> (f64, f64) {
    let face = builtin_face(style.family(), style.style());
    let size = style.size();
    (text.chars().count() as f64 * char_width(face) * size, size)
}

impl DrawingBackend for PdfBackend {
    type ErrorType = PdfBackendError;

    fn get_size(&self) -> (u32, u32) {
        self.size
    }

    fn ensure_prepared(&mut self) -> BackendResult {
        if self.doc.is_none() {
            return Err(DrawingErrorKind::DrawingError(PdfBackendError::Finished));
        }
        Ok(())
    }

    fn present(&mut self) -> BackendResult {
        let Some(doc) = self.doc.take() else {
            return Ok(());
        };
        let file = File::create(&self.path).map_err(|e| DrawingErrorKind::DrawingError(e.into()))?;
        doc.save(&mut BufWriter::new(file))
            .map_err(|e| DrawingErrorKind::DrawingError(e.into()))
    }

    fn draw_pixel(&mut self, point: BackendCoord, color: BackendColor) -> BackendResult {
        if color.alpha == 0.0 {
            return Ok(());
        }
        let (x, y) = point;
        self.fill(
            vec![
                self.point((x, y)),
                self.point((x + 1, y)),
                self.point((x + 1, y + 1)),
                self.point((x, y + 1)),
            ],
            color,
        );
        Ok(())
    }

    fn draw_line<S: BackendStyle>(&mut self, from: BackendCoord, to: BackendCoord, style: &S) -> BackendResult {
        if style.color().alpha == 0.0 {
            return Ok(());
        }
        self.stroke(vec![self.point(from), self.point(to)], false, style.color(), style.stroke_width());
        Ok(())
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> BackendResult {
        if style.color().alpha == 0.0 {
            return Ok(());
        }
        let corners = vec![
            self.point(upper_left),
            self.point((bottom_right.0, upper_left.1)),
            self.point(bottom_right),
            self.point((upper_left.0, bottom_right.1)),
        ];
        if fill {
            self.fill(corners, style.color());
        } else {
            self.stroke(corners, true, style.color(), style.stroke_width());
        }
        Ok(())
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(&mut self, path: I, style: &S) -> BackendResult {
        if style.color().alpha == 0.0 {
            return Ok(());
        }
        let points: Vec<Point> = path.into_iter().map(|p| self.point(p)).collect();
        if points.len() > 1 {
            self.stroke(points, false, style.color(), style.stroke_width());
        }
        Ok(())
    }

    fn draw_circle<S: BackendStyle>(&mut self, center: BackendCoord, radius: u32, style: &S, fill: bool) -> BackendResult {
        if style.color().alpha == 0.0 || radius == 0 {
            return Ok(());
        }
        let (cx, cy, r) = (f64::from(center.0), f64::from(center.1), f64::from(radius));
        let points: Vec<Point> = (0..CIRCLE_SEGMENTS)
            .map(|i| {
                let a = TAU * i as f64 / CIRCLE_SEGMENTS as f64;
                self.point_f(cx + r * a.cos(), cy + r * a.sin())
            })
            .collect();
        if fill {
            self.fill(points, style.color());
        } else {
            self.stroke(points, true, style.color(), style.stroke_width());
        }
        Ok(())
    }

    fn fill_polygon<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(&mut self, vert: I, style: &S) -> BackendResult {
        if style.color().alpha == 0.0 {
            return Ok(());
        }
        let points: Vec<Point> = vert.into_iter().map(|p| self.point(p)).collect();
        if points.len() > 2 {
            self.fill(points, style.color());
        }
        Ok(())
    }

    fn draw_text<TStyle: BackendTextStyle>(&mut self, text: &str, style: &TStyle, pos: BackendCoord) -> BackendResult {
        let color = style.color();
        if color.alpha == 0.0 || text.is_empty() {
            return Ok(());
        }
        let face = builtin_face(style.family(), style.style());
        let font = self.font(face)?;
        let (width, height) = text_extent(text, style);

        // Offset from the anchor to the baseline start, in unrotated pixels.
        let dx = match style.anchor().h_pos {
            HPos::Left => 0.0,
            HPos::Center => -width / 2.0,
            HPos::Right => -width,
        };
        let dy = match style.anchor().v_pos {
            VPos::Top => 0.0,
            VPos::Center => -height / 2.0,
            VPos::Bottom => -height,
        } + ASCENT * height;

        let transform = style.transform();
        let (ox, oy) = match transform {
            FontTransform::None => (dx, dy),
            FontTransform::Rotate90 => (-dy, dx),
            FontTransform::Rotate180 => (-dx, -dy),
            FontTransform::Rotate270 => (dy, -dx),
        };
        // Clockwise on screen is clockwise on the page too, and printpdf
        // rotates counter-clockwise.
        let angle = match transform {
            FontTransform::None => 0.0,
            FontTransform::Rotate90 => 270.0,
            FontTransform::Rotate180 => 180.0,
            FontTransform::Rotate270 => 90.0,
        };
        let origin = self.point_f(f64::from(pos.0) + ox, f64::from(pos.1) + oy);

        self.layer.set_fill_color(self.color(color));
        self.layer.begin_text_section();
        self.layer.set_font(&font, style.size() as f32);
        self.layer
            .set_text_matrix(TextMatrix::TranslateRotate(origin.x, origin.y, angle));
        self.layer.write_text(text, &font);
        self.layer.end_text_section();
        Ok(())
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(&self, text: &str, style: &TStyle) -> Result<(u32, u32), DrawingErrorKind<PdfBackendError>> {
        let (w, h) = text_extent(text, style);
        Ok((w.ceil() as u32, h.ceil() as u32))
    }
}
