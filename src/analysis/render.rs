//! Page rasterization.
//!
//! [`VectorRenderer`] paints what the content interpreter reports onto a
//! tiny-skia pixmap. It draws coverage, not appearance: paths are filled
//! and stroked in their colors, glyphs become solid boxes spanning the
//! em height over their advance, and images become mid-gray quads. That is
//! all the raster analyzer needs to find where ink lands.

use tiny_skia::{FillRule as SkiaFillRule, IntSize, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::error::{Error, Result};
use crate::geometry::{Matrix, PageGeometry};
use crate::parser::{
    ContentInterpreter, ContentSink, FillRule, PageId, PaintedPath, PathSegment, PdfBackend, Rgb,
    TextShow,
};

/// Gray level used for image XObjects and inline images.
const IMAGE_GRAY: u8 = 128;

/// Glyph boxes span this fraction of the font size below the baseline.
const DESCENT: f64 = 0.2;
/// ...and this fraction above it.
const ASCENT: f64 = 0.8;

/// An RGBA raster.
pub struct RasterSurface {
    pixmap: Pixmap,
}

impl RasterSurface {
    /// An opaque white surface.
    pub fn blank(width: u32, height: u32) -> Result<Self> {
        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| Error::Render(format!("cannot allocate {width}x{height} surface")))?;
        pixmap.fill(tiny_skia::Color::WHITE);
        Ok(Self { pixmap })
    }

    /// Wrap existing RGBA bytes (`width * height * 4` of them).
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let size = IntSize::from_wh(width, height)
            .ok_or_else(|| Error::Render(format!("invalid surface size {width}x{height}")))?;
        let pixmap = Pixmap::from_vec(data, size)
            .ok_or_else(|| Error::Render("RGBA buffer does not match surface size".to_string()))?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Row-major RGBA bytes.
    pub fn rgba(&self) -> &[u8] {
        self.pixmap.data()
    }
}

/// Something that can rasterize a page.
pub trait PageRenderer {
    /// Render `page` at `scale` into a `width × height` surface whose
    /// top-left pixel is the top-left corner of `geometry`.
    fn render(
        &self,
        page: PageId,
        geometry: &PageGeometry,
        scale: f64,
        width: u32,
        height: u32,
    ) -> Result<RasterSurface>;
}

/// Coverage renderer over any [`PdfBackend`].
pub struct VectorRenderer<'a, B: PdfBackend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: PdfBackend + ?Sized> VectorRenderer<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }
}

impl<B: PdfBackend + ?Sized> PageRenderer for VectorRenderer<'_, B> {
    fn render(
        &self,
        page: PageId,
        geometry: &PageGeometry,
        scale: f64,
        width: u32,
        height: u32,
    ) -> Result<RasterSurface> {
        let mut surface = RasterSurface::blank(width, height)?;
        let device = geometry
            .user_to_view()
            .then(&Matrix::new(scale, 0.0, 0.0, scale, 0.0, 0.0));

        let mut painter = Painter {
            pixmap: &mut surface.pixmap,
        };
        ContentInterpreter::new(self.backend).run_page(page, device, &mut painter)?;
        Ok(surface)
    }
}

/// Paints interpreter events; every CTM it sees already includes the
/// user → device mapping.
struct Painter<'a> {
    pixmap: &'a mut Pixmap,
}

impl Painter<'_> {
    fn fill_polygon(&mut self, points: &[(f64, f64)], color: [u8; 3]) {
        let mut pb = PathBuilder::new();
        for (i, (x, y)) in points.iter().enumerate() {
            if i == 0 {
                pb.move_to(*x as f32, *y as f32);
            } else {
                pb.line_to(*x as f32, *y as f32);
            }
        }
        pb.close();
        if let Some(path) = pb.finish() {
            self.pixmap.fill_path(
                &path,
                &paint(color),
                SkiaFillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }
}

impl ContentSink for Painter<'_> {
    fn paint_path(&mut self, path: &PaintedPath<'_>) {
        let Some(sk_path) = build_path(path.segments, &path.ctm) else {
            return;
        };

        if let Some(rule) = path.fill {
            let rule = match rule {
                FillRule::NonZero => SkiaFillRule::Winding,
                FillRule::EvenOdd => SkiaFillRule::EvenOdd,
            };
            self.pixmap.fill_path(
                &sk_path,
                &paint(to_rgb8(path.fill_color)),
                rule,
                Transform::identity(),
                None,
            );
        }

        if path.stroke {
            let scale = (path.ctm.a * path.ctm.d - path.ctm.b * path.ctm.c).abs().sqrt();
            let stroke = Stroke {
                width: ((path.line_width * scale) as f32).max(1.0),
                ..Stroke::default()
            };
            self.pixmap.stroke_path(
                &sk_path,
                &paint(to_rgb8(path.stroke_color)),
                &stroke,
                Transform::identity(),
                None,
            );
        }
    }

    fn show_text(&mut self, text: &TextShow) {
        if !text.is_visible() {
            return;
        }
        let low = text.rise - DESCENT * text.font_size;
        let high = text.rise + ASCENT * text.font_size;
        let m = text.text_to_user;
        let corners = [
            m.apply(0.0, low),
            m.apply(text.advance, low),
            m.apply(text.advance, high),
            m.apply(0.0, high),
        ];
        let color = match text.render_mode {
            1 | 5 => text.stroke_color,
            _ => text.fill_color,
        };
        self.fill_polygon(&corners, to_rgb8(color));
    }

    fn paint_image(&mut self, ctm: &Matrix) {
        let corners = [
            ctm.apply(0.0, 0.0),
            ctm.apply(1.0, 0.0),
            ctm.apply(1.0, 1.0),
            ctm.apply(0.0, 1.0),
        ];
        self.fill_polygon(&corners, [IMAGE_GRAY; 3]);
    }
}

fn build_path(segments: &[PathSegment], ctm: &Matrix) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    let pt = |x: f64, y: f64| {
        let (dx, dy) = ctm.apply(x, y);
        (dx as f32, dy as f32)
    };
    for segment in segments {
        match *segment {
            PathSegment::MoveTo(x, y) => {
                let (x, y) = pt(x, y);
                pb.move_to(x, y);
            }
            PathSegment::LineTo(x, y) => {
                let (x, y) = pt(x, y);
                pb.line_to(x, y);
            }
            PathSegment::CurveTo(x1, y1, x2, y2, x3, y3) => {
                let (x1, y1) = pt(x1, y1);
                let (x2, y2) = pt(x2, y2);
                let (x3, y3) = pt(x3, y3);
                pb.cubic_to(x1, y1, x2, y2, x3, y3);
            }
            PathSegment::Close => pb.close(),
        }
    }
    pb.finish()
}

fn to_rgb8(color: Rgb) -> [u8; 3] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn paint(color: [u8; 3]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], 255);
    paint.anti_alias = true;
    paint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LopdfBackend;
    use crate::test_support::{single_page_document, PageSpec};

    fn render(content: &[u8], scale: f64) -> RasterSurface {
        let backend = LopdfBackend::from_document(single_page_document(&PageSpec::letter(
            content.to_vec(),
        )));
        let page = *backend.pages().values().next().unwrap();
        let geometry = backend.page_geometry(page);
        let width = (geometry.width * scale).ceil() as u32;
        let height = (geometry.height * scale).ceil() as u32;
        VectorRenderer::new(&backend)
            .render(page, &geometry, scale, width, height)
            .unwrap()
    }

    fn pixel(surface: &RasterSurface, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * surface.width() + x) * 4) as usize;
        let data = surface.rgba();
        [data[i], data[i + 1], data[i + 2], data[i + 3]]
    }

    #[test]
    fn test_blank_page_is_white() {
        let surface = render(b"", 1.0);
        assert_eq!((surface.width(), surface.height()), (612, 792));
        assert!(surface.rgba().iter().all(|b| *b == 255));
    }

    #[test]
    fn test_filled_rect_is_flipped_and_scaled() {
        // Bottom-left square in user space lands at the bottom-left of the raster.
        let surface = render(b"0 0 0 rg 0 0 100 100 re f", 2.0);
        assert_eq!(pixel(&surface, 10, 1574), [0, 0, 0, 255]);
        assert_eq!(pixel(&surface, 10, 10), [255, 255, 255, 255]);
        assert_eq!(pixel(&surface, 250, 1574), [255, 255, 255, 255]);
    }

    #[test]
    fn test_text_paints_glyph_boxes() {
        let surface = render(b"BT /F1 20 Tf 100 692 Td (abcd) Tj ET", 1.0);
        // Baseline at y = 100 from the top, box spans 16px above it.
        assert_eq!(pixel(&surface, 110, 95), [0, 0, 0, 255]);
        assert_eq!(pixel(&surface, 150, 95), [255, 255, 255, 255]);
    }

    #[test]
    fn test_invisible_text_not_painted() {
        let surface = render(b"BT 3 Tr /F1 20 Tf 100 692 Td (abcd) Tj ET", 1.0);
        assert!(surface.rgba().iter().all(|b| *b == 255));
    }

    #[test]
    fn test_surface_from_rgba_checks_size() {
        assert!(RasterSurface::from_rgba(2, 2, vec![0; 16]).is_ok());
        assert!(RasterSurface::from_rgba(2, 2, vec![0; 15]).is_err());
        assert!(RasterSurface::from_rgba(0, 2, Vec::new()).is_err());
    }
}
