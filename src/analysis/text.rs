//! Text-geometry analyzer.
//!
//! Measures where shown strings sit on the page without rasterizing
//! anything. Text in render mode 3 (invisible, typical of OCR layers)
//! counts as content like any other run.

use log::debug;

use super::Detection;
use crate::geometry::{pad_and_clamp, BoundsAccumulator, ContentBox, Matrix, PageGeometry};
use crate::parser::{ContentInterpreter, ContentSink, PageId, PdfBackend, TextShow};

/// Placement of one text run in view space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Glyph space → view space. `e` is the run's left edge, `f` its
    /// baseline measured from the top of the page.
    pub transform: Matrix,
    /// Extent along the baseline, in points.
    pub width: f64,
    /// `|d|` of `transform`.
    pub height: f64,
    pub glyph_count: usize,
}

struct RunCollector {
    to_view: Matrix,
    runs: Vec<TextRun>,
}

impl ContentSink for RunCollector {
    fn show_text(&mut self, text: &TextShow) {
        let transform = text.rendering_matrix().then(&self.to_view);
        let (x0, y0) = text.text_to_user.apply(0.0, text.rise);
        let (x1, y1) = text.text_to_user.apply(text.advance, text.rise);
        self.runs.push(TextRun {
            transform,
            width: (x1 - x0).hypot(y1 - y0),
            height: transform.d.abs(),
            glyph_count: text.glyph_count,
        });
    }
}

/// Collect every text run of a page.
pub fn extract_text_runs<B: PdfBackend + ?Sized>(
    backend: &B,
    page: PageId,
    geometry: &PageGeometry,
) -> crate::Result<Vec<TextRun>> {
    let mut collector = RunCollector {
        to_view: geometry.user_to_view(),
        runs: Vec::new(),
    };
    ContentInterpreter::new(backend).run_page(page, Matrix::IDENTITY, &mut collector)?;
    Ok(collector.runs)
}

/// Bounding box of all finite runs: `(e, f − h)` to `(e + w, f)`.
pub fn text_content_box(runs: &[TextRun], geometry: &PageGeometry) -> Detection {
    let mut bounds = BoundsAccumulator::new();
    for run in runs {
        let x = run.transform.e;
        let y = run.transform.f - run.height;
        let values = [x, y, run.width, run.height];
        if values.iter().all(|v| v.is_finite()) {
            bounds.add_point(x, y);
            bounds.add_point(x + run.width, y + run.height);
        }
    }
    bounds
        .finish()
        .map(Detection::found)
        .unwrap_or_else(|| Detection::full_page(geometry))
}

/// Raw text detection for a page; unreadable content degrades to the full page.
pub fn detect_text<B: PdfBackend + ?Sized>(
    backend: &B,
    page: PageId,
    geometry: &PageGeometry,
) -> Detection {
    match extract_text_runs(backend, page, geometry) {
        Ok(runs) => text_content_box(&runs, geometry),
        Err(e) => {
            debug!("text extraction failed, using full page: {}", e);
            Detection::full_page(geometry)
        }
    }
}

/// Text box padded by `padding` and clamped to the page.
///
/// Pages without text return the full page unpadded.
pub fn compute_text_box<B: PdfBackend + ?Sized>(
    backend: &B,
    page: PageId,
    geometry: &PageGeometry,
    padding: f64,
) -> ContentBox {
    let detection = detect_text(backend, page, geometry);
    if detection.fallback {
        return detection.content;
    }
    pad_and_clamp(&detection.content, geometry, padding)
        .unwrap_or_else(|| ContentBox::full_page(geometry))
}
