//! Content detection.
//!
//! Two independent analyzers locate the visible content of a page:
//! [`text`] reads glyph placement from the content stream, [`raster`]
//! renders the page and thresholds the pixels. Both report a view-space
//! [`ContentBox`] and fall back to the full page when they find nothing.

pub mod raster;
pub mod render;
pub mod text;

use serde::Serialize;

use crate::geometry::{ContentBox, PageGeometry};

pub use raster::{compute_raster_box, otsu_threshold, to_grayscale, DEFAULT_STRIDE};
pub use render::{PageRenderer, RasterSurface, VectorRenderer};
pub use text::{compute_text_box, extract_text_runs, text_content_box, TextRun};

/// Outcome of one analyzer run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub content: ContentBox,
    /// `true` when nothing was detected and `content` is the full page.
    pub fallback: bool,
}

impl Detection {
    pub fn found(content: ContentBox) -> Self {
        Self {
            content,
            fallback: false,
        }
    }

    pub fn full_page(geometry: &PageGeometry) -> Self {
        Self {
            content: ContentBox::full_page(geometry),
            fallback: true,
        }
    }
}
