//! Raster analyzer.
//!
//! Renders a page, binarizes it with Otsu's method and scans for dark
//! pixels. The scan assumes dark ink on a light background; pages with a
//! dark background and light content are not handled and usually come
//! back as the full page.

use log::debug;

use super::render::PageRenderer;
use super::Detection;
use crate::geometry::{ContentBox, PageGeometry};
use crate::parser::PageId;

/// Sample every second row and column.
pub const DEFAULT_STRIDE: usize = 2;

/// Added to the Otsu threshold so light-gray anti-aliasing counts as background.
pub const THRESHOLD_BIAS: u8 = 15;

/// Pages that would need a larger raster are not rendered.
pub const MAX_RASTER_PIXELS: u64 = 40_000_000;

/// Inclusive pixel bounds of detected content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

/// Raster dimensions `ceil(w·scale) × ceil(h·scale)`, or `None` when they
/// are not positive, not finite, or above [`MAX_RASTER_PIXELS`].
pub fn raster_size(geometry: &PageGeometry, scale: f64) -> Option<(u32, u32)> {
    let width = (geometry.width * scale).ceil();
    let height = (geometry.height * scale).ceil();
    if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
        return None;
    }
    if width * height > MAX_RASTER_PIXELS as f64 {
        return None;
    }
    Some((width as u32, height as u32))
}

/// Luma grayscale of an RGBA buffer, truncated like `(0.299R + 0.587G + 0.114B) | 0`.
pub fn to_grayscale(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .map(|px| {
            let (r, g, b) = (f64::from(px[0]), f64::from(px[1]), f64::from(px[2]));
            (r * 0.299 + g * 0.587 + b * 0.114) as u8
        })
        .collect()
}

/// Otsu's threshold over a 256-bin histogram.
///
/// Sweeps `t = 0..=255` once, skipping levels until the background class
/// is non-empty and stopping when the foreground class empties. The first
/// `t` reaching the maximum between-class variance wins. Returns 127 when
/// the image has fewer than two distinct levels.
pub fn otsu_threshold(gray: &[u8]) -> u8 {
    let mut hist = [0u64; 256];
    for &g in gray {
        hist[g as usize] += 1;
    }

    let total = gray.len() as f64;
    let sum: f64 = hist
        .iter()
        .enumerate()
        .map(|(t, &count)| t as f64 * count as f64)
        .sum();

    let mut sum_b = 0.0;
    let mut w_b = 0.0;
    let mut var_max = 0.0;
    let mut threshold = 127u8;

    for (t, &count) in hist.iter().enumerate() {
        w_b += count as f64;
        if w_b == 0.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f == 0.0 {
            break;
        }
        sum_b += t as f64 * count as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum - sum_b) / w_f;
        let between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if between > var_max {
            var_max = between;
            threshold = t as u8;
        }
    }

    threshold
}

/// Otsu threshold plus [`THRESHOLD_BIAS`], capped at 255.
pub fn content_threshold(gray: &[u8]) -> u8 {
    otsu_threshold(gray).saturating_add(THRESHOLD_BIAS)
}

/// Bounds of pixels darker than `threshold`, visiting every `stride`-th
/// row and column starting at 0. Reported edges may fall short of the
/// true edges by up to `stride − 1` pixels.
pub fn scan_content(
    gray: &[u8],
    width: usize,
    height: usize,
    threshold: u8,
    stride: usize,
) -> Option<PixelBounds> {
    if width == 0 || height == 0 || gray.len() < width * height {
        return None;
    }
    let stride = stride.max(1);

    let mut bounds: Option<PixelBounds> = None;
    for y in (0..height).step_by(stride) {
        let row = &gray[y * width..(y + 1) * width];
        for x in (0..width).step_by(stride) {
            if row[x] >= threshold {
                continue;
            }
            let b = bounds.get_or_insert(PixelBounds {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            });
            b.min_x = b.min_x.min(x);
            b.max_x = b.max_x.max(x);
            b.min_y = b.min_y.min(y);
            b.max_y = b.max_y.max(y);
        }
    }
    bounds
}

/// Detect the content box of a page by rendering it.
///
/// A non-positive or non-finite `scale` is replaced by 1. An unusable
/// raster size, a renderer failure or an all-background page yield the
/// full page.
pub fn compute_raster_box<R: PageRenderer + ?Sized>(
    renderer: &R,
    page: PageId,
    geometry: &PageGeometry,
    scale: f64,
    stride: usize,
) -> Detection {
    let scale = if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    };

    let Some((width, height)) = raster_size(geometry, scale) else {
        debug!(
            "unusable raster size for {}x{} at scale {}, using full page",
            geometry.width, geometry.height, scale
        );
        return Detection::full_page(geometry);
    };

    let gray = match renderer.render(page, geometry, scale, width, height) {
        Ok(surface) => to_grayscale(surface.rgba()),
        Err(e) => {
            debug!("no raster surface, using full page: {}", e);
            return Detection::full_page(geometry);
        }
    };

    let threshold = content_threshold(&gray);
    match scan_content(&gray, width as usize, height as usize, threshold, stride) {
        Some(b) => Detection::found(ContentBox::new(
            b.min_x as f64 / scale,
            b.min_y as f64 / scale,
            b.max_x as f64 / scale,
            b.max_y as f64 / scale,
        )),
        None => Detection::full_page(geometry),
    }
}
