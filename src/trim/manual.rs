//! Crops chosen by hand on a rendered page preview.
//!
//! A selection is a rectangle in the pixel space of whatever preview the
//! user dragged it on: top-left origin, scaled by the preview size. It is
//! converted back to points and written as the CropBox only.

use log::warn;
use serde::{Deserialize, Serialize};

use super::options::TrimOptions;
use super::report::{PageOutcome, PageReport, SkipReason, TrimOperation, TrimOutput, TrimReport};
use super::save_document;
use crate::error::Result;
use crate::geometry::{CropRegion, PageGeometry, MIN_CROP_SIZE};
use crate::mutate::{apply_crop_region, BoxSet, LopdfBoxTarget};
use crate::parser::backend::{load_document, page_geometry};
use crate::source::SourceDocument;

/// A rectangle drawn over a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManualSelection {
    /// 1-indexed page number
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Size of the preview the selection was drawn on, in pixels.
    pub rendered_width: f64,
    pub rendered_height: f64,
}

/// Convert a selection to a page-space crop region.
///
/// The result always lies on the page and is at least 10pt on each side.
/// Returns `None` when the preview size is zero, any value is not finite,
/// or the page itself is smaller than the floor.
pub fn selection_to_region(sel: &ManualSelection, geometry: &PageGeometry) -> Option<CropRegion> {
    if !geometry.is_valid() || sel.rendered_width <= 0.0 || sel.rendered_height <= 0.0 {
        return None;
    }
    let (page_w, page_h) = (geometry.width, geometry.height);
    if page_w < MIN_CROP_SIZE || page_h < MIN_CROP_SIZE {
        return None;
    }

    let sx = page_w / sel.rendered_width;
    let sy = page_h / sel.rendered_height;
    let values = [sx, sy, sel.x, sel.y, sel.width, sel.height];
    if !values.iter().all(|v| v.is_finite()) {
        return None;
    }

    let w = sel.width * sx;
    let h = sel.height * sy;
    let x = sel.x * sx;
    let y = page_h - (sel.y * sy + h);

    let x = clamp(x, 0.0, page_w - MIN_CROP_SIZE);
    let y = clamp(y, 0.0, page_h - MIN_CROP_SIZE);
    let w = clamp(w, MIN_CROP_SIZE, page_w - x);
    let h = clamp(h, MIN_CROP_SIZE, page_h - y);

    let region = CropRegion::new(x, y, w, h);
    region.is_finite().then_some(region)
}

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

/// Apply manual selections to a document, writing the CropBox of each
/// selected page.
///
/// Selections are applied in the order given; a later selection for the
/// same page wins. Only `options.cancel` and `options.stamp_metadata` are
/// consulted.
pub fn apply_manual_crops(
    source: &SourceDocument,
    selections: &[ManualSelection],
    options: &TrimOptions,
) -> Result<TrimOutput> {
    options.check_cancelled()?;

    let mut doc = load_document(&source.fork())?;
    let pages = doc.get_pages();
    let mut report = TrimReport::new(TrimOperation::Manual, pages.len() as u32);

    for sel in selections {
        options.check_cancelled()?;

        let Some(&page_id) = pages.get(&sel.page) else {
            warn!("page {}: manual selection for a page that does not exist", sel.page);
            report.pages.push(PageReport {
                page: sel.page,
                outcome: PageOutcome::Skipped {
                    reason: SkipReason::MissingPage,
                },
            });
            continue;
        };

        let geometry = page_geometry(&doc, page_id);
        let Some(region) = selection_to_region(sel, &geometry) else {
            warn!(
                "page {}: skipping selection {:?} on {}x{} page",
                sel.page, sel, geometry.width, geometry.height
            );
            report.pages.push(PageReport {
                page: sel.page,
                outcome: PageOutcome::Skipped {
                    reason: SkipReason::InvalidSelection {
                        detail: format!(
                            "{}x{} at ({}, {}) on a {}x{} preview",
                            sel.width,
                            sel.height,
                            sel.x,
                            sel.y,
                            sel.rendered_width,
                            sel.rendered_height
                        ),
                    },
                },
            });
            continue;
        };

        let boxes = apply_crop_region(
            &mut LopdfBoxTarget::new(&mut doc),
            sel.page,
            page_id,
            &region,
            &geometry,
            BoxSet::CROP,
        )?;
        report.pages.push(PageReport {
            page: sel.page,
            outcome: PageOutcome::Trimmed {
                region,
                boxes,
                fallback: false,
            },
        });
    }

    let bytes = save_document(&mut doc, options)?;
    Ok(TrimOutput { bytes, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::backend::rect_from_object;
    use crate::test_support::{document, to_bytes, PageSpec};

    fn sel(x: f64, y: f64, width: f64, height: f64) -> ManualSelection {
        ManualSelection {
            page: 1,
            x,
            y,
            width,
            height,
            rendered_width: 306.0,
            rendered_height: 396.0,
        }
    }

    #[test]
    fn test_selection_scaled_and_flipped() {
        let g = PageGeometry::new(612.0, 792.0);
        let region = selection_to_region(&sel(50.0, 50.0, 100.0, 200.0), &g).unwrap();
        assert_eq!(region, CropRegion::new(100.0, 292.0, 200.0, 400.0));
    }

    #[test]
    fn test_selection_clamped_to_page() {
        let g = PageGeometry::new(612.0, 792.0);

        let region = selection_to_region(&sel(-20.0, -20.0, 1000.0, 1000.0), &g).unwrap();
        assert_eq!(region, CropRegion::new(0.0, 0.0, 612.0, 792.0));

        let region = selection_to_region(&sel(305.0, 0.0, 0.0, 0.0), &g).unwrap();
        assert_eq!(region.x, 602.0);
        assert_eq!(region.width, 10.0);
        assert_eq!(region.y, 782.0);
        assert_eq!(region.height, 10.0);
    }

    #[test]
    fn test_selection_rejects_bad_input() {
        let g = PageGeometry::new(612.0, 792.0);
        let mut s = sel(0.0, 0.0, 10.0, 10.0);
        s.rendered_width = 0.0;
        assert!(selection_to_region(&s, &g).is_none());
        assert!(selection_to_region(&sel(f64::NAN, 0.0, 10.0, 10.0), &g).is_none());
        let square = sel(0.0, 0.0, 10.0, 10.0);
        assert!(selection_to_region(&square, &PageGeometry::new(5.0, 5.0)).is_none());
        assert!(selection_to_region(&square, &PageGeometry::invalid()).is_none());
    }

    #[test]
    fn test_apply_writes_crop_box_only() {
        let mut second = PageSpec::letter(Vec::new());
        second.media_box = [0.0, 0.0, 300.0, 400.0];
        let bytes = to_bytes(document(&[PageSpec::letter(Vec::new()), second]));
        let source = SourceDocument::from_bytes(bytes).unwrap();

        let mut s2 = sel(0.0, 0.0, 150.0, 200.0);
        s2.page = 2;
        s2.rendered_width = 300.0;
        s2.rendered_height = 400.0;
        let missing = ManualSelection { page: 9, ..s2 };

        let output =
            apply_manual_crops(&source, &[s2, missing], &TrimOptions::default()).unwrap();
        assert_eq!(output.report.operation, TrimOperation::Manual);
        assert_eq!(output.report.trimmed_count(), 1);
        assert_eq!(
            output.report.page(9).unwrap().outcome,
            PageOutcome::Skipped {
                reason: SkipReason::MissingPage
            }
        );

        let doc = lopdf::Document::load_mem(&output.bytes).unwrap();
        let page = doc.get_pages()[&2];
        let dict = doc.get_dictionary(page).unwrap();
        let crop = rect_from_object(&doc, dict.get(b"CropBox").unwrap()).unwrap();
        assert_eq!(crop, [0.0, 200.0, 150.0, 400.0]);
        assert_eq!(
            rect_from_object(&doc, dict.get(b"MediaBox").unwrap()).unwrap(),
            [0.0, 0.0, 300.0, 400.0]
        );
        assert!(dict.get(b"TrimBox").is_err());

        let first = doc.get_dictionary(doc.get_pages()[&1]).unwrap();
        assert!(first.get(b"CropBox").is_err());
    }
}
