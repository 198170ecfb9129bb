//! The trim pipeline.
//!
//! Every trim decodes the input twice. The analysis decoder
//! ([`LopdfBackend`]) only ever reads; the mutation decoder is the
//! `lopdf::Document` whose boxes are rewritten and which is serialized at
//! the end. Pages are analyzed independently (optionally with rayon) and
//! the results are applied to the mutation document in page order, so the
//! output does not depend on the order analyses finish in.
//!
//! Page-local problems never fail a trim: the page keeps its boxes and the
//! [`TrimReport`] says why. Only decoding, a failed box write, cancellation
//! and serialization errors abort.

pub mod manual;
pub mod options;
pub mod report;

pub use manual::{apply_manual_crops, selection_to_region, ManualSelection};
pub use options::{
    PageSelection, TrimEvent, TrimMode, TrimOptions, DEFAULT_MARGIN, DEFAULT_PIXEL_PADDING,
    DEFAULT_RENDER_SCALE, DEFAULT_TEXT_PADDING,
};
pub use report::{
    PageOutcome, PageReport, SkipReason, TrimOperation, TrimOutput, TrimReport,
};

use log::{debug, warn};
use lopdf::{Dictionary, Document, Object};
use rayon::prelude::*;

use crate::analysis::text::detect_text;
use crate::analysis::{compute_raster_box, Detection, VectorRenderer};
use crate::error::{Error, Result};
use crate::geometry::{to_crop_region, CropRegion, PageGeometry, MIN_CROP_SIZE};
use crate::mutate::{apply_crop_region, LopdfBoxTarget};
use crate::parser::backend::{load_document, media_box};
use crate::parser::{LopdfBackend, PageId, PdfBackend};
use crate::source::SourceDocument;

/// Trim a document according to `options`.
pub fn trim(source: &SourceDocument, options: &TrimOptions) -> Result<TrimOutput> {
    options.validate()?;
    options.check_cancelled()?;

    match options.mode {
        TrimMode::FixedMargin => crop_fixed_margin(source, options),
        TrimMode::Text | TrimMode::Pixel => auto_trim(source, options),
    }
}

/// What analysis decided for one page.
#[derive(Debug, Clone)]
enum PagePlan {
    Apply {
        geometry: PageGeometry,
        region: CropRegion,
        fallback: bool,
    },
    Skip(SkipReason),
}

fn auto_trim(source: &SourceDocument, options: &TrimOptions) -> Result<TrimOutput> {
    let backend = LopdfBackend::load_bytes(&source.fork())?;
    let mut doc = load_document(&source.fork())?;

    let pages: Vec<(u32, PageId)> = backend.pages().into_iter().collect();
    let selected: Vec<(u32, PageId)> = pages
        .iter()
        .copied()
        .filter(|(number, _)| options.pages.includes(*number))
        .collect();

    debug!(
        "{} trim of {} of {} pages (parallel: {})",
        options.mode,
        selected.len(),
        pages.len(),
        options.parallel
    );
    options.emit(TrimEvent::Started {
        total_pages: selected.len() as u32,
    });

    let plans = analyze_pages(&backend, &selected, options)?;
    options.check_cancelled()?;

    let operation = match options.mode {
        TrimMode::Pixel => TrimOperation::Pixel,
        _ => TrimOperation::Text,
    };
    let mut report = TrimReport::new(operation, pages.len() as u32);
    let mutation_pages = doc.get_pages();
    let boxes = options.effective_boxes();
    let mut plans = plans.into_iter().peekable();

    for (number, _) in &pages {
        let plan = match plans.peek() {
            Some((planned, _)) if planned == number => plans.next().map(|(_, plan)| plan),
            _ => None,
        };
        let Some(plan) = plan else {
            report.pages.push(PageReport {
                page: *number,
                outcome: PageOutcome::NotSelected,
            });
            continue;
        };

        let outcome = match plan {
            PagePlan::Skip(reason) => {
                warn!("page {}: skipped, {}", number, reason);
                PageOutcome::Skipped { reason }
            }
            PagePlan::Apply {
                geometry,
                region,
                fallback,
            } => match mutation_pages.get(number) {
                Some(&target_page) => {
                    let applied = apply_crop_region(
                        &mut LopdfBoxTarget::new(&mut doc),
                        *number,
                        target_page,
                        &region,
                        &geometry,
                        boxes,
                    )?;
                    debug!("page {}: {} -> {:?}", number, region, applied.applied);
                    PageOutcome::Trimmed {
                        region,
                        boxes: applied,
                        fallback,
                    }
                }
                None => {
                    warn!("page {}: skipped, not found in the mutation document", number);
                    PageOutcome::Skipped {
                        reason: SkipReason::MissingPage,
                    }
                }
            },
        };

        options.emit(match &outcome {
            PageOutcome::Skipped { reason } => TrimEvent::PageSkipped {
                page: *number,
                reason: reason.to_string(),
            },
            _ => TrimEvent::PageTrimmed { page: *number },
        });
        report.pages.push(PageReport {
            page: *number,
            outcome,
        });
    }

    let bytes = save_document(&mut doc, options)?;
    options.emit(TrimEvent::Finished {
        trimmed: report.trimmed_count(),
        skipped: report.skipped_count(),
    });
    Ok(TrimOutput { bytes, report })
}

/// Analyze `pages`, returning plans in the same order.
fn analyze_pages<B: PdfBackend + ?Sized>(
    backend: &B,
    pages: &[(u32, PageId)],
    options: &TrimOptions,
) -> Result<Vec<(u32, PagePlan)>> {
    let analyze = |&(number, page): &(u32, PageId)| {
        analyze_page(backend, number, page, options).map(|plan| (number, plan))
    };

    if options.parallel {
        pages.par_iter().map(analyze).collect()
    } else {
        pages.iter().map(analyze).collect()
    }
}

fn analyze_page<B: PdfBackend + ?Sized>(
    backend: &B,
    number: u32,
    page: PageId,
    options: &TrimOptions,
) -> Result<PagePlan> {
    options.check_cancelled()?;

    let geometry = backend.page_geometry(page);
    let plan = if !geometry.is_valid() {
        PagePlan::Skip(SkipReason::InvalidGeometry {
            width: geometry.width,
            height: geometry.height,
        })
    } else {
        let detection = detect(backend, page, &geometry, options);
        if detection.fallback {
            debug!("page {}: no content detected, framing the full page", number);
        }
        match to_crop_region(&detection.content, &geometry, options.effective_padding()) {
            Some(region) => PagePlan::Apply {
                geometry,
                region,
                fallback: detection.fallback,
            },
            None => PagePlan::Skip(SkipReason::InvalidRegion {
                content: detection.content,
            }),
        }
    };

    options.emit(TrimEvent::PageAnalyzed { page: number });
    Ok(plan)
}

fn detect<B: PdfBackend + ?Sized>(
    backend: &B,
    page: PageId,
    geometry: &PageGeometry,
    options: &TrimOptions,
) -> Detection {
    match options.mode {
        TrimMode::Pixel => compute_raster_box(
            &VectorRenderer::new(backend),
            page,
            geometry,
            options.effective_scale(),
            options.stride,
        ),
        TrimMode::Text | TrimMode::FixedMargin => detect_text(backend, page, geometry),
    }
}

/// Region leaving `margin` points on every side of the page, at least
/// 10pt on each side and always on the page.
///
/// `None` for an invalid page or one smaller than 10pt.
pub fn fixed_margin_region(geometry: &PageGeometry, margin: f64) -> Option<CropRegion> {
    if !geometry.is_valid() || !margin.is_finite() {
        return None;
    }
    let (page_w, page_h) = (geometry.width, geometry.height);
    if page_w < MIN_CROP_SIZE || page_h < MIN_CROP_SIZE {
        return None;
    }
    let w = (page_w - 2.0 * margin).max(MIN_CROP_SIZE);
    let h = (page_h - 2.0 * margin).max(MIN_CROP_SIZE);
    let x = margin.max(0.0).min(page_w - w);
    let y = margin.max(0.0).min(page_h - h);
    Some(CropRegion::new(x, y, w, h))
}

/// Quick-preview crop: page 1 only, measured from its MediaBox.
///
/// The page selection is ignored; the analysis decoder is never created.
fn crop_fixed_margin(source: &SourceDocument, options: &TrimOptions) -> Result<TrimOutput> {
    let mut doc = load_document(&source.fork())?;
    let pages = doc.get_pages();
    let mut report = TrimReport::new(TrimOperation::FixedMargin, pages.len() as u32);

    if let Some(&page) = pages.get(&1) {
        options.emit(TrimEvent::Started { total_pages: 1 });
        let geometry = media_box(&doc, page);

        let outcome = match fixed_margin_region(&geometry, options.margin) {
            Some(region) => {
                let applied = apply_crop_region(
                    &mut LopdfBoxTarget::new(&mut doc),
                    1,
                    page,
                    &region,
                    &geometry,
                    options.effective_boxes(),
                )?;
                options.emit(TrimEvent::PageTrimmed { page: 1 });
                PageOutcome::Trimmed {
                    region,
                    boxes: applied,
                    fallback: false,
                }
            }
            None => {
                let reason = SkipReason::InvalidGeometry {
                    width: geometry.width,
                    height: geometry.height,
                };
                warn!("page 1: skipped, {}", reason);
                options.emit(TrimEvent::PageSkipped {
                    page: 1,
                    reason: reason.to_string(),
                });
                PageOutcome::Skipped { reason }
            }
        };
        report.pages.push(PageReport { page: 1, outcome });
    }

    options.check_cancelled()?;
    let bytes = save_document(&mut doc, options)?;
    options.emit(TrimEvent::Finished {
        trimmed: report.trimmed_count(),
        skipped: report.skipped_count(),
    });
    Ok(TrimOutput { bytes, report })
}

/// Serialize the mutation document, stamping metadata when asked.
pub(crate) fn save_document(doc: &mut Document, options: &TrimOptions) -> Result<Vec<u8>> {
    if options.stamp_metadata {
        stamp_metadata(doc);
    }
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| Error::Write(e.to_string()))?;
    Ok(out)
}

/// Set `Producer` and `ModDate` in the document information dictionary.
fn stamp_metadata(doc: &mut Document) {
    let producer = Object::string_literal(format!("autotrim {}", env!("CARGO_PKG_VERSION")));
    let mod_date = Object::string_literal(
        chrono::Utc::now()
            .format("D:%Y%m%d%H%M%S+00'00'")
            .to_string(),
    );

    let direct = matches!(doc.trailer.get(b"Info"), Ok(Object::Dictionary(_)));
    let info = if direct {
        doc.trailer.get_mut(b"Info").and_then(Object::as_dict_mut).ok()
    } else {
        let id = match doc.trailer.get(b"Info").and_then(Object::as_reference) {
            Ok(id) => id,
            Err(_) => {
                let id = doc.add_object(Dictionary::new());
                doc.trailer.set("Info", id);
                id
            }
        };
        doc.get_object_mut(id).and_then(Object::as_dict_mut).ok()
    };

    match info {
        Some(dict) => {
            dict.set("Producer", producer);
            dict.set("ModDate", mod_date);
        }
        None => debug!("document info dictionary is unreadable, not stamping"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::mutate::BoxSet;
    use crate::parser::backend::rect_from_object;
    use crate::test_support::{document, single_page_document, to_bytes, PageSpec};

    // Forty Helvetica glyphs of 500/1000 em: 400pt wide at 20pt.
    const SCENARIO: &[u8] =
        b"BT /F1 20 Tf 100 672 Td (cksvxyzJcksvxyzJcksvxyzJcksvxyzJcksvxyzJ) Tj 0 -580 Td (a) Tj ET";

    fn source(pages: &[PageSpec]) -> SourceDocument {
        SourceDocument::from_bytes(to_bytes(document(pages))).unwrap()
    }

    fn page_box(bytes: &[u8], page: u32, key: &[u8]) -> Option<[f64; 4]> {
        let doc = Document::load_mem(bytes).unwrap();
        let id = doc.get_pages()[&page];
        let dict = doc.get_dictionary(id).unwrap();
        dict.get(key).ok().and_then(|o| rect_from_object(&doc, o))
    }

    #[test]
    fn test_text_scenario() {
        // Runs span (100,100)-(500,120) and (100,680)-(110,700) in view space.
        let src = source(&[PageSpec::letter(SCENARIO.to_vec())]);
        let output = trim(&src, &TrimOptions::default()).unwrap();

        // (100,100)-(500,700) padded by 18: x 82, y 792-718, w 436, h 636.
        let expected = [82.0, 74.0, 518.0, 710.0];
        for key in [&b"CropBox"[..], b"MediaBox", b"TrimBox", b"BleedBox"] {
            assert_eq!(page_box(&output.bytes, 1, key), Some(expected));
        }
        match &output.report.pages[0].outcome {
            PageOutcome::Trimmed { region, fallback, .. } => {
                assert_eq!(*region, CropRegion::new(82.0, 74.0, 436.0, 636.0));
                assert!(!fallback);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_invalid_geometry_page_is_untouched() {
        let mut broken = PageSpec::letter(SCENARIO.to_vec());
        broken.media_box_override = Some(Object::Array(vec![
            Object::Integer(0),
            Object::Name(b"oops".to_vec()),
        ]));
        let src = source(&[PageSpec::letter(SCENARIO.to_vec()), broken]);

        let output = trim(&src, &TrimOptions::default().sequential()).unwrap();
        assert_eq!(output.report.trimmed_count(), 1);
        assert!(matches!(
            output.report.page(2).unwrap().outcome,
            PageOutcome::Skipped {
                reason: SkipReason::InvalidGeometry { .. }
            }
        ));
        assert!(page_box(&output.bytes, 2, b"CropBox").is_none());
        assert!(page_box(&output.bytes, 2, b"TrimBox").is_none());
    }

    #[test]
    fn test_page_selection() {
        let pages = [
            PageSpec::letter(SCENARIO.to_vec()),
            PageSpec::letter(SCENARIO.to_vec()),
            PageSpec::letter(SCENARIO.to_vec()),
        ];
        let options = TrimOptions::default().with_pages(PageSelection::Pages(vec![2]));
        let output = trim(&source(&pages), &options).unwrap();

        assert_eq!(output.report.pages.len(), 3);
        assert_eq!(output.report.pages[0].outcome, PageOutcome::NotSelected);
        assert!(output.report.pages[1].is_trimmed());
        assert!(page_box(&output.bytes, 1, b"CropBox").is_none());
        assert!(page_box(&output.bytes, 2, b"CropBox").is_some());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let pages: Vec<PageSpec> = (0..6)
            .map(|i| {
                let (x, y) = (50 + i * 40, 100 + i * 60);
                PageSpec::letter(format!("BT /F1 12 Tf {x} {y} Td (x) Tj ET").into_bytes())
            })
            .collect();
        let src = source(&pages);
        let parallel = trim(&src, &TrimOptions::default()).unwrap();
        let sequential = trim(&src, &TrimOptions::default().sequential()).unwrap();
        assert_eq!(parallel.bytes, sequential.bytes);
        assert_eq!(parallel.report, sequential.report);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let options = TrimOptions::default().with_cancellation(token);
        let src = source(&[PageSpec::letter(SCENARIO.to_vec())]);
        assert!(matches!(trim(&src, &options), Err(Error::Cancelled)));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let src = source(&[PageSpec::letter(Vec::new())]);
        let options = TrimOptions::for_mode(TrimMode::Pixel).with_stride(0);
        assert!(matches!(trim(&src, &options), Err(Error::InvalidOption(_))));
    }

    #[test]
    fn test_pixel_blank_page_keeps_media_box() {
        let src = source(&[PageSpec::letter(Vec::new())]);
        let output = trim(&src, &TrimOptions::for_mode(TrimMode::Pixel)).unwrap();
        assert_eq!(page_box(&output.bytes, 1, b"CropBox"), Some([0.0, 0.0, 612.0, 792.0]));
        assert_eq!(page_box(&output.bytes, 1, b"MediaBox"), Some([0.0, 0.0, 612.0, 792.0]));
    }

    #[test]
    fn test_wide_glyphs_stay_inside_crop() {
        // Ten Helvetica W glyphs (944/1000 em) at 20pt end at x = 288.8.
        let content = b"BT /F1 20 Tf 100 672 Td (WWWWWWWWWW) Tj ET".to_vec();
        let src = source(&[PageSpec::letter(content)]);

        let output = trim(&src, &TrimOptions::default()).unwrap();
        let crop = page_box(&output.bytes, 1, b"CropBox").unwrap();
        assert!((crop[2] - 306.8).abs() < 1e-3, "{crop:?}");

        let options = TrimOptions::for_mode(TrimMode::Pixel)
            .with_padding(0.0)
            .with_stride(1);
        let output = trim(&src, &options).unwrap();
        let crop = page_box(&output.bytes, 1, b"CropBox").unwrap();
        assert!(crop[2] >= 287.0, "{crop:?}");
    }

    #[test]
    fn test_pixel_finds_filled_rect() {
        let src = source(&[PageSpec::letter(b"0 g 200 300 100 50 re f".to_vec())]);
        let options = TrimOptions::for_mode(TrimMode::Pixel)
            .with_padding(0.0)
            .with_scale(1.0)
            .with_stride(1);
        let output = trim(&src, &options).unwrap();
        let crop = page_box(&output.bytes, 1, b"CropBox").unwrap();
        assert!((crop[0] - 200.0).abs() <= 1.0, "{crop:?}");
        assert!((crop[1] - 300.0).abs() <= 1.0, "{crop:?}");
        assert!((crop[2] - 300.0).abs() <= 1.0, "{crop:?}");
        assert!((crop[3] - 350.0).abs() <= 1.0, "{crop:?}");
    }

    #[test]
    fn test_progress_events_in_order() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let src = source(&[PageSpec::letter(SCENARIO.to_vec()), PageSpec::letter(Vec::new())]);
        trim(&src, &TrimOptions::default().sequential().with_progress(tx)).unwrap();

        let events: Vec<TrimEvent> = rx.try_iter().collect();
        assert_eq!(events.first(), Some(&TrimEvent::Started { total_pages: 2 }));
        assert_eq!(
            events.last(),
            Some(&TrimEvent::Finished {
                trimmed: 2,
                skipped: 0
            })
        );
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, TrimEvent::PageAnalyzed { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_fixed_margin_region() {
        let g = PageGeometry::new(612.0, 792.0);
        assert_eq!(
            fixed_margin_region(&g, 40.0),
            Some(CropRegion::new(40.0, 40.0, 532.0, 712.0))
        );
        // The floor wins and the region is pulled back onto the page.
        let small = PageGeometry::new(50.0, 50.0);
        assert_eq!(
            fixed_margin_region(&small, 40.0),
            Some(CropRegion::new(40.0, 40.0, 10.0, 10.0))
        );
        assert_eq!(
            fixed_margin_region(&PageGeometry::new(30.0, 30.0), 40.0),
            Some(CropRegion::new(20.0, 20.0, 10.0, 10.0))
        );
        assert!(fixed_margin_region(&PageGeometry::new(5.0, 100.0), 1.0).is_none());
        assert!(fixed_margin_region(&PageGeometry::invalid(), 40.0).is_none());
    }

    #[test]
    fn test_fixed_margin_first_page_only() {
        let mut first = PageSpec::letter(Vec::new());
        first.crop_box = Some([10.0, 10.0, 100.0, 100.0]);
        let src = source(&[first, PageSpec::letter(Vec::new())]);
        let options = TrimOptions::for_mode(TrimMode::FixedMargin);

        let once = trim(&src, &options).unwrap();
        let twice = trim(&src, &options).unwrap();
        assert_eq!(page_box(&once.bytes, 1, b"CropBox"), Some([40.0, 40.0, 572.0, 752.0]));
        assert_eq!(
            page_box(&once.bytes, 1, b"CropBox"),
            page_box(&twice.bytes, 1, b"CropBox")
        );
        assert!(page_box(&once.bytes, 1, b"TrimBox").is_none());
        assert!(page_box(&once.bytes, 2, b"CropBox").is_none());
        assert_eq!(once.report.pages.len(), 1);
    }

    #[test]
    fn test_metadata_stamp() {
        let src = source(&[PageSpec::letter(Vec::new())]);
        let plain = trim(&src, &TrimOptions::default()).unwrap();
        let doc = Document::load_mem(&plain.bytes).unwrap();
        assert!(doc.trailer.get(b"Info").is_err());

        let stamped = trim(&src, &TrimOptions::default().with_metadata_stamp(true)).unwrap();
        let doc = Document::load_mem(&stamped.bytes).unwrap();
        let info = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_dictionary(info).unwrap();
        let producer = info.get(b"Producer").unwrap().as_str().unwrap();
        assert!(producer.starts_with(b"autotrim"));
        assert!(info.get(b"ModDate").unwrap().as_str().unwrap().starts_with(b"D:"));
    }

    #[test]
    fn test_custom_box_set() {
        let src = SourceDocument::from_bytes(to_bytes(single_page_document(&PageSpec::letter(
            SCENARIO.to_vec(),
        ))))
        .unwrap();
        let output = trim(&src, &TrimOptions::default().with_boxes(BoxSet::CROP)).unwrap();
        assert!(page_box(&output.bytes, 1, b"CropBox").is_some());
        assert_eq!(page_box(&output.bytes, 1, b"MediaBox"), Some([0.0, 0.0, 612.0, 792.0]));
    }
}
