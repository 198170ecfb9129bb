//! Page box mutation.
//!
//! Each requested box is written independently. A target that does not
//! support a box kind says so with [`BoxError::Unsupported`] and the box is
//! skipped; any other failure aborts the trim with [`Error::Mutation`].

use std::fmt;
use std::str::FromStr;

use lopdf::{Document, Object};
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::geometry::{CropRegion, PageGeometry};
use crate::parser::PageId;

/// One of the four page boundary boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BoxKind {
    Crop,
    Media,
    Trim,
    Bleed,
}

impl BoxKind {
    pub const ALL: [BoxKind; 4] = [BoxKind::Crop, BoxKind::Media, BoxKind::Trim, BoxKind::Bleed];

    /// Page dictionary key.
    pub fn key(self) -> &'static str {
        match self {
            BoxKind::Crop => "CropBox",
            BoxKind::Media => "MediaBox",
            BoxKind::Trim => "TrimBox",
            BoxKind::Bleed => "BleedBox",
        }
    }

    fn bit(self) -> u8 {
        match self {
            BoxKind::Crop => 1,
            BoxKind::Media => 2,
            BoxKind::Trim => 4,
            BoxKind::Bleed => 8,
        }
    }
}

impl fmt::Display for BoxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A set of [`BoxKind`]s, iterated in Crop, Media, Trim, Bleed order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BoxSet(u8);

impl BoxSet {
    pub const EMPTY: BoxSet = BoxSet(0);
    pub const CROP: BoxSet = BoxSet(1);
    pub const ALL: BoxSet = BoxSet(0b1111);

    pub fn contains(self, kind: BoxKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn insert(&mut self, kind: BoxKind) {
        self.0 |= kind.bit();
    }

    pub fn with(mut self, kind: BoxKind) -> Self {
        self.insert(kind);
        self
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = BoxKind> {
        BoxKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl fmt::Debug for BoxSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for BoxSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl FromIterator<BoxKind> for BoxSet {
    fn from_iter<I: IntoIterator<Item = BoxKind>>(iter: I) -> Self {
        let mut set = BoxSet::EMPTY;
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl FromStr for BoxSet {
    type Err = String;

    /// Parse `"all"` or a comma-separated list such as `"crop,trim"`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(BoxSet::ALL);
        }
        let mut set = BoxSet::EMPTY;
        for part in s.split(',') {
            let kind = match part.trim().to_ascii_lowercase().as_str() {
                "crop" | "cropbox" => BoxKind::Crop,
                "media" | "mediabox" => BoxKind::Media,
                "trim" | "trimbox" => BoxKind::Trim,
                "bleed" | "bleedbox" => BoxKind::Bleed,
                other => return Err(format!("Unknown page box: {other}")),
            };
            set.insert(kind);
        }
        if set.is_empty() {
            return Err("No page boxes given".to_string());
        }
        Ok(set)
    }
}

/// Why a single box could not be written.
#[derive(Debug, Clone, PartialEq)]
pub enum BoxError {
    /// The target cannot hold this box kind.
    Unsupported,
    /// The write failed.
    Failed(String),
}

/// Something whose pages can receive boundary boxes.
pub trait PageBoxTarget {
    /// Write `rect` (`[llx lly urx ury]`, absolute user space) as `kind`.
    fn set_page_box(
        &mut self,
        page: PageId,
        kind: BoxKind,
        rect: [f64; 4],
    ) -> std::result::Result<(), BoxError>;
}

/// [`PageBoxTarget`] over a mutable `lopdf::Document`.
pub struct LopdfBoxTarget<'a> {
    doc: &'a mut Document,
}

impl<'a> LopdfBoxTarget<'a> {
    pub fn new(doc: &'a mut Document) -> Self {
        Self { doc }
    }
}

impl PageBoxTarget for LopdfBoxTarget<'_> {
    fn set_page_box(
        &mut self,
        page: PageId,
        kind: BoxKind,
        rect: [f64; 4],
    ) -> std::result::Result<(), BoxError> {
        let object = self
            .doc
            .get_object_mut(page)
            .map_err(|e| BoxError::Failed(e.to_string()))?;
        let dict = object
            .as_dict_mut()
            .map_err(|_| BoxError::Failed("page object is not a dictionary".to_string()))?;
        dict.set(kind.key(), Object::Array(rect.iter().map(|v| pdf_number(*v)).collect()));
        Ok(())
    }
}

/// Integers stay integers in the written file; everything else is a real.
fn pdf_number(value: f64) -> Object {
    if value.fract() == 0.0 && value.abs() < 1e9 {
        Object::Integer(value as i64)
    } else {
        Object::Real(value as f32)
    }
}

/// Which boxes were written for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AppliedBoxes {
    pub applied: BoxSet,
    pub unsupported: BoxSet,
}

/// Write `region` to every box in `boxes` on one page.
///
/// `page_index` is the 1-based page number used in errors.
pub fn apply_crop_region<T: PageBoxTarget + ?Sized>(
    target: &mut T,
    page_index: u32,
    page: PageId,
    region: &CropRegion,
    geometry: &PageGeometry,
    boxes: BoxSet,
) -> Result<AppliedBoxes> {
    let rect = region.to_pdf_rect(geometry);
    let mut outcome = AppliedBoxes::default();

    for kind in boxes.iter() {
        match target.set_page_box(page, kind, rect) {
            Ok(()) => outcome.applied.insert(kind),
            Err(BoxError::Unsupported) => {
                log::debug!("page {}: {} not supported by target", page_index, kind);
                outcome.unsupported.insert(kind);
            }
            Err(BoxError::Failed(cause)) => {
                log::error!(
                    "page {}: setting {} to {} failed: {}",
                    page_index,
                    kind,
                    region,
                    cause
                );
                return Err(Error::Mutation {
                    page_index,
                    region: *region,
                    cause,
                });
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::backend::rect_from_object;
    use crate::test_support::{single_page_document, PageSpec};
    use std::collections::HashMap;

    /// Only knows Crop and Media boxes, like a minimal page model.
    #[derive(Default)]
    struct MinimalTarget {
        written: HashMap<BoxKind, [f64; 4]>,
        fail_on: Option<BoxKind>,
    }

    impl PageBoxTarget for MinimalTarget {
        fn set_page_box(
            &mut self,
            _page: PageId,
            kind: BoxKind,
            rect: [f64; 4],
        ) -> std::result::Result<(), BoxError> {
            if self.fail_on == Some(kind) {
                return Err(BoxError::Failed("corrupt page".into()));
            }
            match kind {
                BoxKind::Crop | BoxKind::Media => {
                    self.written.insert(kind, rect);
                    Ok(())
                }
                _ => Err(BoxError::Unsupported),
            }
        }
    }

    fn region() -> CropRegion {
        CropRegion::new(82.0, 74.0, 436.0, 636.0)
    }

    #[test]
    fn test_box_set_parse_and_iter() {
        let set: BoxSet = "trim, crop".parse().unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![BoxKind::Crop, BoxKind::Trim]);
        assert_eq!("ALL".parse::<BoxSet>().unwrap(), BoxSet::ALL);
        assert!("crop,foo".parse::<BoxSet>().is_err());
        assert_eq!(BoxSet::ALL.iter().count(), 4);
        assert_eq!(serde_json::to_string(&BoxSet::CROP).unwrap(), "[\"Crop\"]");
    }

    #[test]
    fn test_unsupported_boxes_are_skipped() {
        let mut target = MinimalTarget::default();
        let g = PageGeometry::new(612.0, 792.0);
        let outcome =
            apply_crop_region(&mut target, 1, (1, 0), &region(), &g, BoxSet::ALL).unwrap();

        assert_eq!(outcome.applied, BoxSet::CROP.with(BoxKind::Media));
        assert_eq!(
            outcome.unsupported,
            BoxSet::EMPTY.with(BoxKind::Trim).with(BoxKind::Bleed)
        );
        assert_eq!(target.written[&BoxKind::Crop], [82.0, 74.0, 518.0, 710.0]);
    }

    #[test]
    fn test_failure_is_fatal() {
        let mut target = MinimalTarget {
            fail_on: Some(BoxKind::Media),
            ..Default::default()
        };
        let g = PageGeometry::new(612.0, 792.0);
        let err =
            apply_crop_region(&mut target, 4, (9, 0), &region(), &g, BoxSet::ALL).unwrap_err();
        match err {
            Error::Mutation {
                page_index,
                region: r,
                cause,
            } => {
                assert_eq!(page_index, 4);
                assert_eq!(r, region());
                assert_eq!(cause, "corrupt page");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lopdf_target_writes_all_boxes() {
        let mut doc = single_page_document(&PageSpec::letter(Vec::new()));
        let page = *doc.get_pages().values().next().unwrap();
        let g = PageGeometry::from_rect([10.0, 10.0, 622.0, 802.0]);

        let outcome = apply_crop_region(
            &mut LopdfBoxTarget::new(&mut doc),
            1,
            page,
            &CropRegion::new(0.5, 0.0, 100.0, 200.0),
            &g,
            BoxSet::ALL,
        )
        .unwrap();
        assert_eq!(outcome.applied, BoxSet::ALL);

        let dict = doc.get_dictionary(page).unwrap();
        for kind in BoxKind::ALL {
            let rect = rect_from_object(&doc, dict.get(kind.key().as_bytes()).unwrap()).unwrap();
            assert_eq!(rect, [10.5, 10.0, 110.5, 210.0]);
        }
        assert!(matches!(
            dict.get(b"CropBox").unwrap().as_array().unwrap()[1],
            Object::Integer(10)
        ));
    }

    #[test]
    fn test_lopdf_target_missing_page_fails() {
        let mut doc = single_page_document(&PageSpec::letter(Vec::new()));
        let g = PageGeometry::new(612.0, 792.0);
        let result = apply_crop_region(
            &mut LopdfBoxTarget::new(&mut doc),
            2,
            (999, 0),
            &region(),
            &g,
            BoxSet::CROP,
        );
        assert!(matches!(result, Err(Error::Mutation { page_index: 2, .. })));
    }
}
