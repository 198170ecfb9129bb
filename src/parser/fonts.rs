//! Glyph advance widths.
//!
//! Only what is needed to measure how far a shown string reaches along
//! the baseline: no encodings, no glyph outlines.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use super::backend::{number, resolve, resolve_dict};
use super::standard_fonts::{self, StandardWidths};

/// Width used when a font carries no metrics at all, in thousandths of an em.
pub const FALLBACK_WIDTH: f64 = 500.0;

#[derive(Debug, Clone)]
enum WidthTable {
    /// Single-byte codes with a `/Widths` array starting at `/FirstChar`.
    /// Codes outside it fall back to `/MissingWidth`, then to the built-in
    /// widths of a standard face.
    Simple {
        first_char: u32,
        widths: Vec<f64>,
        missing_width: Option<f64>,
        standard: Option<StandardWidths>,
    },
    /// Two-byte CIDs with `/W` ranges and `/DW`.
    Composite {
        widths: HashMap<u32, f64>,
        default_width: f64,
    },
}

/// Advance widths of one font resource.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    table: WidthTable,
    /// Converts table units to thousandths of text space (Type3 fonts).
    scale: f64,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self::uniform(FALLBACK_WIDTH)
    }
}

impl FontMetrics {
    /// A single-byte font where every glyph has the same width.
    pub fn uniform(width: f64) -> Self {
        Self {
            table: WidthTable::Simple {
                first_char: 0,
                widths: Vec::new(),
                missing_width: Some(width),
                standard: None,
            },
            scale: 1.0,
        }
    }

    /// A single-byte font with explicit widths.
    pub fn simple(first_char: u32, widths: Vec<f64>, missing_width: f64) -> Self {
        Self {
            table: WidthTable::Simple {
                first_char,
                widths,
                missing_width: Some(missing_width),
                standard: None,
            },
            scale: 1.0,
        }
    }

    /// A two-byte font with explicit CID widths.
    pub fn composite(widths: HashMap<u32, f64>, default_width: f64) -> Self {
        Self {
            table: WidthTable::Composite {
                widths,
                default_width,
            },
            scale: 1.0,
        }
    }

    /// Read metrics from a font dictionary.
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let subtype = font
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .unwrap_or(b"Type1");

        if subtype == b"Type0" {
            return Self::from_type0(doc, font);
        }

        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| number(resolve(doc, o)))
            .map(|v| v.max(0.0) as u32)
            .unwrap_or(0);

        let widths: Vec<f64> = font
            .get(b"Widths")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .map(|arr| {
                arr.iter()
                    .map(|w| number(resolve(doc, w)).unwrap_or(0.0))
                    .collect()
            })
            .unwrap_or_default();

        let descriptor = font
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| resolve_dict(doc, o));
        let missing_width = descriptor
            .and_then(|d| d.get(b"MissingWidth").ok())
            .and_then(|o| number(resolve(doc, o)))
            .filter(|w| *w > 0.0);
        let standard = font
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .and_then(standard_fonts::lookup);

        let scale = if subtype == b"Type3" {
            type3_scale(doc, font)
        } else {
            1.0
        };

        Self {
            table: WidthTable::Simple {
                first_char,
                widths,
                missing_width,
                standard,
            },
            scale,
        }
    }

    fn from_type0(doc: &Document, font: &Dictionary) -> Self {
        let descendant = font
            .get(b"DescendantFonts")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| arr.first())
            .and_then(|o| resolve_dict(doc, o));

        let Some(cid_font) = descendant else {
            return Self::composite(HashMap::new(), 1000.0);
        };

        let default_width = cid_font
            .get(b"DW")
            .ok()
            .and_then(|o| number(resolve(doc, o)))
            .unwrap_or(1000.0);

        let widths = cid_font
            .get(b"W")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .map(|arr| parse_cid_widths(doc, arr))
            .unwrap_or_default();

        Self::composite(widths, default_width)
    }

    /// Whether codes are two bytes wide.
    pub fn is_composite(&self) -> bool {
        matches!(self.table, WidthTable::Composite { .. })
    }

    /// Split a shown string into character codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.is_composite() {
            bytes
                .chunks(2)
                .map(|c| match c {
                    [hi, lo] => u32::from(*hi) << 8 | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }

    /// Advance of `code` in thousandths of text space.
    pub fn width(&self, code: u32) -> f64 {
        let raw = match &self.table {
            WidthTable::Simple {
                first_char,
                widths,
                missing_width,
                standard,
            } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .or(*missing_width)
                .or_else(|| standard.map(|s| s.width(code)))
                .unwrap_or(FALLBACK_WIDTH),
            WidthTable::Composite {
                widths,
                default_width,
            } => widths.get(&code).copied().unwrap_or(*default_width),
        };
        raw * self.scale
    }

    /// Word spacing applies to the single-byte code 32 only.
    pub fn is_word_space(&self, code: u32) -> bool {
        code == 32 && !self.is_composite()
    }
}

fn type3_scale(doc: &Document, font: &Dictionary) -> f64 {
    font.get(b"FontMatrix")
        .ok()
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .and_then(|arr| arr.first())
        .and_then(|o| number(resolve(doc, o)))
        .map(|a| a * 1000.0)
        .filter(|s| s.is_finite() && *s != 0.0)
        .unwrap_or(1.0)
}

/// Parse a `/W` array: `c [w1 w2 ...]` and `c_first c_last w` entries.
fn parse_cid_widths(doc: &Document, arr: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < arr.len() {
        let Some(first) = number(resolve(doc, &arr[i])) else {
            break;
        };
        let first = first.max(0.0) as u32;
        match arr.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    let Some(cid) = u32::try_from(offset)
                        .ok()
                        .and_then(|o| first.checked_add(o))
                    else {
                        break;
                    };
                    if let Some(w) = number(resolve(doc, w)) {
                        widths.insert(cid, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(w)) = (
                    number(last),
                    arr.get(i + 2).and_then(|o| number(resolve(doc, o))),
                ) else {
                    break;
                };
                let last = last.max(0.0) as u32;
                // Guard against absurd ranges in broken files.
                for cid in first..=last.min(first.saturating_add(0xFFFF)) {
                    widths.insert(cid, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}
