//! Per-page trim results.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::geometry::{ContentBox, CropRegion};
use crate::mutate::AppliedBoxes;

/// Which operation produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimOperation {
    Text,
    Pixel,
    FixedMargin,
    Manual,
}

impl fmt::Display for TrimOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrimOperation::Text => "text",
            TrimOperation::Pixel => "pixel",
            TrimOperation::FixedMargin => "fixed-margin",
            TrimOperation::Manual => "manual",
        })
    }
}

/// Why a page kept its original boxes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The page's visible box is missing, malformed or too small.
    InvalidGeometry { width: f64, height: f64 },
    /// The detected box did not map to a usable crop region.
    InvalidRegion { content: ContentBox },
    /// A manual selection could not be converted.
    InvalidSelection { detail: String },
    /// A manual selection names a page the document does not have.
    MissingPage,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidGeometry { width, height } => {
                write!(f, "invalid page geometry {width}x{height}")
            }
            SkipReason::InvalidRegion { content } => write!(
                f,
                "no crop region for content ({}, {})-({}, {})",
                content.min_x, content.min_y, content.max_x, content.max_y
            ),
            SkipReason::InvalidSelection { detail } => write!(f, "invalid selection: {detail}"),
            SkipReason::MissingPage => f.write_str("page not in document"),
        }
    }
}

/// What happened to one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageOutcome {
    /// Boxes were rewritten.
    Trimmed {
        region: CropRegion,
        #[serde(flatten)]
        boxes: AppliedBoxes,
        /// Nothing was detected and the region frames the whole page.
        fallback: bool,
    },
    /// The page was left untouched.
    Skipped { reason: SkipReason },
    /// The page was outside the page selection.
    NotSelected,
}

/// Outcome for a 1-indexed page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageReport {
    pub page: u32,
    #[serde(flatten)]
    pub outcome: PageOutcome,
}

impl PageReport {
    pub fn is_trimmed(&self) -> bool {
        matches!(self.outcome, PageOutcome::Trimmed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, PageOutcome::Skipped { .. })
    }
}

/// Summary of one trim run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrimReport {
    pub operation: TrimOperation,
    /// Pages in the output document.
    pub page_count: u32,
    /// Pages that were considered, in page order.
    pub pages: Vec<PageReport>,
}

impl TrimReport {
    pub fn new(operation: TrimOperation, page_count: u32) -> Self {
        Self {
            operation,
            page_count,
            pages: Vec::new(),
        }
    }

    pub fn trimmed_count(&self) -> u32 {
        self.pages.iter().filter(|p| p.is_trimmed()).count() as u32
    }

    pub fn skipped_count(&self) -> u32 {
        self.pages.iter().filter(|p| p.is_skipped()).count() as u32
    }

    /// Report for one page, if it was considered.
    pub fn page(&self, page: u32) -> Option<&PageReport> {
        self.pages.iter().find(|p| p.page == page)
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Other(e.to_string()))
    }
}

/// Trimmed document bytes plus what was done to produce them.
#[derive(Debug, Clone)]
pub struct TrimOutput {
    pub bytes: Vec<u8>,
    pub report: TrimReport,
}

impl TrimOutput {
    /// Write the trimmed document to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
