//! Trim options and configuration.

use std::fmt;
use std::ops::RangeInclusive;

use crossbeam_channel::Sender;
use serde::Serialize;

use crate::analysis::DEFAULT_STRIDE;
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::mutate::BoxSet;

/// Default padding for text-driven trims, in points.
pub const DEFAULT_TEXT_PADDING: f64 = 18.0;
/// Default padding for pixel-driven trims, in points.
pub const DEFAULT_PIXEL_PADDING: f64 = 12.0;
/// Default render scale for pixel-driven trims.
pub const DEFAULT_RENDER_SCALE: f64 = 1.25;
/// Default margin for the fixed-margin crop, in points.
pub const DEFAULT_MARGIN: f64 = 40.0;

/// Which analyzer drives the crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimMode {
    /// Text run geometry from the content stream.
    #[default]
    Text,
    /// Rendered pixels with an Otsu threshold.
    Pixel,
    /// A uniform margin on the first page only, no analysis.
    FixedMargin,
}

impl TrimMode {
    pub fn default_padding(self) -> f64 {
        match self {
            TrimMode::Text => DEFAULT_TEXT_PADDING,
            TrimMode::Pixel => DEFAULT_PIXEL_PADDING,
            TrimMode::FixedMargin => 0.0,
        }
    }

    /// Analyzed trims keep all four boxes in sync; the fixed-margin preview
    /// only moves the CropBox.
    pub fn default_boxes(self) -> BoxSet {
        match self {
            TrimMode::Text | TrimMode::Pixel => BoxSet::ALL,
            TrimMode::FixedMargin => BoxSet::CROP,
        }
    }
}

impl fmt::Display for TrimMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrimMode::Text => "text",
            TrimMode::Pixel => "pixel",
            TrimMode::FixedMargin => "fixed-margin",
        })
    }
}

/// Page selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    /// All pages
    #[default]
    All,
    /// A range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Specific pages (1-indexed)
    Pages(Vec<u32>),
    /// Sorted, non-overlapping ranges (inclusive, 1-indexed)
    Ranges(Vec<RangeInclusive<u32>>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
            PageSelection::Ranges(ranges) => ranges.iter().any(|r| r.contains(&page)),
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        if let Some((start, end)) = s.split_once('-') {
            if !start.contains(',') && !end.contains(',') {
                let start: u32 = start.trim().parse().map_err(|_| "Invalid start page")?;
                let end: u32 = end.trim().parse().map_err(|_| "Invalid end page")?;
                if start > end {
                    return Err(format!("Empty page range {start}-{end}"));
                }
                return Ok(PageSelection::Range(start..=end));
            }
        }

        let mut ranges = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            let (start, end) = match part.split_once('-') {
                Some((start, end)) => (start.trim(), end.trim()),
                None => (part, part),
            };
            let start: u32 = start.parse().map_err(|_| "Invalid page number")?;
            let end: u32 = end.parse().map_err(|_| "Invalid page number")?;
            if start > end {
                return Err(format!("Empty page range {start}-{end}"));
            }
            ranges.push(start..=end);
        }

        ranges.sort_unstable_by_key(|r| *r.start());
        let mut merged: Vec<RangeInclusive<u32>> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if *range.start() <= last.end().saturating_add(1) => {
                    *last = *last.start()..=*last.end().max(range.end());
                }
                _ => merged.push(range),
            }
        }
        Ok(PageSelection::Ranges(merged))
    }
}

/// Progress notifications sent while a trim runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TrimEvent {
    /// Analysis is about to start.
    Started { total_pages: u32 },
    /// One page finished analysis. Arrives out of order when parallel.
    PageAnalyzed { page: u32 },
    /// A page kept its original boxes.
    PageSkipped { page: u32, reason: String },
    /// Boxes were written to a page.
    PageTrimmed { page: u32 },
    /// The output document was serialized.
    Finished { trimmed: u32, skipped: u32 },
}

/// Options for a trim run.
#[derive(Debug, Clone)]
pub struct TrimOptions {
    /// Which analyzer to use
    pub mode: TrimMode,

    /// Padding around detected content in points (`None` = mode default)
    pub padding: Option<f64>,

    /// Render scale for pixel analysis
    pub scale: f64,

    /// Pixel sampling stride for pixel analysis
    pub stride: usize,

    /// Margin for the fixed-margin crop, in points
    pub margin: f64,

    /// Which pages to trim
    pub pages: PageSelection,

    /// Which boxes to write (`None` = mode default)
    pub boxes: Option<BoxSet>,

    /// Analyze pages in parallel
    pub parallel: bool,

    /// Set Producer and ModDate in the document info
    pub stamp_metadata: bool,

    /// Cooperative cancellation
    pub cancel: Option<CancellationToken>,

    /// Progress sink
    pub progress: Option<Sender<TrimEvent>>,
}

impl TrimOptions {
    /// Create new trim options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for `mode` with its defaults.
    pub fn for_mode(mode: TrimMode) -> Self {
        Self::default().with_mode(mode)
    }

    /// Set the trim mode.
    pub fn with_mode(mut self, mode: TrimMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set padding in points.
    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = Some(padding);
        self
    }

    /// Set the render scale for pixel analysis.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the pixel sampling stride.
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Set the fixed-margin width in points.
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Set which boxes to write.
    pub fn with_boxes(mut self, boxes: BoxSet) -> Self {
        self.boxes = Some(boxes);
        self
    }

    /// Enable or disable parallel analysis.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel analysis.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Stamp Producer and ModDate into the output.
    pub fn with_metadata_stamp(mut self, stamp: bool) -> Self {
        self.stamp_metadata = stamp;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Send progress events to `sender`.
    pub fn with_progress(mut self, sender: Sender<TrimEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Padding actually applied: the mode default when unset, 0 when not finite.
    pub fn effective_padding(&self) -> f64 {
        let padding = self.padding.unwrap_or_else(|| self.mode.default_padding());
        if padding.is_finite() {
            padding
        } else {
            0.0
        }
    }

    /// Scale actually used: 1 when not finite or not positive.
    pub fn effective_scale(&self) -> f64 {
        if self.scale.is_finite() && self.scale > 0.0 {
            self.scale
        } else {
            1.0
        }
    }

    pub fn effective_boxes(&self) -> BoxSet {
        self.boxes.unwrap_or_else(|| self.mode.default_boxes())
    }

    /// Reject values no trim can run with.
    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(Error::InvalidOption("stride must be at least 1".to_string()));
        }
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(Error::InvalidOption(format!(
                "margin must be a non-negative number, got {}",
                self.margin
            )));
        }
        if self.boxes.is_some_and(|b| b.is_empty()) {
            return Err(Error::InvalidOption("no page boxes selected".to_string()));
        }
        Ok(())
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }

    pub(crate) fn emit(&self, event: TrimEvent) {
        if let Some(sender) = &self.progress {
            // A dropped receiver only means nobody is listening.
            let _ = sender.send(event);
        }
    }
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self {
            mode: TrimMode::Text,
            padding: None,
            scale: DEFAULT_RENDER_SCALE,
            stride: DEFAULT_STRIDE,
            margin: DEFAULT_MARGIN,
            pages: PageSelection::All,
            boxes: None,
            parallel: true,
            stamp_metadata: false,
            cancel: None,
            progress: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutate::BoxKind;

    #[test]
    fn test_trim_options_builder() {
        let options = TrimOptions::for_mode(TrimMode::Pixel)
            .with_padding(6.0)
            .with_scale(2.0)
            .with_stride(1)
            .sequential();

        assert_eq!(options.mode, TrimMode::Pixel);
        assert_eq!(options.effective_padding(), 6.0);
        assert_eq!(options.effective_scale(), 2.0);
        assert_eq!(options.stride, 1);
        assert!(!options.parallel);
    }

    #[test]
    fn test_default_options() {
        let options = TrimOptions::default();
        assert_eq!(options.mode, TrimMode::Text);
        assert_eq!(options.effective_padding(), DEFAULT_TEXT_PADDING);
        assert_eq!(options.effective_boxes(), BoxSet::ALL);
        assert!(options.parallel);
        assert!(!options.stamp_metadata);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_mode_defaults() {
        assert_eq!(TrimOptions::for_mode(TrimMode::Pixel).effective_padding(), 12.0);
        assert_eq!(
            TrimOptions::for_mode(TrimMode::FixedMargin).effective_boxes(),
            BoxSet::CROP
        );
        assert_eq!(TrimMode::FixedMargin.to_string(), "fixed-margin");
    }

    #[test]
    fn test_sanitized_values() {
        let options = TrimOptions::new()
            .with_padding(f64::NAN)
            .with_scale(-3.0);
        assert_eq!(options.effective_padding(), 0.0);
        assert_eq!(options.effective_scale(), 1.0);
    }

    #[test]
    fn test_validate_rejects() {
        assert!(matches!(
            TrimOptions::new().with_stride(0).validate(),
            Err(Error::InvalidOption(_))
        ));
        assert!(TrimOptions::new().with_margin(-1.0).validate().is_err());
        assert!(TrimOptions::new()
            .with_boxes(BoxSet::EMPTY)
            .validate()
            .is_err());
        assert!(TrimOptions::new()
            .with_boxes(BoxSet::CROP.with(BoxKind::Trim))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_cancellation_check() {
        let token = CancellationToken::new();
        let options = TrimOptions::new().with_cancellation(token.clone());
        assert!(options.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(options.check_cancelled(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_progress_events() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let options = TrimOptions::new().with_progress(tx);
        options.emit(TrimEvent::Started { total_pages: 3 });
        assert_eq!(rx.try_recv().unwrap(), TrimEvent::Started { total_pages: 3 });
    }

    #[test]
    fn test_page_selection_includes() {
        let all = PageSelection::All;
        assert!(all.includes(1));
        assert!(all.includes(100));

        let range = PageSelection::Range(5..=10);
        assert!(!range.includes(4));
        assert!(range.includes(5));
        assert!(range.includes(10));
        assert!(!range.includes(11));

        let pages = PageSelection::Pages(vec![1, 3, 5, 7]);
        assert!(pages.includes(1));
        assert!(!pages.includes(2));
    }

    #[test]
    fn test_page_selection_parse() {
        assert_eq!(PageSelection::parse("all").unwrap(), PageSelection::All);
        assert_eq!(PageSelection::parse("1-10").unwrap(), PageSelection::Range(1..=10));
        assert_eq!(
            PageSelection::parse("7-8,1,3,5-7,2").unwrap(),
            PageSelection::Ranges(vec![1..=3, 5..=8])
        );
        assert!(PageSelection::parse("10-1").is_err());
        assert!(PageSelection::parse("1,5-3").is_err());
        assert!(PageSelection::parse("x").is_err());
    }

    #[test]
    fn test_page_selection_wide_list_is_not_expanded() {
        let selection = PageSelection::parse("1,1-4000000000").unwrap();
        assert_eq!(selection, PageSelection::Ranges(vec![1..=4_000_000_000]));
        assert!(selection.includes(3_999_999_999));
        assert!(!selection.includes(0));
    }
}
