//! # autotrim
//!
//! Automatic PDF page trimming for Rust.
//!
//! This library finds the visible content of every page of a PDF and
//! rewrites the page boxes (CropBox, MediaBox, TrimBox, BleedBox) so they
//! frame that content with a little padding.
//!
//! ## Quick Start
//!
//! ```no_run
//! use autotrim::{trim_file, TrimMode, TrimOptions};
//!
//! fn main() -> autotrim::Result<()> {
//!     // Trim every page around its text, 18pt of padding
//!     let output = trim_file("scan.pdf", &TrimOptions::for_mode(TrimMode::Text))?;
//!     output.save("auto_trimmed.pdf")?;
//!
//!     println!("{} pages trimmed", output.report.trimmed_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Text mode**: content box from glyph placement in the content stream
//! - **Pixel mode**: content box from a rendered raster and an Otsu threshold
//! - **Fixed margin**: uniform margin on the first page, for a quick preview
//! - **Manual crops**: apply rectangles drawn on a rendered preview
//! - **Parallel processing**: pages are analyzed with Rayon
//! - **Reports**: per-page outcomes, serializable to JSON

pub mod analysis;
pub mod cancel;
pub mod detect;
pub mod error;
pub mod geometry;
pub mod mutate;
pub mod parser;
pub mod source;
pub mod trim;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use analysis::{compute_text_box, Detection};
pub use cancel::CancellationToken;
pub use detect::{detect_format_from_bytes, detect_format_from_path, is_pdf, PdfFormat};
pub use error::{Error, Result};
pub use geometry::{ContentBox, CropRegion, PageGeometry};
pub use mutate::{BoxKind, BoxSet};
pub use source::SourceDocument;
pub use trim::{
    apply_manual_crops, ManualSelection, PageOutcome, PageReport, PageSelection, SkipReason,
    TrimEvent, TrimMode, TrimOptions, TrimOutput, TrimReport,
};

use std::path::Path;

/// Trim a PDF held in memory.
///
/// # Example
///
/// ```no_run
/// use autotrim::{trim_bytes, TrimMode, TrimOptions};
///
/// let data = std::fs::read("scan.pdf").unwrap();
/// let options = TrimOptions::for_mode(TrimMode::Pixel).with_scale(2.0);
/// let output = trim_bytes(&data, &options).unwrap();
/// std::fs::write("auto_trimmed.pdf", output.bytes).unwrap();
/// ```
pub fn trim_bytes(data: &[u8], options: &TrimOptions) -> Result<TrimOutput> {
    let source = SourceDocument::from_bytes(data)?;
    trim::trim(&source, options)
}

/// Trim a PDF file.
pub fn trim_file<P: AsRef<Path>>(path: P, options: &TrimOptions) -> Result<TrimOutput> {
    let source = SourceDocument::open(path)?;
    trim::trim(&source, options)
}

/// Trim every page around its text.
///
/// `padding` is in points; 18 is the usual choice.
///
/// # Example
///
/// ```no_run
/// let data = std::fs::read("scan.pdf").unwrap();
/// let trimmed = autotrim::auto_trim_by_text(&data, 18.0).unwrap();
/// ```
pub fn auto_trim_by_text(data: &[u8], padding: f64) -> Result<Vec<u8>> {
    let options = TrimOptions::for_mode(TrimMode::Text).with_padding(padding);
    Ok(trim_bytes(data, &options)?.bytes)
}

/// Trim every page around its rendered ink.
///
/// `padding` is in points (usually 12), `scale` is the render scale
/// (usually 1.25).
pub fn auto_trim_by_pixels(data: &[u8], padding: f64, scale: f64) -> Result<Vec<u8>> {
    let options = TrimOptions::for_mode(TrimMode::Pixel)
        .with_padding(padding)
        .with_scale(scale);
    Ok(trim_bytes(data, &options)?.bytes)
}

/// Set the first page's CropBox to its MediaBox inset by `margin` points.
///
/// Other pages are left as they are.
pub fn crop_first_page_fixed_margin(data: &[u8], margin: f64) -> Result<Vec<u8>> {
    let options = TrimOptions::for_mode(TrimMode::FixedMargin).with_margin(margin);
    Ok(trim_bytes(data, &options)?.bytes)
}

/// Apply manual selections to a PDF held in memory.
pub fn manual_crop_bytes(data: &[u8], selections: &[ManualSelection]) -> Result<TrimOutput> {
    let source = SourceDocument::from_bytes(data)?;
    apply_manual_crops(&source, selections, &TrimOptions::default())
}

/// Trim on tokio's blocking pool.
#[cfg(feature = "async")]
pub async fn trim_async(data: Vec<u8>, options: TrimOptions) -> Result<TrimOutput> {
    tokio::task::spawn_blocking(move || trim_bytes(&data, &options))
        .await
        .map_err(|e| Error::Other(format!("trim task failed: {e}")))?
}

/// Read, trim and write a file without blocking the async runtime.
#[cfg(feature = "async")]
pub async fn trim_file_async<P, Q>(input: P, output: Q, options: TrimOptions) -> Result<TrimReport>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let data = tokio::fs::read(input).await?;
    let trimmed = trim_async(data, options).await?;
    tokio::fs::write(output, &trimmed.bytes).await?;
    Ok(trimmed.report)
}

/// Builder for trimming PDF documents.
///
/// # Example
///
/// ```no_run
/// use autotrim::{AutoTrim, PageSelection};
///
/// let output = AutoTrim::pixels()
///     .with_padding(6.0)
///     .with_scale(2.0)
///     .with_pages(PageSelection::Range(1..=10))
///     .sequential()
///     .trim_file("scan.pdf")?;
/// output.save("auto_trimmed.pdf")?;
/// # Ok::<(), autotrim::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct AutoTrim {
    options: TrimOptions,
}

impl AutoTrim {
    /// Create a new builder (text mode).
    pub fn new() -> Self {
        Self::default()
    }

    /// Text mode builder.
    pub fn text() -> Self {
        Self::new().with_mode(TrimMode::Text)
    }

    /// Pixel mode builder.
    pub fn pixels() -> Self {
        Self::new().with_mode(TrimMode::Pixel)
    }

    /// Fixed-margin builder.
    pub fn fixed_margin(margin: f64) -> Self {
        Self::new()
            .with_mode(TrimMode::FixedMargin)
            .with_margin(margin)
    }

    /// Set the trim mode.
    pub fn with_mode(mut self, mode: TrimMode) -> Self {
        self.options = self.options.with_mode(mode);
        self
    }

    /// Set padding in points.
    pub fn with_padding(mut self, padding: f64) -> Self {
        self.options = self.options.with_padding(padding);
        self
    }

    /// Set the render scale (pixel mode).
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.options = self.options.with_scale(scale);
        self
    }

    /// Set the sampling stride (pixel mode).
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.options = self.options.with_stride(stride);
        self
    }

    /// Set the margin (fixed-margin mode).
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.options = self.options.with_margin(margin);
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.options = self.options.with_pages(pages);
        self
    }

    /// Set which boxes to write.
    pub fn with_boxes(mut self, boxes: BoxSet) -> Self {
        self.options = self.options.with_boxes(boxes);
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.options = self.options.sequential();
        self
    }

    /// Stamp Producer and ModDate.
    pub fn with_metadata_stamp(mut self) -> Self {
        self.options = self.options.with_metadata_stamp(true);
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.options = self.options.with_cancellation(token);
        self
    }

    /// The options built so far.
    pub fn options(&self) -> &TrimOptions {
        &self.options
    }

    /// Trim a PDF file.
    pub fn trim_file<P: AsRef<Path>>(&self, path: P) -> Result<TrimOutput> {
        trim_file(path, &self.options)
    }

    /// Trim a PDF from bytes.
    pub fn trim_bytes(&self, data: &[u8]) -> Result<TrimOutput> {
        trim_bytes(data, &self.options)
    }

    /// Trim an already loaded document.
    pub fn trim(&self, source: &SourceDocument) -> Result<TrimOutput> {
        trim::trim(source, &self.options)
    }
}
