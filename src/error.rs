//! Error types for the autotrim library.

use std::io;
use thiserror::Error;

use crate::geometry::CropRegion;

/// Result type alias for autotrim operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a trim.
///
/// Page-local problems (unreadable page size, empty detection, a crop region
/// that cannot be built) never surface here; they are reported per page in
/// [`TrimReport`](crate::trim::TrimReport) and the page is left untouched.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// The document could not be decoded.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// Writing a page box failed for a reason other than the box being
    /// unsupported by the target.
    #[error("Failed to apply crop to page {page_index} ({region}): {cause}")]
    Mutation {
        /// 1-indexed page number
        page_index: u32,
        /// Region that was being written
        region: CropRegion,
        /// Underlying failure
        cause: String,
    },

    /// A page could not be rasterized.
    #[error("Render error: {0}")]
    Render(String),

    /// Serializing the trimmed document failed.
    #[error("Failed to write PDF: {0}")]
    Write(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// An option value is out of range.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            _ => Error::PdfParse(err.to_string()),
        }
    }
}
