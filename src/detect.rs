//! PDF format detection.
//!
//! Runs before any decoder touches the input so that non-PDF bytes fail
//! fast with [`Error::UnknownFormat`] instead of a parser message.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// PDF format information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Byte offset of the `%PDF-` marker
    pub header_offset: usize,
    /// Whether the file starts with a linearization dictionary
    pub linearized: bool,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)?;
        if self.linearized {
            write!(f, " (linearized)")?;
        }
        Ok(())
    }
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3;

/// Readers tolerate junk before the header; this is the window they scan.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// The linearization dictionary must be the first object in the file.
const LINEARIZED_SEARCH_WINDOW: usize = 2048;

/// Detect PDF format from a file path.
///
/// # Example
/// ```no_run
/// use autotrim::detect::detect_format_from_path;
///
/// let format = detect_format_from_path("document.pdf").unwrap();
/// println!("PDF version: {}", format.version);
/// ```
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<PdfFormat> {
    let file = File::open(path)?;
    let mut head = Vec::with_capacity(LINEARIZED_SEARCH_WINDOW);
    file.take(LINEARIZED_SEARCH_WINDOW as u64)
        .read_to_end(&mut head)?;
    detect_format_from_bytes(&head)
}

/// Detect PDF format from bytes.
///
/// Accepts a `%PDF-x.y` header anywhere in the first 1024 bytes.
///
/// # Returns
/// * `Ok(PdfFormat)` if a header with a well-formed version was found
/// * `Err(Error::UnknownFormat)` if there is no header
/// * `Err(Error::UnsupportedVersion)` if the version is not `d.d`
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PdfFormat> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let header_offset = find(window, PDF_MAGIC).ok_or(Error::UnknownFormat)?;

    let version_start = header_offset + PDF_MAGIC.len();
    let version_bytes = data
        .get(version_start..version_start + VERSION_LEN)
        .ok_or(Error::UnknownFormat)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::UnsupportedVersion(version));
    }

    let tail = &data[header_offset..data.len().min(header_offset + LINEARIZED_SEARCH_WINDOW)];
    let linearized = find(tail, b"/Linearized").is_some();

    Ok(PdfFormat {
        version,
        header_offset,
        linearized,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_digit() && bytes[1] == b'.' && bytes[2].is_ascii_digit()
}

/// Check if a file is a PDF.
pub fn is_pdf<P: AsRef<Path>>(path: P) -> bool {
    detect_format_from_path(path).is_ok()
}

/// Check if bytes look like a PDF.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}
