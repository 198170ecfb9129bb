//! Immutable input document.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::detect::{detect_format_from_bytes, PdfFormat};
use crate::error::Result;

/// The caller's PDF bytes.
///
/// The buffer is never handed to a decoder directly. Every consumer gets
/// its own copy through [`SourceDocument::fork`], so the analysis decoder
/// and the mutation decoder can never observe each other's state.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    bytes: Arc<[u8]>,
    format: PdfFormat,
}

impl SourceDocument {
    /// Wrap a byte buffer, rejecting anything without a PDF header.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self> {
        let data: Vec<u8> = data.into();
        let format = detect_format_from_bytes(&data)?;
        Ok(Self {
            bytes: Arc::from(data),
            format,
        })
    }

    /// Read a file into memory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Read everything from a reader.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// An independent, owned copy of the input for one decoder.
    pub fn fork(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// Read-only view of the input.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Header information detected on load.
    pub fn format(&self) -> &PdfFormat {
        &self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
