//! The request-scoped input value: raw bytes plus their declared type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Declared content type of an uploaded document.
///
/// Unrecognised MIME types are kept verbatim in [`DocumentKind::Other`] so the
/// extractor can report them; they are never rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Png,
    Jpeg,
    Other(String),
}

impl DocumentKind {
    /// Parse a MIME type. Parameters (`; charset=…`) and case are ignored.
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            MIME_PDF => DocumentKind::Pdf,
            MIME_PNG => DocumentKind::Png,
            MIME_JPEG | "image/jpg" | "image/pjpeg" => DocumentKind::Jpeg,
            MIME_DOCX => DocumentKind::Docx,
            _ => DocumentKind::Other(mime.trim().to_string()),
        }
    }

    /// Canonical MIME type for this kind.
    pub fn mime(&self) -> &str {
        match self {
            DocumentKind::Pdf => MIME_PDF,
            DocumentKind::Docx => MIME_DOCX,
            DocumentKind::Png => MIME_PNG,
            DocumentKind::Jpeg => MIME_JPEG,
            DocumentKind::Other(m) => m,
        }
    }

    /// Raster images have no text layer and always go through OCR.
    pub fn is_raster_image(&self) -> bool {
        matches!(self, DocumentKind::Png | DocumentKind::Jpeg)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// An uploaded document: immutable bytes, declared kind, original file name.
///
/// Cloning is cheap (the bytes are shared), which lets the extractor move the
/// document onto a blocking thread without copying the payload.
#[derive(Clone)]
pub struct RawDocument {
    bytes: Arc<[u8]>,
    kind: DocumentKind,
    filename: String,
}

impl RawDocument {
    pub fn new(bytes: impl Into<Arc<[u8]>>, kind: DocumentKind, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            kind,
            filename: filename.into(),
        }
    }

    /// Build from a MIME type string, as received from an upload form.
    pub fn from_mime(bytes: impl Into<Arc<[u8]>>, mime: &str, filename: impl Into<String>) -> Self {
        Self::new(bytes, DocumentKind::from_mime(mime), filename)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn kind(&self) -> &DocumentKind {
        &self.kind
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for RawDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawDocument")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("kind", &self.kind)
            .field("filename", &self.filename)
            .finish()
    }
}
