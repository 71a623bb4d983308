//! Error types for the docnamer library.
//!
//! Three error types reflect the three ways a request can go wrong:
//!
//! * [`DocNamerError`]: **Fatal**: the request cannot produce suggestions at
//!   all (file missing or too large, invalid configuration, no text could be
//!   extracted). Returned as `Err(DocNamerError)` from the `suggest_names*`
//!   entry points.
//!
//! * [`ExtractError`]: **Non-fatal**: one extraction strategy failed (corrupt
//!   PDF, tesseract missing, undecodable image). Collected in
//!   [`crate::output::Extraction::issues`] while the extractor moves on to the
//!   next tier.
//!
//! * [`ClassifyError`]: **Non-fatal**: the remote classification did not
//!   yield a usable record. Stored in [`crate::output::Classification::error`]
//!   next to an empty record, so naming still runs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docnamer library.
#[derive(Debug, Error)]
pub enum DocNamerError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exceeds the configured upload ceiling.
    #[error("File '{path}' is {size} bytes, above the {limit} byte limit")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// HTTP download of a URL input failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// HTTP download timed out.
    #[error("Download timed out after {secs}s: '{url}'\nTry increasing --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// No MIME type was given and none could be guessed from the file name.
    #[error("Cannot determine the type of '{path}'\nPass the MIME type explicitly (e.g. --mime application/pdf).")]
    UnknownType { path: PathBuf },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Every extraction strategy came back empty; classification is skipped.
    #[error("Failed to process document: no text could be extracted ({})", summarize(.issues))]
    NoTextExtracted { issues: Vec<ExtractError> },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The chosen name is not a plain file name.
    #[error("Refusing to save as '{name}': not a plain file name")]
    InvalidTargetName { name: String },

    /// Could not create or write the renamed copy.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn summarize(issues: &[ExtractError]) -> String {
    match issues.first() {
        None => "document contains no text".to_string(),
        Some(first) if issues.len() == 1 => first.to_string(),
        Some(first) => format!("{} (+{} more)", first, issues.len() - 1),
    }
}

/// A non-fatal failure of one extraction strategy.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ExtractError {
    /// The declared MIME type has no extraction strategy.
    #[error("unsupported document type '{mime}'")]
    UnsupportedType { mime: String },

    /// The pdfium library could not be loaded.
    #[error("failed to bind to pdfium library: {0}\nSet PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide.")]
    PdfiumUnavailable(String),

    /// pdfium rejected the document (corrupt, encrypted, truncated).
    #[error("PDF could not be opened: {detail}")]
    PdfOpen { detail: String },

    /// Reading a page's text layer failed.
    #[error("text layer of page {page} could not be read: {detail}")]
    TextLayer { page: usize, detail: String },

    /// The text layer was readable but held no text (scanned document).
    #[error("PDF has no text layer")]
    EmptyTextLayer,

    /// Rasterising a page for OCR failed.
    #[error("page {page} could not be rendered: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Raster image bytes could not be decoded.
    #[error("image could not be decoded: {0}")]
    ImageDecode(String),

    /// The OCR engine is not installed or could not be started.
    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    /// The OCR engine ran but failed on a page.
    #[error("OCR failed on page {page}: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// OCR stopped early because of the page or time ceiling.
    #[error("OCR stopped after {pages} pages: {reason}")]
    OcrTruncated { pages: usize, reason: String },

    /// The word-processing document could not be parsed.
    #[error("DOCX could not be parsed: {0}")]
    Docx(String),

    /// A parsing library panicked on malformed input.
    #[error("{stage} panicked on malformed input")]
    Panicked { stage: String },

    /// The blocking extraction task could not be joined.
    #[error("extraction task failed: {0}")]
    Task(String),
}

/// A non-fatal failure of the remote classification step.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ClassifyError {
    /// No credential was supplied; the request was never sent.
    #[error("Please enter your API key\nSet TOGETHER_API_KEY or pass --api-key.")]
    MissingCredential,

    /// The request could not be sent or the response could not be read.
    #[error("AI analysis failed: {message}")]
    Remote { message: String },

    /// The remote call exceeded the configured timeout.
    #[error("AI analysis timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The endpoint answered with a non-success status.
    #[error("AI analysis failed: HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response contained no brace-delimited span.
    #[error("AI response contained no JSON object")]
    NoJsonFound,

    /// A brace-delimited span was found but none of it decoded as JSON.
    #[error("AI response JSON could not be decoded: {detail}")]
    InvalidJson { detail: String },

    /// JSON decoded but carries none of the classification fields.
    #[error("AI response JSON has an unexpected shape: expected classification fields, got {found}")]
    UnexpectedShape { found: String },
}

impl ClassifyError {
    /// `true` for failures caused by the remote service rather than its output.
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            ClassifyError::Remote { .. } | ClassifyError::Timeout { .. } | ClassifyError::HttpStatus { .. }
        )
    }

    /// `true` when the service answered but the answer was unusable.
    pub fn is_malformed_response(&self) -> bool {
        matches!(
            self,
            ClassifyError::NoJsonFound
                | ClassifyError::InvalidJson { .. }
                | ClassifyError::UnexpectedShape { .. }
        )
    }
}
