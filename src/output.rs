//! Result types produced by each pipeline stage.
//!
//! Every stage returns a value, never an error: failures travel alongside the
//! (possibly empty) result so callers can always render something.

use crate::error::{ClassifyError, ExtractError};
use serde::{Deserialize, Serialize};

/// Which strategy produced the extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    /// Read from the PDF's embedded text layer.
    TextLayer,
    /// Recognised from page or image pixels.
    Ocr,
    /// Read from word-processing paragraphs.
    Paragraphs,
    /// No strategy produced text.
    None,
}

/// Text extracted from one document plus the diagnostics gathered on the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    /// Trimmed UTF-8 text. Empty means every strategy failed.
    pub text: String,
    pub method: ExtractionMethod,
    /// Pages in the PDF, when known.
    pub page_count: Option<usize>,
    /// Pages (or images) passed through OCR.
    pub ocr_pages: usize,
    /// OCR stopped at the page or time ceiling before the last page.
    pub ocr_truncated: bool,
    /// Non-fatal failures, in the order they happened.
    pub issues: Vec<ExtractError>,
}

impl Extraction {
    pub(crate) fn empty(issues: Vec<ExtractError>) -> Self {
        Self {
            text: String::new(),
            method: ExtractionMethod::None,
            page_count: None,
            ocr_pages: 0,
            ocr_truncated: false,
            issues,
        }
    }

    /// `true` when no usable text was produced; callers must stop here.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// The four-field summary returned by the remote model.
///
/// Every field is an open string and defaults to `""`; `document_type` is
/// requested as one of `Resume`, `Cover_Letter`, `Proposal`, `Other` but the
/// model is not trusted to comply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationRecord {
    pub document_type: String,
    pub candidate_name: String,
    pub job_title: String,
    pub company: String,
}

impl ClassificationRecord {
    pub fn is_empty(&self) -> bool {
        self.document_type.is_empty()
            && self.candidate_name.is_empty()
            && self.job_title.is_empty()
            && self.company.is_empty()
    }

    /// Lenient conversion from a decoded JSON object.
    ///
    /// Missing keys and non-string values become empty strings.
    pub fn from_json_object(obj: &serde_json::Map<String, serde_json::Value>) -> Self {
        let field = |key: &str| -> String {
            match obj.get(key) {
                Some(serde_json::Value::String(s)) => s.trim().to_string(),
                Some(other) => {
                    tracing::debug!("Ignoring non-string '{}' in classification: {}", key, other);
                    String::new()
                }
                None => String::new(),
            }
        };
        Self {
            document_type: field("document_type"),
            candidate_name: field("candidate_name"),
            job_title: field("job_title"),
            company: field("company"),
        }
    }
}

/// Outcome of a classification attempt: the record is always usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classification {
    pub record: ClassificationRecord,
    /// Why the record is empty, when it is empty because of a failure.
    pub error: Option<ClassifyError>,
    /// Record keys the model's answer did not contain at all.
    #[serde(default)]
    pub missing_fields: Vec<String>,
}

impl Classification {
    pub(crate) fn failed(error: ClassifyError) -> Self {
        Self {
            record: ClassificationRecord::default(),
            error: Some(error),
            missing_fields: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// `true` when classification failed or the answer omitted `field`.
    pub fn is_missing(&self, field: &str) -> bool {
        self.error.is_some() || self.missing_fields.iter().any(|f| f == field)
    }
}

/// Everything one request produced, in pipeline order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingReport {
    pub original_filename: String,
    pub extraction: Extraction,
    pub classification: Classification,
    /// Suggested names, most specific first. May be empty.
    pub variants: Vec<String>,
    pub duration_ms: u64,
}
