//! Filename suggestions from a classification record.
//!
//! Pure string work: no I/O, no allocation beyond the result, same output for
//! the same input. Five fixed templates are rendered in order of
//! specificity; any result that would start with `_` (its leading field was
//! empty) is dropped.
//!
//! Interior empty fields are **not** collapsed: a record without a job title
//! yields `Jane_Doe__Acme_Corp_Resume.pdf`. The doubled underscore marks the
//! missing field and keeps every template's output distinct.

use crate::output::{Classification, ClassificationRecord};
use once_cell::sync::Lazy;
use regex::Regex;

/// Anything that is not ASCII alphanumeric, `_` or `-`.
static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").unwrap());

/// Split a file name into `(base, extension)`.
///
/// The extension starts at the last `.` of the final path component and
/// keeps its dot; leading dots never start an extension (`.bashrc` has
/// none). The extension is returned as written, not lower-cased.
pub fn split_extension(filename: &str) -> (&str, &str) {
    let name_start = filename.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
    let name = &filename[name_start..];

    match name.rfind('.') {
        Some(dot) if name[..dot].chars().any(|c| c != '.') => {
            let split = name_start + dot;
            (&filename[..split], &filename[split..])
        }
        _ => (filename, ""),
    }
}

/// Make one field safe for a filename.
///
/// Spaces become `_`, everything outside `[A-Za-z0-9_-]` is removed, then
/// leading and trailing `_` are trimmed. Non-ASCII letters are dropped, not
/// transliterated: `José` becomes `Jos`.
pub fn sanitize_component(text: &str) -> String {
    let underscored = text.replace(' ', "_");
    RE_UNSAFE
        .replace_all(&underscored, "")
        .trim_matches('_')
        .to_string()
}

/// The naming templates, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantTemplate {
    NameJobCompanyDoctype,
    NameJobDoctype,
    NameCompanyDoctype,
    NameDoctype,
    DoctypeJobCompany,
}

impl VariantTemplate {
    pub const ALL: [VariantTemplate; 5] = [
        VariantTemplate::NameJobCompanyDoctype,
        VariantTemplate::NameJobDoctype,
        VariantTemplate::NameCompanyDoctype,
        VariantTemplate::NameDoctype,
        VariantTemplate::DoctypeJobCompany,
    ];

    /// Render with already-sanitized fields; `ext` includes its dot.
    pub fn render(self, fields: &SanitizedFields, ext: &str) -> String {
        let (name, job, company, doctype) = (
            fields.name.as_str(),
            fields.job.as_str(),
            fields.company.as_str(),
            fields.doctype.as_str(),
        );
        let parts: &[&str] = match self {
            VariantTemplate::NameJobCompanyDoctype => &[name, job, company, doctype],
            VariantTemplate::NameJobDoctype => &[name, job, doctype],
            VariantTemplate::NameCompanyDoctype => &[name, company, doctype],
            VariantTemplate::NameDoctype => &[name, doctype],
            VariantTemplate::DoctypeJobCompany => &[doctype, job, company],
        };
        format!("{}{}", parts.join("_"), ext)
    }
}

/// The four record fields after [`sanitize_component`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedFields {
    pub name: String,
    pub job: String,
    pub company: String,
    pub doctype: String,
}

impl From<&ClassificationRecord> for SanitizedFields {
    fn from(record: &ClassificationRecord) -> Self {
        Self {
            name: sanitize_component(&record.candidate_name),
            job: sanitize_component(&record.job_title),
            company: sanitize_component(&record.company),
            doctype: sanitize_component(&record.document_type),
        }
    }
}

/// Suggested filenames for `record`, keeping the lower-cased extension of
/// `original_filename`.
///
/// # Example
/// ```rust
/// use docnamer::{build_filename_variants, ClassificationRecord};
///
/// let record = ClassificationRecord {
///     document_type: "Resume".into(),
///     candidate_name: "Jane Doe".into(),
///     job_title: String::new(),
///     company: "Acme Corp".into(),
/// };
/// let names = build_filename_variants(&record, "scan.PDF");
/// assert_eq!(names[0], "Jane_Doe__Acme_Corp_Resume.pdf");
/// assert_eq!(names.len(), 5);
/// ```
pub fn build_filename_variants(record: &ClassificationRecord, original_filename: &str) -> Vec<String> {
    let (_, ext) = split_extension(original_filename);
    let ext = ext.to_lowercase();
    let fields = SanitizedFields::from(record);

    VariantTemplate::ALL
        .iter()
        .map(|t| t.render(&fields, &ext))
        .filter(|name| !name.starts_with('_'))
        .collect()
}

/// The record to name, with `fallback` as the candidate name when the
/// classification failed or the answer had no `candidate_name` key.
///
/// A name that is present but empty is kept as is: the model looked and
/// found no person.
pub fn with_fallback_name(classification: &Classification, fallback: Option<&str>) -> ClassificationRecord {
    match fallback {
        Some(name) if classification.is_missing("candidate_name") => ClassificationRecord {
            candidate_name: name.to_string(),
            ..classification.record.clone()
        },
        _ => classification.record.clone(),
    }
}
