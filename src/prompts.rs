//! Prompt template for document classification.
//!
//! Callers can override the template via
//! [`crate::config::ClassifierConfig::prompt_template`]; the constant here is
//! used only when no override is provided.

/// Placeholder replaced by the document excerpt.
pub const DOCUMENT_PLACEHOLDER: &str = "{document}";

/// Default classification prompt.
///
/// The JSON skeleton lists the allowed document types as an array; models
/// sometimes echo it back verbatim, which is why non-string fields are
/// tolerated when parsing the answer.
pub const CLASSIFICATION_PROMPT: &str = r#"Analyze this document and return JSON with:
{
  "document_type": ["Resume", "Cover_Letter", "Proposal", "Other"],
  "candidate_name": "Full name",
  "job_title": "Primary position",
  "company": "Main company"
}

Document:
{document}
"#;

/// Take the first `max_chars` characters of `text`.
///
/// Counts Unicode scalar values, so multi-byte text is never split inside a
/// character.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Fill the template with a bounded excerpt of the document text.
pub fn classification_prompt(template: Option<&str>, text: &str, max_chars: usize) -> String {
    template
        .unwrap_or(CLASSIFICATION_PROMPT)
        .replacen(DOCUMENT_PLACEHOLDER, excerpt(text, max_chars), 1)
}
