//! Classification: ask the remote model for a four-field record.
//!
//! The classifier fails closed. Whatever goes wrong (missing key, network
//! error, prose instead of JSON) the caller gets an empty
//! [`ClassificationRecord`] and the reason in [`Classification::error`];
//! naming then proceeds on the empty record.
//!
//! ## Why a tolerant JSON search?
//!
//! Models wrap answers in Markdown fences, prepend explanations, and
//! reasoning models emit `<think>…</think>` blocks that may themselves
//! contain braces. [`parse_classification`] strips reasoning blocks, tries the
//! widest `{…}` span first, then falls back to the first balanced object
//! that decodes.

use crate::config::ClassifierConfig;
use crate::error::{ClassifyError, DocNamerError};
use crate::output::{Classification, ClassificationRecord};
use crate::pipeline::llm::{ChatCompletionsClient, ChatMessage, CompletionBackend, CompletionRequest};
use crate::prompts::classification_prompt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Reasoning blocks emitted by R1-style models.
static RE_THINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

const THINK_CLOSE: &str = "</think>";

/// First `{` through last `}`.
static RE_JSON_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

const RECORD_KEYS: [&str; 4] = ["document_type", "candidate_name", "job_title", "company"];

/// Sends documents to a [`CompletionBackend`] and parses the answers.
#[derive(Clone)]
pub struct Classifier {
    backend: Arc<dyn CompletionBackend>,
    config: ClassifierConfig,
}

impl Classifier {
    /// Classifier using [`ChatCompletionsClient`] against `config.base_url`.
    pub fn new(config: ClassifierConfig) -> Result<Self, DocNamerError> {
        let client = ChatCompletionsClient::new(&config.base_url, config.api_timeout_secs)?;
        Ok(Self::with_backend(config, Arc::new(client)))
    }

    pub fn with_backend(config: ClassifierConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify `text`, never failing.
    ///
    /// A blank `credential` short-circuits with
    /// [`ClassifyError::MissingCredential`] before any request is built.
    pub async fn classify(&self, credential: &str, text: &str) -> Classification {
        let credential = credential.trim();
        if credential.is_empty() {
            warn!("No API key supplied; skipping classification");
            return Classification::failed(ClassifyError::MissingCredential);
        }

        let prompt = classification_prompt(
            self.config.prompt_template.as_deref(),
            text,
            self.config.excerpt_chars,
        );
        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let start = Instant::now();
        let raw = match self.backend.complete(credential, &request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Classification request failed: {}", e);
                return Classification::failed(e);
            }
        };
        info!(
            "Model answered in {}ms ({} chars)",
            start.elapsed().as_millis(),
            raw.len()
        );

        match parse_object(&raw) {
            Ok(obj) => {
                let record = ClassificationRecord::from_json_object(&obj);
                let missing_fields: Vec<String> = RECORD_KEYS
                    .iter()
                    .filter(|k| !obj.contains_key(**k))
                    .map(|k| k.to_string())
                    .collect();
                debug!("Classified as {:?} (missing {:?})", record, missing_fields);
                Classification {
                    record,
                    error: None,
                    missing_fields,
                }
            }
            Err(e) => {
                warn!("Unusable model answer: {}", e);
                Classification::failed(e)
            }
        }
    }
}

/// Extract a [`ClassificationRecord`] from free-form model output.
pub fn parse_classification(raw: &str) -> Result<ClassificationRecord, ClassifyError> {
    parse_object(raw).map(|obj| ClassificationRecord::from_json_object(&obj))
}

/// Locate and decode the JSON object carrying the classification fields.
fn parse_object(raw: &str) -> Result<Map<String, Value>, ClassifyError> {
    let stripped = RE_THINK.replace_all(raw, "");

    // Streamed reasoning often arrives without its opening tag; everything up
    // to the last closing tag is reasoning.
    let cleaned: &str = match stripped.rfind(THINK_CLOSE) {
        Some(idx) => &stripped[idx + THINK_CLOSE.len()..],
        None => &stripped,
    };

    // Some models put the whole answer inside the reasoning block.
    let haystack: &str = if RE_JSON_SPAN.is_match(cleaned) {
        cleaned
    } else {
        raw
    };

    let span = RE_JSON_SPAN
        .find(haystack)
        .ok_or(ClassifyError::NoJsonFound)?;

    let value = match serde_json::from_str::<Value>(span.as_str()) {
        Ok(value) => value,
        Err(greedy_err) => {
            debug!("Widest JSON span did not decode ({}); scanning for objects", greedy_err);
            first_balanced_object(haystack).ok_or_else(|| ClassifyError::InvalidJson {
                detail: greedy_err.to_string(),
            })?
        }
    };

    let obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(ClassifyError::UnexpectedShape {
                found: json_kind(&other).to_string(),
            })
        }
    };

    if !RECORD_KEYS.iter().any(|k| obj.contains_key(*k)) {
        let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        return Err(ClassifyError::UnexpectedShape {
            found: format!("object with keys [{}]", keys.join(", ")),
        });
    }

    Ok(obj)
}

/// First JSON object that decodes, starting at successive `{` positions.
fn first_balanced_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(idx, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[idx..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value @ Value::Object(_))) => Some(value),
            _ => None,
        }
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Classify `text` with the default chat-completions client.
///
/// Never fails; see [`Classifier::classify`].
pub async fn classify_document(
    api_credential: &str,
    text: &str,
    config: &ClassifierConfig,
) -> Classification {
    match Classifier::new(config.clone()) {
        Ok(classifier) => classifier.classify(api_credential, text).await,
        Err(e) => Classification::failed(ClassifyError::Remote {
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Backend returning a canned answer and recording each request.
    struct Canned {
        answer: Result<String, ClassifyError>,
        calls: AtomicUsize,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    impl Canned {
        fn ok(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(answer.to_string()),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn err(e: ClassifyError) -> Arc<Self> {
            Arc::new(Self {
                answer: Err(e),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for Canned {
        async fn complete(
            &self,
            _credential: &str,
            request: &CompletionRequest,
        ) -> Result<String, ClassifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            self.answer.clone()
        }
    }

    fn classifier(backend: Arc<Canned>) -> Classifier {
        Classifier::with_backend(ClassifierConfig::default(), backend)
    }

    // ── parse_classification ────────────────────────────────────────────────

    #[test]
    fn parses_plain_object() {
        let rec = parse_classification(
            r#"{"document_type":"Resume","candidate_name":"Jane Doe","job_title":"","company":"Acme Corp"}"#,
        )
        .unwrap();
        assert_eq!(rec.document_type, "Resume");
        assert_eq!(rec.candidate_name, "Jane Doe");
        assert_eq!(rec.company, "Acme Corp");
    }

    #[test]
    fn parses_fenced_object_with_prose() {
        let raw = "Here is the analysis:\n```json\n{\"document_type\": \"Proposal\", \"company\": \"Initech\"}\n```\nLet me know!";
        let rec = parse_classification(raw).unwrap();
        assert_eq!(rec.document_type, "Proposal");
        assert_eq!(rec.company, "Initech");
        assert_eq!(rec.candidate_name, "");
    }

    #[test]
    fn ignores_braces_inside_think_block() {
        let raw = "<think>The schema is {name} and maybe {title}.</think>\n{\"document_type\":\"Cover_Letter\",\"candidate_name\":\"Ann Lee\"}";
        let rec = parse_classification(raw).unwrap();
        assert_eq!(rec.document_type, "Cover_Letter");
        assert_eq!(rec.candidate_name, "Ann Lee");
    }

    #[test]
    fn reasoning_without_opening_tag_is_skipped() {
        let raw = "Okay, the prompt asks for {\"document_type\": [\"Resume\", \"Other\"], \"candidate_name\": \"Full name\"} so I should fill it.\n</think>\n\n{\"document_type\":\"Resume\",\"candidate_name\":\"Jane Doe\",\"job_title\":\"\",\"company\":\"Acme Corp\"}";
        let rec = parse_classification(raw).unwrap();
        assert_eq!(rec.document_type, "Resume");
        assert_eq!(rec.candidate_name, "Jane Doe");
        assert_eq!(rec.company, "Acme Corp");
    }

    #[test]
    fn orphan_closing_tag_with_broken_answer_is_not_rescued_from_reasoning() {
        let raw = "Schema: {\"candidate_name\": \"Full name\"}\n</think>\n{\"candidate_name\": }";
        let err = parse_classification(raw).unwrap_err();
        assert!(matches!(err, ClassifyError::InvalidJson { .. }), "got: {err:?}");
    }

    #[test]
    fn falls_back_to_first_balanced_object() {
        let raw = r#"First guess {"document_type":"Resume","candidate_name":"A"} or maybe {"document_type":"Other"}"#;
        let rec = parse_classification(raw).unwrap();
        assert_eq!(rec.document_type, "Resume");
        assert_eq!(rec.candidate_name, "A");
    }

    #[test]
    fn no_braces_is_no_json() {
        assert_eq!(
            parse_classification("I cannot classify this document."),
            Err(ClassifyError::NoJsonFound)
        );
    }

    #[test]
    fn broken_json_is_invalid() {
        let err = parse_classification(r#"{"document_type": "Resume", "candidate_name": }"#).unwrap_err();
        assert!(matches!(err, ClassifyError::InvalidJson { .. }), "got: {err:?}");
    }

    #[test]
    fn object_without_record_keys_is_unexpected_shape() {
        let err = parse_classification(r#"{"answer": "resume"}"#).unwrap_err();
        assert!(matches!(err, ClassifyError::UnexpectedShape { .. }), "got: {err:?}");
    }

    #[test]
    fn echoed_schema_array_becomes_empty_field() {
        let raw = r#"{"document_type":["Resume","Cover_Letter","Proposal","Other"],"candidate_name":"Full name"}"#;
        let rec = parse_classification(raw).unwrap();
        assert_eq!(rec.document_type, "");
        assert_eq!(rec.candidate_name, "Full name");
    }

    // ── Classifier ──────────────────────────────────────────────────────────

    #[test]
    fn blank_credential_never_calls_backend() {
        let backend = Canned::ok("{}");
        let result = tokio_test::block_on(classifier(backend.clone()).classify("   ", "some text"));
        assert_eq!(result.error, Some(ClassifyError::MissingCredential));
        assert!(result.record.is_empty());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn sends_one_bounded_request() {
        let backend = Canned::ok(r#"{"document_type":"Resume","candidate_name":"Jane Doe"}"#);
        let text = "x".repeat(10_000);
        let result = tokio_test::block_on(classifier(backend.clone()).classify("key", &text));

        assert!(result.is_ok());
        assert_eq!(result.record.candidate_name, "Jane Doe");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        let request = backend.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.temperature, 0.1);
        assert_eq!(request.messages.len(), 1);
        let prompt = &request.messages[0].content;
        assert!(prompt.contains(&"x".repeat(3000)));
        assert!(!prompt.contains(&"x".repeat(3001)));
    }

    #[test]
    fn absent_keys_are_reported() {
        let backend = Canned::ok(r#"{"document_type":"Proposal","candidate_name":"","company":"Globex"}"#);
        let result = tokio_test::block_on(classifier(backend).classify("key", "text"));
        assert!(result.is_ok());
        assert_eq!(result.missing_fields, vec!["job_title".to_string()]);
        assert!(!result.is_missing("candidate_name"));
    }

    #[test]
    fn backend_failure_yields_empty_record() {
        let backend = Canned::err(ClassifyError::Timeout { secs: 60 });
        let result = tokio_test::block_on(classifier(backend).classify("key", "text"));
        assert!(result.record.is_empty());
        assert_eq!(result.error, Some(ClassifyError::Timeout { secs: 60 }));
    }

    #[test]
    fn prose_answer_yields_empty_record() {
        let backend = Canned::ok("Sorry, I can't help with that.");
        let result = tokio_test::block_on(classifier(backend).classify("key", "text"));
        assert!(result.record.is_empty());
        assert!(result.error.unwrap().is_malformed_response());
    }

    #[tokio::test]
    async fn classify_document_without_key_is_offline() {
        let result = classify_document("", "text", &ClassifierConfig::default()).await;
        assert_eq!(result.error, Some(ClassifyError::MissingCredential));
    }
}
