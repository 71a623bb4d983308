//! Remote model access: one chat-completion request per document.
//!
//! [`CompletionBackend`] is the seam the classifier talks to. The default
//! implementation, [`ChatCompletionsClient`], speaks the OpenAI-compatible
//! `POST {base_url}/chat/completions` protocol served by Together AI and most
//! other hosted inference providers.
//!
//! ## Why pass the credential per call?
//!
//! The key belongs to whoever submitted the document, not to the process.
//! Taking it as an argument keeps the client shareable between callers and
//! keeps the key out of any long-lived struct (and out of `Debug` output).

use crate::error::{ClassifyError, DocNamerError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Longest error body kept in [`ClassifyError::HttpStatus`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// One chat message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request body for `/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Sends a completion request and returns the raw assistant text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        credential: &str,
        request: &CompletionRequest,
    ) -> Result<String, ClassifyError>;
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl ChatCompletionsClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, DocNamerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DocNamerError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: chat_completions_url(base_url),
            timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, e: reqwest::Error) -> ClassifyError {
        if e.is_timeout() {
            ClassifyError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            ClassifyError::Remote {
                message: e.to_string(),
            }
        }
    }
}

/// `{base_url}/chat/completions`, tolerating a trailing slash.
pub fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

#[async_trait]
impl CompletionBackend for ChatCompletionsClient {
    async fn complete(
        &self,
        credential: &str,
        request: &CompletionRequest,
    ) -> Result<String, ClassifyError> {
        debug!("POST {} (model {})", self.endpoint, request.model);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(credential)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::HttpStatus {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| self.transport_error(e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ClassifyError::Remote {
                message: "response contained no completion".to_string(),
            })
    }
}
