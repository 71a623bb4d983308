//! Configuration types for the naming pipeline.
//!
//! Each stage has its own plain struct ([`ExtractionConfig`],
//! [`ClassifierConfig`]) so it can be used on its own; [`PipelineConfig`]
//! bundles both with the request-level knobs and is built via
//! [`PipelineConfigBuilder`], which validates the combination.

use crate::error::DocNamerError;
use crate::pipeline::llm::CompletionBackend;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::pdf::PdfBackend;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default upload ceiling: 200 MiB.
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 200 * 1024 * 1024;

/// Default OpenAI-compatible endpoint (Together AI).
pub const DEFAULT_BASE_URL: &str = "https://api.together.xyz/v1";

/// Default classification model.
pub const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-R1-Distill-Llama-70B-free";

/// Candidate name substituted when none was classified.
pub const DEFAULT_FALLBACK_NAME: &str = "Document";

/// Knobs for the extractor.
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Maximum PDF pages sent through OCR. Default: 50.
    ///
    /// Scanned documents route every page through rasterisation and
    /// recognition, which costs seconds per page. Pages past the ceiling are
    /// skipped and the result is flagged `ocr_truncated`.
    pub max_ocr_pages: usize,

    /// Wall-clock budget for the OCR tier in seconds. Default: 300.
    ///
    /// Checked between pages; a page already in progress is allowed to finish.
    pub ocr_timeout_secs: u64,

    /// Longest edge of a rasterised page in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Tesseract language code(s), e.g. `eng` or `eng+deu`. Default: `eng`.
    pub ocr_language: String,

    /// Path to the `tesseract` executable. Default: looked up on `PATH`.
    pub tesseract_path: Option<PathBuf>,

    /// Path to the pdfium shared library (file or directory).
    /// Default: `PDFIUM_LIB_PATH`, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_ocr_pages: 50,
            ocr_timeout_secs: 300,
            max_rendered_pixels: 2000,
            ocr_language: "eng".to_string(),
            tesseract_path: None,
            pdfium_lib_path: None,
            password: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("max_ocr_pages", &self.max_ocr_pages)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_path", &self.tesseract_path)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Knobs for the classifier and its chat-completions client.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Base URL of an OpenAI-compatible API, without `/chat/completions`.
    pub base_url: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Classification is a factual task; a low temperature keeps the model
    /// literal and its JSON stable between runs.
    pub temperature: f32,

    /// Optional completion-token cap. Default: none (provider default).
    pub max_tokens: Option<usize>,

    /// Characters of extracted text sent to the model. Default: 3000.
    pub excerpt_chars: usize,

    /// Per-request timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Custom prompt template; must contain `{document}`. Default: built-in.
    pub prompt_template: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: None,
            excerpt_chars: 3000,
            api_timeout_secs: 60,
            prompt_template: None,
        }
    }
}

/// Configuration for one naming request.
///
/// # Example
/// ```rust
/// use docnamer::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .model("deepseek-ai/DeepSeek-V3")
///     .max_ocr_pages(10)
///     .fallback_name("Document")
///     .build()
///     .unwrap();
/// assert_eq!(config.extraction.max_ocr_pages, 10);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    pub extraction: ExtractionConfig,
    pub classifier: ClassifierConfig,

    /// Candidate name used when classification failed or the answer had no
    /// `candidate_name` key. Default: `"Document"`.
    ///
    /// A name the model returned as an empty string is never replaced. With
    /// `None` a failed classification yields no suggestions.
    pub fallback_name: Option<String>,

    /// Upload ceiling enforced by [`crate::pipeline::input::load_document`].
    pub max_input_bytes: u64,

    /// Timeout for downloading URL inputs, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional stage-event callback.
    pub progress_callback: Option<ProgressCallback>,

    /// Pre-built completion backend. When set, `classifier.base_url` and
    /// `api_timeout_secs` are ignored and this backend is used as-is.
    pub completion_backend: Option<Arc<dyn CompletionBackend>>,

    /// Pre-built PDF backend. Default: pdfium.
    pub pdf_backend: Option<Arc<dyn PdfBackend>>,

    /// Pre-built OCR engine. Default: the `tesseract` executable.
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            classifier: ClassifierConfig::default(),
            fallback_name: Some(DEFAULT_FALLBACK_NAME.to_string()),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            download_timeout_secs: 120,
            progress_callback: None,
            completion_backend: None,
            pdf_backend: None,
            ocr_engine: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("extraction", &self.extraction)
            .field("classifier", &self.classifier)
            .field("fallback_name", &self.fallback_name)
            .field("max_input_bytes", &self.max_input_bytes)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .field(
                "completion_backend",
                &self.completion_backend.as_ref().map(|_| "<dyn CompletionBackend>"),
            )
            .field("pdf_backend", &self.pdf_backend.as_ref().map(|_| "<dyn PdfBackend>"))
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|_| "<dyn OcrEngine>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder starting from the defaults.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn max_ocr_pages(mut self, n: usize) -> Self {
        self.config.extraction.max_ocr_pages = n;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extraction.ocr_timeout_secs = secs;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.extraction.max_rendered_pixels = px.max(100);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.extraction.ocr_language = lang.into();
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.extraction.tesseract_path = Some(path.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.extraction.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.extraction.password = Some(pwd.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.classifier.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.classifier.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.classifier.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.classifier.max_tokens = Some(n);
        self
    }

    pub fn excerpt_chars(mut self, n: usize) -> Self {
        self.config.classifier.excerpt_chars = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.classifier.api_timeout_secs = secs;
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.classifier.prompt_template = Some(template.into());
        self
    }

    pub fn fallback_name(mut self, name: impl Into<String>) -> Self {
        self.config.fallback_name = Some(name.into());
        self
    }

    /// Never substitute a candidate name.
    pub fn without_fallback_name(mut self) -> Self {
        self.config.fallback_name = None;
        self
    }

    pub fn max_input_bytes(mut self, n: u64) -> Self {
        self.config.max_input_bytes = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn completion_backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.config.completion_backend = Some(backend);
        self
    }

    pub fn pdf_backend(mut self, backend: Arc<dyn PdfBackend>) -> Self {
        self.config.pdf_backend = Some(backend);
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, DocNamerError> {
        let c = &self.config;
        if c.extraction.max_ocr_pages == 0 {
            return Err(DocNamerError::InvalidConfig(
                "max_ocr_pages must be ≥ 1".into(),
            ));
        }
        if c.classifier.excerpt_chars == 0 {
            return Err(DocNamerError::InvalidConfig(
                "excerpt_chars must be ≥ 1".into(),
            ));
        }
        if c.classifier.api_timeout_secs == 0 {
            return Err(DocNamerError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        let url = c.classifier.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(DocNamerError::InvalidConfig(format!(
                "base_url must be an HTTP/HTTPS URL, got '{}'",
                url
            )));
        }
        if let Some(ref template) = c.classifier.prompt_template {
            if !template.contains("{document}") {
                return Err(DocNamerError::InvalidConfig(
                    "prompt_template must contain the {document} placeholder".into(),
                ));
            }
        }
        if c.max_input_bytes == 0 {
            return Err(DocNamerError::InvalidConfig(
                "max_input_bytes must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
