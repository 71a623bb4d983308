//! Tiered text extraction.
//!
//! | Kind        | Tier 1                    | Tier 2                 |
//! |-------------|---------------------------|------------------------|
//! | PDF         | embedded text layer       | rasterise + OCR pages  |
//! | PNG / JPEG  | OCR                       | –                      |
//! | DOCX        | body paragraphs           | –                      |
//! | other       | – (empty + issue)         | –                      |
//!
//! Extraction never fails: every problem becomes an [`ExtractError`] in
//! [`Extraction::issues`] and the caller decides what an empty result means.
//!
//! ## Why catch panics?
//! The parsing libraries are fed untrusted uploads. A panic in any of them
//! must not take the request (or a server worker) down, so each call goes
//! through [`guarded`] and a panic becomes [`ExtractError::Panicked`].

use crate::config::ExtractionConfig;
use crate::document::{DocumentKind, RawDocument};
use crate::error::ExtractError;
use crate::output::{Extraction, ExtractionMethod};
use crate::pipeline::docx;
use crate::pipeline::ocr::{OcrEngine, OcrError, TesseractCli};
use crate::pipeline::pdf::{PdfBackend, PdfiumBackend};
use crate::progress::ProgressCallback;
use std::ops::ControlFlow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Runs the extraction tiers for one document.
///
/// Cheap to clone; backends are shared.
#[derive(Clone)]
pub struct Extractor {
    pdf: Arc<dyn PdfBackend>,
    ocr: Arc<dyn OcrEngine>,
    config: ExtractionConfig,
    progress: Option<ProgressCallback>,
}

impl Extractor {
    /// Extractor with pdfium and the tesseract CLI.
    pub fn new(config: ExtractionConfig) -> Self {
        let pdf = Arc::new(PdfiumBackend::new(config.pdfium_lib_path.clone()));
        let ocr = Arc::new(TesseractCli::from_config(&config));
        Self::with_backends(config, pdf, ocr)
    }

    /// Extractor with caller-supplied backends.
    pub fn with_backends(
        config: ExtractionConfig,
        pdf: Arc<dyn PdfBackend>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        Self {
            pdf,
            ocr,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract on the blocking thread pool.
    ///
    /// pdfium and tesseract are synchronous and can take seconds per page;
    /// running them inline would stall the async executor.
    pub async fn extract(&self, document: &RawDocument) -> Extraction {
        let this = self.clone();
        let document = document.clone();
        match tokio::task::spawn_blocking(move || this.extract_blocking(&document)).await {
            Ok(extraction) => extraction,
            Err(e) => {
                error!("Extraction task failed: {}", e);
                Extraction::empty(vec![ExtractError::Task(e.to_string())])
            }
        }
    }

    /// Extract on the current thread.
    pub fn extract_blocking(&self, document: &RawDocument) -> Extraction {
        let start = Instant::now();
        let bytes = document.bytes();

        let mut extraction = match document.kind() {
            DocumentKind::Pdf => self.extract_pdf(bytes),
            DocumentKind::Png | DocumentKind::Jpeg => self.extract_image(bytes),
            DocumentKind::Docx => self.extract_docx(bytes),
            DocumentKind::Other(mime) => {
                warn!("No extraction strategy for '{}'", mime);
                Extraction::empty(vec![ExtractError::UnsupportedType { mime: mime.clone() }])
            }
        };

        let trimmed = extraction.text.trim();
        if trimmed.len() != extraction.text.len() {
            extraction.text = trimmed.to_string();
        }

        if extraction.text.is_empty() {
            extraction.method = ExtractionMethod::None;
            warn!(
                "No text extracted from {} ({} issues)",
                document.kind(),
                extraction.issues.len()
            );
        } else {
            info!(
                "Extracted {} chars from {} via {:?} in {}ms",
                extraction.text.chars().count(),
                document.kind(),
                extraction.method,
                start.elapsed().as_millis()
            );
        }

        extraction
    }

    // ── PDF ──────────────────────────────────────────────────────────────────

    fn extract_pdf(&self, bytes: &[u8]) -> Extraction {
        let mut issues = Vec::new();
        let password = self.config.password.as_deref();

        match guarded("PDF text reader", || self.pdf.page_texts(bytes, password)) {
            Ok(pages) => {
                let page_count = pages.len();
                let text: String = pages.iter().map(|p| format!("{p}\n")).collect();
                if !text.trim().is_empty() {
                    return Extraction {
                        text,
                        method: ExtractionMethod::TextLayer,
                        page_count: Some(page_count),
                        ocr_pages: 0,
                        ocr_truncated: false,
                        issues,
                    };
                }
                debug!("Text layer of {} pages is blank; falling back to OCR", page_count);
                issues.push(ExtractError::EmptyTextLayer);
            }
            Err(e) => {
                warn!("Text layer unavailable ({}); falling back to OCR", e);
                issues.push(e);
            }
        }

        self.ocr_pdf(bytes, issues)
    }

    fn ocr_pdf(&self, bytes: &[u8], mut issues: Vec<ExtractError>) -> Extraction {
        let password = self.config.password.as_deref();
        let max_pages = self.config.max_ocr_pages;
        let budget = Duration::from_secs(self.config.ocr_timeout_secs);
        let started = Instant::now();

        let mut texts: Vec<String> = Vec::new();
        let mut ocr_pages = 0usize;
        let mut visited = 0usize;
        let mut timed_out = false;

        let rendered = {
            let mut visit = |idx: usize, total: usize, page: Result<image::DynamicImage, ExtractError>| {
                let remaining = budget.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    timed_out = true;
                    return ControlFlow::Break(());
                }
                visited += 1;
                if let Some(ref cb) = self.progress {
                    cb.on_ocr_page(idx + 1, total.min(max_pages));
                }

                let image = match page {
                    Ok(image) => image,
                    Err(e) => {
                        issues.push(e);
                        return ControlFlow::Continue(());
                    }
                };

                ocr_pages += 1;
                match self.ocr.recognize_within(&image, remaining) {
                    Ok(text) => {
                        texts.push(text);
                        ControlFlow::Continue(())
                    }
                    Err(OcrError::Unavailable(msg)) => {
                        warn!("OCR unavailable: {}", msg);
                        issues.push(ExtractError::OcrUnavailable(msg));
                        ControlFlow::Break(())
                    }
                    Err(OcrError::Failed(detail)) => {
                        warn!("OCR failed on page {}: {}", idx + 1, detail);
                        issues.push(ExtractError::OcrFailed {
                            page: idx + 1,
                            detail,
                        });
                        ControlFlow::Continue(())
                    }
                    Err(OcrError::TimedOut(_)) => {
                        warn!("OCR of page {} overran the time budget", idx + 1);
                        timed_out = true;
                        ControlFlow::Break(())
                    }
                }
            };

            guarded("PDF rasteriser", || {
                self.pdf.render_pages(
                    bytes,
                    password,
                    self.config.max_rendered_pixels,
                    max_pages,
                    &mut visit,
                )
            })
        };

        let page_count = match rendered {
            Ok(total) => Some(total),
            Err(e) => {
                warn!("Rasterisation failed: {}", e);
                issues.push(e);
                None
            }
        };

        let mut ocr_truncated = false;
        if timed_out {
            ocr_truncated = true;
            issues.push(ExtractError::OcrTruncated {
                pages: ocr_pages,
                reason: format!("time budget of {}s exhausted", budget.as_secs()),
            });
        } else if let Some(total) = page_count {
            if total > max_pages && visited == max_pages {
                ocr_truncated = true;
                issues.push(ExtractError::OcrTruncated {
                    pages: ocr_pages,
                    reason: format!("page limit of {} reached ({} pages in document)", max_pages, total),
                });
            }
        }
        if ocr_truncated {
            warn!("OCR truncated after {} pages", ocr_pages);
        }

        let text = texts.join("\n");
        let method = if text.trim().is_empty() {
            ExtractionMethod::None
        } else {
            ExtractionMethod::Ocr
        };

        Extraction {
            text,
            method,
            page_count,
            ocr_pages,
            ocr_truncated,
            issues,
        }
    }

    // ── Images ───────────────────────────────────────────────────────────────

    fn extract_image(&self, bytes: &[u8]) -> Extraction {
        let image = match guarded("image decoder", || {
            image::load_from_memory(bytes).map_err(|e| ExtractError::ImageDecode(e.to_string()))
        }) {
            Ok(image) => image,
            Err(e) => return Extraction::empty(vec![e]),
        };

        if let Some(ref cb) = self.progress {
            cb.on_ocr_page(1, 1);
        }

        let budget = Duration::from_secs(self.config.ocr_timeout_secs);
        let mut issues = Vec::new();
        let text = match self.ocr.recognize_within(&image, budget) {
            Ok(text) => text,
            Err(OcrError::Unavailable(msg)) => {
                issues.push(ExtractError::OcrUnavailable(msg));
                String::new()
            }
            Err(e @ OcrError::TimedOut(_)) => {
                warn!("OCR of image failed: {}", e);
                issues.push(ExtractError::OcrFailed {
                    page: 1,
                    detail: e.to_string(),
                });
                String::new()
            }
            Err(OcrError::Failed(detail)) => {
                issues.push(ExtractError::OcrFailed { page: 1, detail });
                String::new()
            }
        };

        Extraction {
            method: ExtractionMethod::Ocr,
            text,
            page_count: None,
            ocr_pages: 1,
            ocr_truncated: false,
            issues,
        }
    }

    // ── DOCX ─────────────────────────────────────────────────────────────────

    fn extract_docx(&self, bytes: &[u8]) -> Extraction {
        match guarded("DOCX reader", || docx::paragraphs_text(bytes)) {
            Ok(text) => Extraction {
                text,
                method: ExtractionMethod::Paragraphs,
                page_count: None,
                ocr_pages: 0,
                ocr_truncated: false,
                issues: Vec::new(),
            },
            Err(e) => {
                warn!("DOCX extraction failed: {}", e);
                Extraction::empty(vec![e])
            }
        }
    }
}

/// Run `f`, turning a panic into [`ExtractError::Panicked`].
fn guarded<T>(stage: &str, f: impl FnOnce() -> Result<T, ExtractError>) -> Result<T, ExtractError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            error!("{} panicked", stage);
            Err(ExtractError::Panicked {
                stage: stage.to_string(),
            })
        }
    }
}

/// Extract text from raw bytes with the default backends.
///
/// # Example
/// ```rust,no_run
/// # async fn run() {
/// use docnamer::{extract_text, ExtractionConfig};
///
/// let bytes = std::fs::read("cv.docx").unwrap();
/// let extraction = extract_text(
///     &bytes,
///     "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
///     &ExtractionConfig::default(),
/// )
/// .await;
/// println!("{}", extraction.text);
/// # }
/// ```
pub async fn extract_text(bytes: &[u8], mime_type: &str, config: &ExtractionConfig) -> Extraction {
    let document = RawDocument::from_mime(bytes, mime_type, "");
    Extractor::new(config.clone()).extract(&document).await
}
