//! Pipeline driver: extract → classify → name.
//!
//! [`suggest_names`] runs the three stages for one in-memory document and
//! returns a [`NamingReport`]. Only a document with no extractable text is
//! fatal; a classification failure still produces a report (with an empty
//! record and, usually, no variants) so the caller can show the reason.

use crate::config::PipelineConfig;
use crate::document::RawDocument;
use crate::error::DocNamerError;
use crate::output::NamingReport;
use crate::pipeline::classify::Classifier;
use crate::pipeline::extract::Extractor;
use crate::pipeline::input;
use crate::pipeline::naming::{build_filename_variants, with_fallback_name};
use crate::pipeline::ocr::TesseractCli;
use crate::pipeline::pdf::PdfiumBackend;
use crate::progress::Stage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Suggest filenames for a document.
///
/// # Errors
/// Returns `Err(DocNamerError)` only for fatal errors:
/// - no text could be extracted ([`DocNamerError::NoTextExtracted`])
/// - the HTTP client could not be created
///
/// A missing or rejected `credential` is **not** an error here: the report
/// carries [`crate::ClassifyError::MissingCredential`] and variants built
/// from [`PipelineConfig::fallback_name`] (none when it is unset).
///
/// # Example
/// ```rust,no_run
/// use docnamer::{suggest_names, PipelineConfig, RawDocument};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("scan.pdf")?;
/// let doc = RawDocument::from_mime(bytes, "application/pdf", "scan.pdf");
/// let key = std::env::var("TOGETHER_API_KEY").unwrap_or_default();
/// let report = suggest_names(&doc, &key, &PipelineConfig::default()).await?;
/// for name in &report.variants {
///     println!("{name}");
/// }
/// # Ok(())
/// # }
/// ```
pub async fn suggest_names(
    document: &RawDocument,
    credential: &str,
    config: &PipelineConfig,
) -> Result<NamingReport, DocNamerError> {
    let total_start = Instant::now();
    let progress = config.progress_callback.as_ref();
    info!(
        "Naming '{}' ({}, {} bytes)",
        document.filename(),
        document.kind(),
        document.len()
    );

    let extractor = build_extractor(config);
    let classifier = build_classifier(config)?;

    // ── Stage 1: Extract ─────────────────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_stage_start(Stage::Extraction);
    }
    let stage_start = Instant::now();
    let extraction = extractor.extract(document).await;
    if let Some(cb) = progress {
        cb.on_stage_complete(Stage::Extraction, stage_start.elapsed().as_millis() as u64);
    }

    if extraction.is_empty() {
        let err = DocNamerError::NoTextExtracted {
            issues: extraction.issues,
        };
        if let Some(cb) = progress {
            cb.on_stage_error(Stage::Extraction, &err.to_string());
        }
        warn!("{}", err);
        return Err(err);
    }

    // ── Stage 2: Classify ────────────────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_stage_start(Stage::Classification);
    }
    let stage_start = Instant::now();
    let classification = classifier.classify(credential, &extraction.text).await;
    if let Some(cb) = progress {
        if let Some(ref e) = classification.error {
            cb.on_stage_error(Stage::Classification, &e.to_string());
        }
        cb.on_stage_complete(Stage::Classification, stage_start.elapsed().as_millis() as u64);
    }

    // ── Stage 3: Name ────────────────────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_stage_start(Stage::Naming);
    }
    let stage_start = Instant::now();
    let record = with_fallback_name(&classification, config.fallback_name.as_deref());
    let variants = build_filename_variants(&record, document.filename());
    debug!("Built {} variants", variants.len());
    if let Some(cb) = progress {
        cb.on_stage_complete(Stage::Naming, stage_start.elapsed().as_millis() as u64);
    }

    let duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Suggested {} names for '{}' in {}ms",
        variants.len(),
        document.filename(),
        duration_ms
    );

    Ok(NamingReport {
        original_filename: document.filename().to_string(),
        extraction,
        classification,
        variants,
        duration_ms,
    })
}

/// Load a local file or URL, then run [`suggest_names`].
///
/// The MIME type comes from `mime_override`, else the extension, else the
/// leading bytes.
pub async fn suggest_names_for_file(
    input: impl AsRef<str>,
    mime_override: Option<&str>,
    credential: &str,
    config: &PipelineConfig,
) -> Result<NamingReport, DocNamerError> {
    let document = input::resolve_input(
        input.as_ref(),
        mime_override,
        config.max_input_bytes,
        config.download_timeout_secs,
    )
    .await?;
    suggest_names(&document, credential, config).await
}

/// Synchronous wrapper around [`suggest_names`].
///
/// Creates a temporary tokio runtime internally; do not call from inside an
/// async context.
pub fn suggest_names_sync(
    document: &RawDocument,
    credential: &str,
    config: &PipelineConfig,
) -> Result<NamingReport, DocNamerError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocNamerError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(suggest_names(document, credential, config))
}

/// Write the document's original bytes to `dir/name`.
///
/// Uses atomic write (temp file + rename) so a crash never leaves a partial
/// file under the chosen name. An existing file with that name is replaced.
///
/// `name` must be a plain file name: no separators, not starting with `.`
/// or `_`.
pub async fn save_as(
    document: &RawDocument,
    name: &str,
    dir: impl AsRef<Path>,
) -> Result<PathBuf, DocNamerError> {
    validate_target_name(name)?;

    let dir = dir.as_ref();
    let target = dir.join(name);
    let write_failed = |source: std::io::Error| DocNamerError::OutputWriteFailed {
        path: target.clone(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(write_failed)?;

    let tmp_path = dir.join(format!(".{}.tmp", name));
    tokio::fs::write(&tmp_path, document.bytes())
        .await
        .map_err(write_failed)?;

    if let Err(e) = tokio::fs::rename(&tmp_path, &target).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }

    info!("Saved {} bytes to {}", document.len(), target.display());
    Ok(target)
}

fn validate_target_name(name: &str) -> Result<(), DocNamerError> {
    let plain = !name.is_empty()
        && !name.starts_with('.')
        && !name.starts_with('_')
        && !name.contains(['/', '\\', '\0'])
        && Path::new(name).file_name().map(|n| n == name).unwrap_or(false);

    if plain {
        Ok(())
    } else {
        Err(DocNamerError::InvalidTargetName {
            name: name.to_string(),
        })
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn build_extractor(config: &PipelineConfig) -> Extractor {
    let extraction = config.extraction.clone();
    let pdf = config
        .pdf_backend
        .clone()
        .unwrap_or_else(|| Arc::new(PdfiumBackend::new(extraction.pdfium_lib_path.clone())));
    let ocr = config
        .ocr_engine
        .clone()
        .unwrap_or_else(|| Arc::new(TesseractCli::from_config(&extraction)));
    Extractor::with_backends(extraction, pdf, ocr).with_progress(config.progress_callback.clone())
}

fn build_classifier(config: &PipelineConfig) -> Result<Classifier, DocNamerError> {
    match config.completion_backend {
        Some(ref backend) => Ok(Classifier::with_backend(
            config.classifier.clone(),
            Arc::clone(backend),
        )),
        None => Classifier::new(config.classifier.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_name_validation() {
        for good in ["Jane_Doe_Resume.pdf", "Resume__Acme.docx", "a"] {
            assert!(validate_target_name(good).is_ok(), "{good}");
        }
        for bad in ["", ".hidden", "_x.pdf", "../x.pdf", "a/b.pdf", "a\\b.pdf", ".."] {
            assert!(validate_target_name(bad).is_err(), "{bad}");
        }
    }

    #[tokio::test]
    async fn save_as_writes_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let doc = RawDocument::from_mime(&b"%PDF-1.4 body"[..], "application/pdf", "scan.pdf");

        let path = save_as(&doc, "Jane_Doe_Resume.pdf", dir.path().join("out"))
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("out").join("Jane_Doe_Resume.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4 body");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn save_as_refuses_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let doc = RawDocument::from_mime(&b"x"[..], "application/pdf", "scan.pdf");
        let err = save_as(&doc, "../escape.pdf", dir.path()).await.unwrap_err();
        assert!(matches!(err, DocNamerError::InvalidTargetName { .. }));
    }
}
