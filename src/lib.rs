//! # docnamer
//!
//! Suggest descriptive filenames for uploaded documents (CVs, cover letters,
//! proposals) from their content.
//!
//! ## Why this crate?
//!
//! Uploaded documents arrive as `scan.pdf`, `Document1.docx` or
//! `IMG_2041.jpg`. The useful name (who, which role, which company, what
//! kind of document) is inside the file. This crate reads it out with the
//! cheapest method that works, asks a hosted language model to summarise it
//! as four fields, and turns those fields into a ranked list of safe
//! filenames.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document bytes + MIME type
//!  │
//!  ├─ 1. Extract   PDF text layer → OCR fallback; images → OCR; DOCX paragraphs
//!  ├─ 2. Classify  first 3000 chars → chat-completions model → JSON record
//!  └─ 3. Name      sanitize fields → five templates → filtered variants
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docnamer::{suggest_names_for_file, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = std::env::var("TOGETHER_API_KEY")?;
//!     let config = PipelineConfig::default();
//!     let report = suggest_names_for_file("scan.pdf", None, &key, &config).await?;
//!     for name in &report.variants {
//!         println!("{name}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! | Needed for       | Tool                | Located via                          |
//! |------------------|---------------------|--------------------------------------|
//! | PDF text + pages | pdfium shared lib   | `--pdfium-lib`, `PDFIUM_LIB_PATH`, system |
//! | OCR              | `tesseract` binary  | `--tesseract`, `PATH`                |
//!
//! Both are only touched when a document needs them: DOCX files need
//! neither, and text-layer PDFs never invoke tesseract.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docnamer` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docnamer = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod suggest;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClassifierConfig, ExtractionConfig, PipelineConfig, PipelineConfigBuilder};
pub use document::{DocumentKind, RawDocument};
pub use error::{ClassifyError, DocNamerError, ExtractError};
pub use output::{Classification, ClassificationRecord, Extraction, ExtractionMethod, NamingReport};
pub use pipeline::classify::{classify_document, Classifier};
pub use pipeline::extract::{extract_text, Extractor};
pub use pipeline::naming::build_filename_variants;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use suggest::{save_as, suggest_names, suggest_names_for_file, suggest_names_sync};
