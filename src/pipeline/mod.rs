//! Pipeline stages for document naming.
//!
//! Each submodule implements one step. External dependencies (pdfium,
//! tesseract, the remote model) sit behind traits so every stage can be
//! tested without them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ classify ──▶ naming
//! (path/URL)  │  (pdf, ocr, docx)   (llm)
//! ```
//!
//! 1. [`input`]   : read a local file or download a URL; resolve its MIME type
//! 2. [`extract`] : tiered text extraction; blocking work on `spawn_blocking`
//!    - [`pdf`] : pdfium text layer and page rasterisation
//!    - [`ocr`] : tesseract recognition of page images
//!    - [`docx`]: paragraph text of word-processing documents
//! 3. [`classify`]: prompt the model and parse its JSON; the only stage with
//!    network I/O (via [`llm`])
//! 4. [`naming`]  : pure filename templating

pub mod classify;
pub mod docx;
pub mod extract;
pub mod input;
pub mod llm;
pub mod naming;
pub mod ocr;
pub mod pdf;
