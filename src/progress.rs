//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to hear about
//! each stage as it starts and finishes, and about every page that goes
//! through OCR (the slow path on scanned documents).
//!
//! # Example
//!
//! ```rust
//! use docnamer::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl PipelineProgressCallback for Log {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("{stage}…");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Log))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// The three pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extraction,
    Classification,
    Naming,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Extraction => "Extracting text",
            Stage::Classification => "Classifying document",
            Stage::Naming => "Building names",
        })
    }
}

/// Called by the pipeline as it runs.
///
/// Implementations must be `Send + Sync`: OCR events fire from the blocking
/// thread pool. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called before OCR runs on a page.
    ///
    /// # Arguments
    /// * `page_num`   : 1-indexed page (always 1 for raster images)
    /// * `total_pages`: pages that will be recognised
    fn on_ocr_page(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a stage ends, successfully or not.
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called when a stage reports a failure (fatal or degraded).
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        starts: AtomicUsize,
        pages: AtomicUsize,
        errors: AtomicUsize,
    }

    impl PipelineProgressCallback for Counting {
        fn on_stage_start(&self, _stage: Stage) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_ocr_page(&self, _page_num: usize, _total_pages: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage_error(&self, _stage: Stage, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Extraction);
        cb.on_ocr_page(1, 3);
        cb.on_stage_complete(Stage::Extraction, 12);
        cb.on_stage_error(Stage::Classification, "timeout");
    }

    #[test]
    fn arc_dyn_callback_receives_events() {
        let counting = Arc::new(Counting::default());
        let cb: ProgressCallback = counting.clone();
        cb.on_stage_start(Stage::Extraction);
        cb.on_ocr_page(1, 2);
        cb.on_ocr_page(2, 2);
        cb.on_stage_error(Stage::Classification, "no JSON");
        assert_eq!(counting.starts.load(Ordering::SeqCst), 1);
        assert_eq!(counting.pages.load(Ordering::SeqCst), 2);
        assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Classification.to_string(), "Classifying document");
    }
}
