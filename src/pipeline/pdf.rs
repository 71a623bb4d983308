//! PDF access: read the text layer and rasterise pages via pdfium.
//!
//! Both operations sit behind [`PdfBackend`] so the tiered extraction logic
//! in [`crate::pipeline::extract`] can be exercised without a pdfium shared
//! library. All methods are blocking; callers run them inside
//! `spawn_blocking`.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI would produce a
//! 12,000 × 17,000 px image. `max_pixels` caps the longest edge regardless
//! of physical size, keeping memory bounded while leaving body text large
//! enough for tesseract.

use crate::error::ExtractError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::ops::ControlFlow;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Receives each page: `(page_index_0based, total_pages, image)`, where the
/// image is an [`ExtractError::RenderFailed`] when that page alone could not
/// be rasterised.
///
/// Returning [`ControlFlow::Break`] stops rendering after the current page.
pub type PageVisitor<'a> =
    dyn FnMut(usize, usize, Result<DynamicImage, ExtractError>) -> ControlFlow<()> + 'a;

/// Read access to a PDF's text layer and page pixels.
pub trait PdfBackend: Send + Sync {
    /// Text of every page, in page order.
    fn page_texts(&self, bytes: &[u8], password: Option<&str>) -> Result<Vec<String>, ExtractError>;

    /// Render up to `max_pages` pages in order, handing each to `visit`.
    ///
    /// A page that fails to render is still visited, with its error. Returns
    /// the document's total page count; `Err` only when the document itself
    /// cannot be opened.
    fn render_pages(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        max_pixels: u32,
        max_pages: usize,
        visit: &mut PageVisitor<'_>,
    ) -> Result<usize, ExtractError>;
}

/// [`PdfBackend`] backed by the pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    lib_path: Option<PathBuf>,
}

impl PdfiumBackend {
    /// `lib_path` may name the library file or the directory containing it.
    /// When `None`, `PDFIUM_LIB_PATH` is consulted, then the system library.
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }

    fn bind(&self) -> Result<Pdfium, ExtractError> {
        let explicit = self
            .lib_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => {
                let path = if path.is_dir() {
                    Pdfium::pdfium_platform_library_name_at_path(&path)
                } else {
                    path
                };
                debug!("Binding pdfium from {}", path.display());
                Pdfium::bind_to_library(&path)
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| ExtractError::PdfiumUnavailable(e.to_string()))?;

        Ok(Pdfium::new(bindings))
    }
}

fn open_error(e: PdfiumError, password: Option<&str>) -> ExtractError {
    let detail = format!("{:?}", e);
    let detail = if detail.contains("Password") || detail.contains("password") {
        if password.is_some() {
            "wrong password".to_string()
        } else {
            "document is encrypted; a password is required".to_string()
        }
    } else {
        detail
    };
    ExtractError::PdfOpen { detail }
}

impl PdfBackend for PdfiumBackend {
    fn page_texts(&self, bytes: &[u8], password: Option<&str>) -> Result<Vec<String>, ExtractError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| open_error(e, password))?;

        let pages = document.pages();
        let mut texts = Vec::with_capacity(pages.len() as usize);

        for (idx, page) in pages.iter().enumerate() {
            let text = page.text().map_err(|e| ExtractError::TextLayer {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;
            texts.push(text.all());
        }

        debug!("Read text layer of {} pages", texts.len());
        Ok(texts)
    }

    fn render_pages(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        max_pixels: u32,
        max_pages: usize,
        visit: &mut PageVisitor<'_>,
    ) -> Result<usize, ExtractError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| open_error(e, password))?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("Rasterising up to {} of {} pages", max_pages.min(total_pages), total_pages);

        let render_config = PdfRenderConfig::new()
            .set_target_width(max_pixels as i32)
            .set_maximum_height(max_pixels as i32);

        for (idx, page) in pages.iter().enumerate().take(max_pages) {
            let rendered = match page.render_with_config(&render_config) {
                Ok(bitmap) => {
                    let image = bitmap.as_image();
                    debug!(
                        "Rendered page {} → {}x{} px",
                        idx + 1,
                        image.width(),
                        image.height()
                    );
                    Ok(image)
                }
                Err(e) => {
                    warn!("Page {} could not be rendered: {:?}", idx + 1, e);
                    Err(ExtractError::RenderFailed {
                        page: idx + 1,
                        detail: format!("{:?}", e),
                    })
                }
            };

            if visit(idx, total_pages, rendered).is_break() {
                break;
            }
        }

        Ok(total_pages)
    }
}
