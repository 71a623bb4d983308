//! Optical character recognition via the `tesseract` command-line tool.
//!
//! Recognition sits behind [`OcrEngine`] so the extractor can be tested with
//! a counting fake. The default engine, [`TesseractCli`], writes the image to
//! a temporary PNG and reads the recognised text from tesseract's stdout.
//! Given a time limit it polls the child process and kills it once the limit
//! passes, so one pathological page cannot hold the request hostage.
//!
//! ## Why PNG?
//! Lossless compression preserves text crispness. JPEG artefacts on rendered
//! text degrade recognition accuracy, and the temp file never leaves the
//! machine, so size does not matter.

use crate::config::ExtractionConfig;
use image::DynamicImage;
use std::fs::File;
use std::io::Cursor;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// How often a time-limited tesseract run is checked for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Why a recognition call produced no text.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// The engine cannot run at all; retrying on the next page is pointless.
    #[error("{0}")]
    Unavailable(String),

    /// The engine ran but failed on this image.
    #[error("{0}")]
    Failed(String),

    /// The engine was stopped before it finished this image.
    #[error("no result within {}ms", .0.as_millis())]
    TimedOut(Duration),
}

/// Turns page pixels into text.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;

    /// [`recognize`](Self::recognize), giving up after `limit`.
    ///
    /// Engines that cannot be interrupted finish the image regardless.
    fn recognize_within(&self, image: &DynamicImage, _limit: Duration) -> Result<String, OcrError> {
        self.recognize(image)
    }
}

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// [`OcrEngine`] that shells out to `tesseract <image> stdout -l <lang>`.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
}

impl TesseractCli {
    pub fn new(binary: Option<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.unwrap_or_else(|| PathBuf::from("tesseract")),
            language: language.into(),
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.tesseract_path.clone(), config.ocr_language.clone())
    }
}

impl TesseractCli {
    fn run(&self, image: &DynamicImage, limit: Option<Duration>) -> Result<String, OcrError> {
        let png = encode_png(image).map_err(|e| OcrError::Failed(format!("PNG encoding failed: {e}")))?;

        let temp_err = |e: std::io::Error| OcrError::Failed(format!("temp file: {e}"));
        let dir = tempfile::Builder::new()
            .prefix("docnamer-ocr-")
            .tempdir()
            .map_err(temp_err)?;
        let input = dir.path().join("page.png");
        let stdout_path = dir.path().join("stdout.txt");
        let stderr_path = dir.path().join("stderr.txt");
        std::fs::write(&input, &png).map_err(temp_err)?;

        // Both streams go to files: a full pipe cannot stall the child while
        // it is being polled.
        let stdout = File::create(&stdout_path).map_err(temp_err)?;
        let stderr = File::create(&stderr_path).map_err(temp_err)?;

        let mut child = Command::new(&self.binary)
            .arg(&input)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let status = match limit {
            Some(limit) => wait_with_limit(&mut child, limit)?,
            None => child
                .wait()
                .map_err(|e| OcrError::Failed(format!("waiting for tesseract: {e}")))?,
        };

        if !status.success() {
            let stderr = std::fs::read_to_string(&stderr_path).unwrap_or_default();
            return Err(OcrError::Failed(format!("{}: {}", status, stderr.trim())));
        }

        let raw = std::fs::read(&stdout_path)
            .map_err(|e| OcrError::Failed(format!("reading tesseract output: {e}")))?;
        // tesseract ends every page with a form feed
        let text = String::from_utf8_lossy(&raw).replace('\u{c}', "");
        debug!("tesseract returned {} chars", text.len());
        Ok(text)
    }

    fn spawn_error(&self, e: std::io::Error) -> OcrError {
        if e.kind() == std::io::ErrorKind::NotFound {
            OcrError::Unavailable(format!(
                "'{}' not found; install tesseract or pass its path",
                self.binary.display()
            ))
        } else {
            OcrError::Unavailable(format!("could not start '{}': {e}", self.binary.display()))
        }
    }
}

/// Wait for `child`, killing it once `limit` has passed.
fn wait_with_limit(child: &mut Child, limit: Duration) -> Result<ExitStatus, OcrError> {
    let deadline = Instant::now() + limit;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                let now = Instant::now();
                if now >= deadline {
                    warn!("tesseract still running after {}ms; killing it", limit.as_millis());
                    if let Err(e) = child.kill() {
                        warn!("Could not kill tesseract: {}", e);
                    }
                    // reap so no zombie is left behind
                    let _ = child.wait();
                    return Err(OcrError::TimedOut(limit));
                }
                std::thread::sleep(POLL_INTERVAL.min(deadline - now));
            }
            Err(e) => return Err(OcrError::Failed(format!("waiting for tesseract: {e}"))),
        }
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        self.run(image, None)
    }

    fn recognize_within(&self, image: &DynamicImage, limit: Duration) -> Result<String, OcrError> {
        self.run(image, Some(limit))
    }
}
