//! Input resolution: turn a user-supplied path or URL into a [`RawDocument`].
//!
//! The document type comes from, in order: an explicit MIME override, the
//! file extension (`mime_guess`), then the leading magic bytes. The size
//! ceiling is checked against file metadata (or `Content-Length`) before the
//! body is read, so an oversized upload is never buffered.

use crate::document::{RawDocument, MIME_JPEG, MIME_PDF, MIME_PNG};
use crate::error::DocNamerError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or URL to an in-memory document.
pub async fn resolve_input(
    input: &str,
    mime_override: Option<&str>,
    max_bytes: u64,
    timeout_secs: u64,
) -> Result<RawDocument, DocNamerError> {
    if is_url(input) {
        fetch_document(input, mime_override, max_bytes, timeout_secs).await
    } else {
        load_document(input, mime_override, max_bytes).await
    }
}

/// Read a local file.
pub async fn load_document(
    path: impl AsRef<Path>,
    mime_override: Option<&str>,
    max_bytes: u64,
) -> Result<RawDocument, DocNamerError> {
    let path = path.as_ref();

    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| io_error(e, path))?;
    if meta.len() > max_bytes {
        return Err(DocNamerError::FileTooLarge {
            path: path.to_path_buf(),
            size: meta.len(),
            limit: max_bytes,
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| io_error(e, path))?;

    let mime = match mime_override {
        Some(m) => m.to_string(),
        None => guess_mime(path)
            .or_else(|| sniff_mime(&bytes).map(str::to_string))
            .ok_or_else(|| DocNamerError::UnknownType {
                path: path.to_path_buf(),
            })?,
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    debug!("Loaded {} ({} bytes, {})", path.display(), bytes.len(), mime);
    Ok(RawDocument::from_mime(bytes, &mime, filename))
}

/// Download a document over HTTP(S).
pub async fn fetch_document(
    url: &str,
    mime_override: Option<&str>,
    max_bytes: u64,
    timeout_secs: u64,
) -> Result<RawDocument, DocNamerError> {
    info!("Downloading document from: {}", url);

    let failed = |reason: String| DocNamerError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocNamerError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url);
    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(DocNamerError::FileTooLarge {
                path: PathBuf::from(&filename),
                size: len,
                limit: max_bytes,
            });
        }
    }

    let header_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|m| !m.starts_with("application/octet-stream"));

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    if bytes.len() as u64 > max_bytes {
        return Err(DocNamerError::FileTooLarge {
            path: PathBuf::from(&filename),
            size: bytes.len() as u64,
            limit: max_bytes,
        });
    }

    let mime = mime_override
        .map(str::to_string)
        .or(header_mime)
        .or_else(|| guess_mime(Path::new(&filename)))
        .or_else(|| sniff_mime(&bytes).map(str::to_string))
        .ok_or_else(|| DocNamerError::UnknownType {
            path: PathBuf::from(&filename),
        })?;

    info!("Downloaded {} bytes ({})", bytes.len(), mime);
    Ok(RawDocument::from_mime(bytes.to_vec(), &mime, filename))
}

/// MIME type from the file extension.
pub fn guess_mime(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first_raw().map(str::to_string)
}

/// MIME type from magic bytes, for the formats that have unambiguous ones.
///
/// DOCX is a ZIP container and is not sniffed.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF") {
        Some(MIME_PDF)
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some(MIME_PNG)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(MIME_JPEG)
    } else {
        None
    }
}

/// Last path segment of the URL, or `download` when there is none.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }
    "download".to_string()
}

fn io_error(e: std::io::Error, path: &Path) -> DocNamerError {
    match e.kind() {
        std::io::ErrorKind::NotFound => DocNamerError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => DocNamerError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => DocNamerError::Internal(format!("reading '{}': {}", path.display(), e)),
    }
}
