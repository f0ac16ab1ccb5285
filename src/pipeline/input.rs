//! Input resolution: turn an upload, a path or a URL into an [`UploadedDocument`].
//!
//! ## Why keep everything in memory?
//!
//! lopdf parses straight from a byte buffer, so there is no reason to touch
//! the file system: a browser upload, a local file and a downloaded URL all
//! become the same `UploadedDocument`. The MIME check is the only gate here;
//! whether the bytes really are a PDF is decided by the extraction stage.

use crate::error::AuditError;
use bytes::Bytes;
use std::path::Path;
use tracing::{debug, info};

/// MIME type accepted for uploads.
pub const PDF_MIME: &str = "application/pdf";

/// A selected file: name, declared type and raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    /// Declared MIME type, as sent by the browser or derived from the source.
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadedDocument {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// `true` when the declared type is `application/pdf`, parameters ignored.
    pub fn is_pdf(&self) -> bool {
        self.content_type
            .split(';')
            .next()
            .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_MIME))
            .unwrap_or(false)
    }

    /// Reject anything that is not declared as a PDF.
    pub fn ensure_pdf(&self) -> Result<(), AuditError> {
        if self.is_pdf() {
            Ok(())
        } else {
            Err(AuditError::InvalidFileType {
                filename: self.filename.clone(),
                content_type: self.content_type.clone(),
            })
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// MIME type implied by a file name's extension.
pub fn mime_from_extension(name: &str) -> &'static str {
    let is_pdf = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if is_pdf {
        PDF_MIME
    } else {
        "application/octet-stream"
    }
}

/// Resolve a local path or an HTTP(S) URL to an in-memory document.
pub async fn resolve_input(
    input: &str,
    download_timeout_secs: u64,
) -> Result<UploadedDocument, AuditError> {
    if is_url(input) {
        download_url(input, download_timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<UploadedDocument, AuditError> {
    let path = Path::new(path_str);
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AuditError::ReadError {
            source_name: path_str.to_string(),
            detail: e.to_string(),
        })?;

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path_str)
        .to_string();
    let content_type = mime_from_extension(&filename);

    debug!("Read local file {} ({} bytes)", path.display(), bytes.len());
    Ok(UploadedDocument::new(filename, content_type, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadedDocument, AuditError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| AuditError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url);
    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let content_type = content_type_for_download(header_type.as_deref(), &filename);

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    info!("Downloaded {} ({} bytes, {})", filename, bytes.len(), content_type);
    Ok(UploadedDocument::new(filename, content_type, bytes))
}

/// Prefer the server's Content-Type; fall back to the URL extension when the
/// server is vague about it.
fn content_type_for_download(header: Option<&str>, filename: &str) -> String {
    match header {
        Some(ct) if !ct.trim().is_empty() && !ct.starts_with("application/octet-stream") => {
            ct.to_string()
        }
        _ => mime_from_extension(filename).to_string(),
    }
}

/// Last path segment of the URL, or `downloaded.pdf`.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
