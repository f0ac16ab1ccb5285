//! Text extraction: PDF bytes → one line of text per page.
//!
//! ## Why lopdf?
//!
//! The model only needs the invoice's words, not its layout, so there is no
//! rasterising here. lopdf parses straight from the upload buffer, needs no
//! native library and is pure Rust, which also lets the tests build their
//! own fixture PDFs. Parsing is CPU-bound, so both entry points run on the
//! blocking pool via `spawn_blocking`.

use crate::error::AuditError;
use crate::output::DocumentMetadata;
use lopdf::{Document, Object};
use tracing::{debug, warn};

/// Extract the text of every page, pages in order, one line per page.
///
/// Whitespace runs inside a page collapse to a single space. A page whose
/// content cannot be decoded contributes an empty line.
pub async fn extract_text(bytes: bytes::Bytes, filename: &str) -> Result<String, AuditError> {
    let name = filename.to_string();
    tokio::task::spawn_blocking(move || extract_text_blocking(&bytes, &name))
        .await
        .map_err(|e| AuditError::Internal(format!("extraction task panicked: {e}")))?
}

/// Read page count, version and Info-dictionary fields.
pub async fn extract_metadata(
    bytes: bytes::Bytes,
    filename: &str,
) -> Result<DocumentMetadata, AuditError> {
    let name = filename.to_string();
    tokio::task::spawn_blocking(move || {
        let doc = load(&bytes, &name)?;
        Ok(metadata_of(&doc))
    })
    .await
    .map_err(|e| AuditError::Internal(format!("metadata task panicked: {e}")))?
}

/// Synchronous core of [`extract_text`].
pub fn extract_text_blocking(bytes: &[u8], filename: &str) -> Result<String, AuditError> {
    let doc = load(bytes, filename)?;
    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(AuditError::ParseError {
            filename: filename.to_string(),
            detail: "document has no pages".to_string(),
        });
    }

    let mut lines = Vec::with_capacity(pages.len());
    for page_num in pages.keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(text) => lines.push(collapse_whitespace(&text)),
            Err(e) => {
                warn!("{}: page {} text could not be decoded: {}", filename, page_num, e);
                lines.push(String::new());
            }
        }
    }

    let text = lines.join("\n");
    debug!(
        "Extracted {} chars from {} pages of {}",
        text.len(),
        lines.len(),
        filename
    );
    Ok(text)
}

fn load(bytes: &[u8], filename: &str) -> Result<Document, AuditError> {
    Document::load_mem(bytes).map_err(|e| AuditError::ParseError {
        filename: filename.to_string(),
        detail: e.to_string(),
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn metadata_of(doc: &Document) -> DocumentMetadata {
    let mut meta = DocumentMetadata {
        page_count: doc.get_pages().len(),
        pdf_version: doc.version.clone(),
        title: None,
        author: None,
        is_encrypted: doc.trailer.get(b"Encrypt").is_ok(),
    };

    let info = doc
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_object(id))
        .and_then(Object::as_dict);

    if let Ok(dict) = info {
        let field = |key: &[u8]| {
            dict.get(key)
                .and_then(Object::as_str)
                .ok()
                .map(decode_pdf_string)
                .filter(|s| !s.is_empty())
        };
        meta.title = field(b"Title");
        meta.author = field(b"Author");
    }

    meta
}

/// Decode a PDF text string: UTF-16BE when it carries a BOM, otherwise
/// treated as (mostly ASCII) PDFDocEncoding.
fn decode_pdf_string(raw: &[u8]) -> String {
    if let Some(rest) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units).trim().to_string();
    }
    raw.iter().map(|&b| b as char).collect::<String>().trim().to_string()
}
