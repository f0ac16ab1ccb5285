//! Response parsing: split the model reply into report and record.
//!
//! The reply contract is two free-text parts joined by [`REPORT_SEPARATOR`]:
//!
//! ```text
//! <report lines>
//! ---JSON_OUTPUT---
//! ```json            (optional)
//! { ...record... }
//! ```                (optional)
//! ```
//!
//! This is the only edge-case logic in the pipeline and it is deliberately
//! lenient past the separator: one leading and one trailing code fence are
//! removed, then the remainder must deserialize as an [`InvoiceRecord`].

use crate::error::AuditError;
use crate::output::{AnalysisResult, InvoiceRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Token separating the visual report from the JSON record.
pub const REPORT_SEPARATOR: &str = "---JSON_OUTPUT---";

static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[ \t]*(?:json|JSON)?[ \t]*(?:\r?\n)?").unwrap());

static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:\r?\n)?```$").unwrap());

/// Parse a raw model reply.
///
/// # Errors
/// - [`AuditError::FormatError`] if the separator is missing or repeated
/// - [`AuditError::JsonError`] if the second part is not a valid record
pub fn parse_response(raw: &str) -> Result<AnalysisResult, AuditError> {
    let occurrences = raw.matches(REPORT_SEPARATOR).count();
    let (report, payload) = match occurrences {
        1 => raw.split_once(REPORT_SEPARATOR).ok_or_else(|| {
            AuditError::Internal("separator counted but not found".to_string())
        })?,
        0 => {
            return Err(AuditError::FormatError {
                detail: format!("separator '{REPORT_SEPARATOR}' not found"),
            })
        }
        n => {
            return Err(AuditError::FormatError {
                detail: format!("separator '{REPORT_SEPARATOR}' appears {n} times, expected once"),
            })
        }
    };

    let json = strip_code_fences(payload);
    debug!(report_len = report.len(), json_len = json.len(), "Split model reply");

    let json_data: InvoiceRecord =
        serde_json::from_str(json).map_err(|source| AuditError::JsonError { source })?;

    Ok(AnalysisResult {
        visual_report: report.trim().to_string(),
        json_data,
    })
}

/// Remove at most one leading and one trailing fence from a trimmed payload.
pub fn strip_code_fences(payload: &str) -> &str {
    let s = payload.trim();
    let s = match RE_LEADING_FENCE.find(s) {
        Some(m) => &s[m.end()..],
        None => s,
    };
    let s = match RE_TRAILING_FENCE.find(s) {
        Some(m) => &s[..m.start()],
        None => s,
    };
    s.trim()
}
