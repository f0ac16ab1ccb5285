//! Per-user analysis session: the UI state machine.
//!
//! ```text
//!            select_file              begin_analysis          finish(Ok)
//!   Idle ───────────────▶ FileSelected ─────────────▶ Analyzing ─────────▶ Success
//!    ▲                         ▲                          │                  │
//!    │ remove_file             │ select_file              │ finish(Err)      │
//!    └─────────────────────────┴──────────── Failed ◀─────┘                  │
//!                                              ▲  select_file / remove_file  │
//!                                              └─────────────────────────────┘
//! ```
//!
//! Only one analysis runs at a time: every transition out of `Analyzing`
//! except [`AnalysisSession::finish`] is refused with
//! [`AuditError::AnalysisInProgress`], and nothing cancels a running one.
//! The session never awaits anything itself, so callers can keep it behind
//! a plain mutex and release the lock before calling the model.

use crate::error::AuditError;
use crate::output::{AnalysisResult, InvoiceStatus, ReportItem};
use crate::pipeline::input::UploadedDocument;
use serde::{Deserialize, Serialize};
use std::mem;
use tracing::{debug, warn};

/// A failure as the user sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFailure {
    /// Stable machine-readable code, see [`AuditError::code`].
    pub code: String,
    /// Fixed Spanish sentence, see [`AuditError::user_message`].
    pub message: String,
}

impl From<&AuditError> for SessionFailure {
    fn from(e: &AuditError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.user_message().to_string(),
        }
    }
}

/// Where a session is.
#[derive(Debug, Clone)]
pub enum SessionState {
    Idle,
    FileSelected {
        document: UploadedDocument,
    },
    Analyzing {
        document: UploadedDocument,
    },
    Success {
        document: UploadedDocument,
        result: AnalysisResult,
    },
    Failed {
        /// Still selected, if the failure happened after selection.
        document: Option<UploadedDocument>,
        failure: SessionFailure,
    },
}

/// Serialisable name of a [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    FileSelected,
    Analyzing,
    Success,
    Failed,
}

/// One user's analysis session.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    state: SessionState,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        match self.state {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::FileSelected { .. } => SessionPhase::FileSelected,
            SessionState::Analyzing { .. } => SessionPhase::Analyzing,
            SessionState::Success { .. } => SessionPhase::Success,
            SessionState::Failed { .. } => SessionPhase::Failed,
        }
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self.state, SessionState::Analyzing { .. })
    }

    /// The currently selected document, if any.
    pub fn document(&self) -> Option<&UploadedDocument> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::FileSelected { document }
            | SessionState::Analyzing { document }
            | SessionState::Success { document, .. } => Some(document),
            SessionState::Failed { document, .. } => document.as_ref(),
        }
    }

    /// The last successful result, if the session is in `Success`.
    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.state {
            SessionState::Success { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Select a file, replacing any previous selection and result.
    ///
    /// A non-PDF moves the session to `Failed` with no document.
    pub fn select_file(&mut self, document: UploadedDocument) -> Result<(), AuditError> {
        if self.is_analyzing() {
            return Err(AuditError::AnalysisInProgress);
        }
        if let Err(e) = document.ensure_pdf() {
            warn!(
                "Rejected '{}' with content type '{}'",
                document.filename, document.content_type
            );
            self.state = SessionState::Failed {
                document: None,
                failure: SessionFailure::from(&e),
            };
            return Err(e);
        }

        debug!("Selected '{}' ({} bytes)", document.filename, document.size());
        self.state = SessionState::FileSelected { document };
        Ok(())
    }

    /// Drop the selected file and any result.
    pub fn remove_file(&mut self) -> Result<(), AuditError> {
        if self.is_analyzing() {
            return Err(AuditError::AnalysisInProgress);
        }
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Enter `Analyzing` and hand out the document to analyse.
    ///
    /// Allowed from any state holding a document, so a failed or finished
    /// analysis can be resubmitted. With no document the session fails with
    /// [`AuditError::NoFileSelected`].
    pub fn begin_analysis(&mut self) -> Result<UploadedDocument, AuditError> {
        if self.is_analyzing() {
            return Err(AuditError::AnalysisInProgress);
        }
        let Some(document) = self.document().cloned() else {
            let e = AuditError::NoFileSelected;
            self.state = SessionState::Failed {
                document: None,
                failure: SessionFailure::from(&e),
            };
            return Err(e);
        };

        self.state = SessionState::Analyzing {
            document: document.clone(),
        };
        Ok(document)
    }

    /// Record the outcome of the analysis started by [`Self::begin_analysis`].
    pub fn finish(&mut self, outcome: Result<AnalysisResult, AuditError>) -> Result<(), AuditError> {
        let document = match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Analyzing { document } => document,
            other => {
                self.state = other;
                return Err(AuditError::Internal(
                    "finish called with no analysis in progress".to_string(),
                ));
            }
        };

        self.state = match outcome {
            Ok(result) => SessionState::Success { document, result },
            Err(e) => {
                warn!("Analysis of '{}' failed: {}", document.filename, e);
                SessionState::Failed {
                    document: Some(document),
                    failure: SessionFailure::from(&e),
                }
            }
        };
        Ok(())
    }

    /// Serialisable view of the session for the UI.
    pub fn snapshot(&self) -> SessionSnapshot {
        let file = self.document().map(|d| FileInfo {
            name: d.filename.clone(),
            size: d.size(),
            size_kb: format!("{:.2}", d.size() as f64 / 1024.0),
        });
        let error = match &self.state {
            SessionState::Failed { failure, .. } => Some(failure.clone()),
            _ => None,
        };
        let result = self.result().map(ResultView::from);

        SessionSnapshot {
            state: self.phase(),
            file,
            error,
            result,
        }
    }
}

/// Selected file as shown in the file chip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: usize,
    /// Size in KB with two decimals.
    pub size_kb: String,
}

/// A result ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultView {
    pub status: InvoiceStatus,
    pub status_title: String,
    pub report_items: Vec<ReportItem>,
    #[serde(flatten)]
    pub analysis: AnalysisResult,
}

impl From<&AnalysisResult> for ResultView {
    fn from(r: &AnalysisResult) -> Self {
        Self {
            status: r.json_data.status,
            status_title: r.json_data.status.title().to_string(),
            report_items: r.report_items(),
            analysis: r.clone(),
        }
    }
}

/// Everything the browser needs to render a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionPhase,
    pub file: Option<FileInfo>,
    pub error: Option<SessionFailure>,
    pub result: Option<ResultView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MSG_ANALYSIS_FAILED, MSG_INVALID_FILE_TYPE, MSG_NO_FILE_SELECTED};
    use crate::output::InvoiceRecord;

    fn pdf(name: &str) -> UploadedDocument {
        UploadedDocument::new(name, "application/pdf", vec![0u8; 2048])
    }

    fn result() -> AnalysisResult {
        AnalysisResult {
            visual_report: "🏢 Vendedor vs. Cta. Bancaria: ✅ Coinciden".into(),
            json_data: InvoiceRecord {
                seller_matches_account_holder: true,
                recipient_valid: true,
                incoterm: "FOB Shanghai".into(),
                incoterm_valid: true,
                pickup_address: None,
                payment_terms: "TT".into(),
                payment_terms_valid: true,
                goods: "LED".into(),
                suggested_hs_code: "9405.11".into(),
                hs_code_valid: true,
                status: InvoiceStatus::Valid,
            },
        }
    }

    #[test]
    fn test_happy_path() {
        let mut s = AnalysisSession::new();
        assert_eq!(s.phase(), SessionPhase::Idle);

        s.select_file(pdf("pi.pdf")).unwrap();
        assert_eq!(s.phase(), SessionPhase::FileSelected);

        let doc = s.begin_analysis().unwrap();
        assert_eq!(doc.filename, "pi.pdf");
        assert!(s.is_analyzing());

        s.finish(Ok(result())).unwrap();
        assert_eq!(s.phase(), SessionPhase::Success);
        assert_eq!(s.result().unwrap().json_data.status, InvoiceStatus::Valid);
    }

    #[test]
    fn test_non_pdf_never_reaches_file_selected() {
        let mut s = AnalysisSession::new();
        let err = s
            .select_file(UploadedDocument::new("a.png", "image/png", vec![1]))
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidFileType { .. }));
        assert_eq!(s.phase(), SessionPhase::Failed);
        assert!(s.document().is_none());
        assert_eq!(s.snapshot().error.unwrap().message, MSG_INVALID_FILE_TYPE);
    }

    #[test]
    fn test_begin_without_file_fails_with_fixed_message() {
        let mut s = AnalysisSession::new();
        assert!(matches!(s.begin_analysis(), Err(AuditError::NoFileSelected)));
        let snap = s.snapshot();
        assert_eq!(snap.state, SessionPhase::Failed);
        assert_eq!(snap.error.unwrap().message, MSG_NO_FILE_SELECTED);
    }

    #[test]
    fn test_one_analysis_at_a_time() {
        let mut s = AnalysisSession::new();
        s.select_file(pdf("pi.pdf")).unwrap();
        s.begin_analysis().unwrap();

        assert!(matches!(s.begin_analysis(), Err(AuditError::AnalysisInProgress)));
        assert!(matches!(s.remove_file(), Err(AuditError::AnalysisInProgress)));
        assert!(matches!(
            s.select_file(pdf("other.pdf")),
            Err(AuditError::AnalysisInProgress)
        ));
        assert_eq!(s.document().unwrap().filename, "pi.pdf");
    }

    #[test]
    fn test_failure_keeps_document_for_resubmission() {
        let mut s = AnalysisSession::new();
        s.select_file(pdf("pi.pdf")).unwrap();
        s.begin_analysis().unwrap();
        s.finish(Err(AuditError::ApiError {
            message: "HTTP 503".into(),
        }))
        .unwrap();

        let snap = s.snapshot();
        assert_eq!(snap.state, SessionPhase::Failed);
        assert_eq!(snap.error.as_ref().unwrap().code, "api_error");
        assert_eq!(snap.error.unwrap().message, MSG_ANALYSIS_FAILED);
        assert_eq!(snap.file.unwrap().name, "pi.pdf");

        assert!(s.begin_analysis().is_ok());
    }

    #[test]
    fn test_remove_file_returns_to_idle() {
        let mut s = AnalysisSession::new();
        s.select_file(pdf("pi.pdf")).unwrap();
        s.begin_analysis().unwrap();
        s.finish(Ok(result())).unwrap();

        s.remove_file().unwrap();
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert!(s.result().is_none());
    }

    #[test]
    fn test_new_selection_clears_result() {
        let mut s = AnalysisSession::new();
        s.select_file(pdf("a.pdf")).unwrap();
        s.begin_analysis().unwrap();
        s.finish(Ok(result())).unwrap();

        s.select_file(pdf("b.pdf")).unwrap();
        assert_eq!(s.phase(), SessionPhase::FileSelected);
        assert!(s.result().is_none());
    }

    #[test]
    fn test_finish_without_analysis_is_rejected() {
        let mut s = AnalysisSession::new();
        s.select_file(pdf("a.pdf")).unwrap();
        assert!(s.finish(Ok(result())).is_err());
        assert_eq!(s.phase(), SessionPhase::FileSelected);
    }

    #[test]
    fn test_snapshot_serialises_for_the_ui() {
        let mut s = AnalysisSession::new();
        s.select_file(pdf("pi.pdf")).unwrap();
        s.begin_analysis().unwrap();
        s.finish(Ok(result())).unwrap();

        let value = serde_json::to_value(s.snapshot()).unwrap();
        assert_eq!(value["state"], "success");
        assert_eq!(value["file"]["size_kb"], "2.00");
        assert_eq!(value["result"]["status"], "valida");
        assert_eq!(value["result"]["status_title"], "Factura Válida");
        assert_eq!(value["result"]["json_data"]["estado_final"], "valida");
        assert_eq!(value["result"]["report_items"][0]["verdict"], "pass");
    }
}
