//! Progress-callback trait for analysis stage events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AuditConfigBuilder::progress_callback`] to be told when
//! each pipeline stage starts and finishes. The CLI uses it to drive a
//! spinner; a server could forward it to a log or a socket.
//!
//! # Example
//!
//! ```rust
//! use proforma_audit::{AnalysisProgressCallback, AnalysisStage, AuditConfig};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl AnalysisProgressCallback for Printer {
//!     fn on_stage_start(&self, stage: AnalysisStage) {
//!         eprintln!("{}…", stage.label());
//!     }
//! }
//!
//! let config = AuditConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::InvoiceStatus;
use std::fmt;
use std::sync::Arc;

/// Steps of one analysis, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    /// Resolving a path or URL (CLI only).
    Reading,
    /// PDF → text.
    Extracting,
    /// The model call.
    CallingModel,
    /// Splitting and deserializing the reply.
    Parsing,
}

impl AnalysisStage {
    /// Spanish label, as shown in the UI.
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisStage::Reading => "Leyendo archivo",
            AnalysisStage::Extracting => "Extrayendo texto del PDF",
            AnalysisStage::CallingModel => "Analizando con IA",
            AnalysisStage::Parsing => "Procesando respuesta",
        }
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the auditor as an analysis moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: AnalysisStage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    ///
    /// # Arguments
    /// * `stage`     : the stage that finished
    /// * `elapsed_ms`: wall-clock time spent in it
    fn on_stage_complete(&self, stage: AnalysisStage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called once when the analysis produced a result.
    fn on_analysis_complete(&self, status: InvoiceStatus) {
        let _ = status;
    }

    /// Called once when the analysis failed.
    ///
    /// # Arguments
    /// * `stage`: the stage that failed
    /// * `error`: technical error description
    fn on_analysis_error(&self, stage: AnalysisStage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AuditConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
