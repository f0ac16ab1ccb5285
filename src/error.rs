//! Error types for the proforma-audit library.
//!
//! A single [`AuditError`] covers every stage of the pipeline. Each variant
//! carries a technical `Display` message (for logs and the CLI) and maps to
//! exactly one fixed, user-facing sentence through
//! [`AuditError::user_message`]. The browser UI only ever shows the latter.
//!
//! Nothing in the pipeline retries: an error aborts the current analysis and
//! the session moves to `Failed`, from where the user can pick another file.

use std::path::PathBuf;
use thiserror::Error;

/// Message shown when a selected file is not a PDF.
pub const MSG_INVALID_FILE_TYPE: &str = "Por favor, seleccione un archivo PDF válido.";

/// Message shown when an analysis is requested with no file selected.
pub const MSG_NO_FILE_SELECTED: &str = "Por favor, seleccione un archivo PDF para analizar.";

/// Message shown when the upload could not be read.
pub const MSG_READ_ERROR: &str = "Error al leer el archivo.";

/// Message shown when the bytes are not a usable PDF.
pub const MSG_PARSE_ERROR: &str =
    "Error al procesar el archivo PDF. Asegúrese de que sea un PDF válido.";

/// Message shown for any failure talking to, or understanding, the model.
pub const MSG_ANALYSIS_FAILED: &str =
    "No se pudo obtener el análisis del servicio de IA. Intente nuevamente.";

/// All errors returned by the proforma-audit library.
#[derive(Debug, Error)]
pub enum AuditError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// The selected file does not declare a PDF MIME type.
    #[error("Unsupported file type '{content_type}' for '{filename}': expected application/pdf")]
    InvalidFileType {
        filename: String,
        content_type: String,
    },

    /// An analysis was requested while no file was selected.
    #[error("No file selected")]
    NoFileSelected,

    /// The raw bytes could not be read (file system, multipart body, …).
    #[error("Failed to read '{source_name}': {detail}")]
    ReadError { source_name: String, detail: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The bytes could not be opened as a PDF document.
    #[error("Could not open '{filename}' as a PDF: {detail}")]
    ParseError { filename: String, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Transport, server or timeout failure during the single model call.
    #[error("LLM API error: {message}")]
    ApiError { message: String },

    /// The model reply does not follow the two-part report/JSON contract.
    #[error("Invalid response format from model: {detail}")]
    FormatError { detail: String },

    /// The JSON half of the reply is not a valid invoice record.
    #[error("Invalid JSON record in model response: {source}")]
    JsonError {
        #[source]
        source: serde_json::Error,
    },

    // ── Session errors ────────────────────────────────────────────────────
    /// A second analysis was requested while one is still running.
    #[error("An analysis is already in progress for this session")]
    AnalysisInProgress,

    /// No session exists under the given id.
    #[error("Session '{id}' not found")]
    SessionNotFound { id: String },

    /// A result was requested before any analysis succeeded.
    #[error("No analysis result is available yet")]
    NoResult,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuditError {
    /// The fixed sentence shown to the end user for this error.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuditError::InvalidFileType { .. } => MSG_INVALID_FILE_TYPE,
            AuditError::NoFileSelected => MSG_NO_FILE_SELECTED,
            AuditError::ReadError { .. } | AuditError::DownloadFailed { .. } => MSG_READ_ERROR,
            AuditError::ParseError { .. } => MSG_PARSE_ERROR,
            AuditError::ProviderNotConfigured { .. }
            | AuditError::ApiError { .. }
            | AuditError::FormatError { .. }
            | AuditError::JsonError { .. } => MSG_ANALYSIS_FAILED,
            AuditError::AnalysisInProgress => "Ya hay un análisis en curso. Espere a que termine.",
            AuditError::SessionNotFound { .. } => {
                "La sesión ha expirado. Recargue la página para comenzar de nuevo."
            }
            AuditError::NoResult => "Todavía no hay un resultado de análisis disponible.",
            AuditError::OutputWriteFailed { .. } => "No se pudo guardar el resultado.",
            AuditError::InvalidConfig(_) | AuditError::Internal(_) => {
                "Ocurrió un error inesperado durante el análisis."
            }
        }
    }

    /// Stable machine-readable code, used by the HTTP API.
    pub fn code(&self) -> &'static str {
        match self {
            AuditError::InvalidFileType { .. } => "invalid_file_type",
            AuditError::NoFileSelected => "no_file_selected",
            AuditError::ReadError { .. } => "read_error",
            AuditError::DownloadFailed { .. } => "download_failed",
            AuditError::ParseError { .. } => "parse_error",
            AuditError::ProviderNotConfigured { .. } => "provider_not_configured",
            AuditError::ApiError { .. } => "api_error",
            AuditError::FormatError { .. } => "format_error",
            AuditError::JsonError { .. } => "json_error",
            AuditError::AnalysisInProgress => "analysis_in_progress",
            AuditError::SessionNotFound { .. } => "session_not_found",
            AuditError::NoResult => "no_result",
            AuditError::OutputWriteFailed { .. } => "output_write_failed",
            AuditError::InvalidConfig(_) => "invalid_config",
            AuditError::Internal(_) => "internal",
        }
    }

    /// Whether the same request may succeed if simply tried again.
    ///
    /// The pipeline never retries on its own; this is a hint for clients.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuditError::ApiError { .. }
                | AuditError::FormatError { .. }
                | AuditError::JsonError { .. }
                | AuditError::AnalysisInProgress
                | AuditError::DownloadFailed { .. }
        )
    }
}
