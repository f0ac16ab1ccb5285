//! HTTP error response conversion.
//!
//! Handlers return `Result<_, HttpError>`. Any [`AuditError`] converts into
//! an `HttpError` through `?`, which picks the status code and renders the
//! `{ error, code, recoverable, details }` body. `error` is always the fixed
//! Spanish sentence the UI shows; `details` carries the technical message.

use crate::error::AuditError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// User-facing message.
    pub error: String,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether the same request may succeed if retried
    pub recoverable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// An error on its way out of a handler.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    body: ErrorResponse,
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &ErrorResponse {
        &self.body
    }

    /// Upload larger than the configured limit.
    pub fn payload_too_large(max_bytes: usize) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            body: ErrorResponse {
                error: format!(
                    "El archivo supera el tamaño máximo permitido de {} MB.",
                    max_bytes / 1024 / 1024
                ),
                code: "payload_too_large".to_string(),
                recoverable: false,
                details: None,
            },
        }
    }
}

/// HTTP status for each error class.
pub fn status_for(error: &AuditError) -> StatusCode {
    match error {
        AuditError::InvalidFileType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        AuditError::NoFileSelected | AuditError::ReadError { .. } => StatusCode::BAD_REQUEST,
        AuditError::ParseError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AuditError::DownloadFailed { .. }
        | AuditError::ApiError { .. }
        | AuditError::FormatError { .. }
        | AuditError::JsonError { .. } => StatusCode::BAD_GATEWAY,
        AuditError::ProviderNotConfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AuditError::AnalysisInProgress => StatusCode::CONFLICT,
        AuditError::SessionNotFound { .. } | AuditError::NoResult => StatusCode::NOT_FOUND,
        AuditError::OutputWriteFailed { .. }
        | AuditError::InvalidConfig(_)
        | AuditError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<&AuditError> for HttpError {
    fn from(err: &AuditError) -> Self {
        let status = status_for(err);
        // Internal failures keep their details in the log only.
        let details = (status != StatusCode::INTERNAL_SERVER_ERROR).then(|| err.to_string());
        Self {
            status,
            body: ErrorResponse {
                error: err.user_message().to_string(),
                code: err.code().to_string(),
                recoverable: err.is_recoverable(),
                details,
            },
        }
    }
}

impl From<AuditError> for HttpError {
    fn from(err: AuditError) -> Self {
        HttpError::from(&err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = self.status.as_u16(),
                code = %self.body.code,
                details = ?self.body.details,
                "Request failed"
            );
        } else {
            tracing::debug!(
                status = self.status.as_u16(),
                code = %self.body.code,
                "Request rejected"
            );
        }
        (self.status, Json(self.body)).into_response()
    }
}
