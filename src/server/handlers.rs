//! Route handlers.

use super::error::HttpError;
use super::AppState;
use crate::error::AuditError;
use crate::output::RECORD_FILE_NAME;
use crate::pipeline::input::UploadedDocument;
use crate::session::{ResultView, SessionSnapshot};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// A session snapshot with its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub session: SessionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub sessions: usize,
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.auditor.model_id().to_string(),
        sessions: state.sessions.len(),
    })
}

pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionResponse>), HttpError> {
    let id = state.sessions.create()?;
    let session = state.sessions.read(&id, |s| s.snapshot())?;
    info!(session = %id, "Session created");
    Ok((StatusCode::CREATED, Json(SessionResponse { id, session })))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, HttpError> {
    let id = parse_id(&id)?;
    let session = state.sessions.read(&id, |s| s.snapshot())?;
    Ok(Json(SessionResponse { id, session }))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpError> {
    let id = parse_id(&id)?;
    if state.sessions.remove(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AuditError::SessionNotFound { id: id.to_string() }.into())
    }
}

/// `PUT /api/sessions/{id}/file`: select the multipart `file` field.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<SessionResponse>, HttpError> {
    let id = parse_id(&id)?;
    // Fail fast before reading a large body into a session that is gone.
    state.sessions.read(&id, |_| ())?;

    let document = read_upload(multipart, state.max_upload_bytes).await?;
    info!(session = %id, file = %document.filename, bytes = document.size(), "File selected");
    let session = state.sessions.update(&id, |s| {
        s.select_file(document)?;
        Ok(s.snapshot())
    })?;
    Ok(Json(SessionResponse { id, session }))
}

pub async fn remove_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, HttpError> {
    let id = parse_id(&id)?;
    let session = state.sessions.update(&id, |s| {
        s.remove_file()?;
        Ok(s.snapshot())
    })?;
    Ok(Json(SessionResponse { id, session }))
}

/// `POST /api/sessions/{id}/analysis`: run the pipeline once.
///
/// The session lock is released while the model is working; the
/// `Analyzing` state alone keeps a second request out. The analysis runs on
/// its own task, so a client that disconnects mid-call still leaves the
/// session in `Success` or `Failed`.
pub async fn run_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, HttpError> {
    let id = parse_id(&id)?;
    let document = state.sessions.update(&id, |s| s.begin_analysis())?;

    let auditor = Arc::clone(&state.auditor);
    let sessions = state.sessions.clone();
    let task = tokio::spawn(async move {
        let outcome = auditor.analyze_document(&document).await;
        let failure = outcome.as_ref().err().map(HttpError::from);
        let session = sessions.update(&id, |s| {
            s.finish(outcome)?;
            Ok(s.snapshot())
        });
        (failure, session)
    });

    let (failure, session) = match task.await {
        Ok(done) => done,
        Err(e) => {
            // A panicked task never reached `finish`.
            let detail = format!("analysis task failed: {e}");
            let _ = state
                .sessions
                .update(&id, |s| s.finish(Err(AuditError::Internal(detail.clone()))));
            return Err(AuditError::Internal(detail).into());
        }
    };
    let session = session?;

    match failure {
        Some(err) => Err(err),
        None => Ok(Json(SessionResponse { id, session })),
    }
}

/// `GET /api/sessions/{id}/record.json`: the record as a download.
pub async fn download_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    let id = parse_id(&id)?;
    let record = state.sessions.read(&id, |s| s.result().map(|r| r.json_data.clone()))?;
    let record = record.ok_or(AuditError::NoResult)?;
    let json = record
        .to_pretty_json()
        .map_err(|source| AuditError::JsonError { source })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{RECORD_FILE_NAME}\""),
            ),
        ],
        json,
    )
        .into_response())
}

/// `POST /api/analyze`: stateless one-shot analysis of the `file` field.
pub async fn analyze_once(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ResultView>, HttpError> {
    let document = read_upload(multipart, state.max_upload_bytes).await?;
    let result = state.auditor.analyze_document(&document).await?;
    Ok(Json(ResultView::from(&result)))
}

fn parse_id(raw: &str) -> Result<Uuid, AuditError> {
    Uuid::parse_str(raw).map_err(|_| AuditError::SessionNotFound { id: raw.to_string() })
}

/// Read the single `file` field of a multipart body.
async fn read_upload(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<UploadedDocument, HttpError> {
    let read_error = |detail: String| AuditError::ReadError {
        source_name: "upload".to_string(),
        detail,
    };

    let mut document = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            HttpError::payload_too_large(max_bytes)
        } else {
            read_error(e.body_text()).into()
        }
    })? {
        if field.name() != Some("file") {
            continue;
        }
        if document.is_some() {
            return Err(read_error("more than one 'file' field".to_string()).into());
        }

        let filename = field.file_name().unwrap_or("documento.pdf").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                HttpError::payload_too_large(max_bytes)
            } else {
                read_error(e.body_text()).into()
            }
        })?;
        if bytes.len() > max_bytes {
            return Err(HttpError::payload_too_large(max_bytes));
        }

        document = Some(UploadedDocument::new(filename, content_type, bytes));
    }

    document.ok_or_else(|| AuditError::NoFileSelected.into())
}
