//! Browser UI and JSON API (feature `server`).
//!
//! The server holds one [`InvoiceAuditor`] and an in-memory
//! [`SessionStore`]. Each browser tab creates a session and drives its
//! [`crate::session::AnalysisSession`] through the routes below; the page
//! itself is a single embedded HTML file. The page discards its session on
//! `pagehide`, and sessions idle for `session_idle_ttl_secs` are swept.
//!
//! | Method | Path | Effect |
//! |--------|------|--------|
//! | GET | `/` | browser UI |
//! | GET | `/health` | liveness |
//! | POST | `/api/sessions` | create a session |
//! | GET / DELETE | `/api/sessions/{id}` | snapshot / discard |
//! | PUT / DELETE | `/api/sessions/{id}/file` | select / remove the PDF |
//! | POST | `/api/sessions/{id}/analysis` | run one analysis |
//! | GET | `/api/sessions/{id}/record.json` | download the record |
//! | POST | `/api/analyze` | stateless one-shot analysis |

pub mod error;
pub mod handlers;
pub mod store;

pub use error::{ErrorResponse, HttpError};
pub use store::SessionStore;

use crate::audit::InvoiceAuditor;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub auditor: Arc<InvoiceAuditor>,
    pub sessions: SessionStore,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(auditor: InvoiceAuditor) -> Self {
        let max_upload_bytes = auditor.config().max_upload_bytes;
        let idle_ttl = Duration::from_secs(auditor.config().session_idle_ttl_secs);
        Self {
            auditor: Arc::new(auditor),
            sessions: SessionStore::with_idle_ttl(idle_ttl),
            max_upload_bytes,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/sessions", post(handlers::create_session))
        .route(
            "/api/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/api/sessions/{id}/file",
            put(handlers::upload_file).delete(handlers::remove_file),
        )
        .route("/api/sessions/{id}/analysis", post(handlers::run_analysis))
        .route(
            "/api/sessions/{id}/record.json",
            get(handlers::download_record),
        )
        .route("/api/analyze", post(handlers::analyze_once))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the UI on `bind` until Ctrl+C or SIGTERM.
pub async fn serve(auditor: InvoiceAuditor, bind: &str) -> std::io::Result<()> {
    let state = AppState::new(auditor);
    let max_upload_mb = state.max_upload_bytes / 1024 / 1024;
    let model = state.auditor.model_id().to_string();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        model = %model,
        max_upload_mb,
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

/// Resolves on Ctrl+C (SIGINT) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
