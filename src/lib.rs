//! # proforma-audit
//!
//! Audit pro-forma invoices (PDF) with a hosted language model.
//!
//! ## Why this crate?
//!
//! Checking a pro-forma invoice before paying it is mostly reading: does the
//! seller match the bank account holder, is the invoice addressed to the
//! right company, is the Incoterm complete, does the HS code fit the goods.
//! Those rules live in a natural-language prompt; this crate does the
//! plumbing around it and nothing else. It extracts the PDF's text, sends
//! one request, and turns the reply into a human-readable report plus a
//! structured [`InvoiceRecord`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    upload, local file or URL; MIME must be application/pdf
//!  ├─ 2. Extract  one line of text per page (lopdf, spawn_blocking)
//!  ├─ 3. Prompt   interpolate the text into the audit template
//!  ├─ 4. Model    one call, no retries (gemini-2.5-flash by default)
//!  └─ 5. Parse    report ---JSON_OUTPUT--- record
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use proforma_audit::{analyze, AuditConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GEMINI_API_KEY from the environment.
//!     let config = AuditConfig::default();
//!     let result = analyze("proforma.pdf", &config).await?;
//!     println!("{}", result.json_data.status.title());
//!     println!("{}", result.visual_report);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `proforma-audit` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | Browser UI and JSON API (axum + tower-http + uuid) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod audit;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use audit::{analyze, analyze_sync, analyze_to_file, inspect, render_prompt, InvoiceAuditor};
pub use config::{AuditConfig, AuditConfigBuilder};
pub use error::AuditError;
pub use output::{
    AnalysisResult, DocumentMetadata, InvoiceRecord, InvoiceStatus, ReportItem, Verdict,
    RECORD_FILE_NAME,
};
pub use pipeline::input::UploadedDocument;
pub use pipeline::llm::{ModelClient, ProviderClient};
pub use pipeline::parse::{parse_response, REPORT_SEPARATOR};
pub use progress::{AnalysisProgressCallback, AnalysisStage, NoopProgressCallback, ProgressCallback};
pub use prompts::{PromptBuilder, ReferenceRecipient};
pub use session::{AnalysisSession, SessionPhase, SessionSnapshot};
