//! Audit entry points.
//!
//! [`InvoiceAuditor`] runs one analysis over an in-memory document: MIME
//! gate, text extraction, prompt, one model call, reply parsing. The free
//! functions wrap it for path/URL inputs, file output and sync callers.

use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::output::{AnalysisResult, DocumentMetadata};
use crate::pipeline::input::{self, UploadedDocument};
use crate::pipeline::llm::{self, ModelClient};
use crate::pipeline::{extract, parse};
use crate::progress::AnalysisStage;
use crate::prompts::PromptBuilder;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runs analyses with one model client and one prompt template.
///
/// Cheap to share behind an `Arc`; the server keeps exactly one.
pub struct InvoiceAuditor {
    config: AuditConfig,
    client: Arc<dyn ModelClient>,
    prompts: PromptBuilder,
}

impl InvoiceAuditor {
    /// Resolve the model client and load the prompt template.
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        let client = llm::resolve_client(&config)?;
        Self::with_client(config, client)
    }

    /// Use an explicit client, ignoring the provider settings.
    pub fn with_client(
        config: AuditConfig,
        client: Arc<dyn ModelClient>,
    ) -> Result<Self, AuditError> {
        let prompts = config.prompt_builder()?;
        info!(
            "Auditor ready: model '{}', template '{}'",
            client.model_id(),
            prompts.template_name()
        );
        Ok(Self {
            config,
            client,
            prompts,
        })
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    pub fn model_id(&self) -> &str {
        self.client.model_id()
    }

    /// Analyse one uploaded document.
    ///
    /// The model is only called once the bytes have been accepted as a PDF
    /// and their text extracted.
    pub async fn analyze_document(
        &self,
        doc: &UploadedDocument,
    ) -> Result<AnalysisResult, AuditError> {
        let total_start = Instant::now();
        info!(
            "Analysing '{}' ({} bytes) with {}",
            doc.filename,
            doc.size(),
            self.client.model_id()
        );

        doc.ensure_pdf()?;

        // ── Step 1: Extract text ─────────────────────────────────────────
        let text = self
            .stage(
                AnalysisStage::Extracting,
                extract::extract_text(doc.bytes.clone(), &doc.filename),
            )
            .await?;

        // ── Step 2: Prompt + model call ──────────────────────────────────
        let prompt = self.prompts.build(&text);
        debug!("Prompt is {} chars", prompt.len());
        let raw = self
            .stage(AnalysisStage::CallingModel, self.client.generate(&prompt))
            .await?;

        // ── Step 3: Parse the reply ──────────────────────────────────────
        let mut result = self
            .stage(AnalysisStage::Parsing, async { parse::parse_response(&raw) })
            .await?;

        if self.config.enforce_status_rules {
            result.json_data.enforce_critical_checks();
        }

        info!(
            "Analysis of '{}' complete: {} in {}ms",
            doc.filename,
            result.json_data.status,
            total_start.elapsed().as_millis()
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_analysis_complete(result.json_data.status);
        }
        Ok(result)
    }

    /// Await one stage, reporting start, completion and failure.
    async fn stage<T>(
        &self,
        stage: AnalysisStage,
        fut: impl std::future::Future<Output = Result<T, AuditError>>,
    ) -> Result<T, AuditError> {
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_stage_start(stage);
        }
        let start = Instant::now();
        match fut.await {
            Ok(v) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                debug!("{:?} finished in {}ms", stage, elapsed_ms);
                if let Some(cb) = cb {
                    cb.on_stage_complete(stage, elapsed_ms);
                }
                Ok(v)
            }
            Err(e) => {
                if let Some(cb) = cb {
                    cb.on_analysis_error(stage, &e.to_string());
                }
                Err(e)
            }
        }
    }
}

/// Analyse a PDF file or URL.
///
/// # Errors
/// - [`AuditError::ReadError`] / [`AuditError::DownloadFailed`] if the input
///   cannot be fetched
/// - [`AuditError::InvalidFileType`] if it is not a PDF by name or Content-Type
/// - any error from [`InvoiceAuditor::analyze_document`]
pub async fn analyze(
    input_str: impl AsRef<str>,
    config: &AuditConfig,
) -> Result<AnalysisResult, AuditError> {
    let doc = read_input(input_str.as_ref(), config).await?;
    let auditor = InvoiceAuditor::new(config.clone())?;
    auditor.analyze_document(&doc).await
}

/// Analyse a PDF and write the pretty-printed record to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn analyze_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &AuditConfig,
) -> Result<AnalysisResult, AuditError> {
    let result = analyze(input_str, config).await?;
    write_record(&result, output_path.as_ref()).await?;
    Ok(result)
}

/// Write the record of `result` as pretty JSON, atomically.
pub async fn write_record(result: &AnalysisResult, path: &Path) -> Result<(), AuditError> {
    let json = result
        .json_data
        .to_pretty_json()
        .map_err(|source| AuditError::JsonError { source })?;

    let write_failed = |source| AuditError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;

    debug!("Wrote record to {}", path.display());
    Ok(())
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    config: &AuditConfig,
) -> Result<AnalysisResult, AuditError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AuditError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input_str, config))
}

/// Render the prompt that would be sent for a PDF, without calling the model.
///
/// Does not require a model provider or API key.
pub async fn render_prompt(
    input_str: impl AsRef<str>,
    config: &AuditConfig,
) -> Result<String, AuditError> {
    let prompts = config.prompt_builder()?;
    let doc = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    doc.ensure_pdf()?;
    let text = extract::extract_text(doc.bytes, &doc.filename).await?;
    Ok(prompts.build(&text))
}

/// Extract PDF metadata without analysing it.
///
/// Does not require a model provider or API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, AuditError> {
    let defaults = AuditConfig::default();
    let doc = input::resolve_input(input_str.as_ref(), defaults.download_timeout_secs).await?;
    extract::extract_metadata(doc.bytes, &doc.filename).await
}

async fn read_input(input_str: &str, config: &AuditConfig) -> Result<UploadedDocument, AuditError> {
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_stage_start(AnalysisStage::Reading);
    }
    let start = Instant::now();
    match input::resolve_input(input_str, config.download_timeout_secs).await {
        Ok(doc) => {
            if let Some(cb) = cb {
                cb.on_stage_complete(AnalysisStage::Reading, start.elapsed().as_millis() as u64);
            }
            Ok(doc)
        }
        Err(e) => {
            if let Some(cb) = cb {
                cb.on_analysis_error(AnalysisStage::Reading, &e.to_string());
            }
            Err(e)
        }
    }
}
