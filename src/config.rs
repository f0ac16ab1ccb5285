//! Configuration types for invoice auditing.
//!
//! All audit behaviour is controlled through [`AuditConfig`], built via its
//! [`AuditConfigBuilder`]. Keeping every knob in one struct makes it easy to
//! share one config between the CLI, the HTTP server and library callers.

use crate::error::AuditError;
use crate::pipeline::llm::{ModelClient, DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::progress::ProgressCallback;
use crate::prompts::{PromptBuilder, ReferenceRecipient, DEFAULT_TEMPLATE_NAME};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default upload limit: 20 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Default idle time before the server forgets a session: 30 minutes.
pub const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 30 * 60;

/// Configuration for an invoice audit.
///
/// Built via [`AuditConfig::builder()`] or using [`AuditConfig::default()`].
///
/// # Example
/// ```rust
/// use proforma_audit::AuditConfig;
///
/// let config = AuditConfig::builder()
///     .model("gemini-2.5-pro")
///     .api_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AuditConfig {
    /// Model identifier. Default: `gemini-2.5-flash`.
    pub model: String,

    /// `edgequake_llm` provider name. Default: `gemini`.
    pub provider_name: String,

    /// Pre-constructed model client. Takes precedence over `provider_name`.
    pub client: Option<Arc<dyn ModelClient>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// The audit is a checklist, not creative writing; a low temperature keeps
    /// repeated runs on the same invoice consistent.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    pub max_tokens: usize,

    /// Timeout for the single model call, in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Path to a replacement audit template. `None` uses the embedded one.
    pub prompt_template: Option<PathBuf>,

    /// The recipient every invoice is checked against.
    pub recipient: ReferenceRecipient,

    /// Force `no_valida` when a critical check failed but the model said
    /// otherwise. Default: true.
    pub enforce_status_rules: bool,

    /// Largest accepted upload, in bytes. Default: 20 MiB.
    pub max_upload_bytes: usize,

    /// Seconds a server session may sit untouched before it is dropped,
    /// along with its uploaded document. Default: 1800.
    pub session_idle_ttl_secs: u64,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider_name: DEFAULT_PROVIDER.to_string(),
            client: None,
            temperature: 0.1,
            max_tokens: 8192,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            prompt_template: None,
            recipient: ReferenceRecipient::default(),
            enforce_status_rules: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            session_idle_ttl_secs: DEFAULT_SESSION_IDLE_TTL_SECS,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AuditConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("client", &self.client.as_ref().map(|c| c.model_id().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("prompt_template", &self.prompt_template)
            .field("recipient", &self.recipient.name)
            .field("enforce_status_rules", &self.enforce_status_rules)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("session_idle_ttl_secs", &self.session_idle_ttl_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl AuditConfig {
    /// Create a new builder for `AuditConfig`.
    pub fn builder() -> AuditConfigBuilder {
        AuditConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load the configured template (or the embedded one) into a
    /// [`PromptBuilder`].
    pub fn prompt_builder(&self) -> Result<PromptBuilder, AuditError> {
        match self.prompt_template {
            None if self.recipient == ReferenceRecipient::default() => {
                Ok(PromptBuilder::default_template())
            }
            None => PromptBuilder::new(
                crate::prompts::DEFAULT_AUDIT_TEMPLATE,
                DEFAULT_TEMPLATE_NAME,
                &self.recipient,
            ),
            Some(ref path) => {
                let template = std::fs::read_to_string(path).map_err(|e| {
                    AuditError::InvalidConfig(format!(
                        "cannot read prompt template '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("custom")
                    .to_string();
                PromptBuilder::new(&template, name, &self.recipient)
            }
        }
    }
}

/// Builder for [`AuditConfig`].
#[derive(Debug)]
pub struct AuditConfigBuilder {
    config: AuditConfig,
}

impl AuditConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn prompt_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.prompt_template = Some(path.into());
        self
    }

    pub fn recipient(mut self, recipient: ReferenceRecipient) -> Self {
        self.config.recipient = recipient;
        self
    }

    pub fn enforce_status_rules(mut self, v: bool) -> Self {
        self.config.enforce_status_rules = v;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn session_idle_ttl_secs(mut self, secs: u64) -> Self {
        self.config.session_idle_ttl_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AuditConfig, AuditError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(AuditError::InvalidConfig("model must not be empty".into()));
        }
        if c.client.is_none() && c.provider_name.trim().is_empty() {
            return Err(AuditError::InvalidConfig(
                "provider name must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(AuditError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(AuditError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(AuditError::InvalidConfig(
                "max_upload_bytes must be ≥ 1".into(),
            ));
        }
        if c.session_idle_ttl_secs == 0 {
            return Err(AuditError::InvalidConfig(
                "session_idle_ttl_secs must be ≥ 1".into(),
            ));
        }
        if c.recipient.name.trim().is_empty() {
            return Err(AuditError::InvalidConfig(
                "reference recipient name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let c = AuditConfig::default();
        assert_eq!(c.provider_name, "gemini");
        assert_eq!(c.model, "gemini-2.5-flash");
        assert_eq!(c.api_timeout_secs, 120);
        assert_eq!(c.max_upload_bytes, 20 * 1024 * 1024);
        assert!(c.enforce_status_rules);
        assert_eq!(c.session_idle_ttl_secs, 1800);
    }

    #[test]
    fn test_builder_rejects_zero_session_ttl() {
        let err = AuditConfig::builder()
            .session_idle_ttl_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidConfig(_)));
    }

    #[test]
    fn test_builder_clamps_temperature() {
        let c = AuditConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let err = AuditConfig::builder().api_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, AuditError::InvalidConfig(_)));
    }

    #[test]
    fn test_builder_rejects_empty_model() {
        assert!(AuditConfig::builder().model("  ").build().is_err());
    }

    #[test]
    fn test_debug_hides_client_internals() {
        let dbg = format!("{:?}", AuditConfig::default());
        assert!(dbg.contains("gemini-2.5-flash"));
        assert!(dbg.contains("client: None"));
    }

    #[test]
    fn test_prompt_builder_from_file() {
        let mut file = tempfile::Builder::new()
            .prefix("audit.v2")
            .suffix(".md")
            .tempfile()
            .unwrap();
        write!(file, "Check for {{{{recipient_name}}}}:\n{{{{invoice_text}}}}").unwrap();

        let config = AuditConfig::builder()
            .prompt_template(file.path())
            .build()
            .unwrap();
        let builder = config.prompt_builder().unwrap();
        assert!(builder.template_name().starts_with("audit.v2"));
        assert_eq!(
            builder.build("PI-9"),
            "Check for Guangzhou Baiyun Export & Import Co. LTD.:\nPI-9"
        );
    }

    #[test]
    fn test_prompt_builder_missing_file() {
        let config = AuditConfig::builder()
            .prompt_template("/no/such/template.md")
            .build()
            .unwrap();
        assert!(matches!(
            config.prompt_builder(),
            Err(AuditError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_custom_recipient_uses_embedded_template() {
        let recipient = ReferenceRecipient {
            name: "Andes Trading SpA".into(),
            ..ReferenceRecipient::default()
        };
        let config = AuditConfig::builder().recipient(recipient).build().unwrap();
        let prompt = config.prompt_builder().unwrap().build("x");
        assert!(prompt.contains("Andes Trading SpA"));
        assert!(!prompt.contains("Guangzhou Baiyun"));
    }
}
