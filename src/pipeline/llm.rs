//! Model interaction: send the audit prompt, get raw text back.
//!
//! The prompt is built in [`crate::prompts`] and the reply is interpreted in
//! [`crate::pipeline::parse`]; this module only makes the outbound call.
//!
//! ## One call, no retries
//!
//! An analysis is exactly one request, bounded by `api_timeout_secs`. A
//! failed or expired call surfaces as [`AuditError::ApiError`]; trying again
//! is up to the user.
//!
//! ## The `ModelClient` seam
//!
//! [`ModelClient`] is the only thing the auditor knows about the model.
//! [`ProviderClient`] implements it over an `edgequake_llm` provider; tests
//! and embedders can supply their own through
//! [`crate::config::AuditConfigBuilder::client`].

use crate::config::AuditConfig;
use crate::error::AuditError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Provider used when none is configured.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// A hosted text-generation endpoint.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send `prompt` as the single user message and return the reply text.
    async fn generate(&self, prompt: &str) -> Result<String, AuditError>;

    /// Model identifier, for logs.
    fn model_id(&self) -> &str;
}

/// [`ModelClient`] backed by an `edgequake_llm` provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
    options: CompletionOptions,
    timeout: Duration,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AuditConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            options: build_options(config),
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }
}

#[async_trait]
impl ModelClient for ProviderClient {
    async fn generate(&self, prompt: &str) -> Result<String, AuditError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user(prompt)];

        let response =
            match tokio::time::timeout(self.timeout, self.provider.chat(&messages, Some(&self.options)))
                .await
            {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    error!(model = %self.model, "Model call failed: {}", e);
                    return Err(AuditError::ApiError {
                        message: e.to_string(),
                    });
                }
                Err(_) => {
                    error!(
                        model = %self.model,
                        "Model call timed out after {}s",
                        self.timeout.as_secs()
                    );
                    return Err(AuditError::ApiError {
                        message: format!("request timed out after {}s", self.timeout.as_secs()),
                    });
                }
            };

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.model,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Build `CompletionOptions` from the audit config.
fn build_options(config: &AuditConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Pick the model client for a config.
///
/// A client injected through the builder wins; otherwise the named provider
/// is created through `ProviderFactory`, which reads its API key from the
/// environment (`GEMINI_API_KEY` for the default provider).
pub fn resolve_client(config: &AuditConfig) -> Result<Arc<dyn ModelClient>, AuditError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    let provider = ProviderFactory::create_llm_provider(&config.provider_name, &config.model)
        .map_err(|e| AuditError::ProviderNotConfigured {
            provider: config.provider_name.clone(),
            hint: format!(
                "Set the API key for '{}' in the environment (e.g. GEMINI_API_KEY).\nError: {}",
                config.provider_name, e
            ),
        })?;

    info!("Using provider '{}' with model '{}'", config.provider_name, config.model);
    Ok(Arc::new(ProviderClient::new(provider, config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_options_defaults() {
        let config = AuditConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(8192));
    }

    struct Echo;

    #[async_trait]
    impl ModelClient for Echo {
        async fn generate(&self, prompt: &str) -> Result<String, AuditError> {
            Ok(prompt.to_uppercase())
        }

        fn model_id(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn test_injected_client_wins() {
        let config = AuditConfig::builder()
            .client(Arc::new(Echo))
            .build()
            .unwrap();
        let client = resolve_client(&config).unwrap();
        assert_eq!(client.model_id(), "echo");
    }

    #[tokio::test]
    async fn test_client_is_object_safe() {
        let client: Arc<dyn ModelClient> = Arc::new(Echo);
        assert_eq!(client.generate("ok").await.unwrap(), "OK");
    }
}
