//! Uniform text-completion interface over the configured providers.
//!
//! Every provider returns either a [`Completion`] carrying the raw response body or a typed
//! [`LlmError`]; failures are never folded into the completion text.

mod gemini;
mod http;
mod mock;
mod openai;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{LlmSettings, ProviderKind};
use crate::error::{LucidError, Result};

pub use gemini::GeminiProvider;
pub use mock::MockProvider;
pub use openai::OpenAiProvider;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = std::result::Result<T, LlmError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{provider} timed out after {after:?}")]
    Timeout {
        provider: &'static str,
        after: Duration,
    },

    #[error("{provider} returned HTTP status {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} transport failure: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },

    #[error("malformed response from {provider}: {detail}")]
    MalformedResponse {
        provider: &'static str,
        detail: String,
    },
}

impl LlmError {
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        match self {
            Self::Timeout { provider, .. }
            | Self::Http { provider, .. }
            | Self::Transport { provider, .. }
            | Self::MalformedResponse { provider, .. } => *provider,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: String,
    pub temperature: f32,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.0,
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A successful provider answer. `raw` is the provider's full JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub raw: serde_json::Value,
    pub provider: &'static str,
}

pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a, Completion>;
}

/// The provider chosen at start-up: the first configured entry of the provider order,
/// or the mock when none has credentials.
#[derive(Clone)]
pub struct LlmRouter {
    provider: Arc<dyn LlmProvider>,
}

impl LlmRouter {
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// # Errors
    /// Returns `ConfigError` if the HTTP client cannot be built.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LucidError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        let selected = settings.providers.iter().find_map(|kind| {
            settings.credentials(*kind).map(|creds| -> Arc<dyn LlmProvider> {
                match kind {
                    ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
                        client.clone(),
                        creds,
                        settings.max_tokens,
                        settings.timeout,
                    )),
                    ProviderKind::Gemini => Arc::new(GeminiProvider::new(
                        client.clone(),
                        creds,
                        settings.max_tokens,
                        settings.timeout,
                    )),
                }
            })
        });

        let provider = selected.unwrap_or_else(|| {
            warn!("No LLM provider credentials configured; using mock provider");
            Arc::new(MockProvider)
        });
        info!(provider = provider.name(), "LLM provider selected");
        Ok(Self { provider })
    }

    #[must_use]
    pub fn offline() -> Self {
        Self::new(Arc::new(MockProvider))
    }
}

impl LlmProvider for LlmRouter {
    fn name(&self) -> &'static str {
        self.provider.name()
    }

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a, Completion> {
        Box::pin(async move {
            let started = Instant::now();
            let provider = self.provider.name();
            debug!(provider, prompt_chars = request.prompt.chars().count(), "LLM call started");

            let result = self.provider.complete(request).await;
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            match &result {
                Ok(completion) => debug!(
                    provider,
                    elapsed_ms,
                    response_chars = completion.text.chars().count(),
                    "LLM call finished"
                ),
                Err(e) => warn!(provider, elapsed_ms, error = %e, "LLM call failed"),
            }
            result
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use super::{CompletionRequest, LlmError, LlmProvider, LlmRouter};
    use crate::config::{LlmSettings, ProviderCredentials, ProviderKind};

    fn creds() -> ProviderCredentials {
        ProviderCredentials {
            api_key: "k".to_string(),
            base_url: url::Url::parse("http://127.0.0.1:9").expect("url"),
            model: "m".to_string(),
        }
    }

    #[test]
    fn given_no_credentials_when_routing_then_mock_is_selected() {
        let router = LlmRouter::from_settings(&LlmSettings::offline());
        assert_eq!(router.map(|r| r.name()).ok(), Some("mock"));
    }

    #[test]
    fn given_only_secondary_configured_when_routing_then_secondary_wins() {
        let mut settings = LlmSettings::offline();
        settings.gemini = Some(creds());
        let router = LlmRouter::from_settings(&settings);
        assert_eq!(router.map(|r| r.name()).ok(), Some("gemini"));
    }

    #[test]
    fn given_both_configured_when_routing_then_order_decides() {
        let mut settings = LlmSettings::offline();
        settings.openai = Some(creds());
        settings.gemini = Some(creds());
        settings.providers = vec![ProviderKind::Gemini, ProviderKind::OpenAi];
        let router = LlmRouter::from_settings(&settings);
        assert_eq!(router.map(|r| r.name()).ok(), Some("gemini"));
    }

    #[tokio::test]
    async fn offline_router_echoes_prompt_through_mock() {
        let router = LlmRouter::offline();
        let completion = router.complete(&CompletionRequest::new("hello")).await;
        assert_eq!(
            completion.map(|c| c.text).ok().as_deref(),
            Some("[MOCK RESPONSE] for prompt: hello")
        );
    }

    #[test]
    fn every_failure_names_its_provider() {
        let timeout = LlmError::Timeout {
            provider: "gemini",
            after: Duration::from_secs(5),
        };
        assert_eq!(timeout.provider(), "gemini");
        assert_eq!(timeout.to_string(), "gemini timed out after 5s");
    }
}
