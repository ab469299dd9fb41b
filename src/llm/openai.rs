use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::http::post_json;
use super::{Completion, CompletionRequest, LlmError, LlmProvider, ProviderFuture};
use crate::config::ProviderCredentials;

const PROVIDER: &str = "openai";

/// OpenAI-compatible chat completions (`POST {base}/v1/chat/completions`).
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        credentials: &ProviderCredentials,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/v1/chat/completions",
                credentials.base_url.as_str().trim_end_matches('/')
            ),
            api_key: credentials.api_key.clone(),
            model: credentials.model.clone(),
            max_tokens,
            timeout,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

/// `choices[0].message.content`, falling back to the legacy `choices[0].text`.
fn extract_text(raw: &Value) -> Option<String> {
    raw.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .or_else(|| raw.pointer("/choices/0/text").and_then(Value::as_str))
        .map(ToString::to_string)
}

impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a, Completion> {
        Box::pin(async move {
            debug!(
                provider = PROVIDER,
                model = %self.model,
                max_tokens = self.max_tokens,
                timeout_secs = self.timeout.as_secs(),
                "Invoking chat completions"
            );

            let body = ChatRequest {
                model: &self.model,
                messages: [
                    ChatMessage {
                        role: "system",
                        content: &request.system,
                    },
                    ChatMessage {
                        role: "user",
                        content: &request.prompt,
                    },
                ],
                temperature: request.temperature,
                max_tokens: self.max_tokens,
            };
            let http = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key);
            let raw = post_json(http, PROVIDER, self.timeout, &body).await?;

            let text = extract_text(&raw).ok_or_else(|| LlmError::MalformedResponse {
                provider: PROVIDER,
                detail: "missing choices[0].message.content".to_string(),
            })?;
            Ok(Completion {
                text,
                raw,
                provider: PROVIDER,
            })
        })
    }
}
