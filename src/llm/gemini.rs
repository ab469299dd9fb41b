use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use super::http::post_json;
use super::{Completion, CompletionRequest, LlmError, LlmProvider, ProviderFuture};
use crate::config::ProviderCredentials;

const PROVIDER: &str = "gemini";

/// Google Gemini `generateContent`. The key travels in the `x-goog-api-key` header so it
/// never shows up in URLs or error messages.
pub struct GeminiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl GeminiProvider {
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
                "{}/v1beta/models/{}:generateContent",
                credentials.base_url.as_str().trim_end_matches('/'),
                credentials.model
            ),
            api_key: credentials.api_key.clone(),
            model: credentials.model.clone(),
            max_tokens,
            timeout,
        }
    }
}

/// Concatenates every text part of the first candidate.
fn extract_text(raw: &Value) -> Option<String> {
    let parts = raw.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    (!parts.is_empty()).then_some(text)
}

impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a, Completion> {
        Box::pin(async move {
            debug!(
                provider = PROVIDER,
                model = %self.model,
                max_tokens = self.max_tokens,
                "Invoking generateContent"
            );

            let body = json!({
                "systemInstruction": { "parts": [{ "text": request.system }] },
                "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
                "generationConfig": {
                    "temperature": request.temperature,
                    "maxOutputTokens": self.max_tokens,
                },
            });
            let http = self
                .client
                .post(&self.endpoint)
                .header("x-goog-api-key", &self.api_key);
            let raw = post_json(http, PROVIDER, self.timeout, &body).await?;

            let text = extract_text(&raw).ok_or_else(|| LlmError::MalformedResponse {
                provider: PROVIDER,
                detail: "missing candidates[0].content.parts".to_string(),
            })?;
            Ok(Completion {
                text,
                raw,
                provider: PROVIDER,
            })
        })
    }
}
