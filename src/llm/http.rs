use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::LlmError;

const ERROR_BODY_LIMIT: usize = 500;

/// One JSON POST with the provider's timeout; classifies every failure mode.
pub(super) async fn post_json<B: Serialize + Sync>(
    request: reqwest::RequestBuilder,
    provider: &'static str,
    timeout: Duration,
    body: &B,
) -> Result<Value, LlmError> {
    let transport = |e: reqwest::Error| {
        if e.is_timeout() {
            LlmError::Timeout {
                provider,
                after: timeout,
            }
        } else {
            LlmError::Transport {
                provider,
                message: e.without_url().to_string(),
            }
        }
    };

    let response = request
        .timeout(timeout)
        .json(body)
        .send()
        .await
        .map_err(transport)?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(transport)?;

    if !status.is_success() {
        let body: String = String::from_utf8_lossy(&bytes)
            .chars()
            .take(ERROR_BODY_LIMIT)
            .collect();
        return Err(LlmError::Http {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| LlmError::MalformedResponse {
        provider,
        detail: format!("body is not JSON: {e}"),
    })
}
