// Provider adapters against wiremock servers: success, HTTP error, malformed body, timeout.
#![allow(clippy::expect_used, clippy::panic)]

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lucid::config::ProviderCredentials;
use lucid::llm::{GeminiProvider, OpenAiProvider};
use lucid::{CompletionRequest, LlmError, LlmProvider};

const TIMEOUT: Duration = Duration::from_millis(300);

fn credentials(server: &MockServer, model: &str) -> ProviderCredentials {
    ProviderCredentials {
        api_key: "test-key".to_string(),
        base_url: Url::parse(&server.uri()).expect("mock url"),
        model: model.to_string(),
    }
}

fn openai(server: &MockServer) -> OpenAiProvider {
    OpenAiProvider::new(
        reqwest::Client::new(),
        &credentials(server, "gpt-test"),
        128,
        TIMEOUT,
    )
}

fn gemini(server: &MockServer) -> GeminiProvider {
    GeminiProvider::new(
        reqwest::Client::new(),
        &credentials(server, "gemini-test"),
        128,
        TIMEOUT,
    )
}

#[tokio::test]
async fn given_chat_reply_when_completing_with_openai_then_text_and_raw_body_are_returned() {
    let server = MockServer::start().await;
    let reply = json!({ "choices": [{ "message": { "role": "assistant", "content": "hello" } }] });
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "model": "gpt-test", "max_tokens": 128 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let completion = openai(&server)
        .complete(&CompletionRequest::new("say hello"))
        .await
        .expect("completion");

    assert_eq!(completion.text, "hello");
    assert_eq!(completion.provider, "openai");
    assert_eq!(completion.raw, reply);
}

#[tokio::test]
async fn given_server_error_when_completing_with_openai_then_http_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let result = openai(&server)
        .complete(&CompletionRequest::new("anything"))
        .await;

    match result {
        Err(LlmError::Http { status, body, .. }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn given_reply_without_choices_when_completing_with_openai_then_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "x" })))
        .mount(&server)
        .await;

    let result = openai(&server).complete(&CompletionRequest::new("q")).await;

    assert!(matches!(
        result,
        Err(LlmError::MalformedResponse {
            provider: "openai",
            ..
        })
    ));
}

#[tokio::test]
async fn given_non_json_body_when_completing_then_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = openai(&server).complete(&CompletionRequest::new("q")).await;

    assert!(matches!(result, Err(LlmError::MalformedResponse { .. })));
}

#[tokio::test]
async fn given_slow_server_when_completing_then_timeout_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "choices": [{ "message": { "content": "late" } }] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let result = openai(&server).complete(&CompletionRequest::new("q")).await;

    assert!(
        matches!(result, Err(LlmError::Timeout { provider: "openai", .. })),
        "{result:?}"
    );
}

#[tokio::test]
async fn given_candidate_parts_when_completing_with_gemini_then_parts_are_concatenated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello, " }, { "text": "world" }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let completion = gemini(&server)
        .complete(&CompletionRequest::new("greet").with_system("be brief"))
        .await
        .expect("completion");

    assert_eq!(completion.text, "Hello, world");
    assert_eq!(completion.provider, "gemini");
}

#[tokio::test]
async fn given_blocked_prompt_when_completing_with_gemini_then_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let result = gemini(&server).complete(&CompletionRequest::new("q")).await;

    assert!(matches!(
        result,
        Err(LlmError::MalformedResponse {
            provider: "gemini",
            ..
        })
    ));
}

#[tokio::test]
async fn given_bad_key_when_completing_with_gemini_then_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let result = gemini(&server).complete(&CompletionRequest::new("q")).await;

    assert!(matches!(result, Err(LlmError::Http { status: 403, .. })));
}
