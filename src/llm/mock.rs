use serde_json::json;

use super::{Completion, CompletionRequest, LlmProvider, ProviderFuture};

const ECHO_CHARS: usize = 200;

/// Deterministic offline provider: echoes the first 200 characters of the prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProvider;

impl MockProvider {
    #[must_use]
    pub fn respond(prompt: &str) -> String {
        let echoed: String = prompt.chars().take(ECHO_CHARS).collect();
        format!("[MOCK RESPONSE] for prompt: {echoed}")
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a, Completion> {
        Box::pin(async move {
            Ok(Completion {
                text: Self::respond(&request.prompt),
                raw: json!({ "provider": "mock" }),
                provider: "mock",
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::MockProvider;

    #[test]
    fn long_prompts_are_truncated_by_characters() {
        let prompt = "é".repeat(300);
        let text = MockProvider::respond(&prompt);
        let echoed = text.trim_start_matches("[MOCK RESPONSE] for prompt: ");
        assert_eq!(echoed.chars().count(), 200);
    }
}
