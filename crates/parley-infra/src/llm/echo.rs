//! Offline provider that answers with the latest user message.
//!
//! Lets the service run end to end without credentials or network access.

use parley_core::llm::provider::LlmProvider;
use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError, MessageRole, Usage};

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoProvider;

impl EchoProvider {
    pub fn new() -> Self {
        Self
    }
}

impl LlmProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let content = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.clone())
            .ok_or_else(|| LlmError::InvalidRequest("no user message to echo".to_string()))?;

        let input_chars: usize = request.messages.iter().map(|m| m.content.chars().count()).sum();
        let usage = Usage {
            input_tokens: u32::try_from(input_chars.div_ceil(4)).unwrap_or(u32::MAX),
            output_tokens: u32::try_from(content.chars().count().div_ceil(4)).unwrap_or(u32::MAX),
        };

        Ok(CompletionResponse {
            id: format!("echo-{}", request.messages.len()),
            content,
            model: request.model.clone(),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::llm::PromptMessage;

    fn message(role: MessageRole, content: &str) -> PromptMessage {
        PromptMessage {
            role,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn echoes_latest_user_message() {
        let request = CompletionRequest {
            model: "echo-model".to_string(),
            messages: vec![
                message(MessageRole::System, "be nice"),
                message(MessageRole::User, "first"),
                message(MessageRole::Assistant, "first"),
                message(MessageRole::User, "second"),
            ],
            max_tokens: 10,
            temperature: None,
        };
        let response = EchoProvider.complete(&request).await.unwrap();
        assert_eq!(response.content, "second");
        assert_eq!(response.model, "echo-model");
        assert_eq!(response.usage.output_tokens, 2);
    }

    #[tokio::test]
    async fn rejects_request_without_user_message() {
        let request = CompletionRequest {
            model: "echo-model".to_string(),
            messages: vec![message(MessageRole::System, "only rules")],
            max_tokens: 10,
            temperature: None,
        };
        assert!(matches!(
            EchoProvider.complete(&request).await,
            Err(LlmError::InvalidRequest(_))
        ));
    }
}
