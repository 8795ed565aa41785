//! OpenAI-compatible LLM provider.
//!
//! Serves OpenAI itself and any endpoint speaking the chat completions
//! protocol (local gateways, hosted proxies) through a configurable base URL.
//! Uses [`async_openai`] for request/response handling.

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use async_openai::Client;
use backoff::ExponentialBackoffBuilder;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use parley_core::llm::provider::LlmProvider;
use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError, MessageRole, Usage};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Settings needed to construct an [`OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "openai").
    pub provider_name: String,
    pub base_url: String,
    pub api_key: SecretString,
    /// Fallback model when a request leaves it empty.
    pub model: String,
}

/// Provider for any OpenAI-compatible chat completions API.
///
/// Does not implement Debug: the client holds the API key.
pub struct OpenAiCompatibleProvider {
    client: Client<OpenAIConfig>,
    provider_name: String,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiCompatConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.api_key.expose_secret())
            .with_api_base(&config.base_url);

        // One HTTP attempt per call: retries belong to the conversation layer.
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            client: Client::with_config(openai_config).with_backoff(no_retry),
            provider_name: config.provider_name,
            model: config.model,
        }
    }

    /// OpenAI at its public endpoint.
    pub fn openai(api_key: SecretString, model: &str) -> Self {
        Self::new(OpenAiCompatConfig {
            provider_name: "openai".into(),
            base_url: OPENAI_BASE_URL.into(),
            api_key,
            model: model.into(),
        })
    }

    fn build_request(&self, request: &CompletionRequest) -> CreateChatCompletionRequest {
        let messages = request
            .messages
            .iter()
            .map(|msg| match msg.role {
                MessageRole::System => {
                    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                        content: ChatCompletionRequestSystemMessageContent::Text(
                            msg.content.clone(),
                        ),
                        name: None,
                    })
                }
                MessageRole::User => {
                    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                        content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                        name: None,
                    })
                }
                MessageRole::Assistant => {
                    #[allow(deprecated)]
                    ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                        content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                            msg.content.clone(),
                        )),
                        refusal: None,
                        name: None,
                        audio: None,
                        tool_calls: None,
                        function_call: None,
                    })
                }
            })
            .collect();

        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        CreateChatCompletionRequest {
            model,
            messages,
            max_completion_tokens: Some(request.max_tokens),
            temperature: request.temperature.map(|t| t as f32),
            ..Default::default()
        }
    }
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let oai_request = self.build_request(request);

        let response = self
            .client
            .chat()
            .create(oai_request)
            .await
            .map_err(|err| {
                tracing::debug!(provider = %self.provider_name, error = %err, "chat completion failed");
                map_openai_error(err)
            })?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: response.id,
            content,
            model: response.model,
            usage,
        })
    }
}

/// Map an [`OpenAIError`] onto the provider error kinds the retry loop
/// understands: timeouts and rate limits are retryable, the rest are not.
fn map_openai_error(err: OpenAIError) -> LlmError {
    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "authentication_error"
                || error_type == "authentication_error"
                || code == "invalid_api_key"
            {
                LlmError::AuthenticationFailed
            } else if code == "rate_limit_exceeded" || error_type == "rate_limit_error" {
                LlmError::RateLimited {
                    retry_after_ms: None,
                }
            } else if code == "context_length_exceeded" || error_type == "invalid_request_error" {
                LlmError::InvalidRequest(api_err.message.clone())
            } else {
                LlmError::Unavailable(api_err.message.clone())
            }
        }
        // Transport failures only; HTTP error statuses arrive as `ApiError`.
        OpenAIError::Reqwest(reqwest_err) if reqwest_err.is_timeout() => LlmError::Timeout,
        OpenAIError::JSONDeserialize(_, content) => {
            LlmError::Unavailable(format!("failed to parse response: {content}"))
        }
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg.clone()),
        _ => LlmError::Unavailable(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;
    use parley_types::llm::PromptMessage;

    fn provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::openai(SecretString::from("sk-test".to_string()), "gpt-3.5-turbo")
    }

    fn api_error(code: Option<&str>, error_type: Option<&str>) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: "boom".to_string(),
            r#type: error_type.map(str::to_string),
            param: None,
            code: code.map(str::to_string),
        })
    }

    #[test]
    fn test_openai_factory() {
        let provider = provider();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_build_request_messages() {
        let request = CompletionRequest {
            model: "gpt-4o".to_string(),
            messages: vec![
                PromptMessage {
                    role: MessageRole::System,
                    content: "Be helpful".to_string(),
                },
                PromptMessage {
                    role: MessageRole::User,
                    content: "Hello".to_string(),
                },
                PromptMessage {
                    role: MessageRole::Assistant,
                    content: "Hi there!".to_string(),
                },
            ],
            max_tokens: 500,
            temperature: Some(0.7),
        };

        let oai_req = provider().build_request(&request);
        assert_eq!(oai_req.model, "gpt-4o");
        assert_eq!(oai_req.messages.len(), 3);
        assert!(matches!(oai_req.messages[0], ChatCompletionRequestMessage::System(_)));
        assert_eq!(oai_req.max_completion_tokens, Some(500));
        assert!(oai_req.stream.is_none());
    }

    #[test]
    fn test_build_request_empty_model_uses_default() {
        let request = CompletionRequest {
            model: String::new(),
            messages: vec![],
            max_tokens: 16,
            temperature: None,
        };
        let oai_req = provider().build_request(&request);
        assert_eq!(oai_req.model, "gpt-3.5-turbo");
        assert!(oai_req.temperature.is_none());
    }

    #[test]
    fn test_map_api_errors() {
        assert_eq!(
            map_openai_error(api_error(Some("rate_limit_exceeded"), None)),
            LlmError::RateLimited { retry_after_ms: None }
        );
        assert_eq!(
            map_openai_error(api_error(Some("invalid_api_key"), None)),
            LlmError::AuthenticationFailed
        );
        assert_eq!(
            map_openai_error(api_error(Some("server_error"), None)),
            LlmError::Unavailable("boom".to_string())
        );
        assert_eq!(
            map_openai_error(api_error(Some("context_length_exceeded"), None)),
            LlmError::InvalidRequest("boom".to_string())
        );
    }

    /// Serve `body` with `status` to every request, counting the requests seen.
    async fn serve_status(
        status: &'static str,
        body: &'static str,
    ) -> (String, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 16 * 1024];
                    let mut read = 0;
                    // Headers, then as much body as Content-Length announces.
                    loop {
                        let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        read += n;
                        let text = String::from_utf8_lossy(&buf[..read]).to_lowercase();
                        if let Some(end) = text.find("\r\n\r\n") {
                            let length = text
                                .lines()
                                .find_map(|l| l.strip_prefix("content-length:"))
                                .and_then(|v| v.trim().parse::<usize>().ok())
                                .unwrap_or(0);
                            if read >= end + 4 + length {
                                break;
                            }
                        }
                    }
                    let response = format!(
                        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{addr}/v1"), hits)
    }

    fn local_provider(base_url: String) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(OpenAiCompatConfig {
            provider_name: "local".to_string(),
            base_url,
            api_key: SecretString::from("sk-test".to_string()),
            model: "gpt-3.5-turbo".to_string(),
        })
    }

    fn hello_request() -> CompletionRequest {
        CompletionRequest {
            model: String::new(),
            messages: vec![PromptMessage {
                role: MessageRole::User,
                content: "Hello".to_string(),
            }],
            max_tokens: 16,
            temperature: None,
        }
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_after_single_request() {
        let (base_url, hits) = serve_status(
            "429 Too Many Requests",
            r#"{"error":{"message":"slow down","type":"requests","param":null,"code":"rate_limit_exceeded"}}"#,
        )
        .await;
        let provider = local_provider(base_url);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            provider.complete(&hello_request()),
        )
        .await
        .expect("provider must answer without internal retries");

        assert_eq!(
            result.unwrap_err(),
            LlmError::RateLimited { retry_after_ms: None }
        );
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_surfaces_after_single_request() {
        let (base_url, hits) =
            serve_status("500 Internal Server Error", "upstream exploded").await;
        let provider = local_provider(base_url);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            provider.complete(&hello_request()),
        )
        .await
        .expect("provider must answer without internal retries");

        assert_eq!(
            result.unwrap_err(),
            LlmError::Unavailable("upstream exploded".to_string())
        );
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_map_invalid_argument() {
        assert_eq!(
            map_openai_error(OpenAIError::InvalidArgument("bad".to_string())),
            LlmError::InvalidRequest("bad".to_string())
        );
    }
}
