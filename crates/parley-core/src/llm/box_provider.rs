//! BoxLlmProvider: object-safe wrapper around [`LlmProvider`].
//!
//! `LlmProvider` returns `impl Future`, so it cannot be a trait object.
//! `LlmProviderDyn` boxes the future and is blanket-implemented for every
//! provider; `BoxLlmProvider` holds one behind `dyn`.

use std::future::Future;
use std::pin::Pin;

use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError};

use super::provider::LlmProvider;

type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;

/// Object-safe version of [`LlmProvider`] with boxed futures.
pub trait LlmProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn complete_boxed<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a>;
}

impl<T: LlmProvider> LlmProviderDyn for T {
    fn name(&self) -> &str {
        LlmProvider::name(self)
    }

    fn complete_boxed<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(self.complete(request))
    }
}

/// Type-erased provider selected at startup from configuration.
pub struct BoxLlmProvider {
    inner: Box<dyn LlmProviderDyn>,
}

impl BoxLlmProvider {
    pub fn new<T: LlmProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }
}

impl std::fmt::Debug for BoxLlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxLlmProvider")
            .field("name", &self.inner.name())
            .finish()
    }
}

// Implementing the port itself lets the service stay generic over `P: LlmProvider`.
impl LlmProvider for BoxLlmProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.inner.complete_boxed(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;
    use parley_types::llm::{MessageRole, PromptMessage};

    #[tokio::test]
    async fn boxed_provider_delegates() {
        let scripted = ScriptedProvider::new().reply("boxed hello");
        let boxed = BoxLlmProvider::new(scripted.clone());
        assert_eq!(LlmProvider::name(&boxed), "scripted");

        let request = CompletionRequest {
            model: "test".into(),
            messages: vec![PromptMessage {
                role: MessageRole::User,
                content: "hi".into(),
            }],
            max_tokens: 16,
            temperature: None,
        };
        let response = boxed.complete(&request).await.unwrap();
        assert_eq!(response.content, "boxed hello");
        assert_eq!(scripted.calls(), 1);
    }
}
