//! LlmProvider trait definition.
//!
//! Uses RPITIT for `complete`, matching the storage port. Concrete
//! providers live in parley-infra.

use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for completion backends (OpenAI-compatible endpoints, echo, ...).
///
/// Implementations must be safe to call concurrently and must not apply
/// their own retries; the conversation service owns the retry policy.
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
