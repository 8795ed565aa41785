//! Scripted provider for tests.
//!
//! Replays a queue of canned outcomes in order, records every request, and
//! can be slowed down to exercise timeouts and cancellation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError, Usage};

use super::provider::LlmProvider;

#[derive(Debug, Default)]
struct Script {
    outcomes: VecDeque<Result<String, LlmError>>,
    fallback: Option<String>,
    delay: Option<Duration>,
    requests: Vec<CompletionRequest>,
}

/// Provider whose answers are fixed up front. Clones share one script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn reply(self, content: impl Into<String>) -> Self {
        self.with_script(|s| s.outcomes.push_back(Ok(content.into())));
        self
    }

    /// Queue a failure.
    pub fn fail(self, error: LlmError) -> Self {
        self.with_script(|s| s.outcomes.push_back(Err(error)));
        self
    }

    /// Reply used once the queue is drained. Without one, a drained script
    /// answers `Unavailable`.
    pub fn otherwise(self, content: impl Into<String>) -> Self {
        self.with_script(|s| s.fallback = Some(content.into()));
        self
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.with_script(|s| s.delay = Some(delay));
        self
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.with_script(|s| s.requests.clone())
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.with_script(|s| s.requests.last().cloned())
    }

    fn with_script<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut script)
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let (outcome, delay) = self.with_script(|s| {
            s.requests.push(request.clone());
            let outcome = s.outcomes.pop_front().unwrap_or_else(|| {
                s.fallback
                    .clone()
                    .ok_or_else(|| LlmError::Unavailable("script exhausted".to_string()))
            });
            (outcome, s.delay)
        });

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        outcome.map(|content| CompletionResponse {
            id: format!("scripted-{n}"),
            content,
            model: request.model.clone(),
            usage: Usage::default(),
        })
    }
}
