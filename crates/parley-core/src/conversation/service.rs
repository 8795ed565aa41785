//! ConversationService: runs one user turn end to end.
//!
//! Validate, resolve the session, append the user message, assemble the
//! context, call the provider with a per-attempt timeout and bounded retry,
//! then append the assistant reply. No store lock is held across the
//! provider call; the store hands back owned snapshots.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use parley_types::config::ParleyConfig;
use parley_types::error::{ConversationError, SessionError, TurnError};
use parley_types::llm::{CompletionRequest, CompletionResponse};
use parley_types::session::{
    Message, Metadata, MetadataValue, Session, SessionId, SessionInit, SessionSummary,
};

use super::retry::RetryPolicy;
use crate::context::ContextAssembler;
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::provider::LlmProvider;
use crate::session::store::SessionStore;

/// Per-turn knobs taken from configuration.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub model: String,
    pub context_budget: usize,
    pub max_message_length: usize,
    /// Limit for a single provider attempt, not the whole turn.
    pub provider_timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Seeded into sessions this service creates.
    pub system_prompt: Option<String>,
}

impl TurnSettings {
    pub fn from_config(config: &ParleyConfig) -> Self {
        Self {
            model: config.model.clone(),
            context_budget: config.context_budget,
            max_message_length: config.max_message_length,
            provider_timeout: config.provider_timeout(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system_prompt: config.system_prompt.clone(),
        }
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self::from_config(&ParleyConfig::default())
    }
}

/// How a turn's session was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionLookup {
    Found(Session),
    Created(Session),
}

impl SessionLookup {
    pub fn session(&self) -> &Session {
        match self {
            SessionLookup::Found(s) | SessionLookup::Created(s) => s,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, SessionLookup::Created(_))
    }
}

/// Result of a successful turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    pub reply: String,
    /// Whether this turn started a new session.
    pub created: bool,
    /// Messages in the session after the reply was appended.
    pub message_count: usize,
}

pub struct ConversationService<S: SessionStore> {
    store: Arc<S>,
    provider: BoxLlmProvider,
    assembler: ContextAssembler,
    retry: RetryPolicy,
    settings: TurnSettings,
}

impl<S: SessionStore> ConversationService<S> {
    pub fn new(store: Arc<S>, provider: BoxLlmProvider, settings: TurnSettings) -> Self {
        Self {
            store,
            provider,
            assembler: ContextAssembler::default(),
            retry: RetryPolicy::default(),
            settings,
        }
    }

    /// Wire everything from a loaded config.
    pub fn from_config(store: Arc<S>, provider: BoxLlmProvider, config: &ParleyConfig) -> Self {
        Self::new(store, provider, TurnSettings::from_config(config))
            .with_assembler(ContextAssembler::from_measure(config.context_measure))
            .with_retry_policy(RetryPolicy::from_settings(&config.retry))
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Reject empty, whitespace-only, and over-long user text.
    pub fn validate_input(&self, text: &str) -> Result<(), ConversationError> {
        if text.trim().is_empty() {
            return Err(ConversationError::InvalidInput(
                "message must not be empty".to_string(),
            ));
        }
        let max = self.settings.max_message_length;
        if text.chars().count() > max {
            return Err(ConversationError::InvalidInput(format!(
                "message exceeds {max} characters"
            )));
        }
        Ok(())
    }

    /// Look up `id`, creating a fresh session when it is absent or unknown.
    pub async fn resolve_session(
        &self,
        id: Option<SessionId>,
    ) -> Result<SessionLookup, ConversationError> {
        if let Some(id) = id {
            match self.store.get(&id).await {
                Ok(session) => return Ok(SessionLookup::Found(session)),
                Err(SessionError::NotFound(_)) => {
                    debug!(session_id = %id, "unknown session id, starting a new session");
                }
                Err(e) => return Err(e.into()),
            }
        }
        let session = self.create_session(Metadata::new()).await?;
        Ok(SessionLookup::Created(session))
    }

    /// Run one turn without external cancellation.
    pub async fn handle_turn(
        &self,
        session_id: Option<SessionId>,
        user_text: &str,
    ) -> Result<TurnOutcome, TurnError> {
        self.handle_turn_cancellable(session_id, user_text, CancellationToken::new())
            .await
    }

    /// Run one turn, aborting the provider call or backoff when `cancel` fires.
    ///
    /// On any provider failure the user message stays in the session and no
    /// assistant message is appended; the error carries the session id.
    pub async fn handle_turn_cancellable(
        &self,
        session_id: Option<SessionId>,
        user_text: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        // Validate first so a bad request never creates a session.
        self.validate_input(user_text)?;
        if cancel.is_cancelled() {
            return Err(ConversationError::Cancelled.into());
        }

        let lookup = self.resolve_session(session_id).await?;
        let mut created = lookup.is_created();
        let mut session_id = lookup.session().id;

        let session = match self.store.append(&session_id, Message::user(user_text)).await {
            Ok(session) => session,
            // Expired or swept between lookup and append: start over once.
            Err(SessionError::NotFound(_)) => {
                debug!(session_id = %session_id, "session vanished before the turn, starting a new session");
                let fresh = self.resolve_session(None).await?;
                created = true;
                session_id = fresh.session().id;
                self.store
                    .append(&session_id, Message::user(user_text))
                    .await
                    .map_err(|e| TurnError::in_session(e.into(), session_id, created))?
            }
            Err(e) => return Err(TurnError::in_session(e.into(), session_id, created)),
        };

        self.complete_turn(session, created, &cancel)
            .await
            .map_err(|kind| TurnError::in_session(kind, session_id, created))
    }

    /// Provider call and assistant append for a session holding the new user message.
    async fn complete_turn(
        &self,
        session: Session,
        created: bool,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, ConversationError> {
        let session_id = session.id;
        let context = self.assembler.build(&session, self.settings.context_budget);
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            messages: context.iter().map(Message::to_prompt).collect(),
            max_tokens: self.settings.max_tokens,
            temperature: Some(self.settings.temperature),
        };

        let response = self.complete_with_retry(&request, cancel, session_id).await?;
        if response.content.trim().is_empty() {
            warn!(session_id = %session_id, provider = self.provider.name(), "provider returned an empty reply");
            return Err(ConversationError::ProviderUnavailable(
                "provider returned an empty reply".to_string(),
            ));
        }
        if cancel.is_cancelled() {
            return Err(ConversationError::Cancelled);
        }

        let reply = response.content;
        let session = self
            .store
            .append(&session_id, Message::assistant(reply.clone()))
            .await?;

        info!(
            session_id = %session_id,
            created,
            message_count = session.message_count(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Turn completed"
        );

        Ok(TurnOutcome {
            session_id,
            reply,
            created,
            message_count: session.message_count(),
        })
    }

    async fn complete_with_retry(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        session_id: SessionId,
    ) -> Result<CompletionResponse, ConversationError> {
        // Field names follow the OpenTelemetry GenAI conventions.
        let span = info_span!(
            "chat",
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = self.provider.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            session_id = %session_id,
        );

        let mut retries = 0u32;
        loop {
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(session_id = %session_id, "Turn cancelled during provider call");
                    return Err(ConversationError::Cancelled);
                }
                result = tokio::time::timeout(
                    self.settings.provider_timeout,
                    self.provider.complete(request).instrument(span.clone()),
                ) => match result {
                    Ok(Ok(response)) => return Ok(response),
                    Ok(Err(e)) => ConversationError::from(e),
                    Err(_) => ConversationError::ProviderTimeout,
                },
            };

            if !self.retry.should_retry(&attempt, retries) {
                warn!(
                    session_id = %session_id,
                    provider = self.provider.name(),
                    retries,
                    error = %attempt,
                    "provider call failed"
                );
                return Err(attempt);
            }

            let delay = self.retry.backoff(retries, &attempt);
            retries += 1;
            warn!(
                session_id = %session_id,
                provider = self.provider.name(),
                retry = retries,
                delay_ms = delay.as_millis() as u64,
                error = %attempt,
                "provider call failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(session_id = %session_id, "Turn cancelled during backoff");
                    return Err(ConversationError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    // --- Session pass-throughs ---

    /// Create a session seeded with the configured system prompt.
    pub async fn create_session(&self, metadata: Metadata) -> Result<Session, ConversationError> {
        let init = SessionInit {
            system_prompt: self.settings.system_prompt.clone(),
            metadata,
        };
        Ok(self.store.create(init).await?)
    }

    pub async fn get_session(&self, id: &SessionId) -> Result<Session, ConversationError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ConversationError> {
        Ok(self.store.list().await?)
    }

    /// Idempotent; `Ok(false)` when the session did not exist.
    pub async fn delete_session(&self, id: &SessionId) -> Result<bool, ConversationError> {
        Ok(self.store.delete(id).await?)
    }

    pub async fn update_metadata(
        &self,
        id: &SessionId,
        key: String,
        value: MetadataValue,
    ) -> Result<Session, ConversationError> {
        Ok(self.store.update_metadata(id, key, value).await?)
    }
}
