//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both the CLI and
//! the REST API. The core services are generic over the store; AppState pins
//! them to the in-memory implementation.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use parley_core::conversation::ConversationService;
use parley_core::llm::box_provider::BoxLlmProvider;
use parley_core::session::memory::{InMemorySessionStore, StoreConfig};
use parley_core::sweeper::ExpirySweeper;
use parley_infra::llm::create_provider;
use parley_types::config::ParleyConfig;

pub type ConcreteConversationService = ConversationService<InMemorySessionStore>;

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub conversation: Arc<ConcreteConversationService>,
    pub config: Arc<ParleyConfig>,
    /// Cancelled on shutdown; each turn runs under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build the provider named in `config` and wire the services.
    pub fn init(config: ParleyConfig) -> anyhow::Result<Self> {
        let provider = create_provider(&config.provider, &config.model).with_context(|| {
            format!(
                "failed to create LLM provider '{}' (set OPENAI_API_KEY or use provider.kind = \"echo\")",
                config.provider.name
            )
        })?;
        Ok(Self::with_provider(config, provider))
    }

    /// Wire the services around an already-built provider.
    pub fn with_provider(config: ParleyConfig, provider: BoxLlmProvider) -> Self {
        let store = Arc::new(InMemorySessionStore::new(StoreConfig::from_config(&config)));
        let conversation = ConversationService::from_config(store, provider, &config);

        Self {
            conversation: Arc::new(conversation),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &Arc<InMemorySessionStore> {
        self.conversation.store()
    }

    /// Sweeper over this state's store, using the configured ttl and interval.
    pub fn sweeper(&self) -> ExpirySweeper<InMemorySessionStore> {
        ExpirySweeper::new(
            Arc::clone(self.store()),
            self.config.session_ttl(),
            self.config.sweep_interval(),
        )
    }
}
