//! LLM provider implementations.
//!
//! [`create_provider`] builds the configured backend behind a
//! [`BoxLlmProvider`].

pub mod echo;
pub mod openai_compat;

use secrecy::SecretString;

use parley_core::llm::box_provider::BoxLlmProvider;
use parley_types::config::ProviderSettings;
use parley_types::llm::{LlmError, ProviderKind};

use self::echo::EchoProvider;
use self::openai_compat::{OpenAiCompatConfig, OpenAiCompatibleProvider};

/// Create a [`BoxLlmProvider`] from provider settings.
///
/// # Errors
///
/// `AuthenticationFailed` when an OpenAI-compatible provider has no API key.
pub fn create_provider(settings: &ProviderSettings, model: &str) -> Result<BoxLlmProvider, LlmError> {
    match settings.kind {
        ProviderKind::Echo => Ok(BoxLlmProvider::new(EchoProvider::new())),
        ProviderKind::OpenAiCompatible => {
            let key = settings
                .api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or(LlmError::AuthenticationFailed)?;

            let config = OpenAiCompatConfig {
                provider_name: settings.name.clone(),
                base_url: settings
                    .base_url
                    .clone()
                    .unwrap_or_else(|| openai_compat::OPENAI_BASE_URL.to_string()),
                api_key: SecretString::from(key.to_string()),
                model: model.to_string(),
            };
            Ok(BoxLlmProvider::new(OpenAiCompatibleProvider::new(config)))
        }
    }
}
