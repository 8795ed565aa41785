//! Configuration types for Parley.
//!
//! `ParleyConfig` represents the top-level `parley.toml` that controls the
//! provider model, session lifetime, context budget, store capacity, and the
//! HTTP server. All fields have defaults so an empty file is a valid config.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::llm::ProviderKind;

/// Upper bound on provider retries for timeouts and rate limits.
pub const MAX_PROVIDER_RETRIES: u32 = 2;

/// How message size is measured against the context budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMeasure {
    /// Unicode scalar values of the message content.
    #[default]
    CharCount,
    /// Rough token estimate (~4 characters per token).
    TokenEstimate,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParleyConfig {
    /// Provider model identifier sent with every completion.
    #[serde(default = "default_model")]
    pub model: String,

    /// Inactivity (seconds) before a session is eligible for expiry.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// How often (seconds) the expiry sweeper runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Maximum context size per turn, in `context_measure` units.
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,

    #[serde(default)]
    pub context_measure: ContextMeasure,

    /// Maximum number of live sessions held by the store.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Maximum user message length in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Per-attempt provider timeout in seconds.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Seeded as the first message of every new session when set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub log: LogSettings,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_session_ttl_secs() -> u64 {
    1800
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_context_budget() -> usize {
    12_000
}

fn default_max_sessions() -> usize {
    10_000
}

fn default_max_message_length() -> usize {
    5000
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            session_ttl_secs: default_session_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            context_budget: default_context_budget(),
            context_measure: ContextMeasure::default(),
            max_sessions: default_max_sessions(),
            max_message_length: default_max_message_length(),
            provider_timeout_secs: default_provider_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: None,
            retry: RetrySettings::default(),
            provider: ProviderSettings::default(),
            server: ServerSettings::default(),
            log: LogSettings::default(),
        }
    }
}

impl ParleyConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Reject values the core cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(key: &str, message: &str) -> ConfigError {
            ConfigError::Invalid {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if self.model.trim().is_empty() {
            return Err(invalid("model", "must not be empty"));
        }
        if self.context_budget == 0 {
            return Err(invalid("context_budget", "must be greater than zero"));
        }
        if self.max_sessions == 0 {
            return Err(invalid("max_sessions", "must be greater than zero"));
        }
        if self.max_message_length == 0 {
            return Err(invalid("max_message_length", "must be greater than zero"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(invalid("sweep_interval_secs", "must be greater than zero"));
        }
        if self.provider_timeout_secs == 0 {
            return Err(invalid("provider_timeout_secs", "must be greater than zero"));
        }
        if self.retry.max_retries > MAX_PROVIDER_RETRIES {
            return Err(invalid(
                "retry.max_retries",
                &format!("at most {MAX_PROVIDER_RETRIES} retries are allowed"),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature", "must be between 0.0 and 2.0"));
        }
        Ok(())
    }
}

/// Bounded exponential backoff for provider timeouts and rate limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    MAX_PROVIDER_RETRIES
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    4000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Which provider to call and how to reach it.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_kind")]
    pub kind: ProviderKind,
    /// Human-readable name (e.g., "openai").
    #[serde(default = "default_provider_name")]
    pub name: String,
    /// Override the default base URL for the provider.
    #[serde(default)]
    pub base_url: Option<String>,
    /// API credential; usually supplied through `OPENAI_API_KEY` instead.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_provider_kind() -> ProviderKind {
    ProviderKind::OpenAiCompatible
}

fn default_provider_name() -> String {
    "openai".to_string()
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            name: default_provider_name(),
            base_url: None,
            api_key: None,
        }
    }
}

// Hand-written so the API key never reaches logs.
impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origin allowed by CORS in addition to the local dev origins.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    /// Deployment label reported by the health endpoint.
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            frontend_url: default_frontend_url(),
            environment: default_environment(),
        }
    }
}

/// Logging output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSettings {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
    /// Bridge spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}
