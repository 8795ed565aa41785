//! Bounded exponential backoff for provider calls.
//!
//! Only `ProviderTimeout` and `ProviderRateLimited` are retried. Retry
//! number `n` (0-based) waits `base_delay * 2^n`, capped at `max_delay`.

use std::time::Duration;

use parley_types::config::{MAX_PROVIDER_RETRIES, RetrySettings};
use parley_types::error::ConversationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    /// Build from config, clamping the retry count to the hard limit.
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries.min(MAX_PROVIDER_RETRIES),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Whether another attempt is allowed after `retries_done` retries
    /// ended in `error`.
    pub fn should_retry(&self, error: &ConversationError, retries_done: u32) -> bool {
        error.is_retryable() && retries_done < self.max_retries
    }

    /// Computed delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before retry number `retry`, stretched to a provider-supplied
    /// `retry_after` hint but never beyond `max_delay`.
    pub fn backoff(&self, retry: u32, error: &ConversationError) -> Duration {
        let computed = self.delay_for(retry);
        match error {
            ConversationError::ProviderRateLimited {
                retry_after_ms: Some(ms),
            } => computed
                .max(Duration::from_millis(*ms))
                .min(self.max_delay),
            _ => computed,
        }
    }
}
