use thiserror::Error;

use crate::llm::LlmError;
use crate::session::SessionId;

/// Errors from session store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(SessionId),

    #[error("session capacity exceeded (max {max} live sessions)")]
    CapacityExceeded { max: usize },

    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Caller-visible failures of a conversation turn.
///
/// Store errors convert unchanged; provider errors are folded into the
/// three provider kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("session '{0}' not found")]
    SessionNotFound(SessionId),

    #[error("session capacity exceeded (max {max} live sessions)")]
    CapacityExceeded { max: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider timed out")]
    ProviderTimeout,

    #[error("provider rate limited the request")]
    ProviderRateLimited { retry_after_ms: Option<u64> },

    #[error("request cancelled")]
    Cancelled,
}

impl ConversationError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            ConversationError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            ConversationError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            ConversationError::InvalidInput(_) => "INVALID_INPUT",
            ConversationError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            ConversationError::ProviderTimeout => "PROVIDER_TIMEOUT",
            ConversationError::ProviderRateLimited { .. } => "PROVIDER_RATE_LIMITED",
            ConversationError::Cancelled => "REQUEST_CANCELLED",
        }
    }

    /// Whether the bounded retry loop may try the provider again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConversationError::ProviderTimeout | ConversationError::ProviderRateLimited { .. }
        )
    }
}

impl From<SessionError> for ConversationError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(id) => ConversationError::SessionNotFound(id),
            SessionError::CapacityExceeded { max } => ConversationError::CapacityExceeded { max },
            SessionError::InvalidMessage(msg) => ConversationError::InvalidInput(msg),
        }
    }
}

impl From<LlmError> for ConversationError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout => ConversationError::ProviderTimeout,
            LlmError::RateLimited { retry_after_ms } => {
                ConversationError::ProviderRateLimited { retry_after_ms }
            }
            other => ConversationError::ProviderUnavailable(other.to_string()),
        }
    }
}

/// A failed turn, tagged with the session it ran against.
///
/// `session_id` is set once the turn has resolved (or created) a session, so
/// callers can reach the user message a provider failure leaves behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct TurnError {
    pub kind: ConversationError,
    pub session_id: Option<SessionId>,
    /// Whether the turn created `session_id`.
    pub created: bool,
}

impl TurnError {
    pub fn in_session(kind: ConversationError, session_id: SessionId, created: bool) -> Self {
        Self {
            kind,
            session_id: Some(session_id),
            created,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl From<ConversationError> for TurnError {
    fn from(kind: ConversationError) -> Self {
        Self {
            kind,
            session_id: None,
            created: false,
        }
    }
}

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let err = SessionError::CapacityExceeded { max: 10 };
        assert_eq!(err.to_string(), "session capacity exceeded (max 10 live sessions)");
    }

    #[test]
    fn test_session_error_converts_unchanged() {
        let id = SessionId::new();
        assert_eq!(
            ConversationError::from(SessionError::NotFound(id)),
            ConversationError::SessionNotFound(id)
        );
        assert_eq!(
            ConversationError::from(SessionError::CapacityExceeded { max: 3 }),
            ConversationError::CapacityExceeded { max: 3 }
        );
    }

    #[test]
    fn test_turn_error_keeps_kind_and_session() {
        let id = SessionId::new();
        let err = TurnError::in_session(ConversationError::ProviderTimeout, id, true);
        assert_eq!(err.to_string(), "provider timed out");
        assert_eq!(err.code(), "PROVIDER_TIMEOUT");
        assert_eq!(err.session_id, Some(id));

        let early = TurnError::from(ConversationError::InvalidInput("empty".into()));
        assert_eq!(early.session_id, None);
        assert!(!early.created);
    }

    #[test]
    fn test_llm_error_mapping() {
        assert_eq!(
            ConversationError::from(LlmError::Timeout),
            ConversationError::ProviderTimeout
        );
        assert_eq!(
            ConversationError::from(LlmError::RateLimited { retry_after_ms: None }),
            ConversationError::ProviderRateLimited { retry_after_ms: None }
        );
        assert!(matches!(
            ConversationError::from(LlmError::AuthenticationFailed),
            ConversationError::ProviderUnavailable(_)
        ));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ConversationError::ProviderTimeout.is_retryable());
        assert!(ConversationError::ProviderRateLimited { retry_after_ms: None }.is_retryable());
        assert!(!ConversationError::ProviderUnavailable("down".into()).is_retryable());
        assert!(!ConversationError::InvalidInput("empty".into()).is_retryable());
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let codes = [
            ConversationError::SessionNotFound(SessionId::new()).code(),
            ConversationError::CapacityExceeded { max: 1 }.code(),
            ConversationError::InvalidInput(String::new()).code(),
            ConversationError::ProviderUnavailable(String::new()).code(),
            ConversationError::ProviderTimeout.code(),
            ConversationError::ProviderRateLimited { retry_after_ms: None }.code(),
            ConversationError::Cancelled.code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
