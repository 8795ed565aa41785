//! Conversation session and message types for Parley.
//!
//! A session is one ongoing conversation: an ordered, append-only list of
//! messages plus a small bag of scalar metadata (e.g. the selected model).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Re-export MessageRole from the llm module (it's used in both session and llm contexts).
pub use crate::llm::MessageRole;
use crate::llm::PromptMessage;

/// Unique identifier for a session, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new SessionId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a SessionId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A scalar metadata value attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(x) => write!(f, "{x}"),
            MetadataValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        MetadataValue::Integer(i)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

/// Session metadata, ordered by key for stable serialization.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single message within a session. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Build a message stamped with the given time.
    pub fn new(role: MessageRole, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content, Utc::now())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content, Utc::now())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content, Utc::now())
    }

    /// Strip the timestamp for provider submission.
    pub fn to_prompt(&self) -> PromptMessage {
        PromptMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A conversation session.
///
/// `messages` is append-only; a system message, if present, sits at index 0.
/// `last_active_at` moves forward on every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Session {
    /// Create an empty session stamped with `now`.
    pub fn new(id: SessionId, metadata: Metadata, now: DateTime<Utc>) -> Self {
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            last_active_at: now,
            metadata,
        }
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// The leading system message, if the session has one.
    pub fn system_message(&self) -> Option<&Message> {
        self.messages
            .first()
            .filter(|m| m.role == MessageRole::System)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Whether the session was last touched strictly before `cutoff`.
    pub fn idle_since_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_active_at < cutoff
    }

    /// Lightweight listing view of this session.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            created_at: self.created_at,
            last_active_at: self.last_active_at,
            message_count: self.messages.len(),
            last_message_at: self.messages.last().map(|m| m.timestamp),
        }
    }
}

/// Listing view of a session (no message bodies).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub message_count: usize,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Parameters for creating a session.
#[derive(Debug, Clone, Default)]
pub struct SessionInit {
    /// Seeded as the session's first (system) message when set.
    pub system_prompt: Option<String>,
    pub metadata: Metadata,
}

impl SessionInit {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_id_display_parse() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_system_message_only_at_head() {
        let now = Utc::now();
        let mut session = Session::new(SessionId::new(), Metadata::new(), now);
        assert!(session.system_message().is_none());

        session.messages.push(Message::user("hi"));
        assert!(session.system_message().is_none());

        let mut seeded = Session::new(SessionId::new(), Metadata::new(), now);
        seeded.messages.push(Message::system("be brief"));
        assert_eq!(seeded.system_message().unwrap().content, "be brief");
    }

    #[test]
    fn test_idle_since_before_is_strict() {
        let now = Utc::now();
        let session = Session::new(SessionId::new(), Metadata::new(), now);
        assert!(!session.idle_since_before(now));
        assert!(session.idle_since_before(now + Duration::milliseconds(1)));
    }

    #[test]
    fn test_summary_counts_messages() {
        let mut session = Session::new(SessionId::new(), Metadata::new(), Utc::now());
        session.messages.push(Message::user("one"));
        session.messages.push(Message::assistant("two"));
        let summary = session.summary();
        assert_eq!(summary.message_count, 2);
        assert_eq!(summary.last_message_at, Some(session.messages[1].timestamp));
    }

    #[test]
    fn test_metadata_value_untagged_serde() {
        let mut meta = Metadata::new();
        meta.insert("model".into(), "gpt-4o".into());
        meta.insert("turns".into(), 3i64.into());
        meta.insert("beta".into(), true.into());
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"beta":true,"model":"gpt-4o","turns":3}"#);

        let parsed: Metadata = serde_json::from_str(r#"{"ratio":0.5}"#).unwrap();
        assert_eq!(parsed["ratio"], MetadataValue::Float(0.5));
    }

    #[test]
    fn test_session_serializes_id_as_plain_string() {
        let session = Session::new(SessionId::new(), Metadata::new(), Utc::now());
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["id"], serde_json::json!(session.id.to_string()));
        assert_eq!(json["messages"], serde_json::json!([]));
    }
}
