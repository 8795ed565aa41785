//! SessionStore trait definition.
//!
//! Keyed storage of conversation sessions. Follows the RPITIT pattern used
//! by the other ports: native async fn in traits (Rust 2024 edition), so
//! a durable implementation can live in the infrastructure layer later.

use std::future::Future;
use std::time::Duration;

use parley_types::error::SessionError;
use parley_types::session::{Message, MetadataValue, Session, SessionId, SessionInit, SessionSummary};

/// Storage port for conversation sessions.
///
/// Contract:
/// - Mutations of one session id are serialized; distinct ids never block
///   each other.
/// - Reads return a consistent snapshot (never a torn message list).
/// - An expired session behaves exactly like an absent one.
pub trait SessionStore: Send + Sync {
    /// Allocate a fresh session. Fails with `CapacityExceeded` at the
    /// configured live-session limit.
    fn create(
        &self,
        init: SessionInit,
    ) -> impl Future<Output = Result<Session, SessionError>> + Send;

    /// Fetch a snapshot of a session.
    fn get(&self, id: &SessionId) -> impl Future<Output = Result<Session, SessionError>> + Send;

    /// Atomically append a message and bump `last_active_at`.
    fn append(
        &self,
        id: &SessionId,
        message: Message,
    ) -> impl Future<Output = Result<Session, SessionError>> + Send;

    /// Set one metadata key and bump `last_active_at`.
    fn update_metadata(
        &self,
        id: &SessionId,
        key: String,
        value: MetadataValue,
    ) -> impl Future<Output = Result<Session, SessionError>> + Send;

    /// Remove a session. Idempotent: returns `Ok(false)` when nothing was removed.
    fn delete(&self, id: &SessionId) -> impl Future<Output = Result<bool, SessionError>> + Send;

    /// Ids whose `last_active_at` is strictly older than `now - ttl`. Read-only.
    fn list_expired(
        &self,
        ttl: Duration,
    ) -> impl Future<Output = Result<Vec<SessionId>, SessionError>> + Send;

    /// Summaries of all live sessions, oldest first.
    fn list(&self) -> impl Future<Output = Result<Vec<SessionSummary>, SessionError>> + Send;

    /// Number of sessions currently held (including expired ones not yet swept).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
