//! In-memory session store backed by `DashMap`.
//!
//! Each session lives in its own `Arc<Mutex<Slot>>`. The map shard lock is
//! held only long enough to clone the slot handle, so mutations of one
//! session never wait on another. Lock order is always shard -> slot; no
//! code path acquires a shard lock while holding a slot lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tracing::{debug, info};

use parley_types::config::ParleyConfig;
use parley_types::error::SessionError;
use parley_types::session::{
    Message, MessageRole, MetadataValue, Session, SessionId, SessionInit, SessionSummary,
};

use super::clock::{Clock, SystemClock};
use super::store::SessionStore;

/// Capacity and lifetime limits for the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub max_sessions: usize,
    /// Inactivity after which `get`/`append` treat a session as gone.
    pub session_ttl: Duration,
}

impl StoreConfig {
    pub fn from_config(config: &ParleyConfig) -> Self {
        Self {
            max_sessions: config.max_sessions,
            session_ttl: config.session_ttl(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_config(&ParleyConfig::default())
    }
}

#[derive(Debug)]
struct Slot {
    session: Session,
    /// Set under the slot lock when the entry leaves the map, so holders of
    /// a stale handle observe the deletion.
    removed: bool,
}

type SlotRef = Arc<Mutex<Slot>>;

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Sessions last active strictly before the returned instant are expired.
///
/// `None` when `now - ttl` is not representable, i.e. nothing can be expired.
fn expiry_cutoff(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    let ttl = TimeDelta::from_std(ttl).ok()?;
    now.checked_sub_signed(ttl)
}

/// Process-local [`SessionStore`].
///
/// Owns every session exclusively; callers only ever receive clones.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, SlotRef>,
    live: AtomicUsize,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            live: AtomicUsize::new(0),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        expiry_cutoff(now, self.config.session_ttl)
            .is_some_and(|cutoff| session.idle_since_before(cutoff))
    }

    fn slot(&self, id: &SessionId) -> Result<SlotRef, SessionError> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SessionError::NotFound(*id))
    }

    fn try_reserve(&self) -> bool {
        let max = self.config.max_sessions;
        self.live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .is_ok()
    }

    /// Claim one unit of capacity, atomically with respect to other creates.
    ///
    /// Expired sessions the sweeper has not reached yet still hold capacity;
    /// when the store is full they are evicted and the claim retried once.
    fn reserve(&self) -> Result<(), SessionError> {
        if self.try_reserve() {
            return Ok(());
        }
        if self.evict_expired() > 0 && self.try_reserve() {
            return Ok(());
        }
        Err(SessionError::CapacityExceeded {
            max: self.config.max_sessions,
        })
    }

    /// Remove `id` if `pred` holds, tombstoning the slot while the shard is locked.
    fn remove_where(&self, id: &SessionId, pred: impl FnOnce(&Slot) -> bool) -> bool {
        let removed = self
            .sessions
            .remove_if(id, |_, slot| {
                let mut guard = lock(slot);
                if pred(&guard) {
                    guard.removed = true;
                    true
                } else {
                    false
                }
            })
            .is_some();
        if removed {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
        removed
    }

    /// Drop every expired session, returning how many were removed.
    fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let ids: Vec<SessionId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let evicted = ids
            .iter()
            .filter(|id| self.remove_where(id, |slot| self.is_expired(&slot.session, now)))
            .count();
        if evicted > 0 {
            debug!(evicted, "evicted expired sessions to free capacity");
        }
        evicted
    }

    fn evict_if_expired(&self, id: &SessionId) {
        let now = self.clock.now();
        if self.remove_where(id, |slot| self.is_expired(&slot.session, now)) {
            debug!(session_id = %id, "evicted expired session on access");
        }
    }

    /// Clone a live session under its slot lock.
    fn read(&self, id: &SessionId) -> Result<Session, SessionError> {
        let slot = self.slot(id)?;
        let now = self.clock.now();
        let guard = lock(&slot);
        if guard.removed {
            return Err(SessionError::NotFound(*id));
        }
        if self.is_expired(&guard.session, now) {
            drop(guard);
            self.evict_if_expired(id);
            return Err(SessionError::NotFound(*id));
        }
        Ok(guard.session.clone())
    }

    /// Apply `mutate` to a live session under its slot lock and bump activity.
    fn mutate<F>(&self, id: &SessionId, mutate: F) -> Result<Session, SessionError>
    where
        F: FnOnce(&mut Session, DateTime<Utc>) -> Result<(), SessionError>,
    {
        let slot = self.slot(id)?;
        let now = self.clock.now();
        let mut guard = lock(&slot);
        if guard.removed {
            return Err(SessionError::NotFound(*id));
        }
        if self.is_expired(&guard.session, now) {
            drop(guard);
            self.evict_if_expired(id);
            return Err(SessionError::NotFound(*id));
        }
        mutate(&mut guard.session, now)?;
        // Never move backwards, even if the wall clock does.
        guard.session.last_active_at = guard.session.last_active_at.max(now);
        Ok(guard.session.clone())
    }

    fn snapshot_slots(&self) -> Vec<SlotRef> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl SessionStore for InMemorySessionStore {
    async fn create(&self, init: SessionInit) -> Result<Session, SessionError> {
        self.reserve()?;

        let now = self.clock.now();
        let id = SessionId::new();
        let mut session = Session::new(id, init.metadata, now);
        if let Some(prompt) = init.system_prompt {
            session
                .messages
                .push(Message::new(MessageRole::System, prompt, now));
        }

        self.sessions.insert(
            id,
            Arc::new(Mutex::new(Slot {
                session: session.clone(),
                removed: false,
            })),
        );

        info!(session_id = %id, live = self.len(), "Session created");
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.read(id)
    }

    async fn append(&self, id: &SessionId, message: Message) -> Result<Session, SessionError> {
        self.mutate(id, |session, _| {
            if message.role == MessageRole::System && !session.messages.is_empty() {
                return Err(SessionError::InvalidMessage(
                    "a system message may only open a session".to_string(),
                ));
            }
            session.messages.push(message);
            Ok(())
        })
    }

    async fn update_metadata(
        &self,
        id: &SessionId,
        key: String,
        value: MetadataValue,
    ) -> Result<Session, SessionError> {
        if key.trim().is_empty() {
            return Err(SessionError::InvalidMessage(
                "metadata key must not be empty".to_string(),
            ));
        }
        self.mutate(id, |session, _| {
            session.metadata.insert(key, value);
            Ok(())
        })
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, SessionError> {
        let removed = self.remove_where(id, |_| true);
        if removed {
            info!(session_id = %id, "Session deleted");
        }
        Ok(removed)
    }

    async fn list_expired(&self, ttl: Duration) -> Result<Vec<SessionId>, SessionError> {
        let Some(cutoff) = expiry_cutoff(self.clock.now(), ttl) else {
            return Ok(Vec::new());
        };

        let mut expired: Vec<SessionId> = self
            .snapshot_slots()
            .iter()
            .filter_map(|slot| {
                let guard = lock(slot);
                (!guard.removed && guard.session.idle_since_before(cutoff))
                    .then_some(guard.session.id)
            })
            .collect();
        expired.sort();
        Ok(expired)
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let now = self.clock.now();
        let mut summaries: Vec<SessionSummary> = self
            .snapshot_slots()
            .iter()
            .filter_map(|slot| {
                let guard = lock(slot);
                (!guard.removed && !self.is_expired(&guard.session, now))
                    .then(|| guard.session.summary())
            })
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }

    fn len(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}
