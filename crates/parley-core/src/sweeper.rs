//! Background expiry of idle sessions.
//!
//! Each sweep lists ids idle for longer than the ttl and deletes them one
//! by one through the store, so it follows the same per-session locking as
//! request handling. Deletes are idempotent, so ids removed concurrently
//! by a client are simply skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_types::error::SessionError;

use crate::session::store::SessionStore;

pub struct ExpirySweeper<S: SessionStore> {
    store: Arc<S>,
    ttl: Duration,
    interval: Duration,
}

impl<S: SessionStore + 'static> ExpirySweeper<S> {
    pub fn new(store: Arc<S>, ttl: Duration, interval: Duration) -> Self {
        Self {
            store,
            ttl,
            interval,
        }
    }

    /// Delete every session idle for longer than the ttl. Returns how many
    /// this sweep actually removed.
    pub async fn sweep_once(&self) -> Result<usize, SessionError> {
        let expired = self.store.list_expired(self.ttl).await?;
        if expired.is_empty() {
            return Ok(0);
        }

        let mut removed = 0;
        for id in &expired {
            if self.store.delete(id).await? {
                removed += 1;
            } else {
                debug!(session_id = %id, "expired session already gone");
            }
        }

        info!(
            removed,
            candidates = expired.len(),
            remaining = self.store.len(),
            "Expired sessions swept"
        );
        Ok(removed)
    }

    /// Sweep on every interval tick until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; nothing can be expired yet.
            ticker.tick().await;

            info!(
                ttl_secs = self.ttl.as_secs(),
                interval_secs = self.interval.as_secs(),
                "Expiry sweeper started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep_once().await {
                            warn!(error = %e, "expiry sweep failed");
                        }
                    }
                }
            }

            info!("Expiry sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::clock::ManualClock;
    use crate::session::memory::{InMemorySessionStore, StoreConfig};
    use chrono::{Duration as ChronoDuration, Utc};
    use parley_types::session::{Message, SessionInit};

    fn store(clock: Arc<ManualClock>) -> Arc<InMemorySessionStore> {
        Arc::new(InMemorySessionStore::with_clock(
            StoreConfig {
                max_sessions: 100,
                session_ttl: Duration::from_secs(60),
            },
            clock,
        ))
    }

    #[tokio::test]
    async fn sweep_removes_only_idle_sessions() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = store(clock.clone());
        let idle = store.create(SessionInit::default()).await.unwrap();
        let active = store.create(SessionInit::default()).await.unwrap();

        clock.advance(ChronoDuration::seconds(40));
        store.append(&active.id, Message::user("ping")).await.unwrap();
        clock.advance(ChronoDuration::seconds(30));

        let sweeper = ExpirySweeper::new(store.clone(), Duration::from_secs(60), Duration::from_secs(1));
        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
        assert!(store.get(&idle.id).await.is_err());
        assert!(store.get(&active.id).await.is_ok());
        assert_eq!(store.len(), 1);

        // Nothing left to do on the next pass.
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sweep_on_empty_store() {
        let clock = Arc::new(ManualClock::default());
        let sweeper = ExpirySweeper::new(store(clock), Duration::from_secs(60), Duration::from_secs(1));
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn spawned_sweeper_runs_until_cancelled() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = store(clock.clone());
        let session = store.create(SessionInit::default()).await.unwrap();
        clock.advance(ChronoDuration::seconds(61));

        let cancel = CancellationToken::new();
        let handle = ExpirySweeper::new(
            store.clone(),
            Duration::from_secs(60),
            Duration::from_millis(10),
        )
        .spawn(cancel.clone());

        let mut swept = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if store.is_empty() {
                swept = true;
                break;
            }
        }
        assert!(swept, "session {} was never swept", session.id);

        cancel.cancel();
        handle.await.unwrap();
    }
}
