//! Two-tier storage for game sessions.

use std::sync::Arc;
use std::time::Duration;

use beatrock_core::SessionRecord;
use uuid::Uuid;

use super::local::LocalStore;
use super::shared::{SharedCacheClient, StoreReply};
use super::sweeper::Sweepable;
use crate::clock::SharedClock;
use crate::config::CacheConfig;
use crate::metrics;

const SESSION_PREFIX: &str = "session:";

/// Where a session write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedTo {
    Shared,
    Local,
}

/// Session persistence: shared tier first, local map only when the shared
/// write fails.
///
/// Local copies live for `session_ttl` since their last successful read. A
/// successful shared write drops the local copy of the same session, and a
/// load that finds a local copy newer than the shared one writes it back.
#[derive(Debug, Clone)]
pub struct SessionStore {
    shared: SharedCacheClient,
    local: Arc<LocalStore<SessionRecord>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(shared: SharedCacheClient, config: &CacheConfig, clock: SharedClock) -> Self {
        let ttl = Duration::from_secs(config.session_ttl_secs);
        let local = LocalStore::new("sessions", ttl, config.sweep_every_ops, clock)
            .with_refresh_on_read();
        Self {
            shared,
            local: Arc::new(local),
            ttl,
        }
    }

    /// Store a new session under a fresh id.
    pub async fn create(&self, record: &SessionRecord) -> Uuid {
        let id = Uuid::new_v4();
        let saved_to = self.save(id, record).await;
        tracing::debug!(session_id = %id, ?saved_to, "session created");
        id
    }

    pub async fn save(&self, id: Uuid, record: &SessionRecord) -> SavedTo {
        let key = shared_key(id);
        match self.shared.set(&key, record, self.ttl).await {
            StoreReply::Available(()) => {
                self.local.remove(&id.to_string());
                SavedTo::Shared
            }
            StoreReply::Unavailable => {
                metrics::record_fallback("session");
                self.local.put(&id.to_string(), record.clone());
                SavedTo::Local
            }
        }
    }

    /// Load a session, reconciling the tiers.
    ///
    /// A local copy only exists after a shared write failed, so it can be
    /// newer than the shared one. The copy with the higher revision wins;
    /// a winning local copy is written back to the shared tier when it
    /// answers.
    pub async fn load(&self, id: Uuid) -> Option<SessionRecord> {
        let local_key = id.to_string();
        let shared = self.shared.get::<SessionRecord>(&shared_key(id)).await;
        let local = self.local.get(&local_key);

        let (record, write_back) = match (shared, local) {
            (StoreReply::Available(Some(shared)), Some(local))
                if local.revision > shared.revision =>
            {
                (local, true)
            }
            (StoreReply::Available(Some(shared)), stale) => {
                if stale.is_some() {
                    self.local.remove(&local_key);
                }
                metrics::record_cache_hit("session", "shared");
                return Some(shared);
            }
            (StoreReply::Available(None), Some(local)) => (local, true),
            (StoreReply::Unavailable, Some(local)) => (local, false),
            (_, None) => {
                metrics::record_cache_miss("session");
                return None;
            }
        };

        metrics::record_cache_hit("session", "local");
        if write_back && self.save(id, &record).await == SavedTo::Shared {
            tracing::info!(
                session_id = %id,
                revision = record.revision,
                "local session copy written back to shared tier"
            );
        }
        Some(record)
    }

    /// Remove a session from both tiers. Returns whether either held it.
    pub async fn delete(&self, id: Uuid) -> bool {
        let shared = matches!(
            self.shared.delete(&shared_key(id)).await,
            StoreReply::Available(true)
        );
        let local = self.local.remove(&id.to_string());
        shared || local
    }

    /// Sessions visible to this process: shared keys (when reachable) plus
    /// local fallback entries.
    pub async fn active_count(&self) -> usize {
        let shared = self
            .shared
            .count_keys(SESSION_PREFIX)
            .await
            .available()
            .unwrap_or(0);
        shared + self.local.len()
    }

    pub fn sweep_target(&self) -> Arc<dyn Sweepable> {
        self.local.clone()
    }
}

fn shared_key(id: Uuid) -> String {
    format!("{SESSION_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryStore;
    use crate::clock::ManualClock;

    fn sessions(store: Arc<MemoryStore>, clock: Arc<ManualClock>) -> SessionStore {
        let shared = SharedCacheClient::new(
            store,
            Duration::from_millis(100),
            Duration::from_secs(60),
            clock.clone(),
        );
        SessionStore::new(shared, &CacheConfig::default(), clock)
    }

    #[tokio::test]
    async fn save_prefers_shared_and_drops_stale_local_copy() {
        let store = Arc::new(MemoryStore::new());
        let sessions = sessions(store.clone(), ManualClock::shared());
        let mut record = SessionRecord::new("Rock", "default");

        store.set_available(false);
        let id = sessions.create(&record).await;
        assert_eq!(sessions.active_count().await, 1);

        store.set_available(true);
        record.score = 3;
        assert_eq!(sessions.save(id, &record).await, SavedTo::Shared);
        assert_eq!(sessions.load(id).await.map(|r| r.score), Some(3));

        // The local copy is gone, so an outage now finds nothing stale.
        store.set_available(false);
        assert_eq!(sessions.load(id).await, None);
    }

    #[tokio::test]
    async fn local_session_expires_after_inactivity() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::shared();
        let sessions = sessions(store.clone(), clock.clone());
        store.set_available(false);

        let id = sessions.create(&SessionRecord::new("Rock", "default")).await;
        clock.advance(Duration::from_secs(6 * 24 * 3600));
        assert!(sessions.load(id).await.is_some());
        clock.advance(Duration::from_secs(6 * 24 * 3600));
        assert!(sessions.load(id).await.is_some());
        clock.advance(Duration::from_secs(7 * 24 * 3600));
        assert!(sessions.load(id).await.is_none());
    }

    #[tokio::test]
    async fn newer_local_copy_wins_and_is_written_back() {
        let store = Arc::new(MemoryStore::new());
        let sessions = sessions(store.clone(), ManualClock::shared());
        let mut record = SessionRecord::new("Rock", "default");
        let id = sessions.create(&record).await;

        store.set_available(false);
        record.apply_verdict("Feather", false, String::new());
        assert_eq!(sessions.save(id, &record).await, SavedTo::Local);

        store.set_available(true);
        assert_eq!(sessions.load(id).await, Some(record.clone()));

        // The shared tier now holds the finished game on its own.
        store.set_available(false);
        assert_eq!(sessions.load(id).await, None);
        store.set_available(true);
        assert_eq!(sessions.load(id).await, Some(record));
    }

    #[tokio::test]
    async fn stale_local_copy_loses_to_newer_shared_record() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::shared();
        let ours = sessions(store.clone(), clock.clone());
        let theirs = sessions(store.clone(), clock);
        let mut record = SessionRecord::new("Rock", "default");
        let id = ours.create(&record).await;

        store.set_available(false);
        record.apply_verdict("Paper", true, String::new());
        ours.save(id, &record).await;

        store.set_available(true);
        record.apply_verdict("Scissors", true, String::new());
        theirs.save(id, &record).await;

        assert_eq!(ours.load(id).await, Some(record));
        store.set_available(false);
        assert_eq!(ours.load(id).await, None);
    }

    #[tokio::test]
    async fn delete_clears_both_tiers() {
        let store = Arc::new(MemoryStore::new());
        let sessions = sessions(store.clone(), ManualClock::shared());
        let id = sessions.create(&SessionRecord::new("Rock", "default")).await;

        assert!(sessions.delete(id).await);
        assert!(sessions.load(id).await.is_none());
        assert!(!sessions.delete(id).await);
        assert_eq!(sessions.active_count().await, 0);
    }
}
