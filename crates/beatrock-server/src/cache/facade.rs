//! Two-tier access to verdicts and usage counters.

use std::sync::Arc;
use std::time::Duration;

use beatrock_core::{CounterKey, VerdictKey};

use super::local::LocalStore;
use super::shared::{SharedCacheClient, StoreReply};
use super::sweeper::Sweepable;
use crate::clock::SharedClock;
use crate::config::CacheConfig;
use crate::metrics;

const VERDICT_PREFIX: &str = "verdict:";
const COUNT_PREFIX: &str = "count:";
const PAIR_COUNT_PREFIX: &str = "pair_count:";

/// Verdict and counter cache over the shared tier with a local fallback.
///
/// Verdicts are written to both tiers and read shared-first. Counters treat
/// the shared value as authoritative whenever the shared tier answers; the
/// local map mirrors it and keeps counting for this process during an
/// outage. Local counts are never merged back.
#[derive(Debug, Clone)]
pub struct CacheFacade {
    shared: SharedCacheClient,
    verdicts: Arc<LocalStore<bool>>,
    counters: Arc<LocalStore<u64>>,
    ttl: Duration,
}

impl CacheFacade {
    pub fn new(shared: SharedCacheClient, config: &CacheConfig, clock: SharedClock) -> Self {
        let ttl = Duration::from_secs(config.verdict_ttl_secs);
        Self {
            shared,
            verdicts: Arc::new(LocalStore::new(
                "verdicts",
                ttl,
                config.sweep_every_ops,
                clock.clone(),
            )),
            counters: Arc::new(LocalStore::new(
                "counters",
                ttl,
                config.sweep_every_ops,
                clock,
            )),
            ttl,
        }
    }

    pub async fn get_verdict(&self, key: &VerdictKey) -> Option<bool> {
        let local_key = key.to_string();
        match self.shared.get::<bool>(&shared_verdict_key(key)).await {
            StoreReply::Available(Some(beats)) => {
                self.verdicts.put(&local_key, beats);
                metrics::record_cache_hit("verdict", "shared");
                return Some(beats);
            }
            StoreReply::Available(None) => {}
            StoreReply::Unavailable => metrics::record_fallback("verdict"),
        }

        match self.verdicts.get(&local_key) {
            Some(beats) => {
                metrics::record_cache_hit("verdict", "local");
                Some(beats)
            }
            None => {
                metrics::record_cache_miss("verdict");
                None
            }
        }
    }

    pub async fn save_verdict(&self, key: &VerdictKey, beats: bool) {
        let reply = self
            .shared
            .set(&shared_verdict_key(key), &beats, self.ttl)
            .await;
        if !reply.is_available() {
            tracing::debug!(key = %key, "verdict kept in local tier only");
        }
        self.verdicts.put(&key.to_string(), beats);
    }

    pub async fn get_count(&self, key: &CounterKey) -> u64 {
        let local_key = local_counter_key(key);
        match self.shared.counter(&shared_counter_key(key)).await {
            StoreReply::Available(count) if count > 0 => {
                self.counters.overwrite(&local_key, count);
                count
            }
            StoreReply::Available(_) => self.counters.get(&local_key).unwrap_or(0),
            StoreReply::Unavailable => {
                metrics::record_fallback("counter");
                self.counters.get(&local_key).unwrap_or(0)
            }
        }
    }

    /// Add one and return the new count.
    pub async fn increment(&self, key: &CounterKey) -> u64 {
        let local_key = local_counter_key(key);
        match self.shared.increment(&shared_counter_key(key), self.ttl).await {
            StoreReply::Available(count) => {
                self.counters.overwrite(&local_key, count);
                count
            }
            StoreReply::Unavailable => {
                metrics::record_fallback("counter");
                self.counters.increment(&local_key)
            }
        }
    }

    pub fn sweep_targets(&self) -> Vec<Arc<dyn Sweepable>> {
        vec![
            self.verdicts.clone() as Arc<dyn Sweepable>,
            self.counters.clone() as Arc<dyn Sweepable>,
        ]
    }
}

fn shared_verdict_key(key: &VerdictKey) -> String {
    format!("{VERDICT_PREFIX}{key}")
}

fn shared_counter_key(key: &CounterKey) -> String {
    match key {
        CounterKey::Word(_) => format!("{COUNT_PREFIX}{key}"),
        CounterKey::Pair { .. } => format!("{PAIR_COUNT_PREFIX}{key}"),
    }
}

// Word and pair counters share one local map, so the local key keeps the
// category.
fn local_counter_key(key: &CounterKey) -> String {
    match key {
        CounterKey::Word(_) => format!("w:{key}"),
        CounterKey::Pair { .. } => format!("p:{key}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryStore;
    use crate::clock::ManualClock;

    fn facade(store: Arc<MemoryStore>, clock: Arc<ManualClock>) -> CacheFacade {
        let shared = SharedCacheClient::new(
            store,
            Duration::from_millis(100),
            Duration::from_secs(60),
            clock.clone(),
        );
        CacheFacade::new(shared, &CacheConfig::default(), clock)
    }

    #[test]
    fn shared_keys_follow_layout() {
        assert_eq!(
            shared_verdict_key(&VerdictKey::new("Rock", "Paper")),
            "verdict:rock:paper"
        );
        assert_eq!(shared_counter_key(&CounterKey::word("Paper")), "count:paper");
        assert_eq!(
            shared_counter_key(&CounterKey::pair("Rock", "Paper")),
            "pair_count:rock:paper"
        );
    }

    #[tokio::test]
    async fn verdict_written_during_outage_survives_recovery() {
        let store = Arc::new(MemoryStore::new());
        let cache = facade(store.clone(), ManualClock::shared());
        let key = VerdictKey::new("rock", "paper");

        store.set_available(false);
        cache.save_verdict(&key, true).await;
        assert_eq!(cache.get_verdict(&key).await, Some(true));

        // Shared tier is back but never saw the write; local still answers.
        store.set_available(true);
        assert_eq!(cache.get_verdict(&key).await, Some(true));
    }

    #[tokio::test]
    async fn shared_hit_refreshes_local_copy() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::shared();
        let cache = facade(store.clone(), clock.clone());
        let key = VerdictKey::new("rock", "paper");
        cache.save_verdict(&key, true).await;

        clock.advance(Duration::from_secs(23 * 3600));
        assert_eq!(cache.get_verdict(&key).await, Some(true));

        // Two hours later the original local write would have expired.
        clock.advance(Duration::from_secs(2 * 3600));
        store.set_available(false);
        assert_eq!(cache.get_verdict(&key).await, Some(true));
    }

    #[tokio::test]
    async fn local_verdict_expires_after_ttl() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::shared();
        let cache = facade(store.clone(), clock.clone());
        store.set_available(false);

        let key = VerdictKey::new("rock", "paper");
        cache.save_verdict(&key, false).await;
        clock.advance(Duration::from_secs(24 * 3600));
        assert_eq!(cache.get_verdict(&key).await, None);
    }

    #[tokio::test]
    async fn shared_count_is_mirrored_locally() {
        let store = Arc::new(MemoryStore::new());
        let cache = facade(store.clone(), ManualClock::shared());
        let key = CounterKey::word("paper");

        for _ in 0..3 {
            cache.increment(&key).await;
        }
        assert_eq!(cache.get_count(&key).await, 3);

        store.set_available(false);
        assert_eq!(cache.get_count(&key).await, 3);
        assert_eq!(cache.increment(&key).await, 4);
    }

    #[tokio::test]
    async fn word_and_pair_counters_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let cache = facade(store.clone(), ManualClock::shared());
        store.set_available(false);

        cache.increment(&CounterKey::word("rock:paper")).await;
        assert_eq!(cache.get_count(&CounterKey::pair("rock", "paper")).await, 0);
    }
}
