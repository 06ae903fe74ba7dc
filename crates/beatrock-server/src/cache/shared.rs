//! Shared (L2) cache client.
//!
//! [`SharedStore`] is the raw backend contract, implemented by
//! [`super::redis::RedisStore`] and [`super::memory::MemoryStore`].
//! [`SharedCacheClient`] wraps a backend with the operation timeout, typed
//! MessagePack payloads and log throttling, and reports every failure as
//! [`StoreReply::Unavailable`] so callers can fall back to the local tier.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::clock::SharedClock;
use crate::error::StoreError;

/// Outcome of a shared-store call.
///
/// `Available(None)` from a lookup means the key is absent, which is a
/// normal answer. `Unavailable` means the store could not answer at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreReply<T> {
    Available(T),
    Unavailable,
}

impl<T> StoreReply<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, StoreReply::Available(_))
    }

    pub fn available(self) -> Option<T> {
        match self {
            StoreReply::Available(v) => Some(v),
            StoreReply::Unavailable => None,
        }
    }
}

/// Raw key-value backend for the shared tier.
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically add one (absent counts as zero) and refresh the key's TTL.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError>;

    /// Atomically claim the next call slot on a spacing timestamp.
    ///
    /// The slot is `earliest_ms`, pushed back to `interval` after the slot
    /// already stored under `key`. The claimed slot is stored with `ttl` and
    /// returned, so two callers never claim the same one.
    async fn reserve_slot(
        &self,
        key: &str,
        earliest_ms: u64,
        interval: Duration,
        ttl: Duration,
    ) -> Result<u64, StoreError>;

    /// Current value of a counter written by `increment`; zero when absent.
    async fn counter(&self, key: &str) -> Result<u64, StoreError>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Number of keys starting with `prefix`.
    async fn count_keys(&self, prefix: &str) -> Result<usize, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Backend label for logs.
    fn mode(&self) -> &'static str;
}

/// Lets one warning through per window and counts the rest.
#[derive(Debug)]
pub struct LogThrottle {
    window: Duration,
    last_logged_ms: AtomicU64,
    suppressed: AtomicU64,
    clock: SharedClock,
}

impl LogThrottle {
    pub fn new(window: Duration, clock: SharedClock) -> Self {
        Self {
            window,
            last_logged_ms: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            clock,
        }
    }

    /// Returns `Some(suppressed_since_last)` when the caller may log now.
    pub fn admit(&self) -> Option<u64> {
        let now = self.clock.epoch_millis();
        let last = self.last_logged_ms.load(Ordering::Relaxed);
        let window_ms = self.window.as_millis() as u64;

        if last != 0 && now.saturating_sub(last) < window_ms {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        match self
            .last_logged_ms
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => Some(self.suppressed.swap(0, Ordering::Relaxed)),
            Err(_) => {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }
}

/// Client for the shared tier. Cheap to clone; clones share the backend and
/// the log throttle.
#[derive(Clone)]
pub struct SharedCacheClient {
    store: Option<Arc<dyn SharedStore>>,
    timeout: Duration,
    throttle: Arc<LogThrottle>,
}

impl std::fmt::Debug for SharedCacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCacheClient")
            .field("mode", &self.mode())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SharedCacheClient {
    pub fn new(
        store: Arc<dyn SharedStore>,
        timeout: Duration,
        log_window: Duration,
        clock: SharedClock,
    ) -> Self {
        Self {
            store: Some(store),
            timeout,
            throttle: Arc::new(LogThrottle::new(log_window, clock)),
        }
    }

    /// A client with no backend. Every call answers `Unavailable` without
    /// logging.
    pub fn disabled(clock: SharedClock) -> Self {
        Self {
            store: None,
            timeout: Duration::ZERO,
            throttle: Arc::new(LogThrottle::new(Duration::ZERO, clock)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn mode(&self) -> &'static str {
        self.store.as_ref().map_or("disabled", |s| s.mode())
    }

    /// Look up and decode a value.
    ///
    /// An undecodable payload is logged and reported as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreReply<Option<T>> {
        let Some(store) = &self.store else {
            return StoreReply::Unavailable;
        };
        match self.guard("GET", key, store.get(key)).await {
            StoreReply::Available(Some(bytes)) => match rmp_serde::from_slice::<T>(&bytes) {
                Ok(value) => StoreReply::Available(Some(value)),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "failed to decode shared cache payload");
                    StoreReply::Available(None)
                }
            },
            StoreReply::Available(None) => StoreReply::Available(None),
            StoreReply::Unavailable => StoreReply::Unavailable,
        }
    }

    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> StoreReply<()> {
        let Some(store) = &self.store else {
            return StoreReply::Unavailable;
        };
        let bytes = match rmp_serde::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.report("SET", key, StoreError::Codec(e.to_string()));
                return StoreReply::Unavailable;
            }
        };
        self.guard("SET", key, store.set(key, bytes, ttl)).await
    }

    pub async fn increment(&self, key: &str, ttl: Duration) -> StoreReply<u64> {
        let Some(store) = &self.store else {
            return StoreReply::Unavailable;
        };
        self.guard("INCR", key, store.increment(key, ttl)).await
    }

    pub async fn reserve_slot(
        &self,
        key: &str,
        earliest_ms: u64,
        interval: Duration,
        ttl: Duration,
    ) -> StoreReply<u64> {
        let Some(store) = &self.store else {
            return StoreReply::Unavailable;
        };
        self.guard("RESERVE", key, store.reserve_slot(key, earliest_ms, interval, ttl))
            .await
    }

    pub async fn counter(&self, key: &str) -> StoreReply<u64> {
        let Some(store) = &self.store else {
            return StoreReply::Unavailable;
        };
        self.guard("GET", key, store.counter(key)).await
    }

    pub async fn delete(&self, key: &str) -> StoreReply<bool> {
        let Some(store) = &self.store else {
            return StoreReply::Unavailable;
        };
        self.guard("DEL", key, store.delete(key)).await
    }

    pub async fn count_keys(&self, prefix: &str) -> StoreReply<usize> {
        let Some(store) = &self.store else {
            return StoreReply::Unavailable;
        };
        self.guard("SCAN", prefix, store.count_keys(prefix)).await
    }

    pub async fn ping(&self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        self.guard("PING", "", store.ping()).await.is_available()
    }

    async fn guard<T>(
        &self,
        op: &'static str,
        key: &str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> StoreReply<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => StoreReply::Available(value),
            Ok(Err(e)) => {
                self.report(op, key, e);
                StoreReply::Unavailable
            }
            Err(_) => {
                self.report(op, key, StoreError::Timeout(self.timeout));
                StoreReply::Unavailable
            }
        }
    }

    fn report(&self, op: &'static str, key: &str, error: StoreError) {
        crate::metrics::record_shared_failure(op);
        if error.is_connectivity() {
            if let Some(suppressed) = self.throttle.admit() {
                tracing::warn!(
                    op,
                    key = %key,
                    error = %error,
                    suppressed,
                    "shared cache unavailable, using local fallback"
                );
            }
        } else {
            tracing::error!(op, key = %key, error = %error, "shared cache error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryStore;
    use crate::clock::ManualClock;

    fn client(store: Arc<MemoryStore>, clock: Arc<ManualClock>) -> SharedCacheClient {
        SharedCacheClient::new(
            store,
            Duration::from_millis(50),
            Duration::from_secs(60),
            clock,
        )
    }

    #[tokio::test]
    async fn typed_round_trip_and_absent() {
        let store = Arc::new(MemoryStore::new());
        let client = client(store, ManualClock::shared());

        assert_eq!(
            client.set("k", &vec!["a".to_string(), "b".to_string()], Duration::from_secs(60)).await,
            StoreReply::Available(())
        );
        assert_eq!(
            client.get::<Vec<String>>("k").await,
            StoreReply::Available(Some(vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(client.get::<bool>("missing").await, StoreReply::Available(None));
    }

    #[tokio::test]
    async fn undecodable_payload_reads_as_absent() {
        let store = Arc::new(MemoryStore::new());
        let client = client(store, ManualClock::shared());

        client.set("k", "not a bool", Duration::from_secs(60)).await;
        assert_eq!(client.get::<bool>("k").await, StoreReply::Available(None));
    }

    #[tokio::test]
    async fn outage_is_unavailable_not_absent() {
        let store = Arc::new(MemoryStore::new());
        let client = client(store.clone(), ManualClock::shared());
        client.set("k", &true, Duration::from_secs(60)).await;

        store.set_available(false);
        assert_eq!(client.get::<bool>("k").await, StoreReply::Unavailable);
        assert_eq!(client.increment("n", Duration::from_secs(60)).await, StoreReply::Unavailable);
        assert_eq!(
            client
                .reserve_slot("t", 1_000, Duration::from_millis(500), Duration::from_secs(60))
                .await,
            StoreReply::Unavailable
        );
        assert!(!client.ping().await);

        store.set_available(true);
        assert_eq!(client.get::<bool>("k").await, StoreReply::Available(Some(true)));
        assert!(client.ping().await);
    }

    #[tokio::test]
    async fn stalled_store_times_out() {
        let store = Arc::new(MemoryStore::new());
        let client = client(store.clone(), ManualClock::shared());
        store.set_stalled(true);

        let started = std::time::Instant::now();
        assert_eq!(client.get::<bool>("k").await, StoreReply::Unavailable);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn disabled_client_is_always_unavailable() {
        let client = SharedCacheClient::disabled(ManualClock::shared());
        assert!(!client.is_enabled());
        assert_eq!(client.mode(), "disabled");
        assert_eq!(client.counter("n").await, StoreReply::Unavailable);
        assert!(!client.ping().await);
    }

    #[test]
    fn throttle_admits_once_per_window() {
        let clock = ManualClock::shared();
        let throttle = LogThrottle::new(Duration::from_secs(60), clock.clone());

        assert_eq!(throttle.admit(), Some(0));
        assert_eq!(throttle.admit(), None);
        assert_eq!(throttle.admit(), None);

        clock.advance(Duration::from_secs(59));
        assert_eq!(throttle.admit(), None);

        clock.advance(Duration::from_secs(1));
        assert_eq!(throttle.admit(), Some(3));
        assert_eq!(throttle.admit(), None);
    }
}
