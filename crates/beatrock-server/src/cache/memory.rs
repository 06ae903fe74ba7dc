//! In-process [`SharedStore`] for single-instance runs and tests.
//!
//! Behaves like the Redis backend (TTL expiry, integer counters, prefix
//! counting) and can be switched into an outage or a stall to exercise the
//! fallback paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::shared::SharedStore;
use crate::error::StoreError;

#[derive(Debug, Clone)]
enum Stored {
    Bytes(Vec<u8>),
    Counter(u64),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Stored,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Slot>,
    unavailable: AtomicBool,
    stalled: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Make every call hang until the switch is turned off again.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn check(&self) -> Result<(), StoreError> {
        while self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }

    fn live(&self, key: &str) -> Option<Stored> {
        let now = Instant::now();
        let slot = self.entries.get(key)?;
        if slot.expires_at > now {
            return Some(slot.value.clone());
        }
        drop(slot);
        self.entries.remove_if(key, |_, slot| slot.expires_at <= now);
        None
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check().await?;
        match self.live(key) {
            Some(Stored::Bytes(bytes)) => Ok(Some(bytes)),
            Some(Stored::Counter(n)) => Ok(Some(n.to_string().into_bytes())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        self.check().await?;
        self.entries.insert(
            key.to_string(),
            Slot {
                value: Stored::Bytes(value),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        self.check().await?;
        let now = Instant::now();
        let mut slot = self.entries.entry(key.to_string()).or_insert(Slot {
            value: Stored::Counter(0),
            expires_at: now + ttl,
        });
        if slot.expires_at <= now {
            slot.value = Stored::Counter(0);
        }
        let next = match slot.value {
            Stored::Counter(n) => n + 1,
            Stored::Bytes(_) => {
                return Err(StoreError::Backend(
                    "WRONGTYPE value is not an integer".into(),
                ));
            }
        };
        slot.value = Stored::Counter(next);
        slot.expires_at = now + ttl;
        Ok(next)
    }

    async fn reserve_slot(
        &self,
        key: &str,
        earliest_ms: u64,
        interval: Duration,
        ttl: Duration,
    ) -> Result<u64, StoreError> {
        self.check().await?;
        let now = Instant::now();
        let mut slot = self.entries.entry(key.to_string()).or_insert(Slot {
            value: Stored::Counter(0),
            expires_at: now + ttl,
        });
        if slot.expires_at <= now {
            slot.value = Stored::Counter(0);
        }
        let reserved = match slot.value {
            Stored::Counter(0) => earliest_ms,
            Stored::Counter(last) => earliest_ms.max(last + interval.as_millis() as u64),
            Stored::Bytes(_) => {
                return Err(StoreError::Backend(
                    "WRONGTYPE value is not an integer".into(),
                ));
            }
        };
        slot.value = Stored::Counter(reserved);
        slot.expires_at = now + ttl;
        Ok(reserved)
    }

    async fn counter(&self, key: &str) -> Result<u64, StoreError> {
        self.check().await?;
        match self.live(key) {
            Some(Stored::Counter(n)) => Ok(n),
            Some(Stored::Bytes(_)) => Err(StoreError::Backend(
                "WRONGTYPE value is not an integer".into(),
            )),
            None => Ok(0),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check().await?;
        Ok(self.entries.remove(key).is_some())
    }

    async fn count_keys(&self, prefix: &str) -> Result<usize, StoreError> {
        self.check().await?;
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && e.value().expires_at > now)
            .count())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check().await
    }

    fn mode(&self) -> &'static str {
        "memory"
    }
}
