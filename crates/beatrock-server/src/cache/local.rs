//! Local (L1) fallback tier.
//!
//! A TTL map per data category. The façade and the session store write here
//! independently of the shared tier; reads only happen when the shared tier
//! cannot answer. Expired entries are dropped lazily on read, by an
//! opportunistic sweep every `sweep_every` mutations, and by the background
//! [`super::sweeper::Sweeper`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::sweeper::Sweepable;
use crate::clock::SharedClock;

#[derive(Debug, Clone)]
struct LocalEntry<V> {
    value: V,
    touched_at: Instant,
}

/// Point-in-time counters for one local map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalStats {
    pub entries: usize,
    pub evictions: u64,
    pub mutations: u64,
}

#[derive(Debug)]
pub struct LocalStore<V> {
    name: &'static str,
    entries: DashMap<String, LocalEntry<V>>,
    ttl: Duration,
    sweep_every: u64,
    refresh_on_read: bool,
    mutations: AtomicU64,
    evictions: AtomicU64,
    clock: SharedClock,
}

impl<V: Clone> LocalStore<V> {
    pub fn new(name: &'static str, ttl: Duration, sweep_every: u64, clock: SharedClock) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            ttl,
            sweep_every: sweep_every.max(1),
            refresh_on_read: false,
            mutations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            clock,
        }
    }

    /// Measure the TTL from the last successful read instead of the last
    /// write.
    pub fn with_refresh_on_read(mut self) -> Self {
        self.refresh_on_read = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn put(&self, key: &str, value: V) {
        let touched_at = self.clock.now();
        self.entries
            .insert(key.to_string(), LocalEntry { value, touched_at });
        self.note_mutation();
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entry = self.entries.get_mut(key)?;
        if self.is_expired(entry.touched_at, now) {
            drop(entry);
            if self
                .entries
                .remove_if(key, |_, e| self.is_expired(e.touched_at, now))
                .is_some()
            {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
            return None;
        }
        if self.refresh_on_read {
            entry.touched_at = now;
        }
        Some(entry.value.clone())
    }

    pub fn remove(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.note_mutation();
        }
        removed
    }

    /// Drop every entry older than the TTL; returns how many were removed.
    pub fn remove_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, e| {
            let keep = !self.is_expired(e.touched_at, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            tracing::debug!(store = self.name, removed, "removed expired local entries");
        }
        removed
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> LocalStats {
        LocalStats {
            entries: self.entries.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
            mutations: self.mutations.load(Ordering::Relaxed),
        }
    }

    fn is_expired(&self, touched_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(touched_at) >= self.ttl
    }

    // Callers must not hold a map guard here; the sweep takes every shard.
    fn note_mutation(&self) {
        let n = self.mutations.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.sweep_every == 0 {
            self.remove_expired();
        }
    }
}

impl LocalStore<u64> {
    /// Add one to a local counter. An expired counter restarts from zero.
    pub fn increment(&self, key: &str) -> u64 {
        let now = self.clock.now();
        let next = {
            let mut entry = self.entries.entry(key.to_string()).or_insert(LocalEntry {
                value: 0,
                touched_at: now,
            });
            if self.is_expired(entry.touched_at, now) {
                entry.value = 0;
            }
            entry.value += 1;
            entry.touched_at = now;
            entry.value
        };
        self.note_mutation();
        next
    }

    /// Mirror a value read from the shared tier.
    pub fn overwrite(&self, key: &str, value: u64) {
        self.put(key, value);
    }
}

impl<V: Clone + Send + Sync> Sweepable for LocalStore<V> {
    fn name(&self) -> &str {
        self.name
    }

    fn remove_expired(&self) -> usize {
        LocalStore::remove_expired(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;
    use crate::clock::ManualClock;

    const HOUR: Duration = Duration::from_secs(3600);

    fn store(clock: &Arc<ManualClock>) -> LocalStore<bool> {
        LocalStore::new("verdicts", HOUR, 100, clock.clone())
    }

    #[test]
    fn get_honors_ttl() {
        let clock = ManualClock::shared();
        let store = store(&clock);
        store.put("a", true);

        clock.advance(HOUR - Duration::from_secs(1));
        assert_eq!(store.get("a"), Some(true));

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.get("a"), None);
        assert!(store.is_empty());
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn refresh_on_read_extends_lifetime() {
        let clock = ManualClock::shared();
        let store = LocalStore::new("sessions", HOUR, 100, clock.clone()).with_refresh_on_read();
        store.put("s", 7u32);

        clock.advance(HOUR / 2);
        assert_eq!(store.get("s"), Some(7));
        clock.advance(HOUR / 2 + Duration::from_secs(60));
        assert_eq!(store.get("s"), Some(7));
        clock.advance(HOUR);
        assert_eq!(store.get("s"), None);
    }

    #[test]
    fn remove_expired_counts_removals() {
        let clock = ManualClock::shared();
        let store = store(&clock);
        store.put("old-1", true);
        store.put("old-2", false);
        clock.advance(HOUR);
        store.put("fresh", true);

        assert_eq!(store.remove_expired(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("fresh"), Some(true));
    }

    #[test]
    fn every_nth_mutation_sweeps() {
        let clock = ManualClock::shared();
        let store: LocalStore<bool> = LocalStore::new("verdicts", HOUR, 3, clock.clone());
        store.put("a", true);
        store.put("b", true);
        clock.advance(HOUR);

        // Third mutation triggers the sweep, which also sees the new entry
        // as fresh.
        store.put("c", true);
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().mutations, 3);
    }

    #[test]
    fn counters_increment_and_restart_after_expiry() {
        let clock = ManualClock::shared();
        let counters: LocalStore<u64> = LocalStore::new("counters", HOUR, 100, clock.clone());
        assert_eq!(counters.increment("rock"), 1);
        assert_eq!(counters.increment("rock"), 2);

        counters.overwrite("rock", 40);
        assert_eq!(counters.increment("rock"), 41);

        clock.advance(HOUR);
        assert_eq!(counters.increment("rock"), 1);
    }

    proptest! {
        #[test]
        fn expired_entries_are_never_returned(
            ages in proptest::collection::vec(0u64..7200, 1..20),
        ) {
            let clock = ManualClock::shared();
            let store: LocalStore<u64> = LocalStore::new("p", HOUR, 5, clock.clone());
            let mut written = Vec::new();
            for (i, step) in ages.iter().enumerate() {
                let key = format!("k{i}");
                store.put(&key, i as u64);
                written.push((key, clock.elapsed()));
                clock.advance(Duration::from_secs(*step));
            }
            let now = clock.elapsed();
            for (key, at) in &written {
                let fresh = now - *at < HOUR;
                prop_assert_eq!(store.get(key).is_some(), fresh);
            }
        }
    }
}
