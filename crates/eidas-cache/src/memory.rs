//! In-process implementations backed by `DashMap`.
//!
//! Each shard lock makes the `entry` API atomic per key, which is what gives
//! the replay cache its check-and-insert guarantee.
//!
//! Writes sweep expired entries at most once per sweep interval.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{CacheError, CacheResult};
use crate::provider::{CorrelationMap, ReplayCache};

/// Default lifetime of correlation and replay entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Lower bound of the default sweep interval.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Schedules the sweeps triggered by writes.
#[derive(Debug)]
struct Sweeper {
    interval: Duration,
    next: Mutex<Instant>,
}

impl Sweeper {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Mutex::new(Instant::now() + interval),
        }
    }

    /// Returns true at most once per interval; concurrent callers skip.
    fn due(&self, now: Instant) -> bool {
        let Some(mut next) = self.next.try_lock() else {
            return false;
        };
        if now < *next {
            return false;
        }
        *next = now + self.interval;
        true
    }
}

#[derive(Debug, Clone)]
struct Expiring<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Expiring<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Correlation map held in process memory.
#[derive(Debug)]
pub struct InMemoryCorrelationMap<V> {
    entries: DashMap<String, Expiring<V>>,
    ttl: Duration,
    max_entries: Option<usize>,
    sweeper: Sweeper,
}

impl<V> Default for InMemoryCorrelationMap<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<V> InMemoryCorrelationMap<V> {
    /// Creates a map whose entries live for `ttl`.
    ///
    /// Expired entries are swept every `ttl`, and at most once a second.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: None,
            sweeper: Sweeper::new(ttl.max(MIN_SWEEP_INTERVAL)),
        }
    }

    /// Sets how often writes sweep expired entries.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweeper = Sweeper::new(interval);
        self
    }

    /// Caps the number of stored entries.
    #[must_use]
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Number of entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            tracing::debug!(purged, "purged expired correlation entries");
        }
        purged
    }
}

impl<V> CorrelationMap<V> for InMemoryCorrelationMap<V>
where
    V: Clone + Send + Sync,
{
    fn put(&self, id: &str, value: V) -> CacheResult<()> {
        if self.sweeper.due(Instant::now()) {
            self.purge_expired();
        }
        if let Some(max) = self.max_entries {
            if self.entries.len() >= max && !self.entries.contains_key(id) {
                self.purge_expired();
                if self.entries.len() >= max {
                    return Err(CacheError::CapacityExceeded(max));
                }
            }
        }

        self.entries.insert(
            id.to_string(),
            Expiring {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    fn get(&self, id: &str) -> CacheResult<Option<V>> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    fn remove(&self, id: &str) -> CacheResult<Option<V>> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(id)
            .map(|(_, entry)| entry)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }
}

/// Replay cache held in process memory.
#[derive(Debug)]
pub struct InMemoryReplayCache {
    seen: DashMap<(String, String), Instant>,
    ttl: Duration,
    sweeper: Sweeper,
}

impl Default for InMemoryReplayCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl InMemoryReplayCache {
    /// Creates a cache remembering pairs for `ttl`.
    ///
    /// Expired pairs are swept every `ttl`, and at most once a second.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            ttl,
            sweeper: Sweeper::new(ttl.max(MIN_SWEEP_INTERVAL)),
        }
    }

    /// Sets how often writes sweep expired pairs.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweeper = Sweeper::new(interval);
        self
    }

    /// Number of remembered pairs, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true if no pairs are remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forgets expired pairs and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.seen.len();
        self.seen.retain(|_, expires_at| *expires_at > now);
        let purged = before.saturating_sub(self.seen.len());
        if purged > 0 {
            tracing::debug!(purged, "purged expired replay entries");
        }
        purged
    }
}

impl ReplayCache for InMemoryReplayCache {
    fn check_and_insert(&self, id: &str, country_code: &str) -> CacheResult<bool> {
        let now = Instant::now();
        if self.sweeper.due(now) {
            self.purge_expired();
        }
        let expires_at = now + self.ttl;

        match self.seen.entry((id.to_string(), country_code.to_string())) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() > now {
                    return Ok(false);
                }
                occupied.insert(expires_at);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(expires_at);
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    };
    use std::thread;

    use super::*;

    #[test]
    fn correlation_put_get_remove() {
        let map = InMemoryCorrelationMap::default();
        map.put("_req1", "state".to_string()).unwrap();

        assert_eq!(map.get("_req1").unwrap().as_deref(), Some("state"));
        assert_eq!(map.remove("_req1").unwrap().as_deref(), Some("state"));
        assert!(map.remove("_req1").unwrap().is_none());
        assert!(map.get("_req1").unwrap().is_none());
    }

    #[test]
    fn correlation_expired_entry_is_absent() {
        let map = InMemoryCorrelationMap::new(Duration::ZERO);
        map.put("_req1", 1u32).unwrap();

        assert!(map.get("_req1").unwrap().is_none());
        assert!(map.remove("_req1").unwrap().is_none());
    }

    #[test]
    fn correlation_purge_removes_expired() {
        let map = InMemoryCorrelationMap::new(Duration::ZERO);
        map.put("a", 1u32).unwrap();
        map.put("b", 2u32).unwrap();

        assert_eq!(map.purge_expired(), 2);
        assert!(map.is_empty());
    }

    #[test]
    fn correlation_writes_sweep_abandoned_entries() {
        let map = InMemoryCorrelationMap::new(Duration::from_millis(50))
            .with_sweep_interval(Duration::from_millis(20));
        map.put("a", 1u32).unwrap();
        map.put("b", 2u32).unwrap();
        assert_eq!(map.len(), 2);

        thread::sleep(Duration::from_millis(80));
        map.put("c", 3u32).unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("c").unwrap(), Some(3));
    }

    #[test]
    fn correlation_capacity_is_enforced() {
        let map = InMemoryCorrelationMap::default().with_max_entries(1);
        map.put("a", 1u32).unwrap();
        map.put("a", 2u32).unwrap();

        let err = map.put("b", 3u32).unwrap_err();
        assert!(matches!(err, CacheError::CapacityExceeded(1)));
    }

    #[test]
    fn correlation_remove_once_under_contention() {
        let map = Arc::new(InMemoryCorrelationMap::default());
        map.put("_req", 7u32).unwrap();

        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let map = Arc::clone(&map);
                let winners = Arc::clone(&winners);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    if map.remove("_req").unwrap().is_some() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn replay_second_insert_is_rejected() {
        let cache = InMemoryReplayCache::default();

        assert!(cache.check_and_insert("_id", "CA").unwrap());
        assert!(!cache.check_and_insert("_id", "CA").unwrap());
    }

    #[test]
    fn replay_key_includes_country() {
        let cache = InMemoryReplayCache::default();

        assert!(cache.check_and_insert("_id", "CA").unwrap());
        assert!(cache.check_and_insert("_id", "CB").unwrap());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn replay_expired_pair_is_accepted_again() {
        let cache = InMemoryReplayCache::new(Duration::ZERO);

        assert!(cache.check_and_insert("_id", "CA").unwrap());
        assert!(cache.check_and_insert("_id", "CA").unwrap());
        assert_eq!(cache.purge_expired(), 1);
    }

    #[test]
    fn replay_writes_sweep_expired_pairs() {
        let cache = InMemoryReplayCache::new(Duration::from_millis(50))
            .with_sweep_interval(Duration::from_millis(20));
        assert!(cache.check_and_insert("_a", "CA").unwrap());
        assert!(cache.check_and_insert("_b", "CA").unwrap());
        assert_eq!(cache.len(), 2);

        thread::sleep(Duration::from_millis(80));
        assert!(cache.check_and_insert("_c", "CA").unwrap());

        assert_eq!(cache.len(), 1);
        assert!(!cache.check_and_insert("_c", "CA").unwrap());
    }

    #[test]
    fn replay_exactly_one_concurrent_winner() {
        let cache = Arc::new(InMemoryReplayCache::default());
        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let winners = Arc::clone(&winners);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    if cache.check_and_insert("_dup", "CA").unwrap() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
