//! Cache provider traits.

use crate::error::CacheResult;

/// Key-value store binding a request id to the state saved when the request
/// was forwarded.
///
/// Implementations must be thread-safe. Entries expire after an
/// implementation-defined TTL; an expired entry behaves as absent.
pub trait CorrelationMap<V>: Send + Sync {
    /// Stores a value, replacing any previous value under the same id.
    fn put(&self, id: &str, value: V) -> CacheResult<()>;

    /// Returns a copy of the value stored under `id`.
    ///
    /// Returns `None` if the id is unknown or the entry has expired.
    fn get(&self, id: &str) -> CacheResult<Option<V>>;

    /// Removes and returns the value stored under `id`.
    ///
    /// At most one caller observes `Some` for a given stored value, even
    /// under concurrent removal.
    fn remove(&self, id: &str) -> CacheResult<Option<V>>;
}

/// Set of already-processed (request id, country code) pairs.
pub trait ReplayCache: Send + Sync {
    /// Atomically checks whether the pair was seen before and records it.
    ///
    /// Returns `true` if this call is the first to see the pair. When the
    /// same pair is submitted concurrently, exactly one caller gets `true`.
    fn check_and_insert(&self, id: &str, country_code: &str) -> CacheResult<bool>;
}
