//! # eidas-cache
//!
//! Shared key-value stores used by the eIDAS node.
//!
//! - [`CorrelationMap`] - request id to stored request, consumed once
//! - [`ReplayCache`] - atomic check-and-insert of (request id, country)
//!
//! The node only depends on the traits; [`memory`] provides the in-process
//! implementations used by the server and the tests.
//!
//! ## Example
//!
//! ```
//! use eidas_cache::{InMemoryReplayCache, ReplayCache};
//!
//! let cache = InMemoryReplayCache::default();
//! assert!(cache.check_and_insert("_abc", "CA").unwrap());
//! assert!(!cache.check_and_insert("_abc", "CA").unwrap());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod memory;
pub mod provider;

pub use error::{CacheError, CacheResult};
pub use memory::{InMemoryCorrelationMap, InMemoryReplayCache, DEFAULT_TTL};
pub use provider::{CorrelationMap, ReplayCache};
