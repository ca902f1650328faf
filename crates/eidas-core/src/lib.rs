//! # eidas-core
//!
//! Configuration, error catalog and core error type shared by the eIDAS
//! node crates.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{CatalogEntry, ErrorCatalog, ErrorKey};
pub use config::{CacheConfig, NodeConfig, SignatureConfig};
pub use error::{Error, Result};
