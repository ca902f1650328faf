//! Cache error types.

use std::fmt;

/// Cache operation errors.
#[derive(Debug)]
pub enum CacheError {
    /// Connection to a remote cache backend failed.
    Connection(String),
    /// The cache is full and refused the entry.
    CapacityExceeded(usize),
    /// Invalid cache configuration.
    Configuration(String),
    /// Internal cache error.
    Internal(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "cache connection error: {msg}"),
            Self::CapacityExceeded(max) => write!(f, "cache capacity of {max} entries exceeded"),
            Self::Configuration(msg) => write!(f, "cache configuration error: {msg}"),
            Self::Internal(msg) => write!(f, "internal cache error: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CacheError::CapacityExceeded(10);
        assert_eq!(err.to_string(), "cache capacity of 10 entries exceeded");

        let err = CacheError::Connection("refused".to_string());
        assert!(err.to_string().contains("refused"));
    }
}
