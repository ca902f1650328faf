//! Crypto error types.

use thiserror::Error;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Error type for cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Verification could not be carried out.
    #[error("signature verification failed")]
    Verification,

    /// Invalid key material.
    #[error("invalid key format: {0}")]
    InvalidKey(String),

    /// Algorithm not usable for the requested operation.
    #[error("algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_error_is_generic() {
        let error = CryptoError::Verification;
        assert_eq!(error.to_string(), "signature verification failed");
    }

    #[test]
    fn invalid_key_carries_reason() {
        let error = CryptoError::InvalidKey("truncated".to_string());
        assert!(error.to_string().contains("truncated"));
    }
}
