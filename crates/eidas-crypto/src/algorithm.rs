//! Algorithm identifiers.
//!
//! XML-DSig names algorithms by URI; these enums are the typed side of those
//! URIs and carry the facts the signer and validator need (output length,
//! digest pairing, whether the algorithm may be used for new signatures).

use serde::{Deserialize, Serialize};

/// Message digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-1 (verification of legacy material only).
    #[serde(rename = "SHA1")]
    Sha1,

    /// SHA-256.
    #[serde(rename = "SHA256")]
    Sha256,

    /// SHA-384.
    #[serde(rename = "SHA384")]
    Sha384,

    /// SHA-512.
    #[serde(rename = "SHA512")]
    Sha512,
}

impl DigestAlgorithm {
    /// Returns the output length in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Returns the output length in bits.
    #[must_use]
    pub const fn bits(self) -> usize {
        self.output_len() * 8
    }

    /// Returns the algorithm name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }
}

/// RSA PKCS#1 v1.5 signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RsaAlgorithm {
    /// RSA with SHA-1. Accepted for verification only.
    #[serde(rename = "RS1")]
    Sha1,

    /// RSA with SHA-256.
    #[serde(rename = "RS256")]
    Sha256,

    /// RSA with SHA-384.
    #[serde(rename = "RS384")]
    Sha384,

    /// RSA with SHA-512.
    #[serde(rename = "RS512")]
    Sha512,
}

impl RsaAlgorithm {
    /// Returns the digest paired with this signature algorithm.
    #[must_use]
    pub const fn digest(self) -> DigestAlgorithm {
        match self {
            Self::Sha1 => DigestAlgorithm::Sha1,
            Self::Sha256 => DigestAlgorithm::Sha256,
            Self::Sha384 => DigestAlgorithm::Sha384,
            Self::Sha512 => DigestAlgorithm::Sha512,
        }
    }

    /// Returns true if new signatures may be produced with this algorithm.
    #[must_use]
    pub const fn can_sign(self) -> bool {
        !matches!(self, Self::Sha1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_lengths() {
        assert_eq!(DigestAlgorithm::Sha1.bits(), 160);
        assert_eq!(DigestAlgorithm::Sha256.bits(), 256);
        assert_eq!(DigestAlgorithm::Sha512.output_len(), 64);
    }

    #[test]
    fn rsa_digest_pairing() {
        assert_eq!(RsaAlgorithm::Sha256.digest(), DigestAlgorithm::Sha256);
        assert_eq!(RsaAlgorithm::Sha512.digest(), DigestAlgorithm::Sha512);
    }

    #[test]
    fn sha1_cannot_sign() {
        assert!(!RsaAlgorithm::Sha1.can_sign());
        assert!(RsaAlgorithm::Sha384.can_sign());
    }

    #[test]
    fn serde_names() {
        let json = serde_json::to_string(&RsaAlgorithm::Sha512).unwrap();
        assert_eq!(json, "\"RS512\"");
        let parsed: DigestAlgorithm = serde_json::from_str("\"SHA256\"").unwrap();
        assert_eq!(parsed, DigestAlgorithm::Sha256);
    }
}
