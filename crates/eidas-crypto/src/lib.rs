//! # eidas-crypto
//!
//! Cryptographic primitives used by the eIDAS node, backed by aws-lc-rs.
//!
//! - [`algorithm`] - digest and RSA signature algorithm identifiers
//! - [`hash`] - message digests
//! - [`rsa`] - RSA PKCS#1 v1.5 signing and verification
//! - [`keys`] - PEM decoding and RSA public key components
//!
//! SHA-1 is only reachable through verification of legacy material; it can
//! never be used to produce a new signature.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod algorithm;
pub mod error;
pub mod hash;
pub mod keys;
pub mod rsa;

pub use algorithm::{DigestAlgorithm, RsaAlgorithm};
pub use error::{CryptoError, CryptoResult};
pub use hash::digest;
pub use keys::{pem_blocks, pem_to_der, RsaPublicComponents};
pub use rsa::{rsa_sign, rsa_verify};
