//! Test credentials.
//!
//! `ca.crt` issued `connector.crt`, `node.crt`, `weak-sha1.crt` (signed with
//! SHA-1) and `expired.crt` (2010 to 2011, connector key). `rogue.crt` is
//! self-signed. Keys are 2048-bit RSA.

/// Certificate authority of the federation.
pub const CA_CERT: &str = include_str!("../tests/fixtures/ca.crt");

/// Connector certificate (`C=CC`).
pub const CONNECTOR_CERT: &str = include_str!("../tests/fixtures/connector.crt");

/// Connector private key.
pub const CONNECTOR_KEY: &str = include_str!("../tests/fixtures/connector.key");

/// Node certificate.
pub const NODE_CERT: &str = include_str!("../tests/fixtures/node.crt");

/// Node private key.
pub const NODE_KEY: &str = include_str!("../tests/fixtures/node.key");

/// Self-signed certificate outside the federation.
pub const ROGUE_CERT: &str = include_str!("../tests/fixtures/rogue.crt");

/// Key of the self-signed certificate.
pub const ROGUE_KEY: &str = include_str!("../tests/fixtures/rogue.key");

/// Connector key certified with a SHA-1 signature.
pub const WEAK_SHA1_CERT: &str = include_str!("../tests/fixtures/weak-sha1.crt");

/// Connector key certified for 2010 only.
pub const EXPIRED_CERT: &str = include_str!("../tests/fixtures/expired.crt");
