//! Published capabilities of federation partners.

use std::cmp::Ordering;
use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};
use crate::signature::TrustStore;
use crate::types::SpType;

/// An eIDAS protocol version such as `1.2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolVersion {
    /// Major part.
    pub major: u32,
    /// Minor part.
    pub minor: u32,
}

impl ProtocolVersion {
    /// Version 1.1.
    pub const V1_1: Self = Self::new(1, 1);
    /// Version 1.2.
    pub const V1_2: Self = Self::new(1, 2);

    /// Creates a version.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parses `major.minor`; a missing minor part counts as zero.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.trim().splitn(2, '.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(minor) => minor.parse().ok()?,
            None => 0,
        };
        Some(Self { major, minor })
    }

    /// Returns true if this version is strictly above `other`.
    #[must_use]
    pub fn is_higher_than(&self, other: Self) -> bool {
        *self > other
    }
}

impl PartialOrd for ProtocolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProtocolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Metadata role descriptor of a connector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleDescriptor {
    /// Entity ID (metadata URL).
    pub entity_id: String,
    /// Published assertion consumer service URL.
    pub assertion_consumer_url: Option<String>,
    /// Supported protocol versions, e.g. `["1.2", "1.1"]`.
    pub protocol_versions: Vec<String>,
    /// HTTP methods the assertion consumer service accepts.
    pub protocol_bindings: Vec<String>,
    /// Levels of assurance published by the entity.
    pub published_loas: Vec<String>,
    /// Sector of the service provider.
    pub sp_type: Option<SpType>,
    /// PEM signing certificates; when present they replace the node trust
    /// store for this entity's messages.
    pub signing_certificates: Vec<String>,
    /// Country of the entity.
    pub country_code: Option<String>,
}

impl RoleDescriptor {
    /// Creates a descriptor for `entity_id` with nothing published.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            ..Self::default()
        }
    }

    /// Returns the highest parseable protocol version.
    #[must_use]
    pub fn highest_protocol_version(&self) -> Option<ProtocolVersion> {
        self.protocol_versions
            .iter()
            .filter_map(|v| ProtocolVersion::parse(v))
            .max()
    }

    /// Returns true if the entity accepts responses on this HTTP method.
    #[must_use]
    pub fn accepts_binding(&self, http_method: &str) -> bool {
        self.protocol_bindings
            .iter()
            .any(|binding| binding.eq_ignore_ascii_case(http_method))
    }

    /// Builds the trust store of the entity's signing certificates.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidCertificate`] if a certificate cannot be
    /// parsed.
    pub fn trust_store(&self) -> SamlResult<Option<TrustStore>> {
        if self.signing_certificates.is_empty() {
            return Ok(None);
        }
        TrustStore::from_pem_list(&self.signing_certificates).map(Some)
    }
}

/// Source of partner metadata.
///
/// Resolution is a synchronous call; fetching, caching and refresh belong to
/// the implementation.
pub trait MetadataResolver: Send + Sync {
    /// Returns the role descriptor published by `issuer`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::UnknownIssuer`] if nothing is known about the
    /// issuer.
    fn resolve(&self, issuer: &str) -> SamlResult<RoleDescriptor>;
}

/// Resolver over a fixed set of descriptors.
#[derive(Debug, Default)]
pub struct StaticMetadataResolver {
    descriptors: RwLock<HashMap<String, RoleDescriptor>>,
}

impl StaticMetadataResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON array of descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if the JSON is invalid.
    pub fn from_json(json: &str) -> SamlResult<Self> {
        let descriptors: Vec<RoleDescriptor> = serde_json::from_str(json)
            .map_err(|e| SamlError::Configuration(format!("metadata: {e}")))?;
        let resolver = Self::new();
        for descriptor in descriptors {
            resolver.insert(descriptor);
        }
        Ok(resolver)
    }

    /// Adds or replaces a descriptor.
    pub fn insert(&self, descriptor: RoleDescriptor) {
        self.descriptors
            .write()
            .insert(descriptor.entity_id.clone(), descriptor);
    }

    /// Adds a descriptor, builder style.
    #[must_use]
    pub fn with(self, descriptor: RoleDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    /// Number of known entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    /// Returns true if no entity is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.read().is_empty()
    }
}

impl MetadataResolver for StaticMetadataResolver {
    fn resolve(&self, issuer: &str) -> SamlResult<RoleDescriptor> {
        self.descriptors
            .read()
            .get(issuer)
            .cloned()
            .ok_or_else(|| SamlError::UnknownIssuer(issuer.to_string()))
    }
}
