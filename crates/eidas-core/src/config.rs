//! Node configuration.
//!
//! A single [`NodeConfig`] is built at startup and handed to the pipeline.
//! Nothing here reads the environment; loading is the binary's job.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// RSA-SHA256 signature URI.
pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
/// RSA-SHA384 signature URI.
pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
/// RSA-SHA512 signature URI.
pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";
/// RSA-SHA1 signature URI (verification only).
pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";

/// SHA-256 digest URI.
pub const DIGEST_SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
/// SHA-384 digest URI.
pub const DIGEST_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
/// SHA-512 digest URI.
pub const DIGEST_SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

/// Signature algorithms the node can produce.
pub const SIGNING_ALGORITHMS: [&str; 3] = [RSA_SHA256, RSA_SHA384, RSA_SHA512];

/// Main configuration of the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// ISO country code served by this node.
    pub country_code: String,
    /// Suffix stripped from a requested country code before comparison.
    pub service_suffix: String,
    /// Metadata URL of this node, used as issuer of outgoing responses.
    pub service_metadata_url: String,
    /// Destination expected on requests received over HTTP-POST.
    pub post_destination: String,
    /// Destination expected on requests received over HTTP-Redirect.
    pub redirect_destination: String,
    /// Whether the HTTP method must match the binding declared in the request.
    pub validate_binding: bool,
    /// Whether private-sector requesters must send a requester id.
    pub requester_id_flag: bool,
    /// Attribute name URIs this node does not support.
    pub unsupported_attributes: Vec<String>,
    /// NameID formats accepted in addition to the standard ones.
    pub extra_name_id_formats: Vec<String>,
    /// `;`-separated list of published levels of assurance.
    pub published_loas: String,
    /// Whether unique identifiers are prefixed with the country codes.
    pub prefix_identifiers_country_code: bool,
    /// Signature settings.
    pub signature: SignatureConfig,
    /// Cache lifetimes.
    pub cache: CacheConfig,
}

/// Signature configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// URI of the algorithm used for outgoing signatures.
    pub signing_algorithm: String,
    /// Signature algorithm URIs accepted on incoming messages.
    pub signature_algorithm_whitelist: Vec<String>,
    /// Digest algorithm URIs accepted on incoming messages.
    pub digest_algorithm_whitelist: Vec<String>,
    /// Reject certificates outside their validity period.
    pub check_validity_period: bool,
    /// Reject self-signed certificates that are not trust anchors.
    pub disallow_self_signed: bool,
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of correlation entries in seconds.
    pub correlation_ttl_secs: u64,
    /// Lifetime of replay cache entries in seconds.
    pub replay_ttl_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            country_code: String::new(),
            service_suffix: String::new(),
            service_metadata_url: String::new(),
            post_destination: String::new(),
            redirect_destination: String::new(),
            validate_binding: true,
            requester_id_flag: false,
            unsupported_attributes: Vec::new(),
            extra_name_id_formats: Vec::new(),
            published_loas: String::new(),
            prefix_identifiers_country_code: true,
            signature: SignatureConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            signing_algorithm: RSA_SHA512.to_string(),
            signature_algorithm_whitelist: vec![
                RSA_SHA256.to_string(),
                RSA_SHA384.to_string(),
                RSA_SHA512.to_string(),
            ],
            digest_algorithm_whitelist: vec![
                DIGEST_SHA256.to_string(),
                DIGEST_SHA384.to_string(),
                DIGEST_SHA512.to_string(),
            ],
            check_validity_period: true,
            disallow_self_signed: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            correlation_ttl_secs: 300,
            replay_ttl_secs: 300,
        }
    }
}

impl NodeConfig {
    /// Creates a configuration for the given country with defaults elsewhere.
    #[must_use]
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            ..Self::default()
        }
    }

    /// Returns the published levels of assurance, distinct and in order.
    #[must_use]
    pub fn published_loas(&self) -> Vec<String> {
        split_list(&self.published_loas, ';')
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.country_code.trim().is_empty() {
            return Err(Error::Config("country code is not set".to_string()));
        }
        if self.service_metadata_url.trim().is_empty() {
            return Err(Error::Config("service metadata URL is not set".to_string()));
        }
        if self.published_loas().is_empty() {
            return Err(Error::Config("no level of assurance is published".to_string()));
        }

        let signing = self.signature.signing_algorithm.as_str();
        if !SIGNING_ALGORITHMS.contains(&signing) {
            return Err(Error::Config(format!("unknown signing algorithm {signing}")));
        }
        if !self
            .signature
            .signature_algorithm_whitelist
            .iter()
            .any(|alg| alg == signing)
        {
            return Err(Error::Config(format!(
                "signing algorithm {signing} is not in the signature whitelist"
            )));
        }

        Ok(())
    }
}

/// Splits a separated configuration value, trimming entries and dropping
/// empty and repeated ones. First occurrence wins.
#[must_use]
pub fn split_list(value: &str, separator: char) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in value.split(separator).map(str::trim) {
        if !item.is_empty() && !out.iter().any(|seen| seen == item) {
            out.push(item.to_string());
        }
    }
    out
}
