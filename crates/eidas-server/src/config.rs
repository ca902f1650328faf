//! Server configuration.
//!
//! Configuration is loaded from `EIDAS_*` environment variables, after an
//! optional `.env` file.

use std::path::PathBuf;

use anyhow::Context;
use eidas_core::config::split_list;
use eidas_core::NodeConfig;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to bind to.
    pub port: u16,

    /// ProxyService settings.
    pub node: NodeConfig,

    /// PEM private key signing outgoing responses.
    pub signing_key_path: PathBuf,

    /// PEM certificate matching the signing key.
    pub signing_cert_path: PathBuf,

    /// PEM bundle of the federation trust anchors.
    pub trusted_certs_path: PathBuf,

    /// JSON array of connector role descriptors.
    pub metadata_path: PathBuf,

    /// Optional JSON overlay of the error catalog.
    pub error_catalog_path: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Fails if a required variable is missing, a value does not parse, or
    /// the resulting node configuration is invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let host = var("EIDAS_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("EIDAS_PORT") {
            Some(p) => p.parse().context("EIDAS_PORT is not a port number")?,
            None => 8080,
        };
        let base_url = var("EIDAS_BASE_URL").unwrap_or_else(|| format!("http://{host}:{port}"));

        let country_code = required("EIDAS_COUNTRY_CODE")?;
        let mut node = NodeConfig::new(country_code);
        node.service_metadata_url =
            var("EIDAS_METADATA_URL").unwrap_or_else(|| format!("{base_url}/ServiceMetadata"));
        node.post_destination =
            var("EIDAS_POST_DESTINATION").unwrap_or_else(|| format!("{base_url}/ServiceProvider"));
        node.redirect_destination = var("EIDAS_REDIRECT_DESTINATION")
            .unwrap_or_else(|| node.post_destination.clone());
        node.published_loas = required("EIDAS_PUBLISHED_LOAS")?;
        if let Some(suffix) = var("EIDAS_SERVICE_SUFFIX") {
            node.service_suffix = suffix;
        }
        if let Some(flag) = var("EIDAS_VALIDATE_BINDING") {
            node.validate_binding = parse_flag(&flag);
        }
        if let Some(flag) = var("EIDAS_REQUESTER_ID_FLAG") {
            node.requester_id_flag = parse_flag(&flag);
        }
        if let Some(flag) = var("EIDAS_PREFIX_IDENTIFIERS") {
            node.prefix_identifiers_country_code = parse_flag(&flag);
        }
        if let Some(list) = var("EIDAS_UNSUPPORTED_ATTRIBUTES") {
            node.unsupported_attributes = split_list(&list, ';');
        }
        if let Some(list) = var("EIDAS_EXTRA_NAME_ID_FORMATS") {
            node.extra_name_id_formats = split_list(&list, ';');
        }
        if let Some(alg) = var("EIDAS_SIGNING_ALGORITHM") {
            node.signature.signing_algorithm = alg;
        }
        if let Some(ttl) = var("EIDAS_CORRELATION_TTL_SECS") {
            node.cache.correlation_ttl_secs =
                ttl.parse().context("EIDAS_CORRELATION_TTL_SECS is not a number")?;
        }
        if let Some(ttl) = var("EIDAS_REPLAY_TTL_SECS") {
            node.cache.replay_ttl_secs =
                ttl.parse().context("EIDAS_REPLAY_TTL_SECS is not a number")?;
        }
        node.validate()?;

        Ok(Self {
            host,
            port,
            node,
            signing_key_path: required("EIDAS_SIGNING_KEY_PATH")?.into(),
            signing_cert_path: required("EIDAS_SIGNING_CERT_PATH")?.into(),
            trusted_certs_path: required("EIDAS_TRUSTED_CERTS_PATH")?.into(),
            metadata_path: required("EIDAS_METADATA_PATH")?.into(),
            error_catalog_path: var("EIDAS_ERROR_CATALOG_PATH").map(PathBuf::from),
            log_level: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Address the listener binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &str) -> anyhow::Result<String> {
    var(name).ok_or_else(|| anyhow::anyhow!("{name} environment variable is required"))
}

fn parse_flag(value: &str) -> bool {
    !matches!(value.trim().to_lowercase().as_str(), "false" | "0" | "no" | "off")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("False"));
        assert!(!parse_flag(" off "));
    }

    #[test]
    fn bind_address() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8443,
            node: NodeConfig::new("CC"),
            signing_key_path: PathBuf::new(),
            signing_cert_path: PathBuf::new(),
            trusted_certs_path: PathBuf::new(),
            metadata_path: PathBuf::new(),
            error_catalog_path: None,
            log_level: "info".to_string(),
        };
        assert_eq!(config.bind_address(), "127.0.0.1:8443");
    }
}
