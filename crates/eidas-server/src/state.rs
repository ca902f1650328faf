//! Application state shared by the request handlers.

use std::sync::Arc;

use anyhow::Context;
use eidas_core::ErrorCatalog;
use eidas_node::ProxyService;
use eidas_saml::signature::{ProtocolSigner, SigningCredential, TrustStore};
use eidas_saml::{ProtocolEngine, StaticMetadataResolver};

use crate::config::ServerConfig;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ProxyService.
    pub service: Arc<ProxyService>,

    /// Catalog used for errors raised outside the service.
    pub catalog: Arc<ErrorCatalog>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(service: Arc<ProxyService>, catalog: Arc<ErrorCatalog>) -> Self {
        Self { service, catalog }
    }

    /// Loads credentials, metadata and catalog named by the configuration.
    ///
    /// # Errors
    ///
    /// Fails if a file cannot be read or parsed.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let key = read(&config.signing_key_path)?;
        let cert = read(&config.signing_cert_path)?;
        let trusted = read(&config.trusted_certs_path)?;
        let metadata = read(&config.metadata_path)?;

        let signature = &config.node.signature;
        let signer = ProtocolSigner::new(SigningCredential::from_pem(&key, &cert)?, signature)?;
        let trust_store = TrustStore::from_pem(&trusted)?;
        let resolver = StaticMetadataResolver::from_json(&metadata)?;
        tracing::info!(
            entities = resolver.len(),
            anchors = trust_store.len(),
            "connector metadata loaded"
        );

        let mut catalog = ErrorCatalog::default();
        if let Some(path) = &config.error_catalog_path {
            catalog = catalog.overlay_json(&read(path)?)?;
        }

        let engine = ProtocolEngine::new(signer, signature, trust_store, Arc::new(resolver));
        let service = ProxyService::in_memory(Arc::new(engine), config.node.clone(), catalog.clone());
        Ok(Self::new(Arc::new(service), Arc::new(catalog)))
    }
}

fn read(path: &std::path::Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}
