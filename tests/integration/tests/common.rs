//! Common test utilities and fixtures.

use std::sync::Arc;

use reqwest::Client;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use eidas_core::{ErrorCatalog, NodeConfig};
use eidas_node::ProxyService;
use eidas_saml::fixtures;
use eidas_saml::signature::{ProtocolSigner, SigningCredential, TrustStore};
use eidas_saml::{
    AttributeRegistry, AuthenticationRequest, ImmutableAttributeMap, LoaComparison, PersonType,
    ProtocolEngine, RoleDescriptor, SamlBinding, SpType, StaticMetadataResolver,
};
use eidas_server::{create_router, AppState};

pub const LOW: &str = "http://eidas.europa.eu/LoA/low";
pub const CONNECTOR: &str = "https://connector.example/metadata";
pub const CONNECTOR_ACS: &str = "https://connector.example/acs";
pub const BIRTH_NAME: &str = "http://eidas.europa.eu/attributes/naturalperson/BirthName";
pub const FAMILY_NAME: &str = "http://eidas.europa.eu/attributes/naturalperson/CurrentFamilyName";

/// A node served on an ephemeral port.
pub struct TestEnv {
    /// Base URL of the running server.
    pub base_url: String,
    /// HTTP client for testing.
    pub client: Client,
    /// Engine of the connector sending requests.
    pub connector: ProtocolEngine,
    _shutdown_tx: oneshot::Sender<()>,
}

impl TestEnv {
    /// Starts a node with the default test configuration.
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(|_| {}).await
    }

    /// Starts a node after letting the test adjust its configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut NodeConfig)) -> anyhow::Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("eidas_node=debug,eidas_server=debug")
            .try_init();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let mut config = NodeConfig::new("CC");
        config.service_metadata_url = format!("{base_url}/ServiceMetadata");
        config.post_destination = format!("{base_url}/ServiceProvider");
        config.redirect_destination = format!("{base_url}/ServiceProvider");
        config.published_loas = LOW.to_string();
        adjust(&mut config);

        let resolver = StaticMetadataResolver::new().with(RoleDescriptor {
            assertion_consumer_url: Some(CONNECTOR_ACS.to_string()),
            protocol_versions: vec!["1.2".to_string()],
            protocol_bindings: vec!["POST".to_string(), "GET".to_string()],
            published_loas: vec![LOW.to_string()],
            sp_type: Some(SpType::Public),
            ..RoleDescriptor::new(CONNECTOR)
        });
        let node = engine(fixtures::NODE_KEY, fixtures::NODE_CERT, &config, resolver)?;
        let connector = engine(
            fixtures::CONNECTOR_KEY,
            fixtures::CONNECTOR_CERT,
            &config,
            StaticMetadataResolver::new(),
        )?;

        let catalog = ErrorCatalog::default();
        let service = ProxyService::in_memory(Arc::new(node), config, catalog.clone());
        let app = create_router(AppState::new(Arc::new(service), Arc::new(catalog)));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = eidas_server::serve(listener, app, shutdown).await {
                tracing::error!(error = %e, "server error");
            }
        });

        Ok(Self {
            base_url,
            client: Client::new(),
            connector,
            _shutdown_tx: shutdown_tx,
        })
    }

    /// URL of the ServiceProvider endpoint.
    pub fn service_provider(&self) -> String {
        format!("{}/ServiceProvider", self.base_url)
    }

    /// A request the node accepts over POST.
    pub fn valid_request(&self, id: &str) -> AuthenticationRequest {
        let registry = AttributeRegistry::eidas();
        AuthenticationRequest::new(id, CONNECTOR)
            .with_destination(self.service_provider())
            .with_assertion_consumer_service_url(CONNECTOR_ACS)
            .with_requested_attributes(ImmutableAttributeMap::of_definitions(
                registry.minimum_data_set(PersonType::NaturalPerson).cloned(),
            ))
            .with_levels_of_assurance([LOW], LoaComparison::Minimum)
    }

    /// Posts a signed request with the connector's credentials.
    pub async fn post(
        &self,
        request: &AuthenticationRequest,
        relay_state: Option<&str>,
    ) -> anyhow::Result<reqwest::Response> {
        let encoded = self.connector.encode_request(request, SamlBinding::HttpPost)?;
        let mut form = vec![("SAMLRequest", encoded)];
        if let Some(rs) = relay_state {
            form.push(("RelayState", rs.to_string()));
        }
        Ok(self
            .client
            .post(self.service_provider())
            .form(&form)
            .send()
            .await?)
    }
}

fn engine(
    key: &str,
    cert: &str,
    config: &NodeConfig,
    resolver: StaticMetadataResolver,
) -> anyhow::Result<ProtocolEngine> {
    let signer = ProtocolSigner::new(SigningCredential::from_pem(key, cert)?, &config.signature)?;
    Ok(ProtocolEngine::new(
        signer,
        &config.signature,
        TrustStore::from_pem(fixtures::CA_CERT)?,
        Arc::new(resolver),
    ))
}

/// Extracts a hidden form field from an auto-submit page.
pub fn form_field(html: &str, name: &str) -> Option<String> {
    let marker = format!(r#"name="{name}" value=""#);
    let start = html.find(&marker)? + marker.len();
    let end = html[start..].find('"')?;
    Some(html[start..start + end].to_string())
}
