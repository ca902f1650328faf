//! Shared builders for the unit tests.

use std::sync::Arc;

use eidas_core::NodeConfig;
use eidas_saml::fixtures;
use eidas_saml::signature::{ProtocolSigner, SigningCredential, TrustStore};
use eidas_saml::{
    AttributeRegistry, AuthenticationRequest, ImmutableAttributeMap, LoaComparison, PersonType,
    ProtocolEngine, RoleDescriptor, SamlBinding, StaticMetadataResolver,
};

pub const LOW: &str = "http://eidas.europa.eu/LoA/low";
pub const SUBSTANTIAL: &str = "http://eidas.europa.eu/LoA/substantial";
pub const CONNECTOR: &str = "https://connector.example/metadata";
pub const CONNECTOR_ACS: &str = "https://connector.example/acs";
pub const POST_DESTINATION: &str = "https://node.example/ServiceProvider";
pub const REDIRECT_DESTINATION: &str = "https://node.example/ServiceProvider/redirect";

const NATURAL: &str = "http://eidas.europa.eu/attributes/naturalperson/";

pub fn node_config() -> NodeConfig {
    NodeConfig {
        service_metadata_url: "https://node.example/metadata".to_string(),
        post_destination: POST_DESTINATION.to_string(),
        redirect_destination: REDIRECT_DESTINATION.to_string(),
        published_loas: format!("{SUBSTANTIAL};{LOW}"),
        ..NodeConfig::new("CC")
    }
}

pub fn connector_descriptor() -> RoleDescriptor {
    RoleDescriptor {
        assertion_consumer_url: Some(CONNECTOR_ACS.to_string()),
        protocol_versions: vec!["1.2".to_string()],
        protocol_bindings: vec!["POST".to_string(), "GET".to_string()],
        published_loas: vec![LOW.to_string()],
        sp_type: Some(eidas_saml::SpType::Public),
        ..RoleDescriptor::new(CONNECTOR)
    }
}

fn engine(key: &str, cert: &str, resolver: StaticMetadataResolver) -> ProtocolEngine {
    let config = node_config();
    let credential = SigningCredential::from_pem(key, cert).unwrap();
    ProtocolEngine::new(
        ProtocolSigner::new(credential, &config.signature).unwrap(),
        &config.signature,
        TrustStore::from_pem(fixtures::CA_CERT).unwrap(),
        Arc::new(resolver),
    )
}

pub fn node_engine_with(descriptor: RoleDescriptor) -> ProtocolEngine {
    engine(
        fixtures::NODE_KEY,
        fixtures::NODE_CERT,
        StaticMetadataResolver::new().with(descriptor),
    )
}

pub fn node_engine() -> ProtocolEngine {
    node_engine_with(connector_descriptor())
}

pub fn connector_engine() -> ProtocolEngine {
    engine(
        fixtures::CONNECTOR_KEY,
        fixtures::CONNECTOR_CERT,
        StaticMetadataResolver::new(),
    )
}

/// A request the test node accepts over POST.
pub fn valid_request(id: &str) -> AuthenticationRequest {
    let registry = AttributeRegistry::eidas();
    AuthenticationRequest::new(id, CONNECTOR)
        .with_destination(POST_DESTINATION)
        .with_assertion_consumer_service_url(CONNECTOR_ACS)
        .with_requested_attributes(ImmutableAttributeMap::of_definitions(
            registry.minimum_data_set(PersonType::NaturalPerson).cloned(),
        ))
        .with_levels_of_assurance([LOW], LoaComparison::Minimum)
}

pub fn encode(request: &AuthenticationRequest, binding: SamlBinding) -> String {
    connector_engine().encode_request(request, binding).unwrap()
}

/// The natural person minimum data set with the given identifier.
pub fn natural_person_attributes(identifier: &str) -> ImmutableAttributeMap {
    let registry = AttributeRegistry::eidas();
    let definition = |name: &str| registry.get(&format!("{NATURAL}{name}")).cloned().unwrap();
    let date_of_birth = definition("DateOfBirth");
    let birth = date_of_birth.unmarshal("1965-01-01").unwrap();
    ImmutableAttributeMap::builder()
        .put_text(definition("PersonIdentifier"), identifier)
        .put_text(definition("CurrentFamilyName"), "Garcia")
        .put_text(definition("CurrentGivenName"), "Javier")
        .put(date_of_birth, vec![birth])
        .build()
}
