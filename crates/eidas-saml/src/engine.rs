//! The protocol engine: turns wire payloads into validated values and
//! values into signed payloads.

use std::sync::Arc;

use eidas_core::SignatureConfig;
use tracing::{debug, warn};

use crate::bindings::{decode_message, HttpPostBinding, HttpRedirectBinding};
use crate::error::SamlResult;
use crate::metadata::{MetadataResolver, RoleDescriptor};
use crate::signature::{ProtocolSigner, SignatureValidator, TrustStore};
use crate::types::{AttributeRegistry, AuthenticationRequest, AuthenticationResponse, SamlBinding};
use crate::xml::{marshal_request, marshal_response, parse_authn_request, parse_response};

/// Signs, verifies, marshals and unmarshals eIDAS messages.
pub struct ProtocolEngine {
    signer: ProtocolSigner,
    validator: SignatureValidator,
    trust_store: TrustStore,
    metadata: Arc<dyn MetadataResolver>,
    registry: AttributeRegistry,
}

impl std::fmt::Debug for ProtocolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("signer", &self.signer)
            .field("trusted_certificates", &self.trust_store.len())
            .finish_non_exhaustive()
    }
}

impl ProtocolEngine {
    /// Creates an engine.
    ///
    /// `trust_store` is used for issuers whose metadata publishes no signing
    /// certificate.
    #[must_use]
    pub fn new(
        signer: ProtocolSigner,
        signature_config: &SignatureConfig,
        trust_store: TrustStore,
        metadata: Arc<dyn MetadataResolver>,
    ) -> Self {
        Self {
            signer,
            validator: SignatureValidator::new(signature_config),
            trust_store,
            metadata,
            registry: AttributeRegistry::eidas(),
        }
    }

    /// Replaces the attribute registry.
    #[must_use]
    pub fn with_registry(mut self, registry: AttributeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The attribute registry.
    #[must_use]
    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    /// The metadata resolver.
    #[must_use]
    pub fn metadata(&self) -> &dyn MetadataResolver {
        self.metadata.as_ref()
    }

    /// The node signer.
    #[must_use]
    pub fn signer(&self) -> &ProtocolSigner {
        &self.signer
    }

    /// Decodes, parses and verifies an incoming `AuthnRequest`.
    ///
    /// The signature is checked against the issuer's metadata certificates,
    /// or the node trust store when the metadata publishes none. The origin
    /// country is the metadata country, else the `C=` of the signing
    /// certificate. A request without citizen country gets `citizen_country`.
    ///
    /// # Errors
    ///
    /// Returns a message class [`crate::SamlError`] for undecodable or
    /// malformed payloads and unknown issuers, and a security class error
    /// for signatures that cannot be trusted.
    pub fn unmarshal_request_and_validate(
        &self,
        encoded: &str,
        binding: SamlBinding,
        citizen_country: &str,
    ) -> SamlResult<(AuthenticationRequest, RoleDescriptor)> {
        let xml = decode_message(encoded, binding)?;
        let request = parse_authn_request(&xml, &self.registry)?;
        let descriptor = self.metadata.resolve(&request.issuer)?;

        let published = descriptor.trust_store()?;
        let trusted = published.as_ref().unwrap_or(&self.trust_store);
        let validated = self.validator.validate(&xml, trusted).map_err(|e| {
            warn!(request_id = %request.id, issuer = %request.issuer, error = %e, "request signature rejected");
            e
        })?;

        let origin_country = descriptor
            .country_code
            .clone()
            .or_else(|| validated.certificate.and_then(|cert| cert.country));
        let request = match request.citizen_country_code {
            Some(_) => request,
            None => request.with_citizen_country_code(citizen_country),
        }
        .with_origin_country_code(origin_country);

        debug!(request_id = %request.id, issuer = %request.issuer, "request unmarshalled and verified");
        Ok((request, descriptor))
    }

    /// Marshals and signs a response.
    ///
    /// # Errors
    ///
    /// Returns an internal class error if marshalling or signing fails.
    pub fn marshal_response(&self, response: &AuthenticationResponse) -> SamlResult<String> {
        self.signer.sign(&marshal_response(response)?)
    }

    /// Marshals, signs and base64-encodes a response for the POST binding.
    ///
    /// # Errors
    ///
    /// Returns an internal class error if marshalling or signing fails.
    pub fn encode_response(&self, response: &AuthenticationResponse) -> SamlResult<String> {
        Ok(HttpPostBinding::encode(&self.marshal_response(response)?))
    }

    /// Marshals, signs and encodes a request for `binding`.
    ///
    /// # Errors
    ///
    /// Returns an internal class error if signing or compression fails.
    pub fn encode_request(
        &self,
        request: &AuthenticationRequest,
        binding: SamlBinding,
    ) -> SamlResult<String> {
        let signed = self.signer.sign(&marshal_request(request))?;
        match binding {
            SamlBinding::HttpPost => Ok(HttpPostBinding::encode(&signed)),
            SamlBinding::HttpRedirect => HttpRedirectBinding::encode(&signed),
        }
    }

    /// Decodes, verifies and parses a response signed by a trusted party.
    ///
    /// # Errors
    ///
    /// Returns a message or security class error as for requests.
    pub fn unmarshal_response(
        &self,
        encoded: &str,
        binding: SamlBinding,
        trusted: &TrustStore,
    ) -> SamlResult<AuthenticationResponse> {
        let xml = decode_message(encoded, binding)?;
        self.validator.validate(&xml, trusted)?;
        parse_response(&xml, &self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::metadata::StaticMetadataResolver;
    use crate::signature::SigningCredential;
    use crate::types::{ImmutableAttributeMap, LoaComparison, Status};
    use crate::SamlError;

    const CONNECTOR: &str = "https://connector.example/metadata";

    fn config() -> SignatureConfig {
        SignatureConfig::default()
    }

    fn engine(key: &str, cert: &str, resolver: StaticMetadataResolver, trust: &str) -> ProtocolEngine {
        let credential = SigningCredential::from_pem(key, cert).unwrap();
        ProtocolEngine::new(
            ProtocolSigner::new(credential, &config()).unwrap(),
            &config(),
            TrustStore::from_pem(trust).unwrap(),
            Arc::new(resolver),
        )
    }

    fn connector_engine() -> ProtocolEngine {
        engine(
            fixtures::CONNECTOR_KEY,
            fixtures::CONNECTOR_CERT,
            StaticMetadataResolver::new(),
            fixtures::CA_CERT,
        )
    }

    fn node_engine(descriptor: RoleDescriptor) -> ProtocolEngine {
        engine(
            fixtures::NODE_KEY,
            fixtures::NODE_CERT,
            StaticMetadataResolver::new().with(descriptor),
            fixtures::CA_CERT,
        )
    }

    fn request() -> AuthenticationRequest {
        let registry = AttributeRegistry::eidas();
        AuthenticationRequest::new("_engine1", CONNECTOR)
            .with_destination("https://node.example/ServiceProvider")
            .with_requested_attributes(ImmutableAttributeMap::of_definitions(
                registry.minimum_data_set(crate::types::PersonType::NaturalPerson).cloned(),
            ))
            .with_levels_of_assurance(["http://eidas.europa.eu/LoA/low"], LoaComparison::Minimum)
    }

    #[test]
    fn request_roundtrip_over_both_bindings() {
        let node = node_engine(RoleDescriptor::new(CONNECTOR));
        for binding in [SamlBinding::HttpPost, SamlBinding::HttpRedirect] {
            let encoded = connector_engine().encode_request(&request(), binding).unwrap();
            let (parsed, descriptor) =
                node.unmarshal_request_and_validate(&encoded, binding, "CC").unwrap();
            assert_eq!(parsed.id, "_engine1");
            assert_eq!(parsed.citizen_country_code.as_deref(), Some("CC"));
            // no metadata country: taken from the connector certificate
            assert_eq!(parsed.origin_country_code.as_deref(), Some("CC"));
            assert_eq!(descriptor.entity_id, CONNECTOR);
        }
    }

    #[test]
    fn metadata_country_wins_over_certificate() {
        let node = node_engine(RoleDescriptor {
            country_code: Some("CA".to_string()),
            ..RoleDescriptor::new(CONNECTOR)
        });
        let encoded = connector_engine()
            .encode_request(&request(), SamlBinding::HttpPost)
            .unwrap();
        let (parsed, _) = node
            .unmarshal_request_and_validate(&encoded, SamlBinding::HttpPost, "CC")
            .unwrap();
        assert_eq!(parsed.origin_country_code.as_deref(), Some("CA"));
    }

    #[test]
    fn metadata_certificates_replace_trust_store() {
        let node = node_engine(RoleDescriptor {
            signing_certificates: vec![fixtures::NODE_CERT.to_string()],
            ..RoleDescriptor::new(CONNECTOR)
        });
        let encoded = connector_engine()
            .encode_request(&request(), SamlBinding::HttpPost)
            .unwrap();
        assert!(matches!(
            node.unmarshal_request_and_validate(&encoded, SamlBinding::HttpPost, "CC"),
            Err(SamlError::UntrustedSignature)
        ));
    }

    #[test]
    fn unknown_issuer_is_a_message_error() {
        let node = node_engine(RoleDescriptor::new("https://someone-else.example"));
        let encoded = connector_engine()
            .encode_request(&request(), SamlBinding::HttpPost)
            .unwrap();
        let err = node
            .unmarshal_request_and_validate(&encoded, SamlBinding::HttpPost, "CC")
            .unwrap_err();
        assert!(matches!(err, SamlError::UnknownIssuer(_)));
        assert!(!err.is_security_violation());
    }

    #[test]
    fn signed_response_can_be_verified() {
        let node = node_engine(RoleDescriptor::new(CONNECTOR));
        let response = AuthenticationResponse::failure(
            "_engine1",
            "https://node.example/metadata",
            Status::requester_error("203006 - invalid destination"),
        );
        let encoded = node.encode_response(&response).unwrap();

        let parsed = connector_engine()
            .unmarshal_response(&encoded, SamlBinding::HttpPost, &TrustStore::from_pem(fixtures::CA_CERT).unwrap())
            .unwrap();
        assert_eq!(parsed.in_response_to, "_engine1");
        assert!(parsed.is_failure());
    }
}
