//! The ProxyService: request validation, citizen consent and the answer to
//! the connector.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use eidas_cache::{CorrelationMap, InMemoryCorrelationMap, InMemoryReplayCache, ReplayCache};
use eidas_core::{ErrorCatalog, ErrorKey, NodeConfig};
use eidas_saml::{AuthenticationRequest, AuthenticationResponse, ProtocolEngine};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::consent::{build_consent, filter_consented, missing_mandatory_consent, CitizenConsent};
use crate::error::{ProxyServiceError, ProxyServiceResult, SignedResponse};
use crate::pipeline::RequestValidator;
use crate::response::{Rejection, ResponseAssembler};

/// State kept between accepting a request and answering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAuthenticationRequest {
    /// The validated request.
    pub request: AuthenticationRequest,
    /// Address the request came from.
    pub remote_ip: Option<String>,
    /// Relay state received with the request.
    pub relay_state: Option<String>,
}

/// Entry point of the ProxyService operations.
pub struct ProxyService {
    engine: Arc<ProtocolEngine>,
    validator: RequestValidator,
    requests: Arc<dyn CorrelationMap<StoredAuthenticationRequest>>,
}

impl std::fmt::Debug for ProxyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyService")
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl ProxyService {
    /// Creates the service over explicit stores.
    #[must_use]
    pub fn new(
        engine: Arc<ProtocolEngine>,
        config: Arc<NodeConfig>,
        catalog: Arc<ErrorCatalog>,
        requests: Arc<dyn CorrelationMap<StoredAuthenticationRequest>>,
        replay: Arc<dyn ReplayCache>,
    ) -> Self {
        let validator = RequestValidator::new(engine.clone(), config, catalog, replay);
        Self {
            engine,
            validator,
            requests,
        }
    }

    /// Creates the service with in-memory stores sized by `config.cache`.
    #[must_use]
    pub fn in_memory(engine: Arc<ProtocolEngine>, config: NodeConfig, catalog: ErrorCatalog) -> Self {
        let requests = InMemoryCorrelationMap::new(Duration::from_secs(config.cache.correlation_ttl_secs));
        let replay = InMemoryReplayCache::new(Duration::from_secs(config.cache.replay_ttl_secs));
        Self::new(
            engine,
            Arc::new(config),
            Arc::new(catalog),
            Arc::new(requests),
            Arc::new(replay),
        )
    }

    /// The request validator.
    #[must_use]
    pub fn validator(&self) -> &RequestValidator {
        &self.validator
    }

    fn assembler(&self) -> &ResponseAssembler {
        self.validator.assembler()
    }

    fn catalog(&self) -> &ErrorCatalog {
        self.assembler().catalog()
    }

    /// Validates a connector request and stores it under its id.
    ///
    /// # Errors
    ///
    /// Returns the pipeline rejection, or [`ProxyServiceError::Internal`] if
    /// the request cannot be stored.
    pub fn process_authentication_request(
        &self,
        saml_request: &str,
        http_method: &str,
        remote_ip: Option<&str>,
        relay_state: Option<&str>,
    ) -> ProxyServiceResult<AuthenticationRequest> {
        let request = self
            .validator
            .validate_incoming_request(saml_request, http_method, remote_ip, relay_state)?;
        let stored = StoredAuthenticationRequest {
            request: request.clone(),
            remote_ip: remote_ip.map(str::to_string),
            relay_state: request.relay_state.clone(),
        };
        self.requests.put(&request.id, stored).map_err(|e| {
            error!(request_id = %request.id, error = %e, "request could not be stored");
            ProxyServiceError::internal(self.catalog())
        })?;
        Ok(request)
    }

    /// Applies the citizen's consent to a stored request.
    ///
    /// Optional attributes the citizen did not tick are dropped from the
    /// stored request; the returned request is what the identity provider
    /// will be asked for.
    ///
    /// # Errors
    ///
    /// - [`ProxyServiceError::InvalidMessage`] if no request is stored under
    ///   `request_id`
    /// - [`ProxyServiceError::ValidationFailure`] with
    ///   `CITIZEN_RESPONSE_MANDATORY` if a required attribute was not
    ///   consented to
    pub fn process_citizen_consent(
        &self,
        request_id: &str,
        web_params: &HashMap<String, String>,
    ) -> ProxyServiceResult<AuthenticationRequest> {
        let stored = self.stored(request_id, |requests| requests.get(request_id))?;
        let consent = build_consent(web_params, &stored.request.requested_attributes);
        self.enforce_consent(&consent, &stored)?;

        let filtered = filter_consented(&consent, &stored.request.requested_attributes);
        let request = match filtered {
            Cow::Borrowed(_) => stored.request.clone(),
            Cow::Owned(attributes) => {
                let request = stored.request.clone().with_requested_attributes(attributes);
                let updated = StoredAuthenticationRequest {
                    request: request.clone(),
                    ..stored
                };
                self.requests.put(request_id, updated).map_err(|e| {
                    error!(request_id, error = %e, "request could not be stored");
                    ProxyServiceError::internal(self.catalog())
                })?;
                request
            }
        };
        info!(request_id, consented = consent.mandatory().len() + consent.optional().len(), "citizen consent recorded");
        Ok(request)
    }

    /// Fails if a required attribute is missing from the consent.
    ///
    /// # Errors
    ///
    /// [`ProxyServiceError::ValidationFailure`] with
    /// `CITIZEN_RESPONSE_MANDATORY`.
    pub fn enforce_consent(
        &self,
        consent: &CitizenConsent,
        stored: &StoredAuthenticationRequest,
    ) -> ProxyServiceResult<()> {
        if let Some(missing) = missing_mandatory_consent(consent, &stored.request.requested_attributes) {
            info!(request_id = %stored.request.id, attribute = missing, "mandatory attribute not consented");
            return Err(self.assembler().reject(
                &stored.request,
                Rejection::responder(ErrorKey::CitizenResponseMandatory),
                stored.remote_ip.as_deref(),
            ));
        }
        Ok(())
    }

    /// Answers the connector with the identity provider's result.
    ///
    /// The stored request is consumed; if the answer is a rejection it is
    /// put back so that a later call can still find it.
    ///
    /// # Errors
    ///
    /// - [`ProxyServiceError::InvalidMessage`] with `IDP_SAML_RESPONSE` if
    ///   no request is stored under `request_id`
    /// - the rejections of [`ResponseAssembler::build_success_response`]
    pub fn process_idp_response(
        &self,
        request_id: &str,
        idp_response: Option<&AuthenticationResponse>,
        remote_ip: Option<&str>,
    ) -> ProxyServiceResult<SignedResponse> {
        let stored = self.stored(request_id, |requests| requests.remove(request_id))?;
        let sp_version = match self.engine.metadata().resolve(&stored.request.issuer) {
            Ok(metadata) => metadata.highest_protocol_version(),
            Err(e) => {
                warn!(request_id, error = %e, "connector metadata unavailable, genders left unchanged");
                None
            }
        };

        let ip_address = remote_ip.or(stored.remote_ip.as_deref());
        let result = self
            .assembler()
            .build_success_response(&stored.request, idp_response, sp_version, ip_address);
        if result.is_err() {
            if let Err(e) = self.requests.put(request_id, stored) {
                error!(request_id, error = %e, "rejected request could not be stored back");
            }
        }
        result
    }

    fn stored(
        &self,
        request_id: &str,
        lookup: impl FnOnce(
            &dyn CorrelationMap<StoredAuthenticationRequest>,
        ) -> eidas_cache::CacheResult<Option<StoredAuthenticationRequest>>,
    ) -> ProxyServiceResult<StoredAuthenticationRequest> {
        match lookup(self.requests.as_ref()) {
            Ok(Some(stored)) => Ok(stored),
            Ok(None) => {
                info!(request_id, "no stored request");
                Err(ProxyServiceError::invalid_message(self.catalog(), ErrorKey::IdpSamlResponse))
            }
            Err(e) => {
                error!(request_id, error = %e, "correlation map unavailable");
                Err(ProxyServiceError::internal(self.catalog()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use eidas_saml::{name_id_formats, AttributeRegistry, ImmutableAttributeMap, SamlBinding, Status};

    const BIRTH_NAME: &str = "http://eidas.europa.eu/attributes/naturalperson/BirthName";
    const FAMILY_NAME: &str = "http://eidas.europa.eu/attributes/naturalperson/CurrentFamilyName";

    fn service() -> ProxyService {
        ProxyService::in_memory(Arc::new(node_engine()), node_config(), ErrorCatalog::default())
    }

    fn with_birth_name(id: &str) -> AuthenticationRequest {
        let registry = AttributeRegistry::eidas();
        let requested = ImmutableAttributeMap::of_definitions(
            valid_request(id)
                .requested_attributes
                .definitions()
                .cloned()
                .chain(registry.get(BIRTH_NAME).cloned()),
        );
        valid_request(id).with_requested_attributes(requested)
    }

    fn accept(service: &ProxyService, request: &AuthenticationRequest) -> AuthenticationRequest {
        service
            .process_authentication_request(
                &encode(request, SamlBinding::HttpPost),
                "POST",
                Some("192.0.2.1"),
                Some("state"),
            )
            .unwrap()
    }

    fn ticked(request: &AuthenticationRequest, skip: &[&str]) -> HashMap<String, String> {
        request
            .requested_attributes
            .definitions()
            .filter(|d| !skip.contains(&d.name_uri.as_str()))
            .map(|d| (d.name_uri.clone(), "true".to_string()))
            .collect()
    }

    fn idp_answer() -> AuthenticationResponse {
        AuthenticationResponse::success("_idp", "https://idp.example")
            .with_attributes(natural_person_attributes("987"))
            .with_level_of_assurance(LOW)
            .with_subject("987", name_id_formats::PERSISTENT)
    }

    #[test]
    fn full_exchange() {
        let service = service();
        let request = accept(&service, &with_birth_name("_flow"));
        assert_eq!(request.requested_attributes.len(), 5);

        let consented = service
            .process_citizen_consent("_flow", &ticked(&request, &[BIRTH_NAME]))
            .unwrap();
        assert_eq!(consented.requested_attributes.len(), 4);
        assert!(!consented.requested_attributes.contains(BIRTH_NAME));

        let signed = service
            .process_idp_response("_flow", Some(&idp_answer()), None)
            .unwrap();
        assert_eq!(signed.in_response_to, "_flow");
        assert_eq!(signed.relay_state.as_deref(), Some("state"));
        assert_eq!(signed.assertion_consumer_url.as_deref(), Some(CONNECTOR_ACS));

        // consumed
        let err = service
            .process_idp_response("_flow", Some(&idp_answer()), None)
            .unwrap_err();
        assert!(matches!(err, ProxyServiceError::InvalidMessage { .. }));
    }

    #[test]
    fn refusing_a_mandatory_attribute() {
        let service = service();
        let request = accept(&service, &valid_request("_refuse"));
        let err = service
            .process_citizen_consent("_refuse", &ticked(&request, &[FAMILY_NAME]))
            .unwrap_err();
        assert_eq!(err.code(), "202015");
        assert_eq!(
            err.failure_response().and_then(|f| f.relay_state.as_deref()),
            Some("state")
        );
    }

    #[test]
    fn full_consent_keeps_the_request() {
        let service = service();
        let request = accept(&service, &with_birth_name("_all"));
        let consented = service
            .process_citizen_consent("_all", &ticked(&request, &[]))
            .unwrap();
        assert_eq!(consented, request);
    }

    #[test]
    fn failed_answer_puts_the_request_back() {
        let service = service();
        accept(&service, &valid_request("_back"));

        let failed = AuthenticationResponse::failure("_idp", "https://idp.example", Status::responder_error("cancelled"));
        let err = service
            .process_idp_response("_back", Some(&failed), None)
            .unwrap_err();
        assert_eq!(err.code(), "202005");
        assert!(err.failure_response().is_some());

        assert!(service
            .process_idp_response("_back", Some(&idp_answer()), None)
            .is_ok());
    }

    #[test]
    fn unknown_request_id() {
        let service = service();
        let err = service
            .process_citizen_consent("_nobody", &HashMap::new())
            .unwrap_err();
        assert_eq!(err.code(), "202016");
        assert!(service.process_idp_response("_nobody", None, None).is_err());
    }

    #[test]
    fn rejected_requests_are_not_stored() {
        let service = service();
        let request = valid_request("_bad").with_destination("https://elsewhere.example");
        assert!(service
            .process_authentication_request(&encode(&request, SamlBinding::HttpPost), "POST", None, None)
            .is_err());
        assert!(service
            .process_citizen_consent("_bad", &HashMap::new())
            .is_err());
    }
}
