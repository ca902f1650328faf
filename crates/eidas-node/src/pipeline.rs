//! Validation of incoming connector requests.
//!
//! [`RequestValidator::validate_incoming_request`] runs the checks below in
//! order; the first failure wins and nothing is stored before the last
//! check passes.
//!
//! 1. decoding, parsing, issuer metadata and signature
//! 2. assertion consumer URL
//! 3. requester id of private sector requesters
//! 4. citizen country
//! 5. requested attribute list
//! 6. binding declared by the request
//! 7. NameID format
//! 8. destination
//! 9. eIDAS checks: levels of assurance, [`RequestAcceptancePolicy`], defaults
//! 10. unsupported message formats
//! 11. replay
//!
//! Failures of steps 2 to 10 are answered with a signed failure response;
//! step 1 and 11 failures are not.

use std::sync::Arc;

use eidas_cache::ReplayCache;
use eidas_core::{ErrorCatalog, ErrorKey, NodeConfig};
use eidas_saml::{
    name_id_formats, AuthenticationRequest, ProtocolEngine, ProtocolVersion, RoleDescriptor,
    SamlBinding, SpType,
};
use tracing::{debug, error, info, warn};

use crate::error::{ProxyServiceError, ProxyServiceResult};
use crate::loa::{is_first_loa_highest_notified, is_request_loa_valid};
use crate::response::{ResponseAssembler, Rejection};

/// Result of a single check.
pub type CheckResult<T = ()> = Result<T, Rejection>;

/// Decides whether the connector may send this request with this binding.
///
/// Implementations follow a protocol version of the connector's metadata.
pub trait RequestAcceptancePolicy: Send + Sync {
    /// Checks the request against the issuer's metadata.
    ///
    /// `http_method` is `None` when binding validation is disabled.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] to answer with.
    fn check(
        &self,
        request: &AuthenticationRequest,
        metadata: &RoleDescriptor,
        http_method: Option<&str>,
    ) -> CheckResult;
}

/// Acceptance rules of the eIDAS SAML profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct EidasAcceptancePolicy;

impl RequestAcceptancePolicy for EidasAcceptancePolicy {
    fn check(
        &self,
        request: &AuthenticationRequest,
        metadata: &RoleDescriptor,
        http_method: Option<&str>,
    ) -> CheckResult {
        let acs_matches = match (&metadata.assertion_consumer_url, &request.assertion_consumer_service_url) {
            (None, _) => false,
            (Some(published), Some(requested)) => published == requested,
            (Some(_), None) => true,
        };
        if !acs_matches {
            return Err(Rejection::requester(ErrorKey::ColleagueReqInvalidSaml));
        }

        if let Some(method) = http_method.filter(|method| !method.trim().is_empty()) {
            if !metadata.accepts_binding(method) {
                info!(issuer = %request.issuer, http_method = method, "binding not supported by issuer");
                return Err(Rejection::requester(ErrorKey::ColleagueReqInvalidSaml)
                    .with_cause(ErrorKey::InvalidProtocolBinding));
            }
        }

        match (request.sp_type, metadata.sp_type) {
            (Some(_), Some(_)) => {
                error!(issuer = %request.issuer, "SP type both in metadata and request");
                Err(Rejection::requester(ErrorKey::ColleagueReqInconsistentSptype))
            }
            (None, None) => {
                error!(issuer = %request.issuer, "SP type not provided");
                Err(Rejection::requester(ErrorKey::ColleagueReqMissingSptype))
            }
            _ => Ok(()),
        }
    }
}

/// Step 2: defaults the assertion consumer URL from metadata or requires the
/// requested one to match it exactly.
///
/// # Errors
///
/// `COLLEAGUE_REQ_INVALID_SAML` on mismatch.
pub fn resolve_assertion_consumer_url(
    request: AuthenticationRequest,
    metadata: &RoleDescriptor,
) -> CheckResult<AuthenticationRequest> {
    match (&request.assertion_consumer_service_url, &metadata.assertion_consumer_url) {
        (None, Some(published)) => {
            let published = published.clone();
            Ok(request.with_assertion_consumer_service_url(published))
        }
        (None, None) => Ok(request),
        (Some(requested), Some(published)) if requested == published => Ok(request),
        (Some(_), _) => Err(Rejection::requester(ErrorKey::ColleagueReqInvalidSaml)),
    }
}

/// Step 3: private sector requesters must name the requester when the
/// connector speaks protocol 1.1 or lower and the feature is enabled.
///
/// A connector publishing no parseable version counts as 1.1 or lower.
///
/// # Errors
///
/// `COLLEAGUE_REQ_MISSING_REQUESTER_ID`.
pub fn check_requester_id(
    config: &NodeConfig,
    request: &AuthenticationRequest,
    metadata: &RoleDescriptor,
) -> CheckResult {
    if !config.requester_id_flag {
        return Ok(());
    }
    let legacy = metadata
        .highest_protocol_version()
        .map_or(true, |version| !version.is_higher_than(ProtocolVersion::V1_1));
    let private = request.sp_type.or(metadata.sp_type) == Some(SpType::Private);
    let missing = request
        .requester_id
        .as_deref()
        .map_or(true, |id| id.trim().is_empty());
    if legacy && private && missing {
        return Err(Rejection::requester(ErrorKey::ColleagueReqMissingRequesterId));
    }
    Ok(())
}

/// Step 4: the citizen country, without the service suffix, must be the
/// node's country.
///
/// # Errors
///
/// `COLLEAGUE_REQ_INVALID_COUNTRYCODE`.
pub fn check_country_code(config: &NodeConfig, request: &AuthenticationRequest) -> CheckResult {
    let requested = request.citizen_country_code.as_deref().map(|country| {
        if config.service_suffix.is_empty() {
            country.to_string()
        } else {
            country.replace(&config.service_suffix, "")
        }
    });
    if config.country_code.is_empty() || requested.as_deref() != Some(config.country_code.as_str()) {
        return Err(Rejection::requester(ErrorKey::ColleagueReqInvalidCountrycode));
    }
    Ok(())
}

/// Step 5: at least one attribute must be requested and no mandatory one may
/// be unsupported. Unsupported optional attributes are tolerated.
///
/// # Errors
///
/// `COLLEAGUE_REQ_ATTR_NULL` or `COLLEAGUE_REQ_ATTR_LIST`.
pub fn check_attribute_list(config: &NodeConfig, request: &AuthenticationRequest) -> CheckResult {
    if request.requested_attributes.is_empty() {
        return Err(Rejection::requester(ErrorKey::ColleagueReqAttrNull));
    }
    let unsupported_mandatory = request
        .requested_attributes
        .definitions()
        .filter(|definition| definition.required)
        .any(|definition| config.unsupported_attributes.contains(&definition.name_uri));
    if unsupported_mandatory {
        return Err(Rejection::requester(ErrorKey::ColleagueReqAttrList));
    }
    Ok(())
}

/// Step 6: the binding declared by the request must be the one used.
///
/// # Errors
///
/// `COLLEAGUE_REQ_INVALID_SAML`.
pub fn check_binding(
    config: &NodeConfig,
    request: &AuthenticationRequest,
    binding: SamlBinding,
) -> CheckResult {
    if !config.validate_binding {
        return Ok(());
    }
    match request.binding.as_deref() {
        Some(declared) if !SamlBinding::declared_method(declared).eq_ignore_ascii_case(binding.http_method()) => {
            Err(Rejection::requester(ErrorKey::ColleagueReqInvalidSaml))
        }
        _ => Ok(()),
    }
}

/// Step 7: a requested NameID format must be a standard or configured one.
///
/// # Errors
///
/// `COLLEAGUE_REQ_INVALID_NAMEID`.
pub fn check_name_id_format(config: &NodeConfig, request: &AuthenticationRequest) -> CheckResult {
    let Some(format) = request.name_id_format.as_deref() else {
        return Ok(());
    };
    let known = name_id_formats::STANDARD.contains(&format)
        || config.extra_name_id_formats.iter().any(|extra| extra == format);
    if known {
        Ok(())
    } else {
        Err(Rejection::requester(ErrorKey::ColleagueReqInvalidNameid))
    }
}

/// Step 8: the destination must be the node URL of the binding used,
/// ignoring case.
///
/// # Errors
///
/// `COLLEAGUE_REQ_INVALID_DEST_URL`.
pub fn check_destination(
    config: &NodeConfig,
    request: &AuthenticationRequest,
    binding: SamlBinding,
) -> CheckResult {
    let expected = match binding {
        SamlBinding::HttpPost => &config.post_destination,
        SamlBinding::HttpRedirect => &config.redirect_destination,
    };
    match request.destination.as_deref() {
        Some(destination) if !expected.is_empty() && destination.eq_ignore_ascii_case(expected) => Ok(()),
        _ => Err(Rejection::requester(ErrorKey::ColleagueReqInvalidDestUrl)),
    }
}

/// Step 9, first part: a connector on protocol 1.1 only understands the
/// first published level, which must then be the highest notified one.
///
/// # Errors
///
/// `SERVICE_PROVIDER_INVALID_LOA`.
pub fn check_published_loas(published: &[String], metadata: &RoleDescriptor) -> CheckResult {
    if metadata.highest_protocol_version() == Some(ProtocolVersion::V1_1)
        && !is_first_loa_highest_notified(published)
    {
        return Err(Rejection::requester(ErrorKey::ServiceProviderInvalidLoa));
    }
    Ok(())
}

/// Step 9, second part: the requested levels must be served by a published
/// one.
///
/// # Errors
///
/// `COLLEAGUE_REQ_INVALID_LOA`.
pub fn check_request_loa(request: &AuthenticationRequest, published: &[String]) -> CheckResult {
    if is_request_loa_valid(request, published) {
        Ok(())
    } else {
        Err(Rejection::requester(ErrorKey::ColleagueReqInvalidLoa))
    }
}

/// Runs the validation pipeline.
pub struct RequestValidator {
    engine: Arc<ProtocolEngine>,
    config: Arc<NodeConfig>,
    assembler: ResponseAssembler,
    replay: Arc<dyn ReplayCache>,
    policy: Arc<dyn RequestAcceptancePolicy>,
}

impl std::fmt::Debug for RequestValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestValidator")
            .field("country_code", &self.config.country_code)
            .finish_non_exhaustive()
    }
}

impl RequestValidator {
    /// Creates a validator with the eIDAS acceptance policy.
    #[must_use]
    pub fn new(
        engine: Arc<ProtocolEngine>,
        config: Arc<NodeConfig>,
        catalog: Arc<ErrorCatalog>,
        replay: Arc<dyn ReplayCache>,
    ) -> Self {
        let assembler = ResponseAssembler::new(engine.clone(), catalog, config.clone());
        Self {
            engine,
            config,
            assembler,
            replay,
            policy: Arc::new(EidasAcceptancePolicy),
        }
    }

    /// Replaces the acceptance policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn RequestAcceptancePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// The assembler used for failure responses.
    #[must_use]
    pub fn assembler(&self) -> &ResponseAssembler {
        &self.assembler
    }

    /// Validates an encoded `AuthnRequest` received with `http_method`.
    ///
    /// Returns the request with its assertion consumer URL, citizen country,
    /// SP type and relay state filled in.
    ///
    /// # Errors
    ///
    /// - [`ProxyServiceError::InvalidMessage`] if the payload cannot be read
    ///   or its issuer is unknown
    /// - [`ProxyServiceError::SecurityViolation`] for untrusted signatures
    ///   and replayed requests
    /// - [`ProxyServiceError::ValidationFailure`] with the signed failure
    ///   response for every policy violation
    /// - [`ProxyServiceError::Internal`] if the replay cache or the signer
    ///   fails
    pub fn validate_incoming_request(
        &self,
        saml_request: &str,
        http_method: &str,
        remote_ip: Option<&str>,
        relay_state: Option<&str>,
    ) -> ProxyServiceResult<AuthenticationRequest> {
        let catalog = self.assembler.catalog();
        let Some(binding) = SamlBinding::from_http_method(http_method) else {
            info!(http_method, "request received with unsupported HTTP method");
            return Err(ProxyServiceError::invalid_message(catalog, ErrorKey::ColleagueReqInvalidSaml));
        };

        let (request, metadata) = self
            .engine
            .unmarshal_request_and_validate(saml_request, binding, &self.config.country_code)
            .map_err(|e| {
                let err = ProxyServiceError::from_saml(catalog, &e);
                if err.is_security_violation() {
                    warn!(error = %e, error_code = %err.code(), "untrusted request rejected");
                } else {
                    info!(error = %e, error_code = %err.code(), "unreadable request rejected");
                }
                err
            })?;
        debug!(request_id = %request.id, issuer = %request.issuer, "processing request");

        let relay_state = relay_state.filter(|relay| !relay.is_empty());
        let reject = |request: &AuthenticationRequest, rejection: Rejection| {
            let request = request.clone().with_relay_state(relay_state.map(str::to_string));
            self.assembler.reject(&request, rejection, remote_ip)
        };

        let request = resolve_assertion_consumer_url(request.clone(), &metadata)
            .map_err(|rejection| reject(&request, rejection))?;
        let checks = check_requester_id(&self.config, &request, &metadata)
            .and_then(|()| check_country_code(&self.config, &request))
            .and_then(|()| check_attribute_list(&self.config, &request))
            .and_then(|()| check_binding(&self.config, &request, binding))
            .and_then(|()| check_name_id_format(&self.config, &request))
            .and_then(|()| check_destination(&self.config, &request, binding));
        if let Err(rejection) = checks {
            return Err(reject(&request, rejection));
        }

        if !request.is_eidas() {
            return Err(reject(&request, Rejection::responder(ErrorKey::MessageFormatUnsupported)));
        }
        let request = self
            .check_eidas_request(request, &metadata, binding, relay_state)
            .map_err(|(request, rejection)| reject(&request, rejection))?;

        self.check_replay(&request)?;
        info!(request_id = %request.id, issuer = %request.issuer, "request accepted");
        Ok(request)
    }

    fn check_eidas_request(
        &self,
        request: AuthenticationRequest,
        metadata: &RoleDescriptor,
        binding: SamlBinding,
        relay_state: Option<&str>,
    ) -> Result<AuthenticationRequest, (AuthenticationRequest, Rejection)> {
        let request = if request.citizen_country_code.is_none() {
            request.with_citizen_country_code(self.config.country_code.clone())
        } else {
            request
        };

        let published = self.config.published_loas();
        let http_method = self.config.validate_binding.then(|| binding.http_method());
        let checks = check_published_loas(&published, metadata)
            .and_then(|()| check_request_loa(&request, &published))
            .and_then(|()| self.policy.check(&request, metadata, http_method));
        if let Err(rejection) = checks {
            return Err((request, rejection));
        }

        let request = match (request.sp_type, metadata.sp_type) {
            (None, Some(sp_type)) => request.with_sp_type(sp_type),
            _ => request,
        };
        Ok(match relay_state {
            Some(relay) => request.with_relay_state(Some(relay.to_string())),
            None => request,
        })
    }

    fn check_replay(&self, request: &AuthenticationRequest) -> ProxyServiceResult<()> {
        let catalog = self.assembler.catalog();
        let country = request.citizen_country_code.as_deref().unwrap_or_default();
        let first = self
            .replay
            .check_and_insert(&request.id, country)
            .map_err(|e| {
                error!(request_id = %request.id, error = %e, "replay cache unavailable");
                ProxyServiceError::internal(catalog)
            })?;
        if !first {
            error!(request_id = %request.id, issuer = %request.issuer, "replayed request rejected");
            return Err(ProxyServiceError::security_violation(
                catalog,
                ErrorKey::SproviderSelectorInvalidSaml,
            ));
        }
        Ok(())
    }
}
