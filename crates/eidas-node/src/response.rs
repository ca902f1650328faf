//! Assembly of the signed responses sent back to connectors.

use std::borrow::Cow;
use std::sync::Arc;

use eidas_core::{ErrorCatalog, ErrorKey, NodeConfig};
use eidas_saml::{
    name_id_formats, sub_status_codes, AttributeValue, AuthenticationRequest,
    AuthenticationResponse, Gender, ImmutableAttributeMap, LoaComparison, ProtocolEngine,
    ProtocolVersion, Status, CONSENT_OBTAINED,
};
use tracing::{error, info, warn};

use crate::consent::{check_mandatory_attribute_set, check_mandatory_attributes};
use crate::error::{ProxyServiceError, ProxyServiceResult, SignedResponse};
use crate::loa::{is_loa_valid, is_non_notified_loa_valid};

/// Party a failure response blames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStatus {
    /// The connector sent an unacceptable request.
    Requester,
    /// Authentication or attribute retrieval failed on this side.
    Responder,
}

impl FailureStatus {
    fn status(self, message: String) -> Status {
        match self {
            Self::Requester => Status::requester_error(message)
                .with_sub_status(sub_status_codes::REQUEST_DENIED),
            Self::Responder => Status::responder_error(message)
                .with_sub_status(sub_status_codes::AUTHN_FAILED),
        }
    }
}

/// A rejection decided by a check, before it is turned into a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    /// Reported catalog key.
    pub key: ErrorKey,
    /// Narrower cause, if any.
    pub cause: Option<ErrorKey>,
    /// Party blamed by the failure response.
    pub status: FailureStatus,
}

impl Rejection {
    /// A rejection blaming the requester.
    #[must_use]
    pub const fn requester(key: ErrorKey) -> Self {
        Self {
            key,
            cause: None,
            status: FailureStatus::Requester,
        }
    }

    /// A rejection blaming the responder.
    #[must_use]
    pub const fn responder(key: ErrorKey) -> Self {
        Self {
            key,
            cause: None,
            status: FailureStatus::Responder,
        }
    }

    /// Attaches a narrower cause.
    #[must_use]
    pub const fn with_cause(mut self, cause: ErrorKey) -> Self {
        self.cause = Some(cause);
        self
    }
}

/// Builds and signs success and failure responses.
#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    engine: Arc<ProtocolEngine>,
    catalog: Arc<ErrorCatalog>,
    config: Arc<NodeConfig>,
}

impl ResponseAssembler {
    /// Creates an assembler.
    #[must_use]
    pub fn new(
        engine: Arc<ProtocolEngine>,
        catalog: Arc<ErrorCatalog>,
        config: Arc<NodeConfig>,
    ) -> Self {
        Self {
            engine,
            catalog,
            config,
        }
    }

    /// The error catalog.
    #[must_use]
    pub fn catalog(&self) -> &ErrorCatalog {
        &self.catalog
    }

    /// Builds the signed failure response answering `request`.
    ///
    /// The status message is `"{code} - {message}"` of the catalog entry.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyServiceError::Internal`] if signing fails.
    pub fn build_failure_response(
        &self,
        request: &AuthenticationRequest,
        key: ErrorKey,
        status: FailureStatus,
        ip_address: Option<&str>,
    ) -> ProxyServiceResult<SignedResponse> {
        let entry = self.catalog.lookup(key);
        let response = AuthenticationResponse::failure(
            request.id.clone(),
            self.config.service_metadata_url.clone(),
            status.status(format!("{} - {}", entry.code, entry.message)),
        )
        .with_destination(request.assertion_consumer_service_url.clone())
        .with_ip_address(ip_address.map(str::to_string));
        self.sign(request, &response)
    }

    /// Turns a rejection into a [`ProxyServiceError::ValidationFailure`]
    /// carrying the signed failure response.
    #[must_use]
    pub fn reject(
        &self,
        request: &AuthenticationRequest,
        rejection: Rejection,
        ip_address: Option<&str>,
    ) -> ProxyServiceError {
        let entry = self.catalog.lookup(rejection.key);
        info!(
            request_id = %request.id,
            issuer = %request.issuer,
            error_code = %entry.code,
            cause = ?rejection.cause,
            "request rejected"
        );
        match self.build_failure_response(request, rejection.key, rejection.status, ip_address) {
            Ok(failure) => ProxyServiceError::ValidationFailure {
                code: entry.code,
                message: entry.message,
                cause: rejection.cause,
                failure: Box::new(failure),
            },
            Err(err) => err,
        }
    }

    /// Validates the identity provider's answer and assembles the signed
    /// success response.
    ///
    /// Checks, first failure wins: response present and successful,
    /// requested mandatory attributes, minimum data set, attribute values,
    /// level of assurance. Released attributes then get their identifiers
    /// prefixed and genders converted for `sp_version`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProxyServiceError::ValidationFailure`] with `Responder`
    /// status when a check fails, and [`ProxyServiceError::Internal`] if a
    /// value cannot be marshalled or signing fails.
    pub fn build_success_response(
        &self,
        request: &AuthenticationRequest,
        idp_response: Option<&AuthenticationResponse>,
        sp_version: Option<ProtocolVersion>,
        ip_address: Option<&str>,
    ) -> ProxyServiceResult<SignedResponse> {
        let (idp_response, loa) = self
            .check_idp_response(request, idp_response)?
            .map_err(|rejection| self.reject(request, rejection, ip_address))?;

        let attributes = self.update_response_attributes(request, sp_version, &idp_response.attributes);
        let mut response = AuthenticationResponse::success(
            request.id.clone(),
            self.config.service_metadata_url.clone(),
        )
        .with_destination(request.assertion_consumer_service_url.clone())
        .with_audience(request.issuer.clone())
        .with_attributes(attributes.into_owned())
        .with_level_of_assurance(loa)
        .with_ip_address(ip_address.map(str::to_string).or_else(|| idp_response.ip_address.clone()))
        .with_consent(CONSENT_OBTAINED);

        if let Some(subject) = &idp_response.subject {
            let format = request
                .name_id_format
                .as_deref()
                .or(idp_response.subject_name_id_format.as_deref())
                .unwrap_or(name_id_formats::UNSPECIFIED);
            response = response.with_subject(subject.clone(), format);
        }

        info!(request_id = %request.id, issuer = %request.issuer, "success response assembled");
        self.sign(request, &response)
    }

    /// Runs the response checks.
    ///
    /// The outer result carries internal errors, the inner one the
    /// rejection to answer with.
    fn check_idp_response<'a>(
        &self,
        request: &AuthenticationRequest,
        idp_response: Option<&'a AuthenticationResponse>,
    ) -> ProxyServiceResult<Result<(&'a AuthenticationResponse, String), Rejection>> {
        let Some(idp_response) = idp_response.filter(|response| !response.is_failure()) else {
            return Ok(Err(Rejection::responder(ErrorKey::InvalidAttributeList)));
        };
        let attributes = &idp_response.attributes;

        if !check_mandatory_attributes(&request.requested_attributes, attributes) {
            return Ok(Err(Rejection::responder(ErrorKey::AttVerificationMandatory)));
        }
        if !check_mandatory_attribute_set(self.engine.registry(), attributes) {
            return Ok(Err(Rejection::responder(ErrorKey::EidasMandatoryAttributes)));
        }

        for (definition, values) in attributes.iter() {
            for value in values {
                let marshalled = definition.marshal(value).map_err(|e| {
                    error!(request_id = %request.id, attribute = %definition.name_uri, error = %e, "attribute value cannot be marshalled");
                    ProxyServiceError::internal(&self.catalog)
                })?;
                if !definition.accepts(&marshalled) {
                    warn!(request_id = %request.id, attribute = %definition.name_uri, "attribute value rejected");
                    return Ok(Err(Rejection::responder(ErrorKey::InvalidAttributeValue)));
                }
            }
        }

        let Some(loa) = idp_response.level_of_assurance.clone() else {
            return Ok(Err(Rejection::responder(ErrorKey::MessageValidationError)));
        };
        if !self.config.published_loas().contains(&loa) {
            return Ok(Err(Rejection::responder(ErrorKey::InvalidResponseLoaValueUnpublished)));
        }
        let satisfied = match request.loa_comparison {
            LoaComparison::Minimum => request
                .level_of_assurance()
                .is_some_and(|requested| is_loa_valid(request.loa_comparison, requested, &loa)),
            LoaComparison::Exact => {
                is_non_notified_loa_valid(request.loa_comparison, &request.levels_of_assurance, &loa)
            }
        };
        if !satisfied {
            return Ok(Err(Rejection::responder(ErrorKey::InvalidResponseLoaValue)));
        }

        Ok(Ok((idp_response, loa)))
    }

    /// Rewrites released attribute values for the connector.
    ///
    /// Unique identifiers get the `"{node country}/{origin country}/"`
    /// prefix unless already present (none when prefixing is disabled).
    /// Gender values follow the connector's protocol version: up to 1.2 the
    /// legacy `Not Specified`, later `Unspecified`; with no known version
    /// they are left alone. Returns the input when nothing changes.
    #[must_use]
    pub fn update_response_attributes<'a>(
        &self,
        request: &AuthenticationRequest,
        sp_version: Option<ProtocolVersion>,
        attributes: &'a ImmutableAttributeMap,
    ) -> Cow<'a, ImmutableAttributeMap> {
        let prefix = if self.config.prefix_identifiers_country_code {
            format!(
                "{}/{}/",
                self.config.country_code,
                request.origin_country_code.as_deref().unwrap_or_default()
            )
        } else {
            String::new()
        };
        let gender = sp_version.map(|version| {
            if version.is_higher_than(ProtocolVersion::V1_2) {
                Gender::Unspecified
            } else {
                Gender::NotSpecified
            }
        });

        let mut changed = false;
        let updated = attributes.map_values(|definition, value| match value {
            AttributeValue::Text(text)
                if definition.unique_identifier && !text.starts_with(&prefix) =>
            {
                changed = true;
                AttributeValue::Text(format!("{prefix}{text}"))
            }
            AttributeValue::Gender(current @ (Gender::Unspecified | Gender::NotSpecified)) => {
                match gender {
                    Some(target) if target != *current => {
                        changed = true;
                        AttributeValue::Gender(target)
                    }
                    _ => value.clone(),
                }
            }
            _ => value.clone(),
        });

        if changed {
            Cow::Owned(updated)
        } else {
            Cow::Borrowed(attributes)
        }
    }

    fn sign(
        &self,
        request: &AuthenticationRequest,
        response: &AuthenticationResponse,
    ) -> ProxyServiceResult<SignedResponse> {
        let saml_response = self.engine.encode_response(response).map_err(|e| {
            error!(request_id = %request.id, error = %e, "response signing failed");
            ProxyServiceError::internal(&self.catalog)
        })?;
        Ok(SignedResponse {
            saml_response,
            assertion_consumer_url: request.assertion_consumer_service_url.clone(),
            relay_state: request.relay_state.clone(),
            in_response_to: request.id.clone(),
        })
    }
}
