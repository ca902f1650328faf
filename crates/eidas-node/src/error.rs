//! Outcomes of the ProxyService operations.
//!
//! Every rejection carries the `(code, message)` pair of the error catalog.
//! Callers branch on the variant:
//!
//! - [`ProxyServiceError::ValidationFailure`] - answer the requester with the
//!   attached signed failure response
//! - [`ProxyServiceError::InvalidMessage`] - the message could not be read,
//!   there is no trusted address to answer to
//! - [`ProxyServiceError::SecurityViolation`] - reject without answering
//! - [`ProxyServiceError::Internal`] - generic internal error

use eidas_core::{ErrorCatalog, ErrorKey};
use eidas_saml::SamlError;
use serde::Serialize;
use thiserror::Error;

/// A signed SAML response ready to be delivered to a connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedResponse {
    /// Base64 encoded signed `samlp:Response`.
    pub saml_response: String,
    /// Assertion consumer URL the response is addressed to.
    pub assertion_consumer_url: Option<String>,
    /// Relay state to echo back.
    pub relay_state: Option<String>,
    /// Id of the answered request.
    pub in_response_to: String,
}

/// Signed failure response attached to a validation failure.
pub type FailureResponse = SignedResponse;

/// Result type for ProxyService operations.
pub type ProxyServiceResult<T> = Result<T, ProxyServiceError>;

/// Typed rejection of a ProxyService operation.
#[derive(Debug, Error)]
pub enum ProxyServiceError {
    /// The request is malformed or violates node policy.
    #[error("validation failure {code}: {message}")]
    ValidationFailure {
        /// Catalog code.
        code: String,
        /// Catalog message.
        message: String,
        /// Underlying catalog key, when the reported one wraps a narrower cause.
        cause: Option<ErrorKey>,
        /// Signed failure response for the requester.
        failure: Box<FailureResponse>,
    },

    /// The payload could not be decoded, parsed or attributed to a known
    /// issuer.
    #[error("invalid message {code}: {message}")]
    InvalidMessage {
        /// Catalog code.
        code: String,
        /// Catalog message.
        message: String,
    },

    /// The message cannot be trusted: signature, credential or replay.
    #[error("security violation {code}: {message}")]
    SecurityViolation {
        /// Catalog code.
        code: String,
        /// Catalog message.
        message: String,
    },

    /// Failure not attributable to the caller.
    #[error("internal error {code}")]
    Internal {
        /// Catalog code.
        code: String,
        /// Catalog message.
        message: String,
    },
}

impl ProxyServiceError {
    /// Builds an [`InvalidMessage`](Self::InvalidMessage) from a catalog key.
    #[must_use]
    pub fn invalid_message(catalog: &ErrorCatalog, key: ErrorKey) -> Self {
        let entry = catalog.lookup(key);
        Self::InvalidMessage {
            code: entry.code,
            message: entry.message,
        }
    }

    /// Builds a [`SecurityViolation`](Self::SecurityViolation) from a catalog key.
    #[must_use]
    pub fn security_violation(catalog: &ErrorCatalog, key: ErrorKey) -> Self {
        let entry = catalog.lookup(key);
        Self::SecurityViolation {
            code: entry.code,
            message: entry.message,
        }
    }

    /// Builds the generic [`Internal`](Self::Internal) error.
    #[must_use]
    pub fn internal(catalog: &ErrorCatalog) -> Self {
        let entry = catalog.lookup(ErrorKey::InternalError);
        Self::Internal {
            code: entry.code,
            message: entry.message,
        }
    }

    /// Classifies a protocol engine error.
    ///
    /// The engine error text is not carried over; only the catalog entry of
    /// its key is.
    #[must_use]
    pub fn from_saml(catalog: &ErrorCatalog, err: &SamlError) -> Self {
        if err.is_security_violation() {
            Self::security_violation(catalog, err.error_key())
        } else if err.is_internal() {
            Self::internal(catalog)
        } else {
            Self::invalid_message(catalog, err.error_key())
        }
    }

    /// Catalog code.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::ValidationFailure { code, .. }
            | Self::InvalidMessage { code, .. }
            | Self::SecurityViolation { code, .. }
            | Self::Internal { code, .. } => code,
        }
    }

    /// Catalog message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::ValidationFailure { message, .. }
            | Self::InvalidMessage { message, .. }
            | Self::SecurityViolation { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    /// The signed failure response, for validation failures.
    #[must_use]
    pub fn failure_response(&self) -> Option<&FailureResponse> {
        match self {
            Self::ValidationFailure { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Returns true for security class rejections.
    #[must_use]
    pub const fn is_security_violation(&self) -> bool {
        matches!(self, Self::SecurityViolation { .. })
    }

    /// Returns true for internal errors.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saml_errors_are_classified() {
        let catalog = ErrorCatalog::default();

        let err = ProxyServiceError::from_saml(&catalog, &SamlError::UntrustedSignature);
        assert!(err.is_security_violation());
        assert_eq!(err.code(), "203017");

        let err = ProxyServiceError::from_saml(
            &catalog,
            &SamlError::InvalidSignatureAlgorithm("md5".to_string()),
        );
        assert!(err.is_security_violation());
        assert_eq!(err.code(), "203016");

        let err = ProxyServiceError::from_saml(&catalog, &SamlError::XmlParse("eof".to_string()));
        assert!(matches!(err, ProxyServiceError::InvalidMessage { .. }));
        assert_eq!(err.code(), "203001");
        assert!(err.failure_response().is_none());
    }

    #[test]
    fn internal_errors_do_not_echo_input() {
        let catalog = ErrorCatalog::default();
        let err = ProxyServiceError::from_saml(
            &catalog,
            &SamlError::Crypto("<script>".to_string()),
        );
        assert!(err.is_internal());
        assert!(!err.to_string().contains("<script>"));
        assert_eq!(err.message(), "internal.error");
    }

    #[test]
    fn validation_failure_exposes_response() {
        let err = ProxyServiceError::ValidationFailure {
            code: "203006".to_string(),
            message: "invalid.colleagueRequest.destUrl".to_string(),
            cause: None,
            failure: Box::new(SignedResponse {
                saml_response: "PHNhbWxwOlJlc3BvbnNlLz4=".to_string(),
                assertion_consumer_url: Some("https://connector.example/acs".to_string()),
                relay_state: Some("rs".to_string()),
                in_response_to: "_abc".to_string(),
            }),
        };
        assert_eq!(
            err.failure_response().and_then(|f| f.assertion_consumer_url.as_deref()),
            Some("https://connector.example/acs")
        );
        assert_eq!(err.to_string(), "validation failure 203006: invalid.colleagueRequest.destUrl");
    }
}
