//! Authentication response sent back to a connector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attribute::ImmutableAttributeMap;
use super::status::Status;

/// A cross-border authentication response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    /// Unique identifier of this response.
    pub id: String,

    /// Id of the request this response answers.
    pub in_response_to: String,

    /// Entity ID of the responding node.
    pub issuer: String,

    /// Timestamp when this response was issued.
    pub issue_instant: DateTime<Utc>,

    /// Assertion consumer URL the response is delivered to.
    pub destination: Option<String>,

    /// Audience of the assertion (the requesting connector).
    pub audience: Option<String>,

    /// Status of the response.
    pub status: Status,

    /// Released attributes; always empty on failure.
    pub attributes: ImmutableAttributeMap,

    /// Level of assurance of the authentication.
    pub level_of_assurance: Option<String>,

    /// Address of the authenticated user agent.
    pub ip_address: Option<String>,

    /// Subject name identifier.
    pub subject: Option<String>,

    /// Format of the subject name identifier.
    pub subject_name_id_format: Option<String>,

    /// Consent URI.
    pub consent: Option<String>,
}

/// Generates a new response or assertion identifier.
#[must_use]
pub fn new_id() -> String {
    format!("_{}", uuid::Uuid::new_v4())
}

impl AuthenticationResponse {
    /// Creates a success response answering `in_response_to`.
    #[must_use]
    pub fn success(in_response_to: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            in_response_to: in_response_to.into(),
            issuer: issuer.into(),
            issue_instant: Utc::now(),
            destination: None,
            audience: None,
            status: Status::success(),
            attributes: ImmutableAttributeMap::new(),
            level_of_assurance: None,
            ip_address: None,
            subject: None,
            subject_name_id_format: None,
            consent: None,
        }
    }

    /// Creates a failure response answering `in_response_to`.
    ///
    /// Failure responses never carry attributes.
    #[must_use]
    pub fn failure(
        in_response_to: impl Into<String>,
        issuer: impl Into<String>,
        status: Status,
    ) -> Self {
        Self {
            status,
            ..Self::success(in_response_to, issuer)
        }
    }

    /// Returns true if the status is not success.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.status.is_success()
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, destination: Option<String>) -> Self {
        self.destination = destination;
        self
    }

    /// Sets the audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Sets the attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: ImmutableAttributeMap) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the level of assurance.
    #[must_use]
    pub fn with_level_of_assurance(mut self, loa: impl Into<String>) -> Self {
        self.level_of_assurance = Some(loa.into());
        self
    }

    /// Sets the user agent address.
    #[must_use]
    pub fn with_ip_address(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    /// Sets the subject and its NameID format.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>, format: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self.subject_name_id_format = Some(format.into());
        self
    }

    /// Sets the consent URI.
    #[must_use]
    pub fn with_consent(mut self, consent: impl Into<String>) -> Self {
        self.consent = Some(consent.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::status_codes;

    #[test]
    fn ids_are_prefixed_and_unique() {
        let a = new_id();
        let b = new_id();
        assert!(a.starts_with('_'));
        assert_ne!(a, b);
    }

    #[test]
    fn failure_carries_no_attributes() {
        let response = AuthenticationResponse::failure(
            "_req",
            "https://node.example/metadata",
            Status::requester_error("203006"),
        );
        assert!(response.is_failure());
        assert!(response.attributes.is_empty());
        assert_eq!(response.status.status_code, status_codes::REQUESTER);
        assert_eq!(response.in_response_to, "_req");
    }

    #[test]
    fn success_builder() {
        let response = AuthenticationResponse::success("_req", "issuer")
            .with_level_of_assurance("http://eidas.europa.eu/LoA/high")
            .with_ip_address(Some("10.0.0.1".to_string()));
        assert!(!response.is_failure());
        assert_eq!(response.ip_address.as_deref(), Some("10.0.0.1"));
    }
}
