//! Authentication request received from a connector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attribute::ImmutableAttributeMap;
use super::loa::{LoaComparison, SpType};

/// Protocol variant a request was written in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageFormat {
    /// eIDAS SAML profile.
    Eidas,
    /// Anything else, named by its extensions namespace.
    Unsupported(String),
}

/// A cross-border authentication request.
///
/// Values are never changed in place once stored; the `with_*` methods
/// consume the request and return the modified copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationRequest {
    /// Unique identifier chosen by the issuer.
    pub id: String,

    /// Entity ID (metadata URL) of the issuing connector.
    pub issuer: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// Destination the request was addressed to.
    pub destination: Option<String>,

    /// URL where the response must be delivered.
    pub assertion_consumer_service_url: Option<String>,

    /// Binding declared by the request (URI or HTTP method).
    pub binding: Option<String>,

    /// Human-readable name of the requesting service provider.
    pub provider_name: Option<String>,

    /// Country of the citizen being authenticated.
    pub citizen_country_code: Option<String>,

    /// Country of the requesting service provider.
    pub origin_country_code: Option<String>,

    /// Requested attributes.
    pub requested_attributes: ImmutableAttributeMap,

    /// Requested levels of assurance, notified or not.
    pub levels_of_assurance: Vec<String>,

    /// Comparison applied to the requested levels.
    pub loa_comparison: LoaComparison,

    /// Public or private sector requester.
    pub sp_type: Option<SpType>,

    /// Identifier of the final requester, for private-sector requests.
    pub requester_id: Option<String>,

    /// Requested NameID format.
    pub name_id_format: Option<String>,

    /// Relay state received with the request.
    pub relay_state: Option<String>,

    /// Protocol variant.
    pub message_format: MessageFormat,
}

impl AuthenticationRequest {
    /// Creates an eIDAS request with the given id and issuer.
    #[must_use]
    pub fn new(id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            issuer: issuer.into(),
            issue_instant: Utc::now(),
            destination: None,
            assertion_consumer_service_url: None,
            binding: None,
            provider_name: None,
            citizen_country_code: None,
            origin_country_code: None,
            requested_attributes: ImmutableAttributeMap::new(),
            levels_of_assurance: Vec::new(),
            loa_comparison: LoaComparison::Minimum,
            sp_type: None,
            requester_id: None,
            name_id_format: None,
            relay_state: None,
            message_format: MessageFormat::Eidas,
        }
    }

    /// Returns the first requested level of assurance.
    #[must_use]
    pub fn level_of_assurance(&self) -> Option<&str> {
        self.levels_of_assurance.first().map(String::as_str)
    }

    /// Returns true if the request follows the eIDAS profile.
    #[must_use]
    pub fn is_eidas(&self) -> bool {
        self.message_format == MessageFormat::Eidas
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_assertion_consumer_service_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the declared binding.
    #[must_use]
    pub fn with_binding(mut self, binding: impl Into<String>) -> Self {
        self.binding = Some(binding.into());
        self
    }

    /// Sets the provider name.
    #[must_use]
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    /// Sets the citizen country code.
    #[must_use]
    pub fn with_citizen_country_code(mut self, country: impl Into<String>) -> Self {
        self.citizen_country_code = Some(country.into());
        self
    }

    /// Sets the origin country code.
    #[must_use]
    pub fn with_origin_country_code(mut self, country: Option<String>) -> Self {
        self.origin_country_code = country;
        self
    }

    /// Sets the requested attributes.
    #[must_use]
    pub fn with_requested_attributes(mut self, attributes: ImmutableAttributeMap) -> Self {
        self.requested_attributes = attributes;
        self
    }

    /// Sets the requested levels of assurance and their comparison.
    #[must_use]
    pub fn with_levels_of_assurance(
        mut self,
        levels: impl IntoIterator<Item = impl Into<String>>,
        comparison: LoaComparison,
    ) -> Self {
        self.levels_of_assurance = levels.into_iter().map(Into::into).collect();
        self.loa_comparison = comparison;
        self
    }

    /// Sets the SP type.
    #[must_use]
    pub fn with_sp_type(mut self, sp_type: SpType) -> Self {
        self.sp_type = Some(sp_type);
        self
    }

    /// Sets the requester id.
    #[must_use]
    pub fn with_requester_id(mut self, requester_id: impl Into<String>) -> Self {
        self.requester_id = Some(requester_id.into());
        self
    }

    /// Sets the NameID format.
    #[must_use]
    pub fn with_name_id_format(mut self, format: impl Into<String>) -> Self {
        self.name_id_format = Some(format.into());
        self
    }

    /// Sets the relay state.
    #[must_use]
    pub fn with_relay_state(mut self, relay_state: Option<String>) -> Self {
        self.relay_state = relay_state;
        self
    }

    /// Sets the message format.
    #[must_use]
    pub fn with_message_format(mut self, format: MessageFormat) -> Self {
        self.message_format = format;
        self
    }
}
