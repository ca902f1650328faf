//! Error and message catalog.
//!
//! Maps symbolic [`ErrorKey`]s to the `(code, message)` pair placed in
//! failure responses. Defaults are built in; deployments may overlay their own
//! values from JSON keyed by property key.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

macro_rules! error_keys {
    ($($variant:ident => ($property:literal, $code:literal, $message:literal),)+) => {
        /// Symbolic error keys.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        #[allow(missing_docs)]
        pub enum ErrorKey {
            $($variant,)+
        }

        impl ErrorKey {
            /// Every key, in declaration order.
            pub const ALL: &'static [ErrorKey] = &[$(ErrorKey::$variant,)+];

            /// Property key under which code and message are configured.
            #[must_use]
            pub const fn property_key(self) -> &'static str {
                match self {
                    $(Self::$variant => $property,)+
                }
            }

            /// Built-in error code.
            #[must_use]
            pub const fn default_code(self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            /// Built-in message.
            #[must_use]
            pub const fn default_message(self) -> &'static str {
                match self {
                    $(Self::$variant => $message,)+
                }
            }
        }
    };
}

error_keys! {
    ColleagueReqInvalidSaml => ("colleagueRequest.invalidSAML", "203001", "invalid.colleagueRequest.SAML"),
    ColleagueReqAttrNull => ("colleagueRequest.attrNull", "203002", "invalid.colleagueRequest.attrNull"),
    ColleagueReqAttrList => ("colleagueRequest.attrList", "203003", "invalid.colleagueRequest.attrList"),
    ColleagueReqInvalidCountrycode => ("colleagueRequest.invalidCountryCode", "203004", "invalid.colleagueRequest.countryCode"),
    ColleagueReqInvalidNameid => ("colleagueRequest.invalidNameID", "203005", "invalid.colleagueRequest.nameID"),
    ColleagueReqInvalidDestUrl => ("colleagueRequest.invalidDestUrl", "203006", "invalid.colleagueRequest.destUrl"),
    ColleagueReqMissingRequesterId => ("colleagueRequest.missing.requesterID", "203007", "missing.colleagueRequest.requesterID"),
    ColleagueReqInvalidLoa => ("colleagueRequest.invalidLoA", "203008", "invalid.colleagueRequest.LoA"),
    ColleagueReqInconsistentSptype => ("inconsistent.sptype", "203009", "inconsistent.sptype"),
    ColleagueReqMissingSptype => ("missing.sptype", "203010", "missing.sptype"),
    ServiceProviderInvalidLoa => ("serviceProviderRequest.invalidLoA", "203011", "invalid.serviceProviderRequest.LoA"),
    InvalidProtocolBinding => ("invalidProtocolBinding.error", "203012", "invalid.protocol.binding"),
    MessageFormatUnsupported => ("samlengine.message.format.unsupported", "203013", "message.format.unsupported"),
    MessageValidationError => ("message.validation.error", "203014", "message.validation.error"),
    SproviderSelectorInvalidSaml => ("sProviderAction.invalidSaml", "203015", "invalid.sProviderAction.SAML"),
    InvalidSignatureAlgorithm => ("invalidReceivedSignAlgo.error", "203016", "invalid.received.signature.algorithm"),
    InvalidCertificateSign => ("invalidCertificateSign.error", "203017", "invalid.certificate.signature"),
    InvalidMinimumSignatureHashLength => ("invalidMinimumHashLength.error", "203018", "invalid.minimum.signature.hash.length"),
    InvalidAttributeList => ("invalidAttributeList", "202005", "invalid.attribute.list"),
    AttVerificationMandatory => ("attVerification.mandatory", "202010", "missing.mandatory.attribute"),
    EidasMandatoryAttributes => ("eidas.mandatory.attributes", "202011", "missing.eidas.mandatory.attributes"),
    InvalidAttributeValue => ("invalidAttributeValue", "202012", "invalid.attribute.value"),
    InvalidResponseLoaValue => ("idp.incorrect.loa", "202013", "invalid.response.LoA"),
    InvalidResponseLoaValueUnpublished => ("idp.incorrect.loa.unpublished", "202014", "invalid.response.LoA.unpublished"),
    CitizenResponseMandatory => ("citizenResponse.mandatory", "202015", "missing.mandatory.consent"),
    IdpSamlResponse => ("IdPSAMLResponse", "202016", "invalid.IdP.SAML.response"),
    InternalError => ("internalError", "003001", "internal.error"),
}

impl ErrorKey {
    /// Finds the key configured under the given property key.
    #[must_use]
    pub fn from_property_key(property: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.property_key() == property)
    }
}

impl fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property_key())
    }
}

/// Code and message of a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Error code.
    pub code: String,
    /// Message.
    pub message: String,
}

/// Catalog mapping error keys to their code and message.
#[derive(Debug, Clone)]
pub struct ErrorCatalog {
    entries: HashMap<ErrorKey, CatalogEntry>,
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        let entries = ErrorKey::ALL
            .iter()
            .map(|&key| {
                (
                    key,
                    CatalogEntry {
                        code: key.default_code().to_string(),
                        message: key.default_message().to_string(),
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

impl ErrorCatalog {
    /// Looks up the entry for a key.
    #[must_use]
    pub fn lookup(&self, key: ErrorKey) -> CatalogEntry {
        self.entries.get(&key).cloned().unwrap_or_else(|| CatalogEntry {
            code: key.default_code().to_string(),
            message: key.default_message().to_string(),
        })
    }

    /// Returns the code configured for a key.
    #[must_use]
    pub fn code(&self, key: ErrorKey) -> String {
        self.lookup(key).code
    }

    /// Replaces the entry of one key.
    #[must_use]
    pub fn with_override(mut self, key: ErrorKey, entry: CatalogEntry) -> Self {
        self.entries.insert(key, entry);
        self
    }

    /// Overlays entries from a JSON object keyed by property key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`] for invalid JSON or an unknown property key.
    pub fn overlay_json(mut self, json: &str) -> Result<Self> {
        let overlay: HashMap<String, CatalogEntry> = serde_json::from_str(json)?;
        for (property, entry) in overlay {
            let key = ErrorKey::from_property_key(&property)
                .ok_or_else(|| Error::Catalog(format!("unknown error property {property}")))?;
            self.entries.insert(key, entry);
        }
        Ok(self)
    }
}
