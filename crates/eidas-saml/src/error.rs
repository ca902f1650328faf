//! SAML error types.
//!
//! Errors fall into three classes that callers branch on:
//!
//! - message errors: the payload cannot be read or is incomplete
//! - security errors: the signature or its credential cannot be trusted
//! - internal errors: configuration, marshalling or crypto engine failures

use eidas_core::ErrorKey;
use thiserror::Error;

use crate::types::status_codes;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Invalid SAML request format or content.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid SAML response format or content.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Missing required element or attribute.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// Encoded or decoded message exceeds the allowed size.
    #[error("message exceeds {limit} bytes")]
    MessageTooLarge {
        /// The limit that was exceeded.
        limit: usize,
    },

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Deflate decompression error.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// No metadata is known for the issuer.
    #[error("unknown issuer")]
    UnknownIssuer(String),

    /// The message carries no signature.
    #[error("message is not signed")]
    SignatureMissing,

    /// The signature is malformed or does not verify.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// The signing credential is not trusted.
    #[error("untrusted signature")]
    UntrustedSignature,

    /// Signature or digest algorithm outside the allow-list.
    #[error("signature algorithm not allowed: {0}")]
    InvalidSignatureAlgorithm(String),

    /// Certificate signed with a hash shorter than 256 bits.
    #[error("certificate signature hash is too short")]
    InvalidMinimumSignatureHashLength,

    /// Certificate outside its validity period.
    #[error("certificate is expired or not yet valid")]
    CertificateExpired,

    /// Self-signed certificate while those are disallowed.
    #[error("self-signed certificates are not allowed")]
    SelfSignedCertificate,

    /// Certificate cannot be used (unparseable, weak key, wrong key type).
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// XML signature creation failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// Attribute value could not be marshalled or unmarshalled.
    #[error("attribute value marshalling failed: {0}")]
    AttributeMarshalling(String),

    /// Cryptographic operation error.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SamlError {
    /// Returns the top-level SAML status code for this error.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        if self.is_internal() {
            status_codes::RESPONDER
        } else {
            status_codes::REQUESTER
        }
    }

    /// Returns true if the error concerns the trust placed in the message.
    #[must_use]
    pub const fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::SignatureMissing
                | Self::SignatureInvalid(_)
                | Self::UntrustedSignature
                | Self::InvalidSignatureAlgorithm(_)
                | Self::InvalidMinimumSignatureHashLength
                | Self::CertificateExpired
                | Self::SelfSignedCertificate
                | Self::InvalidCertificate(_)
        )
    }

    /// Returns true if the error is not attributable to the sender.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::SignatureCreation(_)
                | Self::AttributeMarshalling(_)
                | Self::Crypto(_)
                | Self::Configuration(_)
                | Self::Internal(_)
        )
    }

    /// Returns the catalog key reported for this error.
    #[must_use]
    pub const fn error_key(&self) -> ErrorKey {
        match self {
            Self::InvalidSignatureAlgorithm(_) => ErrorKey::InvalidSignatureAlgorithm,
            Self::InvalidMinimumSignatureHashLength => {
                ErrorKey::InvalidMinimumSignatureHashLength
            }
            Self::SignatureMissing
            | Self::SignatureInvalid(_)
            | Self::UntrustedSignature
            | Self::CertificateExpired
            | Self::SelfSignedCertificate
            | Self::InvalidCertificate(_) => ErrorKey::InvalidCertificateSign,
            Self::SignatureCreation(_)
            | Self::AttributeMarshalling(_)
            | Self::Crypto(_)
            | Self::Configuration(_)
            | Self::Internal(_) => ErrorKey::InternalError,
            Self::InvalidRequest(_)
            | Self::InvalidResponse(_)
            | Self::XmlParse(_)
            | Self::MissingElement(_)
            | Self::MessageTooLarge { .. }
            | Self::Base64Decode(_)
            | Self::Deflate(_)
            | Self::UnknownIssuer(_) => ErrorKey::ColleagueReqInvalidSaml,
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::Deflate(err.to_string())
    }
}

impl From<eidas_crypto::CryptoError> for SamlError {
    fn from(err: eidas_crypto::CryptoError) -> Self {
        Self::Crypto(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_errors_are_requester_errors() {
        let err = SamlError::MissingElement("Issuer".to_string());
        assert_eq!(err.status_code(), status_codes::REQUESTER);
        assert_eq!(err.error_key(), ErrorKey::ColleagueReqInvalidSaml);
        assert!(!err.is_security_violation());
    }

    #[test]
    fn trust_errors_are_security_violations() {
        for err in [
            SamlError::UntrustedSignature,
            SamlError::SignatureMissing,
            SamlError::InvalidSignatureAlgorithm("dsa".to_string()),
            SamlError::CertificateExpired,
        ] {
            assert!(err.is_security_violation(), "{err}");
            assert!(!err.is_internal());
        }
    }

    #[test]
    fn algorithm_errors_keep_their_key() {
        assert_eq!(
            SamlError::InvalidSignatureAlgorithm("x".to_string()).error_key(),
            ErrorKey::InvalidSignatureAlgorithm
        );
        assert_eq!(
            SamlError::InvalidMinimumSignatureHashLength.error_key(),
            ErrorKey::InvalidMinimumSignatureHashLength
        );
    }

    #[test]
    fn internal_errors_use_responder_status() {
        let err = SamlError::Crypto("engine".to_string());
        assert!(err.is_internal());
        assert_eq!(err.status_code(), status_codes::RESPONDER);
        assert_eq!(err.error_key(), ErrorKey::InternalError);
    }

    #[test]
    fn unknown_issuer_does_not_echo_input() {
        let err = SamlError::UnknownIssuer("https://evil.example/<script>".to_string());
        assert_eq!(err.to_string(), "unknown issuer");
    }
}
