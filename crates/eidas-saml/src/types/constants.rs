//! SAML 2.0 and eIDAS constants and URIs.

/// SAML 2.0 assertion namespace URI.
pub const SAML_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// SAML 2.0 protocol namespace URI.
pub const SAMLP_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// XML Digital Signature namespace URI.
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// eIDAS SAML extensions namespace URI.
pub const EIDAS_NS: &str = "http://eidas.europa.eu/saml-extensions";

/// Legacy STORK protocol namespace URI.
pub const STORK_NS: &str = "urn:eu:stork:names:tc:STORK:1.0:protocol";

/// Entity name ID format used for issuers.
pub const ENTITY_FORMAT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:entity";

/// URI attribute name format.
pub const ATTRNAME_FORMAT_URI: &str = "urn:oasis:names:tc:SAML:2.0:attrname-format:uri";

/// Bearer subject confirmation method.
pub const BEARER: &str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";

/// Consent obtained, as carried on responses.
pub const CONSENT_OBTAINED: &str = "urn:oasis:names:tc:SAML:2.0:consent:obtained";

// ============================================================================
// Bindings
// ============================================================================

/// SAML bindings the node receives requests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamlBinding {
    /// HTTP POST binding.
    HttpPost,
    /// HTTP Redirect binding.
    HttpRedirect,
}

impl SamlBinding {
    /// Returns the URI for this binding.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
            Self::HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
        }
    }

    /// Returns the HTTP method carrying this binding.
    #[must_use]
    pub const fn http_method(&self) -> &'static str {
        match self {
            Self::HttpPost => "POST",
            Self::HttpRedirect => "GET",
        }
    }

    /// Parses a binding from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" => Some(Self::HttpPost),
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" => Some(Self::HttpRedirect),
            _ => None,
        }
    }

    /// Parses a binding from an HTTP method name, ignoring case.
    #[must_use]
    pub fn from_http_method(method: &str) -> Option<Self> {
        if method.eq_ignore_ascii_case("POST") {
            Some(Self::HttpPost)
        } else if method.eq_ignore_ascii_case("GET") {
            Some(Self::HttpRedirect)
        } else {
            None
        }
    }

    /// Maps a declared binding, given either as URI or as HTTP method, to
    /// the HTTP method it implies. Unknown values are returned unchanged.
    #[must_use]
    pub fn declared_method(declared: &str) -> &str {
        match Self::from_uri(declared) {
            Some(binding) => binding.http_method(),
            None => declared,
        }
    }
}

// ============================================================================
// Name ID Formats
// ============================================================================

/// Name ID format URIs.
pub mod name_id_formats {
    /// Persistent identifier format.
    pub const PERSISTENT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent";

    /// Transient identifier format.
    pub const TRANSIENT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:transient";

    /// Unspecified format.
    pub const UNSPECIFIED: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified";

    /// Formats every eIDAS node accepts.
    pub const STANDARD: [&str; 3] = [PERSISTENT, TRANSIENT, UNSPECIFIED];
}

// ============================================================================
// Status Codes
// ============================================================================

/// Top-level SAML status codes.
pub mod status_codes {
    /// Success status code.
    pub const SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

    /// Requester error status code.
    pub const REQUESTER: &str = "urn:oasis:names:tc:SAML:2.0:status:Requester";

    /// Responder error status code.
    pub const RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";
}

/// Second-level SAML status codes.
pub mod sub_status_codes {
    /// Authentication failed.
    pub const AUTHN_FAILED: &str = "urn:oasis:names:tc:SAML:2.0:status:AuthnFailed";

    /// Invalid attribute name or value.
    pub const INVALID_ATTR_NAME_OR_VALUE: &str =
        "urn:oasis:names:tc:SAML:2.0:status:InvalidAttrNameOrValue";

    /// Request denied.
    pub const REQUEST_DENIED: &str = "urn:oasis:names:tc:SAML:2.0:status:RequestDenied";
}

// ============================================================================
// Algorithms
// ============================================================================

/// XML-DSig signature algorithm URIs.
pub mod signature_algorithms {
    /// RSA with SHA-1 (verification of legacy messages only).
    pub const RSA_SHA1: &str = eidas_core::config::RSA_SHA1;

    /// RSA with SHA-256.
    pub const RSA_SHA256: &str = eidas_core::config::RSA_SHA256;

    /// RSA with SHA-384.
    pub const RSA_SHA384: &str = eidas_core::config::RSA_SHA384;

    /// RSA with SHA-512.
    pub const RSA_SHA512: &str = eidas_core::config::RSA_SHA512;
}

/// XML-DSig digest algorithm URIs.
pub mod digest_algorithms {
    /// SHA-1.
    pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";

    /// SHA-256.
    pub const SHA256: &str = eidas_core::config::DIGEST_SHA256;

    /// SHA-384.
    pub const SHA384: &str = eidas_core::config::DIGEST_SHA384;

    /// SHA-512.
    pub const SHA512: &str = eidas_core::config::DIGEST_SHA512;
}

/// Canonicalization and transform URIs.
pub mod transforms {
    /// Exclusive XML canonicalization without comments.
    pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

    /// Enveloped signature transform.
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
}
