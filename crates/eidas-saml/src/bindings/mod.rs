//! SAML bindings.
//!
//! - **HTTP-POST Binding** - messages are base64-encoded and sent in HTML forms
//! - **HTTP-Redirect Binding** - messages are deflated, base64-encoded and URL-encoded
//!
//! Decoding enforces size limits before and after decompression so that a
//! small payload cannot inflate into an arbitrarily large document.
//!
//! ```rust,ignore
//! use eidas_saml::bindings::{HttpPostBinding, HttpRedirectBinding};
//!
//! let xml = HttpPostBinding::decode(&saml_request)?;
//! let form = HttpPostBinding::encode_response(&signed_xml, &acs_url, relay_state.as_deref());
//! ```

mod post;
mod redirect;

pub use post::*;
pub use redirect::*;

use crate::types::SamlBinding;

/// Maximum size of a base64 POST payload.
pub const MAX_POST_ENCODED: usize = 512 * 1024;

/// Maximum size of a URL-decoded Redirect payload.
pub const MAX_REDIRECT_ENCODED: usize = 128 * 1024;

/// Maximum size of an inflated Redirect payload.
pub const MAX_REDIRECT_INFLATED: usize = 64 * 1024;

/// SAML message type for binding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// AuthnRequest message.
    Request,
    /// Response message.
    Response,
}

impl SamlMessageType {
    /// Returns the form parameter name for this message type.
    #[must_use]
    pub const fn form_param(&self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }
}

/// Decodes a received message according to the binding it arrived on.
///
/// # Errors
///
/// Returns a message error if the payload is oversized or cannot be decoded.
pub fn decode_message(encoded: &str, binding: SamlBinding) -> crate::SamlResult<String> {
    match binding {
        SamlBinding::HttpPost => HttpPostBinding::decode(encoded),
        SamlBinding::HttpRedirect => HttpRedirectBinding::decode(encoded),
    }
}
