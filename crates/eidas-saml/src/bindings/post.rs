//! HTTP-POST Binding implementation.

use base64::Engine;

use crate::error::{SamlError, SamlResult};

use super::{SamlMessageType, MAX_POST_ENCODED};

/// HTTP-POST binding encoder/decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Encodes a SAML response as an auto-submitting HTML form.
    #[must_use]
    pub fn encode_response(xml: &str, destination: &str, relay_state: Option<&str>) -> String {
        Self::auto_submit_form(
            &Self::encode(xml),
            destination,
            relay_state,
            SamlMessageType::Response,
        )
    }

    /// Base64-encodes a message for the POST binding.
    #[must_use]
    pub fn encode(xml: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(xml)
    }

    /// Builds an HTML form posting an already encoded message.
    #[must_use]
    pub fn auto_submit_form(
        encoded: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> String {
        let param_name = message_type.form_param();

        let relay_state_input = relay_state
            .map(|rs| {
                format!(
                    r#"<input type="hidden" name="RelayState" value="{}"/>"#,
                    html_escape(rs)
                )
            })
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>eIDAS Node</title>
</head>
<body onload="document.forms[0].submit()">
    <noscript>
        <p>JavaScript is disabled. Click the button below to continue.</p>
    </noscript>
    <form method="post" action="{}">
        <input type="hidden" name="{}" value="{}"/>
        {}
        <noscript>
            <input type="submit" value="Continue"/>
        </noscript>
    </form>
</body>
</html>"#,
            html_escape(destination),
            param_name,
            html_escape(encoded),
            relay_state_input
        )
    }

    /// Decodes a `SAMLRequest` or `SAMLResponse` form value.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::MessageTooLarge`] above the POST size limit, and
    /// a decoding error for invalid base64 or UTF-8.
    pub fn decode(encoded: &str) -> SamlResult<String> {
        if encoded.len() > MAX_POST_ENCODED {
            return Err(SamlError::MessageTooLarge {
                limit: MAX_POST_ENCODED,
            });
        }

        // Form encoders may wrap long base64 values.
        let compact: String = encoded.split_whitespace().collect();
        let decoded = base64::engine::general_purpose::STANDARD.decode(compact)?;

        String::from_utf8(decoded)
            .map_err(|e| SamlError::InvalidRequest(format!("invalid UTF-8 in message: {e}")))
    }
}

/// Escapes HTML special characters.
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
