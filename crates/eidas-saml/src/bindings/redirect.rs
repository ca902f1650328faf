//! HTTP-Redirect Binding implementation.
//!
//! Messages travel in the query string, DEFLATE-compressed (raw, no zlib
//! header) and base64-encoded.

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{SamlError, SamlResult};

use super::{SamlMessageType, MAX_REDIRECT_ENCODED, MAX_REDIRECT_INFLATED};

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes a SAML response into a redirect URL.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Deflate`] if compression fails.
    pub fn encode_response(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        Ok(Self::build_url(
            &Self::encode(xml)?,
            destination,
            relay_state,
            SamlMessageType::Response,
        ))
    }

    /// Deflates and base64-encodes a message, without URL encoding.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Deflate`] if compression fails.
    pub fn encode(xml: &str) -> SamlResult<String> {
        let compressed = deflate_compress(xml.as_bytes())?;
        Ok(base64::engine::general_purpose::STANDARD.encode(compressed))
    }

    /// Appends an encoded message and relay state to a destination URL.
    #[must_use]
    pub fn build_url(
        encoded: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> String {
        let param_name = message_type.form_param();
        let separator = if destination.contains('?') { '&' } else { '?' };

        let mut url = format!(
            "{}{}{}={}",
            destination,
            separator,
            param_name,
            urlencoding::encode(encoded)
        );

        if let Some(rs) = relay_state {
            url.push_str(&format!("&RelayState={}", urlencoding::encode(rs)));
        }

        url
    }

    /// Decodes a `SAMLRequest` or `SAMLResponse` query value.
    ///
    /// The value may arrive URL-encoded or already decoded by the web
    /// framework; both are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::MessageTooLarge`] if either the encoded or the
    /// inflated form exceeds its limit, and a decoding error otherwise.
    pub fn decode(encoded: &str) -> SamlResult<String> {
        if encoded.len() > MAX_REDIRECT_ENCODED {
            return Err(SamlError::MessageTooLarge {
                limit: MAX_REDIRECT_ENCODED,
            });
        }

        let url_decoded = if encoded.contains('%') {
            urlencoding::decode(encoded)
                .map_err(|e| SamlError::InvalidRequest(format!("URL decode error: {e}")))?
                .into_owned()
        } else {
            encoded.to_string()
        };

        let compressed = base64::engine::general_purpose::STANDARD.decode(url_decoded.trim())?;
        let xml_bytes = deflate_decompress(&compressed, MAX_REDIRECT_INFLATED)?;

        String::from_utf8(xml_bytes)
            .map_err(|e| SamlError::InvalidRequest(format!("invalid UTF-8 in message: {e}")))
    }
}

/// Compresses data using DEFLATE (raw, no zlib header).
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Deflate(format!("compression error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Deflate(format!("compression finish error: {e}")))
}

/// Decompresses DEFLATE data, refusing output larger than `limit`.
fn deflate_decompress(data: &[u8], limit: usize) -> SamlResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data).take(limit as u64 + 1);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SamlError::Deflate(format!("decompression error: {e}")))?;
    if decompressed.len() > limit {
        return Err(SamlError::MessageTooLarge { limit });
    }
    Ok(decompressed)
}
