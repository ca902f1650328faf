//! Key material helpers.
//!
//! Certificates and private keys arrive as PEM text from configuration and
//! metadata; signatures carry public keys either as certificates or as raw
//! `RSAKeyValue` components. These helpers convert between the forms.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{CryptoError, CryptoResult};

/// Modulus and public exponent of an RSA key, big-endian without sign padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicComponents {
    /// Modulus (n).
    pub modulus: Vec<u8>,
    /// Public exponent (e).
    pub exponent: Vec<u8>,
}

impl RsaPublicComponents {
    /// Parses a DER `RSAPublicKey` (`SEQUENCE { n INTEGER, e INTEGER }`).
    ///
    /// # Errors
    ///
    /// Returns an error if the structure is not a well-formed `RSAPublicKey`.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let mut pos = 0;
        expect_tag(der, pos, 0x30, "SEQUENCE")?;
        pos += 1;
        pos = skip_length(der, pos)?;

        let (modulus, next) = read_integer(der, pos, "n")?;
        let (exponent, _) = read_integer(der, next, "e")?;

        Ok(Self { modulus, exponent })
    }

    /// Builds components from base64 text as found in `ds:Modulus` and
    /// `ds:Exponent`. Whitespace inside the text is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is not valid base64.
    pub fn from_base64(modulus: &str, exponent: &str) -> CryptoResult<Self> {
        Ok(Self {
            modulus: strip_leading_zeros(decode_b64(modulus)?),
            exponent: strip_leading_zeros(decode_b64(exponent)?),
        })
    }

    /// Encodes the modulus as base64.
    #[must_use]
    pub fn modulus_b64(&self) -> String {
        STANDARD.encode(&self.modulus)
    }

    /// Encodes the exponent as base64.
    #[must_use]
    pub fn exponent_b64(&self) -> String {
        STANDARD.encode(&self.exponent)
    }

    /// Returns the key size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        match self.modulus.first() {
            Some(&top) => (self.modulus.len() - 1) * 8 + (8 - top.leading_zeros() as usize),
            None => 0,
        }
    }

    /// Encodes the components back into a DER `RSAPublicKey`.
    #[must_use]
    pub fn to_der(&self) -> Vec<u8> {
        let n = encode_integer(&self.modulus);
        let e = encode_integer(&self.exponent);
        let mut body = Vec::with_capacity(n.len() + e.len());
        body.extend_from_slice(&n);
        body.extend_from_slice(&e);

        let mut out = vec![0x30];
        out.extend_from_slice(&encode_length(body.len()));
        out.extend_from_slice(&body);
        out
    }
}

/// Returns the DER payload of every PEM block with the given label.
///
/// # Errors
///
/// Returns an error if a matching block has invalid base64 content.
pub fn pem_blocks(pem: &str, label: &str) -> CryptoResult<Vec<Vec<u8>>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let mut blocks = Vec::new();
    let mut rest = pem;
    while let Some(start) = rest.find(&begin) {
        let after = &rest[start + begin.len()..];
        let stop = after
            .find(&end)
            .ok_or_else(|| CryptoError::InvalidKey(format!("unterminated PEM block {label}")))?;
        blocks.push(decode_b64(&after[..stop])?);
        rest = &after[stop + end.len()..];
    }

    Ok(blocks)
}

/// Returns the DER payload of the first PEM block with the given label.
///
/// # Errors
///
/// Returns an error if no such block exists or its content is invalid.
pub fn pem_to_der(pem: &str, label: &str) -> CryptoResult<Vec<u8>> {
    pem_blocks(pem, label)?
        .into_iter()
        .next()
        .ok_or_else(|| CryptoError::InvalidKey(format!("no PEM block labelled {label}")))
}

fn decode_b64(text: &str) -> CryptoResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(format!("invalid base64: {e}")))
}

fn strip_leading_zeros(mut bytes: Vec<u8>) -> Vec<u8> {
    let zeros = bytes.iter().take_while(|&&b| b == 0).count();
    if zeros == bytes.len() && !bytes.is_empty() {
        return vec![0];
    }
    bytes.drain(..zeros);
    bytes
}

fn expect_tag(data: &[u8], pos: usize, tag: u8, what: &str) -> CryptoResult<()> {
    if data.get(pos) == Some(&tag) {
        Ok(())
    } else {
        Err(CryptoError::InvalidKey(format!("invalid RSAPublicKey: expected {what}")))
    }
}

fn read_integer(data: &[u8], pos: usize, name: &str) -> CryptoResult<(Vec<u8>, usize)> {
    expect_tag(data, pos, 0x02, &format!("INTEGER for {name}"))?;
    let len_pos = pos + 1;
    let len = read_length(data, len_pos)?;
    let start = skip_length(data, len_pos)?;
    let value = data
        .get(start..start + len)
        .ok_or_else(|| CryptoError::InvalidKey(format!("truncated INTEGER {name}")))?;

    Ok((strip_leading_zeros(value.to_vec()), start + len))
}

/// Reads an ASN.1 length field.
fn read_length(data: &[u8], pos: usize) -> CryptoResult<usize> {
    let first = *data
        .get(pos)
        .ok_or_else(|| CryptoError::InvalidKey("unexpected end of data".to_string()))?;

    if first < 0x80 {
        return Ok(first as usize);
    }

    let num_bytes = (first & 0x7F) as usize;
    if num_bytes > 4 {
        return Err(CryptoError::InvalidKey("length too large".to_string()));
    }
    let mut len = 0usize;
    for i in 0..num_bytes {
        let byte = *data
            .get(pos + 1 + i)
            .ok_or_else(|| CryptoError::InvalidKey("unexpected end of length".to_string()))?;
        len = (len << 8) | (byte as usize);
    }
    Ok(len)
}

/// Skips an ASN.1 length field and returns the position after it.
fn skip_length(data: &[u8], pos: usize) -> CryptoResult<usize> {
    let first = *data
        .get(pos)
        .ok_or_else(|| CryptoError::InvalidKey("unexpected end of data".to_string()))?;

    if first < 0x80 {
        Ok(pos + 1)
    } else {
        Ok(pos + 1 + (first & 0x7F) as usize)
    }
}

fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let bytes: Vec<u8> = len
        .to_be_bytes()
        .iter()
        .copied()
        .skip_while(|&b| b == 0)
        .collect();
    let mut out = vec![0x80 | bytes.len() as u8];
    out.extend_from_slice(&bytes);
    out
}

fn encode_integer(value: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(value.len() + 1);
    if value.first().is_some_and(|&b| b & 0x80 != 0) {
        content.push(0);
    }
    content.extend_from_slice(value);

    let mut out = vec![0x02];
    out.extend_from_slice(&encode_length(content.len()));
    out.extend_from_slice(&content);
    out
}
