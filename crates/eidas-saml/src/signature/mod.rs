//! XML Signature support for eIDAS messages.
//!
//! Messages carry one enveloped signature over their root element, placed
//! right after the root's `Issuer`. Both the reference digest and
//! `SignedInfo` use exclusive XML canonicalization, applied identically by
//! [`ProtocolSigner`] and [`SignatureValidator`].
//!
//! # Signing Algorithms
//!
//! - RSA-SHA256, RSA-SHA384, RSA-SHA512 for signing and verification
//! - RSA-SHA1 for verification of legacy messages only

mod signer;
mod trust;
mod validator;

pub use signer::*;
pub use trust::*;
pub use validator::*;

use std::collections::BTreeSet;
use std::ops::Range;

use eidas_crypto::{DigestAlgorithm, RsaAlgorithm};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::PrefixDeclaration;
use quick_xml::Reader;
use xml_canonicalization::Canonicalizer;

use crate::error::{SamlError, SamlResult};
use crate::types::{digest_algorithms, signature_algorithms, transforms};

/// Signature algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    /// Legacy RSA with SHA-1 (verification only).
    RsaSha1,
    /// RSA with SHA-256.
    RsaSha256,
    /// RSA with SHA-384.
    RsaSha384,
    /// RSA with SHA-512.
    #[default]
    RsaSha512,
}

impl SignatureAlgorithm {
    /// Returns the URI for this signature algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha1 => signature_algorithms::RSA_SHA1,
            Self::RsaSha256 => signature_algorithms::RSA_SHA256,
            Self::RsaSha384 => signature_algorithms::RSA_SHA384,
            Self::RsaSha512 => signature_algorithms::RSA_SHA512,
        }
    }

    /// Parses a signature algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri.trim() {
            signature_algorithms::RSA_SHA1 => Some(Self::RsaSha1),
            signature_algorithms::RSA_SHA256 => Some(Self::RsaSha256),
            signature_algorithms::RSA_SHA384 => Some(Self::RsaSha384),
            signature_algorithms::RSA_SHA512 => Some(Self::RsaSha512),
            _ => None,
        }
    }

    /// Returns the RSA primitive behind this algorithm.
    #[must_use]
    pub const fn rsa(&self) -> RsaAlgorithm {
        match self {
            Self::RsaSha1 => RsaAlgorithm::Sha1,
            Self::RsaSha256 => RsaAlgorithm::Sha256,
            Self::RsaSha384 => RsaAlgorithm::Sha384,
            Self::RsaSha512 => RsaAlgorithm::Sha512,
        }
    }

    /// Returns the digest paired with this algorithm for references.
    #[must_use]
    pub const fn digest(&self) -> DigestAlgorithm {
        self.rsa().digest()
    }
}

/// Returns the XML-DSig URI of a digest algorithm.
#[must_use]
pub const fn digest_uri(algorithm: DigestAlgorithm) -> &'static str {
    match algorithm {
        DigestAlgorithm::Sha1 => digest_algorithms::SHA1,
        DigestAlgorithm::Sha256 => digest_algorithms::SHA256,
        DigestAlgorithm::Sha384 => digest_algorithms::SHA384,
        DigestAlgorithm::Sha512 => digest_algorithms::SHA512,
    }
}

/// Parses a digest algorithm from its XML-DSig URI.
#[must_use]
pub fn digest_from_uri(uri: &str) -> Option<DigestAlgorithm> {
    match uri.trim() {
        digest_algorithms::SHA1 => Some(DigestAlgorithm::Sha1),
        digest_algorithms::SHA256 => Some(DigestAlgorithm::Sha256),
        digest_algorithms::SHA384 => Some(DigestAlgorithm::Sha384),
        digest_algorithms::SHA512 => Some(DigestAlgorithm::Sha512),
        _ => None,
    }
}

/// Canonicalizes a standalone XML element (exclusive C14N, no comments).
///
/// # Errors
///
/// Returns [`SamlError::XmlParse`] if the input is not well-formed.
pub fn canonicalize(xml: &str) -> SamlResult<String> {
    let mut output = Vec::new();
    Canonicalizer::read_from_str(xml)
        .write_to_writer(&mut output)
        .canonicalize(false)
        .map_err(|e| SamlError::XmlParse(format!("canonicalization failed: {e}")))?;
    String::from_utf8(output)
        .map_err(|e| SamlError::XmlParse(format!("canonical form is not UTF-8: {e}")))
}

/// Canonicalizes the element at `range` of `xml`.
///
/// Namespace prefixes the element uses but inherits from its ancestors are
/// declared on it first, so the fragment canonicalizes as it would in place.
pub(crate) fn canonicalize_fragment(xml: &str, range: Range<usize>) -> SamlResult<String> {
    let inherited = namespaces_in_scope(xml, range.start)?;
    let fragment = &xml[range];
    if inherited.is_empty() {
        return canonicalize(fragment);
    }

    let mut reader = Reader::from_str(fragment);
    let mut used = BTreeSet::new();
    let mut declared = None;
    let mut name_end = 0usize;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                if declared.is_none() {
                    declared = Some(namespace_declarations(&e)?);
                    name_end = 1 + e.name().as_ref().len();
                }
                used.insert(prefix_of(e.name().as_ref()));
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.as_namespace_binding().is_none() {
                        let prefix = prefix_of(attr.key.as_ref());
                        if !prefix.is_empty() && prefix != "xml" {
                            used.insert(prefix);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let declared = declared.unwrap_or_default();
    let mut injected = String::new();
    for prefix in used {
        if declared.iter().any(|(p, _)| *p == prefix) {
            continue;
        }
        let Some((_, uri)) = inherited.iter().rev().find(|(p, _)| *p == prefix) else {
            continue;
        };
        if uri.is_empty() {
            continue;
        }
        if prefix.is_empty() {
            injected.push_str(&format!(r#" xmlns="{uri}""#));
        } else {
            injected.push_str(&format!(r#" xmlns:{prefix}="{uri}""#));
        }
    }
    if injected.is_empty() {
        return canonicalize(fragment);
    }
    canonicalize(&format!(
        "{}{injected}{}",
        &fragment[..name_end],
        &fragment[name_end..]
    ))
}

fn prefix_of(qname: &[u8]) -> String {
    qname
        .iter()
        .position(|b| *b == b':')
        .map(|i| String::from_utf8_lossy(&qname[..i]).into_owned())
        .unwrap_or_default()
}

/// Namespace declarations carried by a start tag, as (prefix, raw URI).
fn namespace_declarations(e: &BytesStart<'_>) -> SamlResult<Vec<(String, String)>> {
    let mut declarations = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let prefix = match attr.key.as_namespace_binding() {
            Some(PrefixDeclaration::Default) => String::new(),
            Some(PrefixDeclaration::Named(p)) => String::from_utf8_lossy(p).into_owned(),
            None => continue,
        };
        declarations.push((prefix, String::from_utf8_lossy(&attr.value).into_owned()));
    }
    Ok(declarations)
}

/// Declarations of the ancestors of the element starting at `position`,
/// outermost first.
fn namespaces_in_scope(xml: &str, position: usize) -> SamlResult<Vec<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    let mut scopes: Vec<Vec<(String, String)>> = Vec::new();
    loop {
        let start = offset(&reader);
        match reader.read_event()? {
            Event::Start(e) => {
                if start == position {
                    break;
                }
                scopes.push(namespace_declarations(&e)?);
            }
            Event::Empty(_) if start == position => break,
            Event::End(_) => {
                scopes.pop();
            }
            Event::Eof => {
                return Err(SamlError::XmlParse("element not found".to_string()));
            }
            _ => {}
        }
    }
    Ok(scopes.into_iter().flatten().collect())
}

/// Location of the document element.
#[derive(Debug, Clone)]
pub(crate) struct RootElement {
    /// Byte range of the whole element.
    pub range: Range<usize>,
    /// Value of its `ID` attribute.
    pub id: Option<String>,
    /// Byte offset right after the closing tag of its `Issuer` child.
    pub issuer_end: Option<usize>,
}

/// The `<ds:Signature>` element of a signed message.
#[derive(Debug, Clone, Default)]
pub struct XmlSignature {
    /// Canonicalization method URI.
    pub canonicalization: Option<String>,
    /// Signature method URI.
    pub signature_method: String,
    /// Reference URIs, one per `ds:Reference`.
    pub references: Vec<String>,
    /// Transform URIs of the reference.
    pub transforms: Vec<String>,
    /// Digest method URI.
    pub digest_method: String,
    /// Digest value, base64.
    pub digest_value: String,
    /// Signature value, base64.
    pub signature_value: String,
    /// Embedded certificates, base64 DER, signing certificate first.
    pub certificates: Vec<String>,
    /// Raw RSA key value (modulus, exponent), base64.
    pub key_value: Option<(String, String)>,
    /// Byte range of the `ds:Signature` element.
    pub(crate) signature_range: Range<usize>,
    /// Byte range of the `ds:SignedInfo` element.
    pub(crate) signed_info_range: Range<usize>,
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, name: &str) -> SamlResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn offset<R>(reader: &Reader<R>) -> usize {
    reader.buffer_position() as usize
}

/// Locates the document element, its ID and its `Issuer` child.
///
/// Anything but comments, processing instructions and whitespace after the
/// document element is rejected.
pub(crate) fn find_root(xml: &str) -> SamlResult<RootElement> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut open: Option<RootElement> = None;
    let mut complete: Option<RootElement> = None;
    let mut in_root_issuer = false;

    loop {
        let start = offset(&reader);
        match reader.read_event()? {
            Event::Start(_) | Event::Empty(_) if complete.is_some() => {
                return Err(trailing_content());
            }
            Event::Start(e) => {
                depth += 1;
                if depth == 1 {
                    open = Some(RootElement {
                        range: start..start,
                        id: attribute(&e, "ID")?,
                        issuer_end: None,
                    });
                } else if depth == 2 && local_name(&e) == "Issuer" {
                    in_root_issuer = true;
                }
            }
            Event::Empty(e) if depth == 0 => {
                complete = Some(RootElement {
                    range: start..offset(&reader),
                    id: attribute(&e, "ID")?,
                    issuer_end: None,
                });
            }
            Event::End(_) => {
                if in_root_issuer && depth == 2 {
                    in_root_issuer = false;
                    if let Some(root) = open.as_mut() {
                        if root.issuer_end.is_none() {
                            root.issuer_end = Some(offset(&reader));
                        }
                    }
                }
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(mut root) = open.take() {
                        root.range.end = offset(&reader);
                        complete = Some(root);
                    }
                }
            }
            Event::Text(t) if depth == 0 && complete.is_some() => {
                if !t.unescape()?.trim().is_empty() {
                    return Err(trailing_content());
                }
            }
            Event::CData(_) | Event::DocType(_) if complete.is_some() => {
                return Err(trailing_content());
            }
            Event::Eof => {
                return complete.ok_or_else(|| {
                    SamlError::XmlParse("no complete document element".to_string())
                });
            }
            _ => {}
        }
    }
}

fn trailing_content() -> SamlError {
    SamlError::XmlParse("content after the document element".to_string())
}

impl XmlSignature {
    /// Extracts the enveloped signature of a message and locates the root.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureMissing`] if the root carries no
    /// signature, and [`SamlError::SignatureInvalid`] if the document holds
    /// more than one signature or the signature is not a child of the root.
    pub(crate) fn parse(xml: &str) -> SamlResult<(Self, RootElement)> {
        let root = find_root(xml)?;

        let mut reader = Reader::from_str(xml);
        let mut depth = 0usize;
        let mut stack: Vec<String> = Vec::new();
        let mut found: Option<Self> = None;
        let mut signature_count = 0usize;
        let mut in_signature = false;
        let mut modulus: Option<String> = None;
        let mut exponent: Option<String> = None;

        loop {
            let start = offset(&reader);
            let event = reader.read_event()?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let name = local_name(e);
                    let is_empty = matches!(event, Event::Empty(_));

                    if name == "Signature" {
                        signature_count += 1;
                        if depth != 1 {
                            return Err(SamlError::SignatureInvalid(
                                "signature is not enveloped by the document element".to_string(),
                            ));
                        }
                        in_signature = !is_empty;
                        found = Some(Self {
                            signature_range: start..start,
                            ..Self::default()
                        });
                    }

                    if in_signature {
                        if let Some(sig) = found.as_mut() {
                            match name.as_str() {
                                "SignedInfo" => sig.signed_info_range = start..start,
                                "CanonicalizationMethod" => {
                                    sig.canonicalization = attribute(e, "Algorithm")?;
                                }
                                "SignatureMethod" => {
                                    sig.signature_method =
                                        attribute(e, "Algorithm")?.unwrap_or_default();
                                }
                                "Reference" => {
                                    sig.references.push(attribute(e, "URI")?.unwrap_or_default());
                                }
                                "Transform" => {
                                    if let Some(alg) = attribute(e, "Algorithm")? {
                                        sig.transforms.push(alg);
                                    }
                                }
                                "DigestMethod" => {
                                    sig.digest_method =
                                        attribute(e, "Algorithm")?.unwrap_or_default();
                                }
                                _ => {}
                            }
                        }
                    }

                    if !is_empty {
                        depth += 1;
                        stack.push(name);
                    }
                }
                Event::Text(ref t) if in_signature => {
                    let text = t.unescape()?;
                    let text = text.trim();
                    if let (Some(sig), Some(current)) = (found.as_mut(), stack.last()) {
                        match current.as_str() {
                            "DigestValue" => sig.digest_value.push_str(text),
                            "SignatureValue" => sig.signature_value.push_str(text),
                            "X509Certificate" => sig.certificates.push(compact(text)),
                            "Modulus" => modulus.get_or_insert_with(String::new).push_str(text),
                            "Exponent" => exponent.get_or_insert_with(String::new).push_str(text),
                            _ => {}
                        }
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    let name = stack.pop().unwrap_or_default();
                    if in_signature {
                        if let Some(sig) = found.as_mut() {
                            match name.as_str() {
                                "SignedInfo" => sig.signed_info_range.end = offset(&reader),
                                "Signature" => {
                                    sig.signature_range.end = offset(&reader);
                                    in_signature = false;
                                }
                                _ => {}
                            }
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if signature_count > 1 {
            return Err(SamlError::SignatureInvalid(
                "more than one signature in message".to_string(),
            ));
        }
        let mut signature = found.ok_or(SamlError::SignatureMissing)?;
        if let (Some(m), Some(e)) = (modulus, exponent) {
            signature.key_value = Some((compact(&m), compact(&e)));
        }
        signature.digest_value = compact(&signature.digest_value);
        signature.signature_value = compact(&signature.signature_value);

        Ok((signature, root))
    }

    /// Checks the shape required by the SAML signature profile.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] naming the first violation.
    pub fn check_profile(&self, root_id: Option<&str>) -> SamlResult<()> {
        let root_id = root_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SamlError::SignatureInvalid("signed element has no ID".to_string()))?;

        if self.signed_info_range.is_empty() {
            return Err(SamlError::SignatureInvalid("missing SignedInfo".to_string()));
        }
        let [reference] = self.references.as_slice() else {
            return Err(SamlError::SignatureInvalid(
                "exactly one reference is required".to_string(),
            ));
        };
        if *reference != format!("#{root_id}") {
            return Err(SamlError::SignatureInvalid(
                "reference does not point to the document element".to_string(),
            ));
        }
        if !self
            .transforms
            .iter()
            .any(|t| t == transforms::ENVELOPED_SIGNATURE)
        {
            return Err(SamlError::SignatureInvalid(
                "enveloped signature transform is missing".to_string(),
            ));
        }
        if let Some(other) = self.transforms.iter().find(|t| {
            t.as_str() != transforms::ENVELOPED_SIGNATURE && t.as_str() != transforms::EXCLUSIVE_C14N
        }) {
            return Err(SamlError::SignatureInvalid(format!("transform not allowed: {other}")));
        }
        if let Some(c14n) = &self.canonicalization {
            if c14n != transforms::EXCLUSIVE_C14N {
                return Err(SamlError::SignatureInvalid(format!(
                    "canonicalization not allowed: {c14n}"
                )));
            }
        }
        if self.signature_value.is_empty() {
            return Err(SamlError::SignatureInvalid("empty SignatureValue".to_string()));
        }
        if self.digest_value.is_empty() {
            return Err(SamlError::SignatureInvalid("empty DigestValue".to_string()));
        }
        Ok(())
    }
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
