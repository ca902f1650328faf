//! XML Signature creation.

use base64::Engine;
use eidas_core::config::SIGNING_ALGORITHMS;
use eidas_core::SignatureConfig;
use eidas_crypto::{digest, pem_to_der, rsa_sign, RsaPublicComponents};
use tracing::debug;

use crate::error::{SamlError, SamlResult};
use crate::types::transforms;

use super::{canonicalize, digest_uri, find_root, CertificateInfo, SignatureAlgorithm};

/// Private key and certificate of the node.
#[derive(Clone)]
pub struct SigningCredential {
    key_der: Vec<u8>,
    certificate: CertificateInfo,
}

impl std::fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredential")
            .field("certificate", &self.certificate.subject)
            .finish_non_exhaustive()
    }
}

impl SigningCredential {
    /// Creates a credential from DER key (PKCS#8 or PKCS#1) and certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be parsed.
    pub fn new(key_der: Vec<u8>, certificate_der: &[u8]) -> SamlResult<Self> {
        Ok(Self {
            key_der,
            certificate: CertificateInfo::from_der(certificate_der)?,
        })
    }

    /// Creates a credential from PEM-encoded key and certificate.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if either PEM is unusable.
    pub fn from_pem(private_key_pem: &str, certificate_pem: &str) -> SamlResult<Self> {
        let key_der = pem_to_der(private_key_pem, "PRIVATE KEY")
            .or_else(|_| pem_to_der(private_key_pem, "RSA PRIVATE KEY"))
            .map_err(|e| SamlError::Configuration(format!("signing key: {e}")))?;
        let certificate_der = pem_to_der(certificate_pem, "CERTIFICATE")
            .map_err(|e| SamlError::Configuration(format!("signing certificate: {e}")))?;
        Self::new(key_der, &certificate_der)
    }

    /// The signing certificate.
    #[must_use]
    pub fn certificate(&self) -> &CertificateInfo {
        &self.certificate
    }

    /// The RSA public key components.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate does not hold an RSA key.
    pub fn public_components(&self) -> SamlResult<RsaPublicComponents> {
        self.certificate.public_components()
    }
}

/// What the signature's `KeyInfo` carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyInfoMode {
    /// The X.509 signing certificate.
    #[default]
    Certificate,
    /// Only the raw RSA key value.
    KeyValue,
}

/// Signs eIDAS messages with the node credential.
#[derive(Debug, Clone)]
pub struct ProtocolSigner {
    credential: SigningCredential,
    algorithm: SignatureAlgorithm,
    key_info: KeyInfoMode,
    check_validity_period: bool,
    disallow_self_signed: bool,
}

impl ProtocolSigner {
    /// Creates a signer using the configured signing algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if the algorithm is unknown or not
    /// allowed for new signatures.
    pub fn new(credential: SigningCredential, config: &SignatureConfig) -> SamlResult<Self> {
        let uri = config.signing_algorithm.trim();
        let algorithm = SignatureAlgorithm::from_uri(uri)
            .filter(|alg| alg.rsa().can_sign() && SIGNING_ALGORITHMS.contains(&alg.uri()))
            .ok_or_else(|| SamlError::Configuration(format!("signing algorithm {uri} is not allowed")))?;

        Ok(Self {
            credential,
            algorithm,
            key_info: KeyInfoMode::default(),
            check_validity_period: config.check_validity_period,
            disallow_self_signed: config.disallow_self_signed,
        })
    }

    /// Sets what the signature's `KeyInfo` carries.
    #[must_use]
    pub fn with_key_info(mut self, mode: KeyInfoMode) -> Self {
        self.key_info = mode;
        self
    }

    /// The algorithm of produced signatures.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// The signing credential.
    #[must_use]
    pub fn credential(&self) -> &SigningCredential {
        &self.credential
    }

    /// Signs the document element of `xml`.
    ///
    /// The signature is inserted after the root's `Issuer` element, or as
    /// first child when there is none.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureCreation`] if the document has no
    /// identified root or the credential is unusable.
    pub fn sign(&self, xml: &str) -> SamlResult<String> {
        self.check_credential()?;

        let root = find_root(xml)
            .map_err(|e| SamlError::SignatureCreation(format!("unsigned document: {e}")))?;
        let reference_id = root
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SamlError::SignatureCreation("document element has no ID".to_string()))?;

        let insert_position = match root.issuer_end {
            Some(position) => position,
            None => xml[root.range.clone()]
                .find('>')
                .map(|pos| root.range.start + pos + 1)
                .ok_or_else(|| SamlError::SignatureCreation("malformed document".to_string()))?,
        };

        let element = &xml[root.range.clone()];
        let digest_algorithm = self.algorithm.digest();
        let canonical = canonicalize(element)
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;
        let digest_value = base64::engine::general_purpose::STANDARD
            .encode(digest(digest_algorithm, canonical.as_bytes()));

        let signed_info = build_signed_info(reference_id, &digest_value, self.algorithm);
        let canonical_signed_info = canonicalize(&signed_info)
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;
        let signature_value = rsa_sign(
            &self.credential.key_der,
            canonical_signed_info.as_bytes(),
            self.algorithm.rsa(),
        )
        .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;
        let signature_b64 = base64::engine::general_purpose::STANDARD.encode(signature_value);

        let signature = build_signature_element(&signed_info, &signature_b64, &self.key_info()?);
        debug!(reference = %reference_id, algorithm = %self.algorithm.uri(), "signed document");

        Ok(format!(
            "{}{}{}",
            &xml[..insert_position],
            signature,
            &xml[insert_position..]
        ))
    }

    fn check_credential(&self) -> SamlResult<()> {
        let certificate = self.credential.certificate();
        if self.check_validity_period && !certificate.is_currently_valid() {
            return Err(SamlError::SignatureCreation(
                "signing certificate is outside its validity period".to_string(),
            ));
        }
        if self.disallow_self_signed && certificate.is_self_signed() {
            return Err(SamlError::SignatureCreation(
                "signing certificate is self-signed".to_string(),
            ));
        }
        Ok(())
    }

    fn key_info(&self) -> SamlResult<String> {
        Ok(match self.key_info {
            KeyInfoMode::Certificate => format!(
                "<ds:KeyInfo>\n<ds:X509Data>\n<ds:X509Certificate>{}</ds:X509Certificate>\n</ds:X509Data>\n</ds:KeyInfo>",
                self.credential.certificate().to_base64()
            ),
            KeyInfoMode::KeyValue => {
                let key = self.credential.public_components()?;
                format!(
                    "<ds:KeyInfo>\n<ds:KeyValue>\n<ds:RSAKeyValue>\n<ds:Modulus>{}</ds:Modulus>\n<ds:Exponent>{}</ds:Exponent>\n</ds:RSAKeyValue>\n</ds:KeyValue>\n</ds:KeyInfo>",
                    key.modulus_b64(),
                    key.exponent_b64()
                )
            }
        })
    }
}

/// Builds the SignedInfo element.
fn build_signed_info(reference_id: &str, digest_b64: &str, algorithm: SignatureAlgorithm) -> String {
    format!(
        r##"<ds:SignedInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
<ds:CanonicalizationMethod Algorithm="{c14n}"/>
<ds:SignatureMethod Algorithm="{}"/>
<ds:Reference URI="#{}">
<ds:Transforms>
<ds:Transform Algorithm="{}"/>
<ds:Transform Algorithm="{c14n}"/>
</ds:Transforms>
<ds:DigestMethod Algorithm="{}"/>
<ds:DigestValue>{}</ds:DigestValue>
</ds:Reference>
</ds:SignedInfo>"##,
        algorithm.uri(),
        reference_id,
        transforms::ENVELOPED_SIGNATURE,
        digest_uri(algorithm.digest()),
        digest_b64,
        c14n = transforms::EXCLUSIVE_C14N,
    )
}

/// Builds the complete Signature element.
fn build_signature_element(signed_info: &str, signature_value: &str, key_info: &str) -> String {
    format!(
        "<ds:Signature xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">\n{signed_info}\n<ds:SignatureValue>{signature_value}</ds:SignatureValue>\n{key_info}\n</ds:Signature>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::signature::XmlSignature;

    const UNSIGNED: &str = r#"<saml2p:Response xmlns:saml2p="urn:oasis:names:tc:SAML:2.0:protocol" ID="_resp"><saml2:Issuer xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion">https://node.example/metadata</saml2:Issuer><saml2p:Status/></saml2p:Response>"#;

    fn signer() -> ProtocolSigner {
        let credential =
            SigningCredential::from_pem(fixtures::NODE_KEY, fixtures::NODE_CERT).unwrap();
        ProtocolSigner::new(credential, &SignatureConfig::default()).unwrap()
    }

    #[test]
    fn signature_follows_issuer() {
        let signed = signer().sign(UNSIGNED).unwrap();
        let issuer_end = signed.find("</saml2:Issuer>").unwrap() + "</saml2:Issuer>".len();
        assert!(signed[issuer_end..].starts_with("<ds:Signature"));
        assert!(signed.contains("<ds:X509Certificate>"));

        let (sig, root) = XmlSignature::parse(&signed).unwrap();
        sig.check_profile(root.id.as_deref()).unwrap();
        assert_eq!(sig.signature_method, SignatureAlgorithm::RsaSha512.uri());
    }

    #[test]
    fn key_value_mode_omits_certificate() {
        let signed = signer().with_key_info(KeyInfoMode::KeyValue).sign(UNSIGNED).unwrap();
        assert!(!signed.contains("X509Certificate"));
        let (sig, _) = XmlSignature::parse(&signed).unwrap();
        assert!(sig.key_value.is_some());
    }

    #[test]
    fn sha1_cannot_be_configured_for_signing() {
        let credential =
            SigningCredential::from_pem(fixtures::NODE_KEY, fixtures::NODE_CERT).unwrap();
        let config = SignatureConfig {
            signing_algorithm: SignatureAlgorithm::RsaSha1.uri().to_string(),
            ..SignatureConfig::default()
        };
        assert!(matches!(
            ProtocolSigner::new(credential, &config),
            Err(SamlError::Configuration(_))
        ));
    }

    #[test]
    fn document_without_id_cannot_be_signed() {
        let err = signer().sign("<a><Issuer>x</Issuer></a>").unwrap_err();
        assert!(matches!(err, SamlError::SignatureCreation(_)));
    }

    #[test]
    fn self_signed_credential_is_refused_when_disallowed() {
        let credential =
            SigningCredential::from_pem(fixtures::ROGUE_KEY, fixtures::ROGUE_CERT).unwrap();
        let strict = ProtocolSigner::new(credential.clone(), &SignatureConfig::default()).unwrap();
        assert!(matches!(strict.sign(UNSIGNED), Err(SamlError::SignatureCreation(_))));

        let relaxed = SignatureConfig {
            disallow_self_signed: false,
            ..SignatureConfig::default()
        };
        let lenient = ProtocolSigner::new(credential, &relaxed).unwrap();
        assert!(lenient.sign(UNSIGNED).is_ok());
    }
}
