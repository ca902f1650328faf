//! Trusted credentials.
//!
//! A [`TrustStore`] is loaded once (node trust anchors, or the signing
//! certificates published in an issuer's metadata) and only read afterwards.

use base64::Engine;
use chrono::Utc;
use eidas_crypto::{pem_blocks, rsa_verify, DigestAlgorithm, RsaAlgorithm, RsaPublicComponents};
use x509_parser::oid_registry::{
    OID_PKCS1_RSAENCRYPTION, OID_PKCS1_SHA1WITHRSA, OID_PKCS1_SHA256WITHRSA,
    OID_PKCS1_SHA384WITHRSA, OID_PKCS1_SHA512WITHRSA,
};

use crate::error::{SamlError, SamlResult};

/// The facts about an X.509 certificate that trust decisions need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Full DER encoding.
    pub der: Vec<u8>,
    /// Raw DER of the subject name.
    pub subject: Vec<u8>,
    /// Raw DER of the issuer name.
    pub issuer: Vec<u8>,
    /// `RSAPublicKey` DER; empty for other key types.
    pub public_key: Vec<u8>,
    /// Digest used by the issuer's signature; `None` for non-RSA signatures.
    pub signature_digest: Option<DigestAlgorithm>,
    /// Country (`C=`) of the subject, if any.
    pub country: Option<String>,
    tbs: Vec<u8>,
    signature: Vec<u8>,
    not_before: i64,
    not_after: i64,
}

impl CertificateInfo {
    /// Parses a DER certificate.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidCertificate`] if the bytes are not a
    /// certificate.
    pub fn from_der(der: &[u8]) -> SamlResult<Self> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| SamlError::InvalidCertificate(format!("unparseable certificate: {e}")))?;

        let spki = cert.public_key();
        let public_key = if spki.algorithm.algorithm == OID_PKCS1_RSAENCRYPTION {
            spki.subject_public_key.data.to_vec()
        } else {
            Vec::new()
        };

        let oid = &cert.signature_algorithm.algorithm;
        let signature_digest = if *oid == OID_PKCS1_SHA1WITHRSA {
            Some(DigestAlgorithm::Sha1)
        } else if *oid == OID_PKCS1_SHA256WITHRSA {
            Some(DigestAlgorithm::Sha256)
        } else if *oid == OID_PKCS1_SHA384WITHRSA {
            Some(DigestAlgorithm::Sha384)
        } else if *oid == OID_PKCS1_SHA512WITHRSA {
            Some(DigestAlgorithm::Sha512)
        } else {
            None
        };

        let country = cert
            .subject()
            .iter_country()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_string);

        Ok(Self {
            der: der.to_vec(),
            subject: cert.subject().as_raw().to_vec(),
            issuer: cert.issuer().as_raw().to_vec(),
            public_key,
            signature_digest,
            country,
            tbs: cert.tbs_certificate.as_ref().to_vec(),
            signature: cert.signature_value.data.to_vec(),
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
        })
    }

    /// Parses a base64 DER certificate, as embedded in `ds:X509Certificate`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidCertificate`] for bad base64 or DER.
    pub fn from_base64(b64: &str) -> SamlResult<Self> {
        let der = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| SamlError::InvalidCertificate(format!("bad certificate encoding: {e}")))?;
        Self::from_der(&der)
    }

    /// Base64 of the DER encoding.
    #[must_use]
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.der)
    }

    /// Returns true if subject and issuer are the same name.
    #[must_use]
    pub fn is_self_signed(&self) -> bool {
        self.subject == self.issuer
    }

    /// Returns true if the current time is inside the validity period.
    #[must_use]
    pub fn is_currently_valid(&self) -> bool {
        let now = Utc::now().timestamp();
        self.not_before <= now && now <= self.not_after
    }

    /// Returns the RSA key components.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidCertificate`] for non-RSA keys.
    pub fn public_components(&self) -> SamlResult<RsaPublicComponents> {
        if self.public_key.is_empty() {
            return Err(SamlError::InvalidCertificate("not an RSA key".to_string()));
        }
        RsaPublicComponents::from_der(&self.public_key)
            .map_err(|e| SamlError::InvalidCertificate(e.to_string()))
    }

    /// Returns true if `issuer` names this certificate's issuer and its key
    /// verifies this certificate's signature.
    #[must_use]
    pub fn is_issued_by(&self, issuer: &Self) -> bool {
        if self.issuer != issuer.subject || issuer.public_key.is_empty() {
            return false;
        }
        let algorithm = match self.signature_digest {
            Some(DigestAlgorithm::Sha1) => RsaAlgorithm::Sha1,
            Some(DigestAlgorithm::Sha256) => RsaAlgorithm::Sha256,
            Some(DigestAlgorithm::Sha384) => RsaAlgorithm::Sha384,
            Some(DigestAlgorithm::Sha512) => RsaAlgorithm::Sha512,
            None => return false,
        };
        rsa_verify(&issuer.public_key, &self.tbs, &self.signature, algorithm).unwrap_or(false)
    }
}

/// Set of trusted certificates.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    certificates: Vec<CertificateInfo>,
}

impl TrustStore {
    /// Creates a store holding the given certificates.
    #[must_use]
    pub fn new(certificates: Vec<CertificateInfo>) -> Self {
        Self { certificates }
    }

    /// Loads every `CERTIFICATE` block of a PEM bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if a block cannot be decoded or parsed.
    pub fn from_pem(pem: &str) -> SamlResult<Self> {
        let blocks = pem_blocks(pem, "CERTIFICATE")
            .map_err(|e| SamlError::InvalidCertificate(e.to_string()))?;
        let certificates = blocks
            .iter()
            .map(|der| CertificateInfo::from_der(der))
            .collect::<SamlResult<Vec<_>>>()?;
        Ok(Self { certificates })
    }

    /// Loads several PEM bundles into one store.
    ///
    /// # Errors
    ///
    /// Returns an error if any bundle is invalid.
    pub fn from_pem_list<S: AsRef<str>>(pems: &[S]) -> SamlResult<Self> {
        let mut certificates = Vec::new();
        for pem in pems {
            certificates.extend(Self::from_pem(pem.as_ref())?.certificates);
        }
        Ok(Self { certificates })
    }

    /// Number of trusted certificates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Returns true if nothing is trusted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Iterates over the trusted certificates.
    pub fn iter(&self) -> impl Iterator<Item = &CertificateInfo> {
        self.certificates.iter()
    }

    /// Returns true if this exact certificate is trusted.
    #[must_use]
    pub fn contains(&self, certificate: &CertificateInfo) -> bool {
        self.certificates.iter().any(|c| c.der == certificate.der)
    }

    /// Returns the trusted certificate that issued `certificate`.
    #[must_use]
    pub fn issuer_of(&self, certificate: &CertificateInfo) -> Option<&CertificateInfo> {
        self.certificates.iter().find(|c| certificate.is_issued_by(c))
    }

    /// Returns true if a trusted certificate holds exactly this RSA key.
    #[must_use]
    pub fn trusts_key(&self, key: &RsaPublicComponents) -> bool {
        self.certificates
            .iter()
            .filter_map(|c| c.public_components().ok())
            .any(|trusted| trusted == *key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn parses_fixture_certificate() {
        let store = TrustStore::from_pem(fixtures::CONNECTOR_CERT).unwrap();
        assert_eq!(store.len(), 1);
        let cert = store.iter().next().unwrap();
        assert_eq!(cert.country.as_deref(), Some("CC"));
        assert_eq!(cert.signature_digest, Some(DigestAlgorithm::Sha256));
        assert!(!cert.is_self_signed());
        assert!(cert.is_currently_valid());
        assert_eq!(cert.public_components().unwrap().bits(), 2048);
    }

    #[test]
    fn chain_to_ca() {
        let ca = TrustStore::from_pem(fixtures::CA_CERT).unwrap();
        let connector = TrustStore::from_pem(fixtures::CONNECTOR_CERT).unwrap();
        let leaf = connector.iter().next().unwrap();
        assert!(ca.issuer_of(leaf).is_some());
        assert!(!ca.contains(leaf));
    }

    #[test]
    fn rogue_is_not_issued_by_ca() {
        let ca = TrustStore::from_pem(fixtures::CA_CERT).unwrap();
        let rogue = TrustStore::from_pem(fixtures::ROGUE_CERT).unwrap();
        let rogue = rogue.iter().next().unwrap();
        assert!(rogue.is_self_signed());
        assert!(ca.issuer_of(rogue).is_none());
    }

    #[test]
    fn key_match_is_exact() {
        let store = TrustStore::from_pem(fixtures::CONNECTOR_CERT).unwrap();
        let key = store.iter().next().unwrap().public_components().unwrap();
        assert!(store.trusts_key(&key));

        let mut other = key.clone();
        other.exponent = vec![0x03];
        assert!(!store.trusts_key(&other));
    }

    #[test]
    fn expired_certificate() {
        let store = TrustStore::from_pem(fixtures::EXPIRED_CERT).unwrap();
        assert!(!store.iter().next().unwrap().is_currently_valid());
    }

    #[test]
    fn bundle_loading() {
        let bundle = format!("{}\n{}", fixtures::CA_CERT, fixtures::NODE_CERT);
        assert_eq!(TrustStore::from_pem(&bundle).unwrap().len(), 2);
        assert!(TrustStore::from_pem("").unwrap().is_empty());
    }
}
