//! XML Signature validation.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. signature shape (one enveloped signature referencing the root)
//! 2. signature and digest algorithm allow-lists, before any crypto
//! 3. trust of the embedded certificate chain or raw key
//! 4. certificate constraints (hash length, key size, validity, self-signed)
//! 5. digest and signature value

use base64::Engine;
use eidas_core::config::RSA_SHA1;
use eidas_core::SignatureConfig;
use eidas_crypto::{digest, rsa_verify, RsaPublicComponents};
use tracing::{debug, warn};

use crate::error::{SamlError, SamlResult};

use super::{
    canonicalize, canonicalize_fragment, digest_from_uri, CertificateInfo, SignatureAlgorithm,
    TrustStore, XmlSignature,
};

/// Minimum bit length of the hash used to sign an accepted certificate.
pub const MIN_CERTIFICATE_HASH_BITS: usize = 256;

/// Minimum RSA key length accepted on incoming signatures.
pub const MIN_RSA_KEY_BITS: usize = 2048;

/// Upper bound on certificates walked when building a chain.
const MAX_CHAIN_LENGTH: usize = 8;

/// Outcome of a successful validation.
#[derive(Debug, Clone)]
pub struct ValidatedSignature {
    /// Algorithm of the verified signature.
    pub algorithm: SignatureAlgorithm,
    /// The signing certificate, when the signature embedded one.
    pub certificate: Option<CertificateInfo>,
}

/// XML signature validator.
#[derive(Debug, Clone)]
pub struct SignatureValidator {
    signature_algorithms: Vec<String>,
    digest_algorithms: Vec<String>,
    check_validity_period: bool,
    disallow_self_signed: bool,
}

impl SignatureValidator {
    /// Creates a validator from the signature configuration.
    ///
    /// Verification accepts the configured whitelist plus legacy RSA-SHA1.
    #[must_use]
    pub fn new(config: &SignatureConfig) -> Self {
        let mut signature_algorithms: Vec<String> = config
            .signature_algorithm_whitelist
            .iter()
            .map(|alg| alg.trim().to_string())
            .collect();
        if !signature_algorithms.iter().any(|alg| alg == RSA_SHA1) {
            signature_algorithms.push(RSA_SHA1.to_string());
        }

        Self {
            signature_algorithms,
            digest_algorithms: config
                .digest_algorithm_whitelist
                .iter()
                .map(|alg| alg.trim().to_string())
                .collect(),
            check_validity_period: config.check_validity_period,
            disallow_self_signed: config.disallow_self_signed,
        }
    }

    /// Validates the enveloped signature of a message against `trusted`.
    ///
    /// # Errors
    ///
    /// Returns a security class [`SamlError`] describing the first failed check.
    pub fn validate(&self, xml: &str, trusted: &TrustStore) -> SamlResult<ValidatedSignature> {
        let (signature, root) = XmlSignature::parse(xml)?;
        signature.check_profile(root.id.as_deref())?;

        let algorithm = self.check_algorithms(&signature)?;

        let certificate = self.resolve_trust(&signature, trusted)?;
        let public_key = match &certificate {
            Some(cert) => {
                self.check_certificate(cert)?;
                cert.public_key.clone()
            }
            None => raw_key(&signature)?.to_der(),
        };

        self.verify_digest(xml, &signature, &root.range)?;
        self.verify_signature_value(xml, &signature, &public_key, algorithm)?;

        debug!(algorithm = %algorithm.uri(), "signature verified");
        Ok(ValidatedSignature {
            algorithm,
            certificate,
        })
    }

    fn check_algorithms(&self, signature: &XmlSignature) -> SamlResult<SignatureAlgorithm> {
        let method = signature.signature_method.trim();
        let algorithm = SignatureAlgorithm::from_uri(method)
            .filter(|_| self.signature_algorithms.iter().any(|alg| alg == method))
            .ok_or_else(|| {
                warn!(algorithm = %method, "signature algorithm not allowed");
                SamlError::InvalidSignatureAlgorithm(method.to_string())
            })?;

        let digest_method = signature.digest_method.trim();
        if digest_from_uri(digest_method).is_none()
            || !self.digest_algorithms.iter().any(|alg| alg == digest_method)
        {
            warn!(algorithm = %digest_method, "digest algorithm not allowed");
            return Err(SamlError::InvalidSignatureAlgorithm(digest_method.to_string()));
        }

        Ok(algorithm)
    }

    /// Finds the credential the signature claims and decides whether it is
    /// trusted. Returns the signing certificate, or `None` for a trusted raw key.
    fn resolve_trust(
        &self,
        signature: &XmlSignature,
        trusted: &TrustStore,
    ) -> SamlResult<Option<CertificateInfo>> {
        if signature.certificates.is_empty() {
            let key = raw_key(signature)?;
            return if trusted.trusts_key(&key) {
                Ok(None)
            } else {
                Err(SamlError::UntrustedSignature)
            };
        }

        let embedded = signature
            .certificates
            .iter()
            .map(|b64| CertificateInfo::from_base64(b64))
            .collect::<SamlResult<Vec<_>>>()?;
        let leaf = embedded
            .first()
            .cloned()
            .ok_or(SamlError::UntrustedSignature)?;

        let mut current = &leaf;
        for _ in 0..MAX_CHAIN_LENGTH {
            if trusted.contains(current) || trusted.issuer_of(current).is_some() {
                return Ok(Some(leaf));
            }
            match embedded
                .iter()
                .find(|candidate| *candidate != current && current.is_issued_by(candidate))
            {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Err(SamlError::UntrustedSignature)
    }

    fn check_certificate(&self, cert: &CertificateInfo) -> SamlResult<()> {
        match cert.signature_digest {
            Some(alg) if alg.bits() >= MIN_CERTIFICATE_HASH_BITS => {}
            Some(_) => return Err(SamlError::InvalidMinimumSignatureHashLength),
            None => {
                return Err(SamlError::InvalidCertificate(
                    "unsupported certificate signature algorithm".to_string(),
                ));
            }
        }

        let bits = cert.public_components()?.bits();
        if bits < MIN_RSA_KEY_BITS {
            return Err(SamlError::InvalidCertificate(format!(
                "RSA key of {bits} bits is too short"
            )));
        }

        if self.check_validity_period && !cert.is_currently_valid() {
            return Err(SamlError::CertificateExpired);
        }
        if self.disallow_self_signed && cert.is_self_signed() {
            return Err(SamlError::SelfSignedCertificate);
        }
        Ok(())
    }

    fn verify_digest(
        &self,
        xml: &str,
        signature: &XmlSignature,
        root: &std::ops::Range<usize>,
    ) -> SamlResult<()> {
        let digest_algorithm = digest_from_uri(&signature.digest_method).ok_or_else(|| {
            SamlError::InvalidSignatureAlgorithm(signature.digest_method.clone())
        })?;

        let without_signature = format!(
            "{}{}",
            &xml[root.start..signature.signature_range.start],
            &xml[signature.signature_range.end..root.end]
        );
        let canonical = canonicalize(&without_signature)
            .map_err(|e| SamlError::SignatureInvalid(e.to_string()))?;
        let calculated = base64::engine::general_purpose::STANDARD
            .encode(digest(digest_algorithm, canonical.as_bytes()));

        if calculated != signature.digest_value {
            return Err(SamlError::SignatureInvalid("digest value mismatch".to_string()));
        }
        Ok(())
    }

    fn verify_signature_value(
        &self,
        xml: &str,
        signature: &XmlSignature,
        public_key: &[u8],
        algorithm: SignatureAlgorithm,
    ) -> SamlResult<()> {
        let signed_info = canonicalize_fragment(xml, signature.signed_info_range.clone())
            .map_err(|e| SamlError::SignatureInvalid(e.to_string()))?;
        let value = base64::engine::general_purpose::STANDARD
            .decode(&signature.signature_value)
            .map_err(|e| SamlError::SignatureInvalid(format!("bad signature encoding: {e}")))?;

        let valid = rsa_verify(public_key, signed_info.as_bytes(), &value, algorithm.rsa())
            .map_err(|e| SamlError::SignatureInvalid(e.to_string()))?;
        if valid {
            Ok(())
        } else {
            Err(SamlError::SignatureInvalid("signature verification failed".to_string()))
        }
    }
}

fn raw_key(signature: &XmlSignature) -> SamlResult<RsaPublicComponents> {
    let (modulus, exponent) = signature
        .key_value
        .as_ref()
        .ok_or(SamlError::UntrustedSignature)?;
    let key = RsaPublicComponents::from_base64(modulus, exponent)
        .map_err(|_| SamlError::UntrustedSignature)?;
    if key.modulus.is_empty() {
        return Err(SamlError::UntrustedSignature);
    }
    Ok(key)
}
