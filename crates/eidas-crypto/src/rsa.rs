//! RSA PKCS#1 v1.5 signatures.
//!
//! Verification accepts keys of 2048 to 8192 bits, which is also the minimum
//! key length the node accepts on incoming signatures.

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{self, RsaKeyPair, UnparsedPublicKey, VerificationAlgorithm},
};

use crate::algorithm::RsaAlgorithm;
use crate::error::{CryptoError, CryptoResult};

/// Signs data with an RSA private key.
///
/// # Arguments
///
/// * `key_der` - RSA private key in DER format (PKCS#8 or PKCS#1)
/// * `data` - Data to sign
/// * `algorithm` - Signature algorithm; SHA-1 is refused
///
/// # Errors
///
/// Returns an error if the key cannot be parsed, the algorithm may not be
/// used for signing, or signing fails.
pub fn rsa_sign(key_der: &[u8], data: &[u8], algorithm: RsaAlgorithm) -> CryptoResult<Vec<u8>> {
    let padding = match algorithm {
        RsaAlgorithm::Sha256 => &signature::RSA_PKCS1_SHA256,
        RsaAlgorithm::Sha384 => &signature::RSA_PKCS1_SHA384,
        RsaAlgorithm::Sha512 => &signature::RSA_PKCS1_SHA512,
        RsaAlgorithm::Sha1 => {
            return Err(CryptoError::UnsupportedAlgorithm(
                "SHA-1 cannot be used for new signatures".to_string(),
            ));
        }
    };

    let key_pair = RsaKeyPair::from_pkcs8(key_der)
        .or_else(|_| RsaKeyPair::from_der(key_der))
        .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA key: {e}")))?;

    let rng = SystemRandom::new();
    let mut sig = vec![0u8; key_pair.public_modulus_len()];

    key_pair
        .sign(padding, &rng, data, &mut sig)
        .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;

    Ok(sig)
}

/// Verifies an RSA signature.
///
/// # Arguments
///
/// * `public_key_der` - RSA public key in DER format (`RSAPublicKey`)
/// * `data` - Original data that was signed
/// * `sig` - Signature to verify
/// * `algorithm` - Signature algorithm
///
/// Returns `Ok(false)` when the signature does not match.
///
/// # Errors
///
/// This function does not currently fail; the `Result` leaves room for key
/// parsing errors to be reported separately from mismatches.
pub fn rsa_verify(
    public_key_der: &[u8],
    data: &[u8],
    sig: &[u8],
    algorithm: RsaAlgorithm,
) -> CryptoResult<bool> {
    let verification_alg: &'static dyn VerificationAlgorithm = match algorithm {
        RsaAlgorithm::Sha1 => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        RsaAlgorithm::Sha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
        RsaAlgorithm::Sha384 => &signature::RSA_PKCS1_2048_8192_SHA384,
        RsaAlgorithm::Sha512 => &signature::RSA_PKCS1_2048_8192_SHA512,
    };

    let public_key = UnparsedPublicKey::new(verification_alg, public_key_der);

    Ok(public_key.verify(data, sig).is_ok())
}
