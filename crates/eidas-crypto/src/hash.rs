//! Message digests.

use aws_lc_rs::digest as lc_digest;

use crate::algorithm::DigestAlgorithm;

/// Computes a digest of the input data.
#[must_use]
pub fn digest(algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8> {
    let alg = match algorithm {
        DigestAlgorithm::Sha1 => &lc_digest::SHA1_FOR_LEGACY_USE_ONLY,
        DigestAlgorithm::Sha256 => &lc_digest::SHA256,
        DigestAlgorithm::Sha384 => &lc_digest::SHA384,
        DigestAlgorithm::Sha512 => &lc_digest::SHA512,
    };

    lc_digest::digest(alg, data).as_ref().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_produces_algorithm_length() {
        for alg in [
            DigestAlgorithm::Sha1,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ] {
            assert_eq!(digest(alg, b"test").len(), alg.output_len());
        }
    }

    #[test]
    fn sha256_known_vector() {
        let out = digest(DigestAlgorithm::Sha256, b"abc");
        assert_eq!(out[0], 0xba);
        assert_eq!(out[31], 0xad);
    }

    #[test]
    fn different_inputs_produce_different_digests() {
        let a = digest(DigestAlgorithm::Sha512, b"hello");
        let b = digest(DigestAlgorithm::Sha512, b"world");
        assert_ne!(a, b);
    }
}
