//! Content fingerprint of a submission.
//!
//! The digest covers the exact bytes submitted. Whitespace, comments and
//! ordering are not normalized, so two texts that differ in any byte hash
//! differently.

use sha2::{Digest, Sha256};

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 64;

/// Hex characters of the fingerprint shown in logs.
const SHORT_LEN: usize = 16;

/// SHA-256 of `code`, lowercase hex.
pub fn fingerprint(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Log-sized prefix of a fingerprint.
pub fn short(fingerprint: &str) -> &str {
    fingerprint.get(..SHORT_LEN).unwrap_or(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_no_normalization() {
        assert_ne!(fingerprint("qc.h(0)"), fingerprint("qc.h(0) "));
        assert_ne!(fingerprint("qc.h(0)\n"), fingerprint("qc.h(0)\r\n"));
    }

    #[test]
    fn test_short() {
        let digest = fingerprint("abc");
        assert_eq!(short(&digest), "ba7816bf8f01cfea");
        assert_eq!(short("abc"), "abc");
    }

    proptest! {
        #[test]
        fn test_deterministic(code in "\\PC{0,256}") {
            let first = fingerprint(&code);
            prop_assert_eq!(first.len(), FINGERPRINT_LEN);
            prop_assert_eq!(first, fingerprint(&code));
        }

        #[test]
        fn test_distinct_inputs_hash_apart(a in "\\PC{0,64}", b in "\\PC{0,64}") {
            prop_assume!(a != b);
            prop_assert_ne!(fingerprint(&a), fingerprint(&b));
        }
    }
}
