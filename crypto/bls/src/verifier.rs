use crate::{PublicKeyBytes, SignatureBytes};
use ethereum_hashing::hash;
use fixed_bytes::Hash256;

/// The opaque signature-verification predicate.
///
/// The state transition never inspects curve points; it hands (pubkeys,
/// message, signature) triples to an implementation of this trait.
pub trait BlsVerifier {
    /// Verify a signature over `message` by a single public key.
    fn verify(&self, pubkey: &PublicKeyBytes, message: Hash256, signature: &SignatureBytes)
    -> bool;

    /// Verify an aggregate signature over a single `message` signed by every
    /// key in `pubkeys`.
    fn fast_aggregate_verify(
        &self,
        pubkeys: &[PublicKeyBytes],
        message: Hash256,
        signature: &SignatureBytes,
    ) -> bool;

    /// Verify an aggregate signature where each key signed its own message.
    /// `pubkeys` and `messages` must have equal lengths.
    fn aggregate_verify(
        &self,
        pubkeys: &[PublicKeyBytes],
        messages: &[Hash256],
        signature: &SignatureBytes,
    ) -> bool;
}

/// A deterministic stand-in for the pairing check, for use in tests.
///
/// A "signature" is valid iff it equals [`TestingVerifier::sign`] for the
/// same key set and message, so tests can mint valid and invalid signatures
/// at will. The infinity signature verifies only via
/// `fast_aggregate_verify` with an empty key set, mirroring the one context
/// in which the protocol accepts it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestingVerifier;

impl TestingVerifier {
    /// Produce the unique valid "signature" for `pubkeys` over `message`.
    pub fn sign(pubkeys: &[PublicKeyBytes], message: Hash256) -> SignatureBytes {
        let mut preimage = Vec::with_capacity(pubkeys.len() * 48 + 32);
        for pubkey in pubkeys {
            preimage.extend_from_slice(pubkey.as_serialized());
        }
        preimage.extend_from_slice(message.as_slice());
        let digest = hash(&preimage);

        let mut bytes = [0u8; 96];
        // Tag with a valid-looking compression prefix and fill the rest from
        // the digest so distinct inputs give distinct signatures.
        bytes[0] = 0xa0;
        bytes[1..33].copy_from_slice(&digest);
        bytes[33..65].copy_from_slice(&digest);
        bytes[65..96].copy_from_slice(&digest[0..31]);
        SignatureBytes::deserialize(&bytes).expect("96 bytes")
    }

    pub fn sign_single(pubkey: &PublicKeyBytes, message: Hash256) -> SignatureBytes {
        Self::sign(std::slice::from_ref(pubkey), message)
    }
}

impl BlsVerifier for TestingVerifier {
    fn verify(
        &self,
        pubkey: &PublicKeyBytes,
        message: Hash256,
        signature: &SignatureBytes,
    ) -> bool {
        !signature.is_infinity() && *signature == Self::sign_single(pubkey, message)
    }

    fn fast_aggregate_verify(
        &self,
        pubkeys: &[PublicKeyBytes],
        message: Hash256,
        signature: &SignatureBytes,
    ) -> bool {
        if pubkeys.is_empty() {
            return signature.is_infinity();
        }
        !signature.is_infinity() && *signature == Self::sign(pubkeys, message)
    }

    fn aggregate_verify(
        &self,
        pubkeys: &[PublicKeyBytes],
        messages: &[Hash256],
        signature: &SignatureBytes,
    ) -> bool {
        if pubkeys.len() != messages.len() || pubkeys.is_empty() || signature.is_infinity() {
            return false;
        }
        // Fold the per-key messages into one digest; enough to make the
        // signature depend on every (key, message) pair.
        let mut preimage = Vec::with_capacity(messages.len() * 32);
        for message in messages {
            preimage.extend_from_slice(message.as_slice());
        }
        let folded = Hash256::from_slice(&hash(&preimage));
        *signature == Self::sign(pubkeys, folded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixed_bytes::FixedBytesExtended;

    fn pubkey(byte: u8) -> PublicKeyBytes {
        PublicKeyBytes::deserialize(&[byte; 48]).unwrap()
    }

    #[test]
    fn minted_signature_verifies() {
        let verifier = TestingVerifier;
        let pk = pubkey(1);
        let message = Hash256::from_low_u64_be(42);
        let sig = TestingVerifier::sign_single(&pk, message);
        assert!(verifier.verify(&pk, message, &sig));
    }

    #[test]
    fn wrong_message_fails() {
        let verifier = TestingVerifier;
        let pk = pubkey(1);
        let sig = TestingVerifier::sign_single(&pk, Hash256::from_low_u64_be(42));
        assert!(!verifier.verify(&pk, Hash256::from_low_u64_be(43), &sig));
    }

    #[test]
    fn wrong_key_fails() {
        let verifier = TestingVerifier;
        let message = Hash256::from_low_u64_be(42);
        let sig = TestingVerifier::sign_single(&pubkey(1), message);
        assert!(!verifier.verify(&pubkey(2), message, &sig));
    }

    #[test]
    fn infinity_rejected_for_single_verify() {
        let verifier = TestingVerifier;
        assert!(!verifier.verify(
            &pubkey(1),
            Hash256::from_low_u64_be(42),
            &SignatureBytes::infinity()
        ));
    }

    #[test]
    fn infinity_accepted_only_for_empty_aggregate() {
        let verifier = TestingVerifier;
        let message = Hash256::from_low_u64_be(7);
        assert!(verifier.fast_aggregate_verify(&[], message, &SignatureBytes::infinity()));
        assert!(!verifier.fast_aggregate_verify(
            &[pubkey(1)],
            message,
            &SignatureBytes::infinity()
        ));
    }

    #[test]
    fn aggregate_verify_depends_on_all_messages() {
        let verifier = TestingVerifier;
        let pubkeys = [pubkey(1), pubkey(2)];
        let messages = [Hash256::from_low_u64_be(1), Hash256::from_low_u64_be(2)];

        let mut preimage = Vec::new();
        for m in &messages {
            preimage.extend_from_slice(m.as_slice());
        }
        let folded = Hash256::from_slice(&hash(&preimage));
        let sig = TestingVerifier::sign(&pubkeys, folded);

        assert!(verifier.aggregate_verify(&pubkeys, &messages, &sig));

        let wrong_messages = [Hash256::from_low_u64_be(1), Hash256::from_low_u64_be(3)];
        assert!(!verifier.aggregate_verify(&pubkeys, &wrong_messages, &sig));
    }
}
