//! Serialized forms of BLS12-381 public keys and signatures, plus the narrow
//! verification oracle the state transition calls through.
//!
//! The pairing math itself lives behind the [`BlsVerifier`] trait: production
//! deployments plug in a real backend, while this crate ships a deterministic
//! [`TestingVerifier`] that tests use to mint and check "signatures" without
//! any curve arithmetic. Nothing in this workspace inspects signature bytes
//! beyond the compression-prefix rules (notably the point-at-infinity
//! encoding).

mod bytes_types;
mod verifier;

pub use bytes_types::{PublicKeyBytes, SignatureBytes};
pub use verifier::{BlsVerifier, TestingVerifier};

pub const PUBLIC_KEY_BYTES_LEN: usize = 48;
pub const SIGNATURE_BYTES_LEN: usize = 96;

/// The compressed encoding of the G2 point at infinity.
///
/// This is the "empty" aggregate signature: it must be rejected everywhere
/// except a sync aggregate with no participants, which requires it.
pub const INFINITY_SIGNATURE: [u8; SIGNATURE_BYTES_LEN] = {
    let mut bytes = [0u8; SIGNATURE_BYTES_LEN];
    bytes[0] = 0xc0;
    bytes
};

/// The compressed encoding of the G1 point at infinity (the "empty"
/// aggregate public key).
pub const INFINITY_PUBLIC_KEY: [u8; PUBLIC_KEY_BYTES_LEN] = {
    let mut bytes = [0u8; PUBLIC_KEY_BYTES_LEN];
    bytes[0] = 0xc0;
    bytes
};

/// The result of verifying a batch of signature sets: either everything
/// checked out, or the index of the first set that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchVerificationOutcome {
    Valid,
    Invalid { first_offender: usize },
}

/// Verify a single signature with the process-wide backend.
///
/// The backend is the deterministic stand-in ([`TestingVerifier`]); see the
/// crate docs for how deployments swap in pairing math.
pub fn verify(
    pubkey: &PublicKeyBytes,
    message: fixed_bytes::Hash256,
    signature: &SignatureBytes,
) -> bool {
    TestingVerifier.verify(pubkey, message, signature)
}

/// Verify an aggregate signature over one message with the process-wide backend.
pub fn fast_aggregate_verify(
    pubkeys: &[PublicKeyBytes],
    message: fixed_bytes::Hash256,
    signature: &SignatureBytes,
) -> bool {
    TestingVerifier.fast_aggregate_verify(pubkeys, message, signature)
}

/// Verify an aggregate signature over distinct messages with the process-wide backend.
pub fn aggregate_verify(
    pubkeys: &[PublicKeyBytes],
    messages: &[fixed_bytes::Hash256],
    signature: &SignatureBytes,
) -> bool {
    TestingVerifier.aggregate_verify(pubkeys, messages, signature)
}

/// Aggregate a list of public keys (`eth_aggregate_pubkeys` from the
/// consensus specs). An empty list aggregates to the point at infinity.
///
/// This workspace ships the deterministic stand-in backend (the same one
/// [`TestingVerifier`] checks against); deployments that need real curve
/// arithmetic supply a pairing library behind this function and the
/// [`BlsVerifier`] trait.
pub fn eth_aggregate_pubkeys(pubkeys: &[PublicKeyBytes]) -> PublicKeyBytes {
    if pubkeys.is_empty() {
        return PublicKeyBytes::deserialize(&INFINITY_PUBLIC_KEY).expect("48 bytes");
    }
    let mut preimage = Vec::with_capacity(pubkeys.len() * PUBLIC_KEY_BYTES_LEN);
    for pubkey in pubkeys {
        preimage.extend_from_slice(pubkey.as_serialized());
    }
    let digest = ethereum_hashing::hash_fixed(&preimage);

    let mut bytes = [0u8; PUBLIC_KEY_BYTES_LEN];
    bytes[0] = 0xb0;
    bytes[1..33].copy_from_slice(&digest);
    bytes[33..48].copy_from_slice(&digest[0..15]);
    PublicKeyBytes::deserialize(&bytes).expect("48 bytes")
}
