use crate::Hash256;
use ethereum_hashing::hash_fixed;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;
use std::str::FromStr;
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

pub const BYTES_PER_COMMITMENT: usize = 48;
pub const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;

/// A KZG commitment to a blob.
///
/// Only its serialized form and hash matter to the state transition; the
/// polynomial math lives with the external KZG library.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KzgCommitment(pub [u8; BYTES_PER_COMMITMENT]);

impl KzgCommitment {
    pub fn empty_for_testing() -> Self {
        KzgCommitment([0; BYTES_PER_COMMITMENT])
    }

    /// The versioned hash committing to this blob in the execution layer.
    pub fn calculate_versioned_hash(&self) -> Hash256 {
        let mut versioned_hash = hash_fixed(&self.0);
        versioned_hash[0] = VERSIONED_HASH_VERSION_KZG;
        Hash256::from(versioned_hash)
    }
}

impl fmt::Display for KzgCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for KzgCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KzgCommitment({self})")
    }
}

impl FromStr for KzgCommitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s
            .strip_prefix("0x")
            .ok_or_else(|| "commitment must have a 0x prefix".to_string())?;
        let bytes = hex::decode(stripped).map_err(|e| e.to_string())?;
        if bytes.len() != BYTES_PER_COMMITMENT {
            return Err(format!("commitment has wrong length: {}", bytes.len()));
        }
        let mut out = [0u8; BYTES_PER_COMMITMENT];
        out.copy_from_slice(&bytes);
        Ok(KzgCommitment(out))
    }
}

impl Serialize for KzgCommitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for KzgCommitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let string = String::deserialize(deserializer)?;
        Self::from_str(&string).map_err(D::Error::custom)
    }
}

impl Encode for KzgCommitment {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        BYTES_PER_COMMITMENT
    }

    fn ssz_bytes_len(&self) -> usize {
        BYTES_PER_COMMITMENT
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl Decode for KzgCommitment {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        BYTES_PER_COMMITMENT
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != BYTES_PER_COMMITMENT {
            return Err(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: BYTES_PER_COMMITMENT,
            });
        }
        let mut out = [0u8; BYTES_PER_COMMITMENT];
        out.copy_from_slice(bytes);
        Ok(KzgCommitment(out))
    }
}

impl TreeHash for KzgCommitment {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Vector
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("Vector should never be packed.")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("Vector should never be packed.")
    }

    fn tree_hash_root(&self) -> Hash256 {
        tree_hash::merkle_root(&self.0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_hash_has_kzg_version_byte() {
        let commitment = KzgCommitment::empty_for_testing();
        let hash = commitment.calculate_versioned_hash();
        assert_eq!(hash.as_slice()[0], VERSIONED_HASH_VERSION_KZG);
    }

    #[test]
    fn display_round_trip() {
        let commitment = KzgCommitment([0xab; BYTES_PER_COMMITMENT]);
        assert_eq!(
            KzgCommitment::from_str(&commitment.to_string()).unwrap(),
            commitment
        );
    }
}
