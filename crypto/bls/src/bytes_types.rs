use crate::{INFINITY_SIGNATURE, PUBLIC_KEY_BYTES_LEN, SIGNATURE_BYTES_LEN};
use fixed_bytes::Hash256;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

macro_rules! bytes_struct {
    ($name: ident, $byte_size: expr, $small_name: literal) => {
        /// Serialized (compressed) form with no guarantee of being a valid
        /// curve point; deserialization is deferred to the verifier backend.
        #[derive(Clone, Copy)]
        pub struct $name {
            bytes: [u8; $byte_size],
        }

        impl $name {
            pub fn empty() -> Self {
                Self {
                    bytes: [0; $byte_size],
                }
            }

            pub fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError> {
                if bytes.len() != $byte_size {
                    return Err(DecodeError::InvalidByteLength {
                        len: bytes.len(),
                        expected: $byte_size,
                    });
                }
                let mut out = Self::empty();
                out.bytes.copy_from_slice(bytes);
                Ok(out)
            }

            pub fn serialize(&self) -> [u8; $byte_size] {
                self.bytes
            }

            pub fn as_serialized(&self) -> &[u8] {
                &self.bytes
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.bytes[..] == other.bytes[..]
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.bytes.hash(state);
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::empty()
            }
        }

        impl Encode for $name {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                $byte_size
            }

            fn ssz_bytes_len(&self) -> usize {
                $byte_size
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.bytes)
            }
        }

        impl Decode for $name {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                $byte_size
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
                Self::deserialize(bytes)
            }
        }

        impl TreeHash for $name {
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
                tree_hash::merkle_root(&self.bytes, 0)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let string = String::deserialize(deserializer)?;
                Self::from_str(&string).map_err(D::Error::custom)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let stripped = s
                    .strip_prefix("0x")
                    .ok_or_else(|| format!("{} must have a 0x prefix", $small_name))?;
                let bytes = hex::decode(stripped).map_err(|e| e.to_string())?;
                Self::deserialize(&bytes).map_err(|e| format!("invalid {}: {:?}", $small_name, e))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.bytes))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}

bytes_struct!(PublicKeyBytes, PUBLIC_KEY_BYTES_LEN, "public key");
bytes_struct!(SignatureBytes, SIGNATURE_BYTES_LEN, "signature");

impl SignatureBytes {
    /// Returns `true` if this is the compressed point at infinity.
    pub fn is_infinity(&self) -> bool {
        self.bytes == INFINITY_SIGNATURE
    }

    pub fn infinity() -> Self {
        Self {
            bytes: INFINITY_SIGNATURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pubkey_is_all_zero() {
        assert_eq!(PublicKeyBytes::empty().serialize(), [0u8; 48]);
    }

    #[test]
    fn ssz_round_trip() {
        let mut pk = PublicKeyBytes::empty();
        let mut serialized = pk.serialize();
        serialized[0] = 0xab;
        pk = PublicKeyBytes::deserialize(&serialized).unwrap();

        let bytes = pk.as_ssz_bytes();
        assert_eq!(PublicKeyBytes::from_ssz_bytes(&bytes).unwrap(), pk);
    }

    #[test]
    fn deserialize_rejects_wrong_length() {
        assert!(PublicKeyBytes::deserialize(&[0; 47]).is_err());
        assert!(SignatureBytes::deserialize(&[0; 97]).is_err());
    }

    #[test]
    fn infinity_signature_round_trips() {
        let sig = SignatureBytes::infinity();
        assert!(sig.is_infinity());
        assert!(!SignatureBytes::empty().is_infinity());
        assert_eq!(
            SignatureBytes::from_ssz_bytes(&sig.as_ssz_bytes()).unwrap(),
            sig
        );
    }

    #[test]
    fn hex_display_round_trips() {
        let sig = SignatureBytes::infinity();
        let string = sig.to_string();
        assert!(string.starts_with("0xc0"));
        assert_eq!(SignatureBytes::from_str(&string).unwrap(), sig);
    }

    #[test]
    fn tree_hash_of_pubkey_is_two_chunks() {
        use ethereum_hashing::hash32_concat;
        let pk = PublicKeyBytes::empty();
        let mut chunk0 = [0u8; 32];
        chunk0.copy_from_slice(&pk.serialize()[0..32]);
        let mut chunk1 = [0u8; 32];
        chunk1[0..16].copy_from_slice(&pk.serialize()[32..48]);
        assert_eq!(
            pk.tree_hash_root(),
            Hash256::from(hash32_concat(&chunk0, &chunk1))
        );
    }
}
