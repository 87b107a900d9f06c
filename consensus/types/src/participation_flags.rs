use crate::Hash256;
use crate::consts::altair::NUM_FLAG_INDICES;
use safe_arith::{ArithError, SafeArith};
use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

/// Per-validator participation flags for one epoch (Altair onwards).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipationFlags {
    #[serde(with = "serde_utils::quoted_u8")]
    bits: u8,
}

impl ParticipationFlags {
    pub fn add_flag(&mut self, flag_index: usize) -> Result<(), ArithError> {
        if flag_index >= NUM_FLAG_INDICES {
            return Err(ArithError::Overflow);
        }
        self.bits |= 1u8.safe_shl(flag_index as u32)?;
        Ok(())
    }

    pub fn has_flag(&self, flag_index: usize) -> Result<bool, ArithError> {
        if flag_index >= NUM_FLAG_INDICES {
            return Err(ArithError::Overflow);
        }
        let mask = 1u8.safe_shl(flag_index as u32)?;
        Ok(self.bits & mask == mask)
    }

    pub fn into_u8(self) -> u8 {
        self.bits
    }
}

impl From<u8> for ParticipationFlags {
    fn from(bits: u8) -> Self {
        Self { bits }
    }
}

impl Encode for ParticipationFlags {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        1
    }

    fn ssz_bytes_len(&self) -> usize {
        1
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        self.bits.ssz_append(buf)
    }
}

impl Decode for ParticipationFlags {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        1
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        u8::from_ssz_bytes(bytes).map(Self::from)
    }
}

impl TreeHash for ParticipationFlags {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Basic
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        self.bits.tree_hash_packed_encoding()
    }

    fn tree_hash_packing_factor() -> usize {
        u8::tree_hash_packing_factor()
    }

    fn tree_hash_root(&self) -> Hash256 {
        self.bits.tree_hash_root()
    }
}

impl tree_view::TreeSsz for ParticipationFlags {
    const PACKED_BYTES: Option<usize> = Some(1);
    const SUBTREE_DEPTH: u32 = 0;

    fn write_packed(&self, buf: &mut [u8]) {
        buf[0] = self.bits;
    }

    fn read_packed(buf: &[u8]) -> Self {
        Self { bits: buf[0] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_query_flags() {
        let mut flags = ParticipationFlags::default();
        assert!(!flags.has_flag(0).unwrap());
        flags.add_flag(0).unwrap();
        assert!(flags.has_flag(0).unwrap());
        assert!(!flags.has_flag(1).unwrap());
        flags.add_flag(2).unwrap();
        assert_eq!(flags.into_u8(), 0b101);
    }

    #[test]
    fn out_of_range_flag_is_an_error() {
        let mut flags = ParticipationFlags::default();
        assert!(flags.add_flag(NUM_FLAG_INDICES).is_err());
        assert!(flags.has_flag(NUM_FLAG_INDICES).is_err());
    }
}
