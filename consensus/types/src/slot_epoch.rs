//! The `Slot` and `Epoch` types are defined as new types over u64 to enforce
//! type-safety between the two types.
//!
//! `Slot` and `Epoch` have implementations which permit conversion, comparison
//! and math operations between each and `u64`. Addition and subtraction
//! saturate at the ends of the `u64` range; consensus code that must detect
//! overflow uses the `safe_*` methods instead.

use crate::{ChainSpec, Hash256};
use fixed_bytes::FixedBytesExtended;
use safe_arith::{ArithError, SafeArith};
use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;
use std::hash::Hash;
use std::iter::Iterator;
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(#[serde(with = "serde_utils::quoted_u64")] u64);

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(#[serde(with = "serde_utils::quoted_u64")] u64);

macro_rules! impl_common {
    ($type: ident) => {
        impl $type {
            pub const fn new(value: u64) -> $type {
                $type(value)
            }

            pub const fn as_u64(&self) -> u64 {
                self.0
            }

            pub const fn as_usize(&self) -> usize {
                self.0 as usize
            }

            pub fn max_value() -> $type {
                $type(u64::MAX)
            }

            pub fn saturating_add<T: Into<u64>>(&self, other: T) -> $type {
                $type(self.0.saturating_add(other.into()))
            }

            pub fn saturating_sub<T: Into<u64>>(&self, other: T) -> $type {
                $type(self.0.saturating_sub(other.into()))
            }

            pub fn safe_add<T: Into<u64>>(&self, other: T) -> Result<$type, ArithError> {
                self.0.safe_add(other.into()).map($type)
            }

            pub fn safe_sub<T: Into<u64>>(&self, other: T) -> Result<$type, ArithError> {
                self.0.safe_sub(other.into()).map($type)
            }

            pub fn safe_mul<T: Into<u64>>(&self, other: T) -> Result<$type, ArithError> {
                self.0.safe_mul(other.into()).map($type)
            }

            pub fn safe_div<T: Into<u64>>(&self, other: T) -> Result<$type, ArithError> {
                self.0.safe_div(other.into()).map($type)
            }

            pub fn safe_rem<T: Into<u64>>(&self, other: T) -> Result<$type, ArithError> {
                self.0.safe_rem(other.into()).map($type)
            }

            pub fn safe_add_assign<T: Into<u64>>(&mut self, other: T) -> Result<(), ArithError> {
                self.0 = self.0.safe_add(other.into())?;
                Ok(())
            }

            pub fn safe_sub_assign<T: Into<u64>>(&mut self, other: T) -> Result<(), ArithError> {
                self.0 = self.0.safe_sub(other.into())?;
                Ok(())
            }
        }

        impl From<u64> for $type {
            fn from(value: u64) -> Self {
                $type(value)
            }
        }

        impl From<$type> for u64 {
            fn from(value: $type) -> u64 {
                value.0
            }
        }

        impl From<$type> for usize {
            fn from(value: $type) -> usize {
                value.0 as usize
            }
        }

        impl<T: Into<u64>> std::ops::Add<T> for $type {
            type Output = $type;

            fn add(self, other: T) -> $type {
                self.saturating_add(other.into())
            }
        }

        impl<T: Into<u64>> std::ops::AddAssign<T> for $type {
            fn add_assign(&mut self, other: T) {
                *self = self.saturating_add(other.into());
            }
        }

        impl<T: Into<u64>> std::ops::Sub<T> for $type {
            type Output = $type;

            fn sub(self, other: T) -> $type {
                self.saturating_sub(other.into())
            }
        }

        impl<T: Into<u64>> std::ops::SubAssign<T> for $type {
            fn sub_assign(&mut self, other: T) {
                *self = self.saturating_sub(other.into());
            }
        }

        impl<T: Into<u64>> std::ops::Mul<T> for $type {
            type Output = $type;

            fn mul(self, other: T) -> $type {
                $type(self.0.saturating_mul(other.into()))
            }
        }

        impl<T: Into<u64>> std::ops::Div<T> for $type {
            type Output = $type;

            fn div(self, other: T) -> $type {
                $type(self.0 / other.into())
            }
        }

        impl<T: Into<u64>> std::ops::Rem<T> for $type {
            type Output = $type;

            fn rem(self, other: T) -> $type {
                $type(self.0 % other.into())
            }
        }

        impl PartialEq<u64> for $type {
            fn eq(&self, other: &u64) -> bool {
                self.0 == *other
            }
        }

        impl PartialOrd<u64> for $type {
            fn partial_cmp(&self, other: &u64) -> Option<std::cmp::Ordering> {
                self.0.partial_cmp(other)
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($type), self.0)
            }
        }

        impl Encode for $type {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                <u64 as Encode>::ssz_fixed_len()
            }

            fn ssz_bytes_len(&self) -> usize {
                8
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                self.0.ssz_append(buf)
            }
        }

        impl Decode for $type {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                <u64 as Decode>::ssz_fixed_len()
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
                u64::from_ssz_bytes(bytes).map($type)
            }
        }

        impl TreeHash for $type {
            fn tree_hash_type() -> TreeHashType {
                TreeHashType::Basic
            }

            fn tree_hash_packed_encoding(&self) -> PackedEncoding {
                self.0.tree_hash_packed_encoding()
            }

            fn tree_hash_packing_factor() -> usize {
                u64::tree_hash_packing_factor()
            }

            fn tree_hash_root(&self) -> Hash256 {
                Hash256::from_low_u64_le(self.0)
            }
        }

        impl tree_view::TreeSsz for $type {
            const PACKED_BYTES: Option<usize> = Some(8);
            const SUBTREE_DEPTH: u32 = 0;

            fn write_packed(&self, buf: &mut [u8]) {
                buf.copy_from_slice(&self.0.to_le_bytes());
            }

            fn read_packed(buf: &[u8]) -> Self {
                $type(u64::from_le_bytes(buf.try_into().expect("8 bytes")))
            }
        }
    };
}

impl_common!(Slot);
impl_common!(Epoch);

impl Slot {
    pub fn epoch(self, slots_per_epoch: u64) -> Epoch {
        Epoch::new(self.0 / slots_per_epoch)
    }

    /// The first slot of the epoch this slot belongs to.
    pub fn epoch_start_slot(self, slots_per_epoch: u64) -> Slot {
        Slot(self.0 - self.0 % slots_per_epoch)
    }

    /// Seconds from genesis to the start of this slot.
    pub fn time_at(self, spec: &ChainSpec, genesis_time: u64) -> u64 {
        genesis_time.saturating_add(self.0.saturating_mul(spec.seconds_per_slot))
    }
}

impl Epoch {
    pub fn start_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::new(self.0.saturating_mul(slots_per_epoch))
    }

    pub fn end_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::new(
            self.0
                .saturating_add(1)
                .saturating_mul(slots_per_epoch)
                .saturating_sub(1),
        )
    }

    /// Position of some slot inside this epoch.
    pub fn position(&self, slot: Slot, slots_per_epoch: u64) -> Option<usize> {
        let start = self.start_slot(slots_per_epoch);
        let end = self.end_slot(slots_per_epoch);

        if slot >= start && slot <= end {
            slot.as_usize().checked_sub(start.as_usize())
        } else {
            None
        }
    }

    /// The sync committee period this epoch belongs to.
    pub fn sync_committee_period(&self, spec: &ChainSpec) -> Result<u64, ArithError> {
        self.0.safe_div(spec.epochs_per_sync_committee_period.as_u64())
    }

    pub fn slot_iter(&self, slots_per_epoch: u64) -> SlotIter {
        SlotIter {
            current_iteration: 0,
            epoch: self,
            slots_per_epoch,
        }
    }
}

pub struct SlotIter<'a> {
    current_iteration: u64,
    epoch: &'a Epoch,
    slots_per_epoch: u64,
}

impl Iterator for SlotIter<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        if self.current_iteration >= self.slots_per_epoch {
            None
        } else {
            let start_slot = self.epoch.start_slot(self.slots_per_epoch);
            let previous = self.current_iteration;
            self.current_iteration = self.current_iteration.checked_add(1)?;
            start_slot.safe_add(previous).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_epoch_conversion() {
        assert_eq!(Slot::new(0).epoch(32), Epoch::new(0));
        assert_eq!(Slot::new(31).epoch(32), Epoch::new(0));
        assert_eq!(Slot::new(32).epoch(32), Epoch::new(1));
        assert_eq!(Epoch::new(2).start_slot(32), Slot::new(64));
        assert_eq!(Epoch::new(2).end_slot(32), Slot::new(95));
    }

    #[test]
    fn saturating_math() {
        assert_eq!(Slot::new(0) - 1u64, Slot::new(0));
        assert_eq!(Slot::max_value() + 1u64, Slot::max_value());
    }

    #[test]
    fn safe_math_overflow_errors() {
        assert!(Slot::max_value().safe_add(1u64).is_err());
        assert!(Slot::new(0).safe_sub(1u64).is_err());
        assert!(Slot::new(1).safe_rem(0u64).is_err());
    }

    #[test]
    fn epoch_position() {
        let epoch = Epoch::new(2);
        assert_eq!(epoch.position(Slot::new(64), 32), Some(0));
        assert_eq!(epoch.position(Slot::new(95), 32), Some(31));
        assert_eq!(epoch.position(Slot::new(96), 32), None);
    }

    #[test]
    fn ssz_round_trip() {
        let slot = Slot::new(12345);
        let bytes = slot.as_ssz_bytes();
        assert_eq!(Slot::from_ssz_bytes(&bytes).unwrap(), slot);
    }

    #[test]
    fn slot_iter_covers_the_epoch() {
        let slots: Vec<Slot> = Epoch::new(1).slot_iter(8).collect();
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0], Slot::new(8));
        assert_eq!(slots[7], Slot::new(15));
    }
}
