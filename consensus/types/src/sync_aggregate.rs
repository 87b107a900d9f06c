use crate::{EthSpec, SignedRoot};
use bls::SignatureBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::BitVector;
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "E: EthSpec")]
pub struct SyncAggregate<E: EthSpec> {
    pub sync_committee_bits: BitVector<E::SyncCommitteeSize>,
    pub sync_committee_signature: SignatureBytes,
}

impl<E: EthSpec> SyncAggregate<E> {
    /// New aggregate with no participants: an empty bitvector and the
    /// point-at-infinity signature (the only context that accepts it).
    pub fn new() -> Self {
        Self {
            sync_committee_bits: BitVector::new(),
            sync_committee_signature: SignatureBytes::infinity(),
        }
    }

    /// Returns how many bits are `true` in `sync_committee_bits`.
    pub fn num_set_bits(&self) -> usize {
        self.sync_committee_bits.num_set_bits()
    }

    /// Empty aggregates must carry the infinity signature, and only they may.
    pub fn is_valid_infinity_usage(&self) -> bool {
        if self.sync_committee_signature.is_infinity() {
            self.num_set_bits() == 0
        } else {
            true
        }
    }
}

impl<E: EthSpec> Default for SyncAggregate<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EthSpec> SignedRoot for SyncAggregate<E> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MinimalEthSpec;

    type E = MinimalEthSpec;

    #[test]
    fn empty_aggregate_uses_infinity() {
        let aggregate = SyncAggregate::<E>::new();
        assert_eq!(aggregate.num_set_bits(), 0);
        assert!(aggregate.sync_committee_signature.is_infinity());
        assert!(aggregate.is_valid_infinity_usage());
    }

    #[test]
    fn infinity_with_participants_is_invalid() {
        let mut aggregate = SyncAggregate::<E>::new();
        aggregate.sync_committee_bits.set(0, true).unwrap();
        assert!(!aggregate.is_valid_infinity_usage());
    }
}
