use crate::*;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use superstruct::superstruct;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// A block of the `BeaconChain`.
#[superstruct(
    variants(Base, Altair, Bellatrix, Capella, Deneb, Electra, Fulu),
    variant_attributes(
        derive(
            Debug,
            Clone,
            Serialize,
            Deserialize,
            Encode,
            Decode,
            TreeHash,
            PartialEq,
        ),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    ref_attributes(derive(Debug, TreeHash), tree_hash(enum_behaviour = "transparent")),
    cast_error(ty = "Error", expr = "BeaconStateError::IncorrectStateVariant"),
    partial_getter_error(ty = "Error", expr = "BeaconStateError::IncorrectStateVariant")
)]
#[derive(Debug, Clone, Serialize, Deserialize, Encode, TreeHash, PartialEq)]
#[serde(untagged)]
#[serde(bound = "E: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct BeaconBlock<E: EthSpec> {
    #[superstruct(getter(copy))]
    pub slot: Slot,
    #[superstruct(getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposer_index: u64,
    #[superstruct(getter(copy))]
    pub parent_root: Hash256,
    #[superstruct(getter(copy))]
    pub state_root: Hash256,
    #[superstruct(only(Base), partial_getter(rename = "body_base"))]
    pub body: BeaconBlockBodyBase<E>,
    #[superstruct(only(Altair), partial_getter(rename = "body_altair"))]
    pub body: BeaconBlockBodyAltair<E>,
    #[superstruct(only(Bellatrix), partial_getter(rename = "body_bellatrix"))]
    pub body: BeaconBlockBodyBellatrix<E>,
    #[superstruct(only(Capella), partial_getter(rename = "body_capella"))]
    pub body: BeaconBlockBodyCapella<E>,
    #[superstruct(only(Deneb), partial_getter(rename = "body_deneb"))]
    pub body: BeaconBlockBodyDeneb<E>,
    #[superstruct(only(Electra), partial_getter(rename = "body_electra"))]
    pub body: BeaconBlockBodyElectra<E>,
    #[superstruct(only(Fulu), partial_getter(rename = "body_fulu"))]
    pub body: BeaconBlockBodyFulu<E>,
}

impl<E: EthSpec> SignedRoot for BeaconBlock<E> {}
impl<E: EthSpec> SignedRoot for BeaconBlockRef<'_, E> {}

impl<E: EthSpec> BeaconBlock<E> {
    /// Returns an empty block (no operations) for the fork active at `slot`.
    pub fn empty_at_slot(fork_name: ForkName, slot: Slot) -> Self {
        match fork_name {
            ForkName::Base => BeaconBlock::Base(BeaconBlockBase {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyBase::default(),
            }),
            ForkName::Altair => BeaconBlock::Altair(BeaconBlockAltair {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyAltair::default(),
            }),
            ForkName::Bellatrix => BeaconBlock::Bellatrix(BeaconBlockBellatrix {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyBellatrix::default(),
            }),
            ForkName::Capella => BeaconBlock::Capella(BeaconBlockCapella {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyCapella::default(),
            }),
            ForkName::Deneb => BeaconBlock::Deneb(BeaconBlockDeneb {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyDeneb::default(),
            }),
            ForkName::Electra => BeaconBlock::Electra(BeaconBlockElectra {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyElectra::default(),
            }),
            ForkName::Fulu => BeaconBlock::Fulu(BeaconBlockFulu {
                slot,
                proposer_index: 0,
                parent_root: Hash256::default(),
                state_root: Hash256::default(),
                body: BeaconBlockBodyFulu::default(),
            }),
        }
    }

    /// SSZ decode with fork variant determined by `fork_name`.
    pub fn from_ssz_bytes_by_fork(
        bytes: &[u8],
        fork_name: ForkName,
    ) -> Result<Self, ssz::DecodeError> {
        use ssz::Decode;
        match fork_name {
            ForkName::Base => BeaconBlockBase::from_ssz_bytes(bytes).map(Self::Base),
            ForkName::Altair => BeaconBlockAltair::from_ssz_bytes(bytes).map(Self::Altair),
            ForkName::Bellatrix => BeaconBlockBellatrix::from_ssz_bytes(bytes).map(Self::Bellatrix),
            ForkName::Capella => BeaconBlockCapella::from_ssz_bytes(bytes).map(Self::Capella),
            ForkName::Deneb => BeaconBlockDeneb::from_ssz_bytes(bytes).map(Self::Deneb),
            ForkName::Electra => BeaconBlockElectra::from_ssz_bytes(bytes).map(Self::Electra),
            ForkName::Fulu => BeaconBlockFulu::from_ssz_bytes(bytes).map(Self::Fulu),
        }
    }

    pub fn fork_name_unchecked(&self) -> ForkName {
        match self {
            BeaconBlock::Base(_) => ForkName::Base,
            BeaconBlock::Altair(_) => ForkName::Altair,
            BeaconBlock::Bellatrix(_) => ForkName::Bellatrix,
            BeaconBlock::Capella(_) => ForkName::Capella,
            BeaconBlock::Deneb(_) => ForkName::Deneb,
            BeaconBlock::Electra(_) => ForkName::Electra,
            BeaconBlock::Fulu(_) => ForkName::Fulu,
        }
    }

    /// The fork of the block, checked against the fork schedule.
    pub fn fork_name(&self, spec: &ChainSpec) -> Result<ForkName, InconsistentFork> {
        let fork_at_slot = spec.fork_name_at_slot::<E>(self.slot());
        let object_fork = self.fork_name_unchecked();

        if fork_at_slot == object_fork {
            Ok(object_fork)
        } else {
            Err(InconsistentFork {
                fork_at_slot,
                object_fork,
            })
        }
    }

    /// A fork-agnostic view of the block body.
    pub fn body_ref(&self) -> BeaconBlockBodyRef<'_, E> {
        match self {
            BeaconBlock::Base(block) => BeaconBlockBodyRef::Base(&block.body),
            BeaconBlock::Altair(block) => BeaconBlockBodyRef::Altair(&block.body),
            BeaconBlock::Bellatrix(block) => BeaconBlockBodyRef::Bellatrix(&block.body),
            BeaconBlock::Capella(block) => BeaconBlockBodyRef::Capella(&block.body),
            BeaconBlock::Deneb(block) => BeaconBlockBodyRef::Deneb(&block.body),
            BeaconBlock::Electra(block) => BeaconBlockBodyRef::Electra(&block.body),
            BeaconBlock::Fulu(block) => BeaconBlockBodyRef::Fulu(&block.body),
        }
    }

    /// The block body as the fork-agnostic owned enum, cloned.
    pub fn body_cloned(&self) -> BeaconBlockBody<E> {
        match self {
            BeaconBlock::Base(block) => BeaconBlockBody::Base(block.body.clone()),
            BeaconBlock::Altair(block) => BeaconBlockBody::Altair(block.body.clone()),
            BeaconBlock::Bellatrix(block) => BeaconBlockBody::Bellatrix(block.body.clone()),
            BeaconBlock::Capella(block) => BeaconBlockBody::Capella(block.body.clone()),
            BeaconBlock::Deneb(block) => BeaconBlockBody::Deneb(block.body.clone()),
            BeaconBlock::Electra(block) => BeaconBlockBody::Electra(block.body.clone()),
            BeaconBlock::Fulu(block) => BeaconBlockBody::Fulu(block.body.clone()),
        }
    }

    pub fn body_root(&self) -> Hash256 {
        match self {
            BeaconBlock::Base(block) => block.body.tree_hash_root(),
            BeaconBlock::Altair(block) => block.body.tree_hash_root(),
            BeaconBlock::Bellatrix(block) => block.body.tree_hash_root(),
            BeaconBlock::Capella(block) => block.body.tree_hash_root(),
            BeaconBlock::Deneb(block) => block.body.tree_hash_root(),
            BeaconBlock::Electra(block) => block.body.tree_hash_root(),
            BeaconBlock::Fulu(block) => block.body.tree_hash_root(),
        }
    }

    /// Returns the epoch corresponding to `self.slot()`.
    pub fn epoch(&self) -> Epoch {
        self.slot().epoch(E::slots_per_epoch())
    }

    /// Returns the `tree_hash_root` of the block.
    pub fn canonical_root(&self) -> Hash256 {
        self.tree_hash_root()
    }

    /// Returns a full `BeaconBlockHeader` of this block.
    pub fn block_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot(),
            proposer_index: self.proposer_index(),
            parent_root: self.parent_root(),
            state_root: self.state_root(),
            body_root: self.body_root(),
        }
    }

    /// Returns a "temporary" header, where the `state_root` is `Hash256::zero()`.
    pub fn temporary_block_header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            state_root: Hash256::default(),
            ..self.block_header()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MinimalEthSpec;

    type E = MinimalEthSpec;

    #[test]
    fn empty_block_round_trips_per_fork() {
        use ssz::Encode;
        for fork in ForkName::list_all() {
            let block = BeaconBlock::<E>::empty_at_slot(fork, Slot::new(3));
            let bytes = block.as_ssz_bytes();
            let decoded = BeaconBlock::<E>::from_ssz_bytes_by_fork(&bytes, fork).unwrap();
            assert_eq!(decoded, block, "fork {fork}");
            assert_eq!(decoded.fork_name_unchecked(), fork);
        }
    }

    #[test]
    fn block_header_matches_fields() {
        let block = BeaconBlock::<E>::empty_at_slot(ForkName::Altair, Slot::new(9));
        let header = block.block_header();
        assert_eq!(header.slot, Slot::new(9));
        assert_eq!(header.body_root, block.body_root());
        assert_eq!(header.canonical_root(), block.canonical_root());

        let temporary = block.temporary_block_header();
        assert_eq!(temporary.state_root, Hash256::default());
    }

    #[test]
    fn inconsistent_fork_is_detected() {
        let spec = ChainSpec::minimal(); // all forks unscheduled
        let block = BeaconBlock::<E>::empty_at_slot(ForkName::Altair, Slot::new(0));
        assert!(block.fork_name(&spec).is_err());
        let base = BeaconBlock::<E>::empty_at_slot(ForkName::Base, Slot::new(0));
        assert_eq!(base.fork_name(&spec), Ok(ForkName::Base));
    }
}
