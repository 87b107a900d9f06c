use crate::*;
use bls::SignatureBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::Encode;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// A `BeaconBlock` and a signature from its proposer.
#[derive(Debug, Clone, Serialize, Deserialize, Encode, TreeHash, PartialEq)]
#[serde(bound = "E: EthSpec")]
pub struct SignedBeaconBlock<E: EthSpec> {
    pub message: BeaconBlock<E>,
    pub signature: SignatureBytes,
}

impl<E: EthSpec> SignedBeaconBlock<E> {
    pub fn from_block(block: BeaconBlock<E>, signature: SignatureBytes) -> Self {
        Self {
            message: block,
            signature,
        }
    }

    /// SSZ decode with fork variant determined by `fork_name`.
    ///
    /// The signature is a fixed 96 bytes at the front of the container's
    /// variable section, so the message bytes are decoded by the block's own
    /// fork dispatch.
    pub fn from_ssz_bytes_by_fork(
        bytes: &[u8],
        fork_name: ForkName,
    ) -> Result<Self, ssz::DecodeError> {
        // We need the block's fork to decode it, so decode the outer
        // container manually.
        let mut builder = ssz::SszDecoderBuilder::new(bytes);
        builder.register_anonymous_variable_length_item()?;
        builder.register_type::<SignatureBytes>()?;

        let mut decoder = builder.build()?;
        let message = decoder
            .decode_next_with(|bytes| BeaconBlock::from_ssz_bytes_by_fork(bytes, fork_name))?;
        let signature = decoder.decode_next()?;

        Ok(Self { message, signature })
    }

    /// SSZ decode, with the fork determined from the slot and `spec`.
    pub fn from_ssz_bytes(bytes: &[u8], spec: &ChainSpec) -> Result<Self, ssz::DecodeError> {
        // The slot is the first field of the message, which begins after the
        // 4-byte offset to the variable-length message.
        let slot_start = ssz::BYTES_PER_LENGTH_OFFSET;
        let slot_end = slot_start + <Slot as ssz::Decode>::ssz_fixed_len();
        let slot_bytes = bytes
            .get(slot_start..slot_end)
            .ok_or(ssz::DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: slot_end,
            })?;
        let slot = <Slot as ssz::Decode>::from_ssz_bytes(slot_bytes)?;
        let fork_at_slot = spec.fork_name_at_slot::<E>(slot);
        Self::from_ssz_bytes_by_fork(bytes, fork_at_slot)
    }

    pub fn fork_name_unchecked(&self) -> ForkName {
        self.message.fork_name_unchecked()
    }

    pub fn fork_name(&self, spec: &ChainSpec) -> Result<ForkName, InconsistentFork> {
        self.message.fork_name(spec)
    }

    pub fn slot(&self) -> Slot {
        self.message.slot()
    }

    pub fn epoch(&self) -> Epoch {
        self.message.epoch()
    }

    pub fn parent_root(&self) -> Hash256 {
        self.message.parent_root()
    }

    pub fn state_root(&self) -> Hash256 {
        self.message.state_root()
    }

    /// Returns the `tree_hash_root` of the **block**, not the signed container.
    pub fn canonical_root(&self) -> Hash256 {
        self.message.tree_hash_root()
    }

    pub fn signed_block_header(&self) -> SignedBeaconBlockHeader {
        SignedBeaconBlockHeader {
            message: self.message.block_header(),
            signature: self.signature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MinimalEthSpec;
    use ssz::Encode;

    type E = MinimalEthSpec;

    #[test]
    fn signed_block_round_trips_per_fork() {
        for fork in ForkName::list_all() {
            let block = BeaconBlock::<E>::empty_at_slot(fork, Slot::new(7));
            let signed = SignedBeaconBlock::from_block(block, SignatureBytes::empty());
            let bytes = signed.as_ssz_bytes();
            let decoded = SignedBeaconBlock::<E>::from_ssz_bytes_by_fork(&bytes, fork).unwrap();
            assert_eq!(decoded, signed, "fork {fork}");
        }
    }

    #[test]
    fn fork_dispatch_from_slot_and_spec() {
        let mut spec = ChainSpec::minimal();
        spec.altair_fork_epoch = Some(Epoch::new(1));

        // A block in epoch 1 decodes as Altair.
        let slot = Epoch::new(1).start_slot(E::slots_per_epoch());
        let block = BeaconBlock::<E>::empty_at_slot(ForkName::Altair, slot);
        let signed = SignedBeaconBlock::from_block(block, SignatureBytes::empty());
        let decoded = SignedBeaconBlock::<E>::from_ssz_bytes(&signed.as_ssz_bytes(), &spec).unwrap();
        assert_eq!(decoded.fork_name_unchecked(), ForkName::Altair);
    }
}
