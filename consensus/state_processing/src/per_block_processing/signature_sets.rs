//! A `SignatureSet` is an abstraction over the components of a signature: the
//! public keys, the signed message and the signature itself. A set may be
//! verified individually, or batched with others so the whole block costs one
//! pass over the oracle.
//!
//! This module exposes one function to extract each type of `SignatureSet` from a `BeaconBlock`.

use bls::{PublicKeyBytes, SignatureBytes};
use std::borrow::Cow;
use tree_hash::TreeHash;
use types::{
    AttesterSlashingRef, BeaconBlockRef, BeaconState, BeaconStateError, ChainSpec, DepositData,
    Domain, EthSpec, Hash256, IndexedAttestation, ProposerSlashing, SignedBeaconBlock,
    SignedBeaconBlockHeader, SignedBlsToExecutionChange, SignedRoot, SignedVoluntaryExit,
    SyncAggregate,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// There was an error attempting to read from a `BeaconState`. Block
    /// validity was not determined.
    BeaconStateError(BeaconStateError),
    /// Attempted to find the public key of a validator that does not exist. You cannot distinguish
    /// between an invalid block and an invalid state.
    ValidatorUnknown(u64),
    /// The `BeaconBlock` has a `proposer_index` that does not match the index we computed locally.
    ///
    /// The block is invalid.
    IncorrectBlockProposer { block: u64, local_shuffling: u64 },
}

impl From<BeaconStateError> for Error {
    fn from(e: BeaconStateError) -> Error {
        Error::BeaconStateError(e)
    }
}

/// One aggregate-verifiable signature: every pubkey in `pubkeys` is expected
/// to have signed `message`.
#[derive(Debug, Clone)]
pub struct SignatureSet<'a> {
    pub pubkeys: Vec<PublicKeyBytes>,
    pub message: Hash256,
    pub signature: Cow<'a, SignatureBytes>,
}

impl<'a> SignatureSet<'a> {
    pub fn single(
        pubkey: PublicKeyBytes,
        message: Hash256,
        signature: &'a SignatureBytes,
    ) -> Self {
        Self {
            pubkeys: vec![pubkey],
            message,
            signature: Cow::Borrowed(signature),
        }
    }

    pub fn aggregate(
        pubkeys: Vec<PublicKeyBytes>,
        message: Hash256,
        signature: &'a SignatureBytes,
    ) -> Self {
        Self {
            pubkeys,
            message,
            signature: Cow::Borrowed(signature),
        }
    }

    /// Run the BLS oracle over this set.
    pub fn verify(&self) -> bool {
        bls::fast_aggregate_verify(&self.pubkeys, self.message, &self.signature)
    }
}

fn validator_pubkey<E: EthSpec>(
    state: &BeaconState<E>,
    validator_index: u64,
) -> Result<PublicKeyBytes> {
    Ok(state
        .get_validator(validator_index as usize)
        .map_err(|_| Error::ValidatorUnknown(validator_index))?
        .pubkey)
}

/// A signature set that is valid if a block was signed by the expected block producer.
pub fn block_proposal_signature_set<'a, E: EthSpec>(
    state: &'a BeaconState<E>,
    block: &'a SignedBeaconBlock<E>,
    verified_proposer_index: Option<u64>,
    spec: &'a ChainSpec,
) -> Result<SignatureSet<'a>> {
    let block_proposer_index = block.message.proposer_index();
    if let Some(proposer_index) = verified_proposer_index {
        if proposer_index != block_proposer_index {
            return Err(Error::IncorrectBlockProposer {
                block: block_proposer_index,
                local_shuffling: proposer_index,
            });
        }
    }

    let domain = spec.get_domain(
        block.epoch(),
        Domain::BeaconProposer,
        state.fork(),
        state.genesis_validators_root(),
    );

    let message = block.message.signing_root(domain);

    Ok(SignatureSet::single(
        validator_pubkey(state, block_proposer_index)?,
        message,
        &block.signature,
    ))
}

/// A signature set that is valid if the block proposer's randao reveal signature is correct.
pub fn randao_signature_set<'a, E: EthSpec>(
    state: &'a BeaconState<E>,
    proposer_index: u64,
    block: BeaconBlockRef<'a, E>,
    spec: &'a ChainSpec,
) -> Result<SignatureSet<'a>> {
    let epoch = block.slot().epoch(E::slots_per_epoch());
    let domain = spec.get_domain(
        epoch,
        Domain::Randao,
        state.fork(),
        state.genesis_validators_root(),
    );

    let message = epoch.signing_root(domain);

    let randao_reveal = match block {
        BeaconBlockRef::Base(block) => &block.body.randao_reveal,
        BeaconBlockRef::Altair(block) => &block.body.randao_reveal,
        BeaconBlockRef::Bellatrix(block) => &block.body.randao_reveal,
        BeaconBlockRef::Capella(block) => &block.body.randao_reveal,
        BeaconBlockRef::Deneb(block) => &block.body.randao_reveal,
        BeaconBlockRef::Electra(block) => &block.body.randao_reveal,
        BeaconBlockRef::Fulu(block) => &block.body.randao_reveal,
    };

    Ok(SignatureSet::single(
        validator_pubkey(state, proposer_index)?,
        message,
        randao_reveal,
    ))
}

/// The two signature sets of a proposer slashing's conflicting headers.
pub fn proposer_slashing_signature_set<'a, E: EthSpec>(
    state: &'a BeaconState<E>,
    proposer_slashing: &'a ProposerSlashing,
    spec: &'a ChainSpec,
) -> Result<(SignatureSet<'a>, SignatureSet<'a>)> {
    let proposer_index = proposer_slashing.signed_header_1.message.proposer_index;
    let pubkey = validator_pubkey(state, proposer_index)?;

    Ok((
        block_header_signature_set(state, &proposer_slashing.signed_header_1, pubkey, spec),
        block_header_signature_set(state, &proposer_slashing.signed_header_2, pubkey, spec),
    ))
}

fn block_header_signature_set<'a, E: EthSpec>(
    state: &'a BeaconState<E>,
    signed_header: &'a SignedBeaconBlockHeader,
    pubkey: PublicKeyBytes,
    spec: &'a ChainSpec,
) -> SignatureSet<'a> {
    let domain = spec.get_domain(
        signed_header.message.slot.epoch(E::slots_per_epoch()),
        Domain::BeaconProposer,
        state.fork(),
        state.genesis_validators_root(),
    );

    let message = signed_header.message.signing_root(domain);

    SignatureSet::single(pubkey, message, &signed_header.signature)
}

/// A signature set that is valid if the aggregated signature of an indexed
/// attestation was signed by all the attesting validators.
pub fn indexed_attestation_signature_set<'a, E: EthSpec>(
    state: &'a BeaconState<E>,
    signature: &'a SignatureBytes,
    indexed_attestation: &'a IndexedAttestation<E>,
    spec: &'a ChainSpec,
) -> Result<SignatureSet<'a>> {
    let mut pubkeys = Vec::with_capacity(indexed_attestation.attesting_indices_len());
    for &validator_idx in indexed_attestation.attesting_indices_iter() {
        pubkeys.push(validator_pubkey(state, validator_idx)?);
    }

    let domain = spec.get_domain(
        indexed_attestation.data().target.epoch,
        Domain::BeaconAttester,
        state.fork(),
        state.genesis_validators_root(),
    );

    let message = indexed_attestation.data().signing_root(domain);

    Ok(SignatureSet::aggregate(pubkeys, message, signature))
}

fn owned_indexed_attestation_signature_set<'a, E: EthSpec>(
    state: &'a BeaconState<E>,
    indexed_attestation: &IndexedAttestation<E>,
    spec: &'a ChainSpec,
) -> Result<SignatureSet<'a>> {
    let mut pubkeys = Vec::with_capacity(indexed_attestation.attesting_indices_len());
    for &validator_idx in indexed_attestation.attesting_indices_iter() {
        pubkeys.push(validator_pubkey(state, validator_idx)?);
    }

    let domain = spec.get_domain(
        indexed_attestation.data().target.epoch,
        Domain::BeaconAttester,
        state.fork(),
        state.genesis_validators_root(),
    );

    let message = indexed_attestation.data().signing_root(domain);
    let signature = match indexed_attestation {
        IndexedAttestation::Base(att) => att.signature,
        IndexedAttestation::Electra(att) => att.signature,
    };

    Ok(SignatureSet {
        pubkeys,
        message,
        signature: Cow::Owned(signature),
    })
}

/// The two indexed-attestation signature sets of an attester slashing.
pub fn attester_slashing_signature_sets<'a, E: EthSpec>(
    state: &'a BeaconState<E>,
    attester_slashing: AttesterSlashingRef<'a, E>,
    spec: &'a ChainSpec,
) -> Result<(SignatureSet<'a>, SignatureSet<'a>)> {
    Ok((
        owned_indexed_attestation_signature_set(
            state,
            &attester_slashing.attestation_1(),
            spec,
        )?,
        owned_indexed_attestation_signature_set(
            state,
            &attester_slashing.attestation_2(),
            spec,
        )?,
    ))
}

/// A signature set that is valid if the `SignedVoluntaryExit` was signed by the indicated
/// validator.
pub fn exit_signature_set<'a, E: EthSpec>(
    state: &'a BeaconState<E>,
    signed_exit: &'a SignedVoluntaryExit,
    spec: &'a ChainSpec,
) -> Result<SignatureSet<'a>> {
    let exit = &signed_exit.message;
    let validator_index = exit.validator_index;

    let domain = exit.signing_domain(
        state.fork_name_unchecked(),
        state.fork(),
        state.genesis_validators_root(),
        spec,
    );

    let message = exit.signing_root(domain);

    Ok(SignatureSet::single(
        validator_pubkey(state, validator_index)?,
        message,
        &signed_exit.signature,
    ))
}

/// BLS-to-execution changes are signed by the BLS *withdrawal* key, not the
/// validator's signing key, over the genesis fork version.
pub fn bls_execution_change_signature_set<'a, E: EthSpec>(
    state: &'a BeaconState<E>,
    signed_address_change: &'a SignedBlsToExecutionChange,
    spec: &'a ChainSpec,
) -> Result<SignatureSet<'a>> {
    let domain = spec.compute_domain(
        Domain::BlsToExecutionChange,
        spec.genesis_fork_version,
        state.genesis_validators_root(),
    );
    let message = signed_address_change.message.signing_root(domain);
    let signing_key = signed_address_change.message.from_bls_pubkey;

    Ok(SignatureSet::single(
        signing_key,
        message,
        &signed_address_change.signature,
    ))
}

/// A signature set that is valid if the sync aggregate was signed by the
/// participating members of the current sync committee.
///
/// An empty participation set is expected to carry the infinity signature;
/// the oracle accepts exactly that combination and no other use of it.
pub fn sync_aggregate_signature_set<'a, E: EthSpec>(
    state: &'a BeaconState<E>,
    sync_aggregate: &'a SyncAggregate<E>,
    block_root: Hash256,
    spec: &'a ChainSpec,
) -> Result<SignatureSet<'a>> {
    // The sync aggregate signs over the block root of the previous slot.
    let previous_slot = state.slot().saturating_sub(1u64);

    let domain = spec.get_domain(
        previous_slot.epoch(E::slots_per_epoch()),
        Domain::SyncCommittee,
        state.fork(),
        state.genesis_validators_root(),
    );

    let message = types::SigningData {
        object_root: block_root,
        domain,
    }
    .tree_hash_root();

    let committee = state.current_sync_committee()?;
    let mut participant_pubkeys =
        Vec::with_capacity(sync_aggregate.sync_committee_bits.num_set_bits());
    for (i, pubkey) in committee.pubkeys.iter().enumerate() {
        if sync_aggregate
            .sync_committee_bits
            .get(i)
            .map_err(BeaconStateError::SszTypesError)?
        {
            participant_pubkeys.push(*pubkey);
        }
    }

    Ok(SignatureSet {
        pubkeys: participant_pubkeys,
        message,
        signature: Cow::Borrowed(&sync_aggregate.sync_committee_signature),
    })
}

/// The (pubkey, message, signature) triple of a deposit's proof of
/// possession. Deposits use the genesis fork domain and are never batched
/// with other block signatures.
pub fn deposit_pubkey_signature_message(
    deposit_data: &DepositData,
    spec: &ChainSpec,
) -> (PublicKeyBytes, Hash256, SignatureBytes) {
    (
        deposit_data.pubkey,
        deposit_data.signing_root(spec),
        deposit_data.signature,
    )
}
