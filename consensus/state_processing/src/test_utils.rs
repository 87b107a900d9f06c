//! Helpers for building states and blocks in tests.
//!
//! Signatures are minted with the deterministic testing backend in `bls`, so
//! no keypairs are involved: a validator's pubkey bytes double as its
//! "signing key".

use crate::per_block_processing::{
    BlockSignatureStrategy, VerifyBlockRoot, per_block_processing,
};
use crate::state_transition::process_slots;
use crate::{ConsensusContext, upgrade};
use bls::{PublicKeyBytes, SignatureBytes, TestingVerifier};
use types::*;

pub type E = MinimalEthSpec;

pub fn pubkey(index: usize) -> PublicKeyBytes {
    let mut bytes = [0u8; 48];
    bytes[0] = 0xaa;
    bytes[1..9].copy_from_slice(&(index as u64).to_le_bytes());
    PublicKeyBytes::deserialize(&bytes).expect("48 bytes")
}

pub fn active_validator(index: usize, spec: &ChainSpec) -> Validator {
    Validator {
        pubkey: pubkey(index),
        withdrawal_credentials: Hash256::repeat_byte(0x01),
        effective_balance: spec.max_effective_balance,
        slashed: false,
        activation_eligibility_epoch: Epoch::new(0),
        activation_epoch: Epoch::new(0),
        exit_epoch: spec.far_future_epoch,
        withdrawable_epoch: spec.far_future_epoch,
    }
}

/// A phase 0 state at `slot` with `validator_count` active validators,
/// distinct randao mixes, and all caches built.
pub fn base_state(validator_count: usize, slot: u64) -> (BeaconState<E>, ChainSpec) {
    let spec = E::default_spec();
    let mut state = BeaconState::new(0, Eth1Data::default(), &spec);

    *state.slot_mut() = Slot::new(slot);
    for i in 0..validator_count {
        state
            .validators_mut()
            .push(active_validator(i, &spec))
            .expect("registry has capacity");
        state
            .balances_mut()
            .push(spec.max_effective_balance)
            .expect("registry has capacity");
    }
    for i in 0..E::epochs_per_historical_vector() {
        state
            .randao_mixes_mut()
            .set(i, Hash256::from_low_u64_be(i as u64 + 1))
            .expect("index is in bounds");
    }
    state.build_caches(&spec).expect("caches build");
    (state, spec)
}

/// A state of the given fork, built by upgrading a base state in place, with
/// every fork scheduled at epoch 0.
pub fn state_at_fork(
    fork_name: ForkName,
    validator_count: usize,
    slot: u64,
) -> (BeaconState<E>, ChainSpec) {
    let mut spec = ChainSpec::minimal();
    for fork in ForkName::list_all() {
        if fork != ForkName::Base && fork <= fork_name {
            match fork {
                ForkName::Altair => spec.altair_fork_epoch = Some(Epoch::new(0)),
                ForkName::Bellatrix => spec.bellatrix_fork_epoch = Some(Epoch::new(0)),
                ForkName::Capella => spec.capella_fork_epoch = Some(Epoch::new(0)),
                ForkName::Deneb => spec.deneb_fork_epoch = Some(Epoch::new(0)),
                ForkName::Electra => spec.electra_fork_epoch = Some(Epoch::new(0)),
                ForkName::Fulu => spec.fulu_fork_epoch = Some(Epoch::new(0)),
                ForkName::Base => {}
            }
        }
    }

    let (mut state, _) = base_state(validator_count, slot);

    if fork_name.altair_enabled() {
        upgrade::upgrade_to_altair(&mut state, &spec).expect("altair upgrade");
    }
    if fork_name.bellatrix_enabled() {
        upgrade::upgrade_to_bellatrix(&mut state, &spec).expect("bellatrix upgrade");
    }
    if fork_name.capella_enabled() {
        upgrade::upgrade_to_capella(&mut state, &spec).expect("capella upgrade");
    }
    if fork_name.deneb_enabled() {
        upgrade::upgrade_to_deneb(&mut state, &spec).expect("deneb upgrade");
    }
    if fork_name.electra_enabled() {
        upgrade::upgrade_to_electra(&mut state, &spec).expect("electra upgrade");
    }
    if fork_name.fulu_enabled() {
        upgrade::upgrade_to_fulu(&mut state, &spec).expect("fulu upgrade");
    }

    state.build_caches(&spec).expect("caches build");
    (state, spec)
}

/// Build an empty block at `slot` on top of `pre_state`, with a valid
/// proposer index, parent root, randao reveal, state root and proposer
/// signature.
pub fn build_empty_signed_block(
    pre_state: &BeaconState<E>,
    slot: Slot,
    spec: &ChainSpec,
) -> SignedBeaconBlock<E> {
    let mut state = pre_state.clone();
    process_slots(&mut state, slot, spec).expect("slots process");

    let proposer_index = state
        .get_beacon_proposer_index(slot, spec)
        .expect("proposer exists") as u64;
    let proposer_pubkey = state
        .get_validator(proposer_index as usize)
        .expect("proposer is known")
        .pubkey;

    let fork_name = spec.fork_name_at_slot::<E>(slot);
    let mut block = BeaconBlock::<E>::empty_at_slot(fork_name, slot);
    *block.proposer_index_mut() = proposer_index;
    *block.parent_root_mut() = state.latest_block_header().canonical_root();

    // From Capella onwards the merge is complete, so even an "empty" block
    // must carry a structurally valid payload.
    if fork_name.capella_enabled() {
        fill_execution_payload(&mut block, &state, slot, spec);
    }

    // Sign the randao reveal over the block's epoch.
    let epoch = slot.epoch(E::slots_per_epoch());
    let randao_domain = spec.get_domain(
        epoch,
        Domain::Randao,
        state.fork(),
        state.genesis_validators_root(),
    );
    let randao_reveal = TestingVerifier::sign_single(
        &proposer_pubkey,
        epoch.signing_root(randao_domain),
    );
    set_randao_reveal(&mut block, randao_reveal);

    // Apply the block to learn the post-state root.
    let mut ctxt = ConsensusContext::new(slot);
    let mut candidate = SignedBeaconBlock::from_block(block, SignatureBytes::empty());
    per_block_processing(
        &mut state,
        &candidate,
        BlockSignatureStrategy::NoVerification,
        VerifyBlockRoot::True,
        &mut ctxt,
        spec,
    )
    .expect("empty block applies");
    let state_root = state.update_tree_hash_cache().expect("root computes");
    *candidate.message.state_root_mut() = state_root;

    // Sign the completed block.
    let proposal_domain = spec.get_domain(
        epoch,
        Domain::BeaconProposer,
        state.fork(),
        state.genesis_validators_root(),
    );
    let signature = TestingVerifier::sign_single(
        &proposer_pubkey,
        candidate.message.signing_root(proposal_domain),
    );
    candidate.signature = signature;
    candidate
}

/// Populate the payload fields the structural checks look at: randao,
/// timestamp, parent hash and the expected withdrawals.
fn fill_execution_payload(
    block: &mut BeaconBlock<E>,
    state: &BeaconState<E>,
    slot: Slot,
    spec: &ChainSpec,
) {
    let prev_randao = state
        .get_randao_mix(state.current_epoch())
        .expect("randao mix exists");
    let timestamp =
        crate::per_block_processing::compute_timestamp_at_slot(state, slot, spec)
            .expect("timestamp computes");
    let parent_hash = state
        .latest_execution_payload_header()
        .expect("post-merge state has a header")
        .block_hash();
    let withdrawals: Vec<Withdrawal> =
        crate::per_block_processing::get_expected_withdrawals(state, spec)
            .expect("withdrawals compute")
            .0;
    let block_hash = ExecutionBlockHash::repeat_byte(0x42);

    macro_rules! fill {
        ($payload:expr) => {{
            $payload.prev_randao = prev_randao;
            $payload.timestamp = timestamp;
            $payload.parent_hash = parent_hash;
            $payload.block_hash = block_hash;
            $payload.withdrawals =
                VariableList::new(withdrawals.clone()).expect("withdrawals fit");
        }};
    }

    match block {
        BeaconBlock::Base(_) | BeaconBlock::Altair(_) | BeaconBlock::Bellatrix(_) => {}
        BeaconBlock::Capella(block) => fill!(block.body.execution_payload),
        BeaconBlock::Deneb(block) => fill!(block.body.execution_payload),
        BeaconBlock::Electra(block) => fill!(block.body.execution_payload),
        BeaconBlock::Fulu(block) => fill!(block.body.execution_payload),
    }
}

fn set_randao_reveal(block: &mut BeaconBlock<E>, randao_reveal: SignatureBytes) {
    match block {
        BeaconBlock::Base(block) => block.body.randao_reveal = randao_reveal,
        BeaconBlock::Altair(block) => block.body.randao_reveal = randao_reveal,
        BeaconBlock::Bellatrix(block) => block.body.randao_reveal = randao_reveal,
        BeaconBlock::Capella(block) => block.body.randao_reveal = randao_reveal,
        BeaconBlock::Deneb(block) => block.body.randao_reveal = randao_reveal,
        BeaconBlock::Electra(block) => block.body.randao_reveal = randao_reveal,
        BeaconBlock::Fulu(block) => block.body.randao_reveal = randao_reveal,
    }
}
