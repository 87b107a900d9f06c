use crate::consensus_context::ConsensusContext;
use errors::{BlockProcessingError, HeaderInvalid};
use ethereum_hashing::hash;
use safe_arith::{ArithError, SafeArith};
use ssz::Encode;
use types::*;

pub use self::verify_attestation::{
    get_indexed_attestation, verify_attestation_for_block_inclusion, verify_attestation_for_state,
};
pub use self::verify_attester_slashing::verify_attester_slashing;
pub use self::verify_bls_to_execution_change::verify_bls_to_execution_change;
pub use self::verify_deposit::{
    get_existing_validator_index, is_valid_deposit_signature, verify_deposit_merkle_proof,
};
pub use self::verify_exit::verify_exit;
pub use self::verify_proposer_slashing::verify_proposer_slashing;
pub use block_signature_verifier::BlockSignatureVerifier;
pub use is_valid_indexed_attestation::is_valid_indexed_attestation;
pub use process_operations::process_operations;

pub mod block_signature_verifier;
pub mod errors;
mod is_valid_indexed_attestation;
pub mod process_operations;
pub mod signature_sets;
mod verify_attestation;
mod verify_attester_slashing;
mod verify_bls_to_execution_change;
mod verify_deposit;
mod verify_exit;
mod verify_proposer_slashing;

#[cfg(test)]
mod tests;

/// The strategy to be used when validating the block's signatures.
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum BlockSignatureStrategy {
    /// Do not validate any signature. Use with caution.
    NoVerification,
    /// Validate each signature individually, as its object is being processed.
    VerifyIndividual,
    /// Validate all signatures at once, at the start of block processing.
    ///
    /// A failing batch is re-checked set by set to localise the offender.
    VerifyBulk,
}

/// The strategy to be used when validating the block's signatures.
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum VerifySignatures {
    /// Validate all signatures encountered.
    True,
    /// Do not validate any signature. Use with caution.
    False,
}

impl VerifySignatures {
    pub fn is_true(self) -> bool {
        self == VerifySignatures::True
    }
}

/// Control verification of the latest block header.
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum VerifyBlockRoot {
    True,
    False,
}

/// Updates the state for a new block, whilst validating that the block is valid, optionally
/// checking the block proposer signature.
///
/// Returns `Ok(())` if the block is valid and the state was successfully updated. Otherwise
/// returns an error describing why the block was invalid or how the function failed to execute.
///
/// If `block_root` is `Some`, this root is used for verification of the proposer's signature. If it
/// is `None` the signing root is computed from scratch. This parameter only exists to avoid
/// re-calculating the root when it is already known.
pub fn per_block_processing<E: EthSpec>(
    state: &mut BeaconState<E>,
    signed_block: &SignedBeaconBlock<E>,
    block_signature_strategy: BlockSignatureStrategy,
    verify_block_root: VerifyBlockRoot,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let block = &signed_block.message;

    // Verify that the `SignedBeaconBlock` instantiation matches the fork at
    // `signed_block.slot()`.
    signed_block
        .fork_name(spec)
        .map_err(BlockProcessingError::InconsistentStateFork)?;

    // Build the caches the sub-steps leans on up front.
    state.build_slashings_cache()?;

    let verify_signatures = match block_signature_strategy {
        BlockSignatureStrategy::VerifyBulk => {
            let timer = metrics::start_timer(&crate::metrics::BLOCK_SIGNATURE_VERIFY_SECONDS);
            // Verify all signatures in the block at once.
            let mut verifier = BlockSignatureVerifier::new(state, spec);
            verifier.include_all_signatures(signed_block, ctxt)?;
            verifier.verify().map_err(|e| {
                BlockProcessingError::SignatureInvalid {
                    context: e.context,
                    index: e.index,
                }
            })?;
            metrics::stop_timer(timer);
            VerifySignatures::False
        }
        BlockSignatureStrategy::VerifyIndividual => VerifySignatures::True,
        BlockSignatureStrategy::NoVerification => VerifySignatures::False,
    };

    let proposer_index = process_block_header(
        state,
        block.temporary_block_header(),
        verify_block_root,
        ctxt,
        spec,
    )?;

    if verify_signatures.is_true() {
        verify_block_signature(state, signed_block, ctxt, spec)?;
    }

    process_randao(state, block.to_ref(), verify_signatures, ctxt, spec)?;
    process_eth1_data(state, block_body(block).eth1_data())?;
    process_operations(state, block_body(block), verify_signatures, ctxt, spec)?;

    if let Ok(sync_aggregate) = block_body(block).sync_aggregate() {
        process_sync_aggregate(
            state,
            sync_aggregate,
            proposer_index,
            verify_signatures,
            spec,
        )?;
    }

    if let Ok(payload) = block_body(block).execution_payload() {
        if is_execution_enabled(state, payload) {
            process_execution_payload(state, payload, block_body(block), spec)?;
            process_withdrawals(state, payload, spec)?;
        }
    }

    if let Ok(commitments) = block_body(block).blob_kzg_commitments() {
        process_blob_kzg_commitments::<E>(commitments)?;
    }

    Ok(())
}

fn block_body<E: EthSpec>(block: &BeaconBlock<E>) -> BeaconBlockBodyRef<'_, E> {
    block.body_ref()
}

/// Processes the block header, returning the proposer index.
pub fn process_block_header<E: EthSpec>(
    state: &mut BeaconState<E>,
    block_header: BeaconBlockHeader,
    verify_block_root: VerifyBlockRoot,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<u64, BlockProcessingError> {
    let header_invalid =
        |reason: HeaderInvalid| BlockProcessingError::HeaderInvalid { reason };

    // Verify that the slots match
    if block_header.slot != state.slot() {
        return Err(header_invalid(HeaderInvalid::StateSlotMismatch));
    }

    // Verify that the block is newer than the latest block header
    if block_header.slot <= state.latest_block_header().slot {
        return Err(header_invalid(HeaderInvalid::OlderThanLatestBlockHeader {
            block_slot: block_header.slot,
            latest_block_header_slot: state.latest_block_header().slot,
        }));
    }

    // Verify that proposer index is the correct index
    let proposer_index = block_header.proposer_index;
    let state_proposer_index = ctxt.get_proposer_index(state, spec)?;
    if proposer_index != state_proposer_index {
        return Err(header_invalid(HeaderInvalid::ProposerIndexMismatch {
            block_proposer_index: proposer_index,
            state_proposer_index,
        }));
    }

    if verify_block_root == VerifyBlockRoot::True {
        let expected_previous_block_root = state.latest_block_header().canonical_root();
        if block_header.parent_root != expected_previous_block_root {
            return Err(header_invalid(HeaderInvalid::ParentBlockRootMismatch {
                state: expected_previous_block_root,
                block: block_header.parent_root,
            }));
        }
    }

    *state.latest_block_header_mut() = block_header;

    // Verify proposer is not slashed
    if state.get_validator(proposer_index as usize)?.slashed {
        return Err(header_invalid(HeaderInvalid::ProposerSlashed(proposer_index)));
    }

    Ok(proposer_index)
}

/// Verifies the signature of a block.
pub fn verify_block_signature<E: EthSpec>(
    state: &BeaconState<E>,
    block: &SignedBeaconBlock<E>,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let proposer_index = Some(ctxt.get_proposer_index(state, spec)?);
    let set = signature_sets::block_proposal_signature_set(state, block, proposer_index, spec)
        .map_err(map_signature_set_error("block_proposal"))?;

    if !set.verify() {
        return Err(BlockProcessingError::HeaderInvalid {
            reason: HeaderInvalid::ProposalSignatureInvalid,
        });
    }

    Ok(())
}

fn map_signature_set_error(
    context: &'static str,
) -> impl Fn(signature_sets::Error) -> BlockProcessingError {
    move |e| match e {
        signature_sets::Error::BeaconStateError(e) => BlockProcessingError::BeaconStateError(e),
        _ => BlockProcessingError::SignatureInvalid {
            context: context.to_string(),
            index: None,
        },
    }
}

/// Verifies the `randao_reveal` against the block's proposer pubkey and updates
/// `state.latest_randao_mixes`.
pub fn process_randao<E: EthSpec>(
    state: &mut BeaconState<E>,
    block: BeaconBlockRef<'_, E>,
    verify_signatures: VerifySignatures,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    if verify_signatures.is_true() {
        // Verify RANDAO reveal signature.
        let proposer_index = ctxt.get_proposer_index(state, spec)?;
        let set = signature_sets::randao_signature_set(state, proposer_index, block, spec)
            .map_err(map_signature_set_error("randao"))?;
        if !set.verify() {
            return Err(BlockProcessingError::RandaoSignatureInvalid);
        }
    }

    let randao_reveal = match block {
        BeaconBlockRef::Base(block) => &block.body.randao_reveal,
        BeaconBlockRef::Altair(block) => &block.body.randao_reveal,
        BeaconBlockRef::Bellatrix(block) => &block.body.randao_reveal,
        BeaconBlockRef::Capella(block) => &block.body.randao_reveal,
        BeaconBlockRef::Deneb(block) => &block.body.randao_reveal,
        BeaconBlockRef::Electra(block) => &block.body.randao_reveal,
        BeaconBlockRef::Fulu(block) => &block.body.randao_reveal,
    };

    // Update the current epoch RANDAO mix with the xor of the reveal's hash.
    let reveal_hash = Hash256::from_slice(&hash(&randao_reveal.as_ssz_bytes()));
    state.update_randao_mix(state.current_epoch(), reveal_hash)?;

    Ok(())
}

/// Update the `eth1_data_votes`, moving to a new `eth1_data` if enough votes accumulate.
pub fn process_eth1_data<E: EthSpec>(
    state: &mut BeaconState<E>,
    eth1_data: &Eth1Data,
) -> Result<(), BlockProcessingError> {
    if let Some(new_eth1_data) = get_new_eth1_data(state, eth1_data)? {
        *state.eth1_data_mut() = new_eth1_data;
    }

    state.eth1_data_votes_mut().push(eth1_data.clone())?;

    Ok(())
}

/// Returns `Ok(Some(eth1_data))` if adding the given `eth1_data` to `state.eth1_data_votes` would
/// result in a change to `state.eth1_data`.
pub fn get_new_eth1_data<E: EthSpec>(
    state: &BeaconState<E>,
    eth1_data: &Eth1Data,
) -> Result<Option<Eth1Data>, ArithError> {
    let num_votes = state
        .eth1_data_votes()
        .iter()
        .filter(|vote| *vote == *eth1_data)
        .count();

    // The +1 is to account for the `eth1_data` supplied to the function.
    if num_votes.safe_add(1)?.safe_mul(2)? > E::SlotsPerEth1VotingPeriod::to_usize() {
        Ok(Some(eth1_data.clone()))
    } else {
        Ok(None)
    }
}

/// Apply the rewards of a sync aggregate and verify its signature (when
/// enabled). An empty participation set must carry the infinity signature.
pub fn process_sync_aggregate<E: EthSpec>(
    state: &mut BeaconState<E>,
    aggregate: &SyncAggregate<E>,
    proposer_index: u64,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    use errors::SyncAggregateInvalid;

    // The infinity signature is reserved for the empty committee.
    if !aggregate.is_valid_infinity_usage() {
        return Err(BlockProcessingError::SyncAggregateInvalid {
            reason: SyncAggregateInvalid::InfinitySignatureWithParticipants,
        });
    }

    if verify_signatures.is_true() {
        let previous_slot = state.slot().saturating_sub(1u64);
        let block_root = state.get_block_root(previous_slot)?;
        let set =
            signature_sets::sync_aggregate_signature_set(state, aggregate, block_root, spec)
                .map_err(map_signature_set_error("sync_aggregate"))?;
        if !set.verify() {
            return Err(BlockProcessingError::SyncAggregateInvalid {
                reason: SyncAggregateInvalid::SignatureInvalid,
            });
        }
    }

    // Compute participant and proposer rewards
    let (participant_reward, proposer_reward) = compute_sync_aggregate_rewards(state, spec)?;

    // Apply participant and proposer rewards, via the validator indices of
    // the current sync committee's pubkeys.
    let committee = state.current_sync_committee()?.clone();
    state.update_pubkey_cache()?;
    let mut participant_indices = Vec::with_capacity(committee.pubkeys.len());
    for pubkey in committee.pubkeys.iter() {
        let index = state
            .get_validator_index(pubkey)?
            .ok_or(BeaconStateError::PubkeyCacheIncomplete {
                cache_len: state.pubkey_cache().len(),
                registry_len: state.validators().len(),
            })?;
        participant_indices.push(index);
    }

    let mut total_proposer_reward = 0u64;
    for (participant_index, participation_bit) in participant_indices
        .iter()
        .zip(aggregate.sync_committee_bits.iter())
    {
        if participation_bit {
            crate::common::increase_balance(state, *participant_index, participant_reward)?;
            total_proposer_reward.safe_add_assign(proposer_reward)?;
        } else {
            crate::common::decrease_balance(state, *participant_index, participant_reward)?;
        }
    }
    crate::common::increase_balance(state, proposer_index as usize, total_proposer_reward)?;

    metrics::observe(
        &crate::metrics::PROPOSER_SYNC_AGGREGATE_REWARDS,
        total_proposer_reward as f64,
    );

    Ok(())
}

/// Compute the `(participant_reward, proposer_reward)` for a sync aggregate.
pub fn compute_sync_aggregate_rewards<E: EthSpec>(
    state: &BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(u64, u64), BlockProcessingError> {
    use types::consts::altair::{PROPOSER_WEIGHT, SYNC_REWARD_WEIGHT, WEIGHT_DENOMINATOR};

    let total_active_balance = state.get_total_active_balance()?;
    let total_active_increments =
        total_active_balance.safe_div(spec.effective_balance_increment)?;
    let base_reward_per_increment =
        crate::common::altair::BaseRewardPerIncrement::new(total_active_balance, spec)?;
    let total_base_rewards = base_reward_per_increment
        .as_u64()
        .safe_mul(total_active_increments)?;
    let max_participant_rewards = total_base_rewards
        .safe_mul(SYNC_REWARD_WEIGHT)?
        .safe_div(WEIGHT_DENOMINATOR)?
        .safe_div(E::slots_per_epoch())?;
    let participant_reward = max_participant_rewards.safe_div(E::sync_committee_size() as u64)?;
    let proposer_reward = participant_reward
        .safe_mul(PROPOSER_WEIGHT)?
        .safe_div(WEIGHT_DENOMINATOR.safe_sub(PROPOSER_WEIGHT)?)?;

    Ok((participant_reward, proposer_reward))
}

/// Structurally validate the execution payload against the state and extract
/// its header into the state.
///
/// Execution-engine validity (transaction execution, state roots on the
/// execution side) is an external concern; only the consensus-visible checks
/// happen here.
pub fn process_execution_payload<E: EthSpec>(
    state: &mut BeaconState<E>,
    payload: ExecutionPayloadRef<'_, E>,
    body: BeaconBlockBodyRef<'_, E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    use errors::PayloadInvalid;

    partially_verify_execution_payload(state, state.slot(), payload, body, spec)?;

    // The payload fork must match the state fork.
    if payload.fork_name() != state.fork_name_unchecked() {
        return Err(BlockProcessingError::ExecutionPayloadInvalid {
            reason: PayloadInvalid::ForkMismatch,
        });
    }

    state.set_latest_execution_payload_header(ExecutionPayloadHeader::from(payload))?;

    Ok(())
}

/// The structural payload checks that can be performed without the execution
/// engine: hash chain continuity, randao, timestamp and blob count.
pub fn partially_verify_execution_payload<E: EthSpec>(
    state: &BeaconState<E>,
    block_slot: Slot,
    payload: ExecutionPayloadRef<'_, E>,
    body: BeaconBlockBodyRef<'_, E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    use errors::PayloadInvalid;

    if is_merge_transition_complete(state) {
        let state_block_hash = state.latest_execution_payload_header()?.block_hash();
        if payload.parent_hash() != state_block_hash {
            return Err(BlockProcessingError::ExecutionPayloadInvalid {
                reason: PayloadInvalid::ParentHashMismatch {
                    state: state_block_hash,
                    payload: payload.parent_hash(),
                },
            });
        }
    }

    let state_randao = state.get_randao_mix(state.current_epoch())?;
    if payload.prev_randao() != state_randao {
        return Err(BlockProcessingError::ExecutionPayloadInvalid {
            reason: PayloadInvalid::PrevRandaoMismatch {
                state: state_randao,
                payload: payload.prev_randao(),
            },
        });
    }

    let expected_timestamp = compute_timestamp_at_slot(state, block_slot, spec)?;
    if payload.timestamp() != expected_timestamp {
        return Err(BlockProcessingError::ExecutionPayloadInvalid {
            reason: PayloadInvalid::TimestampMismatch {
                expected: expected_timestamp,
                payload: payload.timestamp(),
            },
        });
    }

    if let Ok(commitments) = body.blob_kzg_commitments() {
        let limit = E::max_blob_commitments_per_block();
        if commitments.len() > limit {
            return Err(BlockProcessingError::ExecutionPayloadInvalid {
                reason: PayloadInvalid::TooManyBlobCommitments {
                    found: commitments.len(),
                    limit,
                },
            });
        }
    }

    Ok(())
}

/// Is the execution chain live for this block: either the merge transition
/// has completed, or this very payload is the (non-default) transition
/// payload.
pub fn is_execution_enabled<E: EthSpec>(
    state: &BeaconState<E>,
    payload: ExecutionPayloadRef<'_, E>,
) -> bool {
    is_merge_transition_complete(state) || !payload_is_default(payload)
}

/// Whether the payload equals the default (all-zero) payload of its fork.
pub fn payload_is_default<E: EthSpec>(payload: ExecutionPayloadRef<'_, E>) -> bool {
    match payload {
        ExecutionPayloadRef::Bellatrix(payload) => {
            *payload == &ExecutionPayloadBellatrix::default()
        }
        ExecutionPayloadRef::Capella(payload) => *payload == &ExecutionPayloadCapella::default(),
        ExecutionPayloadRef::Deneb(payload) => *payload == &ExecutionPayloadDeneb::default(),
        ExecutionPayloadRef::Electra(payload) => *payload == &ExecutionPayloadElectra::default(),
        ExecutionPayloadRef::Fulu(payload) => *payload == &ExecutionPayloadFulu::default(),
    }
}

/// Has the execution layer been activated on this chain, i.e. does the state
/// carry a non-default payload header?
pub fn is_merge_transition_complete<E: EthSpec>(state: &BeaconState<E>) -> bool {
    match state.latest_execution_payload_header() {
        Ok(header) => {
            // Capella onwards the transition is always complete.
            if state.fork_name_unchecked().capella_enabled() {
                true
            } else {
                header.block_hash() != ExecutionBlockHash::zero()
                    || header.transactions_root() != Hash256::default()
            }
        }
        Err(_) => false,
    }
}

/// Compute the execution timestamp of `slot`.
pub fn compute_timestamp_at_slot<E: EthSpec>(
    state: &BeaconState<E>,
    block_slot: Slot,
    spec: &ChainSpec,
) -> Result<u64, ArithError> {
    let slots_since_genesis = block_slot.as_u64().safe_sub(spec.genesis_slot.as_u64())?;
    slots_since_genesis
        .safe_mul(spec.seconds_per_slot)
        .and_then(|since_genesis| state.genesis_time().safe_add(since_genesis))
}

/// Apply the expected withdrawals to the state and verify that the payload
/// carried exactly those withdrawals.
pub fn process_withdrawals<E: EthSpec>(
    state: &mut BeaconState<E>,
    payload: ExecutionPayloadRef<'_, E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    use errors::WithdrawalsInvalid;

    let Ok(payload_withdrawals) = payload.withdrawals() else {
        // Pre-Capella payloads have no withdrawals.
        return Ok(());
    };

    let (expected_withdrawals, partial_withdrawals_count) =
        get_expected_withdrawals(state, spec)?;

    if payload_withdrawals.len() != expected_withdrawals.len() {
        return Err(BlockProcessingError::WithdrawalsInvalid {
            reason: WithdrawalsInvalid::LengthMismatch {
                expected: expected_withdrawals.len(),
                payload: payload_withdrawals.len(),
            },
        });
    }
    for (i, (expected, actual)) in expected_withdrawals
        .iter()
        .zip(payload_withdrawals.iter())
        .enumerate()
    {
        if expected != actual {
            return Err(BlockProcessingError::WithdrawalsInvalid {
                reason: WithdrawalsInvalid::WithdrawalMismatch {
                    index: i,
                    expected: Box::new(expected.clone()),
                    payload: Box::new(actual.clone()),
                },
            });
        }
    }

    for withdrawal in &expected_withdrawals {
        crate::common::decrease_balance(
            state,
            withdrawal.validator_index as usize,
            withdrawal.amount,
        )?;
    }

    // Electra: drop the pending partial withdrawals that were consumed
    if let Some(partial_withdrawals_count) = partial_withdrawals_count {
        let remaining = types::List::try_from_iter(
            state
                .pending_partial_withdrawals()?
                .iter_from(partial_withdrawals_count)?,
        )
        .map_err(BeaconStateError::TreeViewError)?;
        *state.pending_partial_withdrawals_mut()? = remaining;
    }

    // Update the next withdrawal index if this block contained withdrawals
    if let Some(latest_withdrawal) = expected_withdrawals.last() {
        *state.next_withdrawal_index_mut()? = latest_withdrawal.index.safe_add(1)?;
    }

    // Advance the sweep: one past the last validator examined.
    let next_validator_index = if expected_withdrawals.len() == E::max_withdrawals_per_payload() {
        // The sweep was exhausted by withdrawals; continue from the latest.
        expected_withdrawals
            .last()
            .map(|w| w.validator_index.safe_add(1))
            .transpose()?
            .map(|i| i.safe_rem(state.validators().len() as u64))
            .transpose()?
            .unwrap_or(0)
    } else {
        // The sweep examined its full bound of validators.
        state
            .next_withdrawal_validator_index()?
            .safe_add(spec.max_validators_per_withdrawals_sweep)?
            .safe_rem(state.validators().len() as u64)?
    };
    *state.next_withdrawal_validator_index_mut()? = next_validator_index;

    Ok(())
}

/// Compute the withdrawals the next payload must carry: the Electra pending
/// partial withdrawals first, then the regular balance sweep.
///
/// Returns the withdrawals and, for Electra states, the number of pending
/// partial withdrawals consumed.
pub fn get_expected_withdrawals<E: EthSpec>(
    state: &BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(Vec<Withdrawal>, Option<usize>), BlockProcessingError> {
    let epoch = state.current_epoch();
    let fork_name = state.fork_name_unchecked();
    let mut withdrawal_index = state.next_withdrawal_index()?;
    let mut validator_index = state.next_withdrawal_validator_index()?;
    let mut withdrawals: Vec<Withdrawal> = Vec::with_capacity(E::max_withdrawals_per_payload());

    // Electra: the pending partial withdrawals drain ahead of the sweep.
    let partial_withdrawals_count = if fork_name.electra_enabled() {
        let mut processed_count = 0;
        for withdrawal in state.pending_partial_withdrawals()?.iter() {
            if withdrawal.withdrawable_epoch > epoch
                || withdrawals.len() == spec.max_pending_partials_per_withdrawals_sweep as usize
            {
                break;
            }

            let validator = state.get_validator(withdrawal.validator_index as usize)?;

            let has_sufficient_effective_balance =
                validator.effective_balance >= spec.min_activation_balance;
            let validator_balance = state.get_balance(withdrawal.validator_index as usize)?;
            let has_excess_balance = validator_balance > spec.min_activation_balance;

            if validator.exit_epoch == spec.far_future_epoch
                && has_sufficient_effective_balance
                && has_excess_balance
            {
                let withdrawable_balance = std::cmp::min(
                    validator_balance.safe_sub(spec.min_activation_balance)?,
                    withdrawal.amount,
                );
                withdrawals.push(Withdrawal {
                    index: withdrawal_index,
                    validator_index: withdrawal.validator_index,
                    address: validator
                        .get_execution_withdrawal_address(spec)
                        .ok_or(BlockProcessingError::WithdrawalCredentialsInvalid)?,
                    amount: withdrawable_balance,
                });
                withdrawal_index.safe_add_assign(1)?;
            }

            processed_count.safe_add_assign(1)?;
        }
        Some(processed_count)
    } else {
        None
    };

    let bound = std::cmp::min(
        state.validators().len() as u64,
        spec.max_validators_per_withdrawals_sweep,
    );
    for _ in 0..bound {
        let validator = state.get_validator(validator_index as usize)?;
        let partially_withdrawn_balance = withdrawals
            .iter()
            .filter_map(|withdrawal| {
                (withdrawal.validator_index == validator_index).then_some(withdrawal.amount)
            })
            .sum::<u64>();
        let balance = state
            .get_balance(validator_index as usize)?
            .safe_sub(partially_withdrawn_balance)?;
        if validator.is_fully_withdrawable_at(balance, epoch, spec, fork_name) {
            withdrawals.push(Withdrawal {
                index: withdrawal_index,
                validator_index,
                address: validator
                    .get_execution_withdrawal_address(spec)
                    .ok_or(BlockProcessingError::WithdrawalCredentialsInvalid)?,
                amount: balance,
            });
            withdrawal_index.safe_add_assign(1)?;
        } else if validator.is_partially_withdrawable_validator(balance, spec, fork_name) {
            withdrawals.push(Withdrawal {
                index: withdrawal_index,
                validator_index,
                address: validator
                    .get_execution_withdrawal_address(spec)
                    .ok_or(BlockProcessingError::WithdrawalCredentialsInvalid)?,
                amount: balance
                    .safe_sub(validator.get_max_effective_balance(spec, fork_name))?,
            });
            withdrawal_index.safe_add_assign(1)?;
        }
        if withdrawals.len() == E::max_withdrawals_per_payload() {
            break;
        }
        validator_index = validator_index
            .safe_add(1)?
            .safe_rem(state.validators().len() as u64)?;
    }

    Ok((withdrawals, partial_withdrawals_count))
}

/// Structural check on the blob commitments list (the KZG math itself is an
/// external concern).
pub fn process_blob_kzg_commitments<E: EthSpec>(
    commitments: &KzgCommitments<E>,
) -> Result<(), BlockProcessingError> {
    let limit = E::max_blob_commitments_per_block();
    if commitments.len() > limit {
        return Err(BlockProcessingError::BlobKzgCommitmentsInvalid {
            found: commitments.len(),
            limit,
        });
    }
    Ok(())
}
