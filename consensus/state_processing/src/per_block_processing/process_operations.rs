//! Application of the operations carried in a block body, in their fixed
//! order: proposer slashings, attester slashings, attestations, deposits,
//! voluntary exits, BLS-to-execution changes and (from Electra) the
//! execution-layer requests.
//!
//! Every operation is verified immediately before it is applied, so an
//! earlier operation in the same block is visible to the checks on a later
//! one.

use super::*;
use crate::VerifySignatures;
use crate::common::{
    get_attestation_participation_flag_indices, increase_balance, initiate_validator_exit,
    slash_validator,
};
use crate::common::update_progressive_balances_cache::{
    initialize_progressive_balances_cache, update_progressive_balances_on_attestation,
};
use crate::epoch_cache::initialize_epoch_cache;
use crate::per_block_processing::errors::{BlockProcessingError, IntoWithIndex, block_verify};
use safe_arith::{ArithError, SafeArith};
use types::consts::altair::{PARTICIPATION_FLAG_WEIGHTS, PROPOSER_WEIGHT, WEIGHT_DENOMINATOR};
use types::consts::electra::{FULL_EXIT_REQUEST_AMOUNT, UNSET_DEPOSIT_REQUESTS_START_INDEX};
use types::typenum::U33;

pub fn process_operations<E: EthSpec>(
    state: &mut BeaconState<E>,
    block_body: BeaconBlockBodyRef<'_, E>,
    verify_signatures: VerifySignatures,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    process_proposer_slashings(
        state,
        block_body.proposer_slashings(),
        verify_signatures,
        ctxt,
        spec,
    )?;
    process_attester_slashings(
        state,
        block_body.attester_slashings(),
        verify_signatures,
        ctxt,
        spec,
    )?;
    process_attestations(state, block_body, verify_signatures, ctxt, spec)?;
    process_deposits(state, block_body.deposits(), spec)?;
    process_exits(state, block_body.voluntary_exits(), verify_signatures, spec)?;

    if let Ok(changes) = block_body.bls_to_execution_changes() {
        process_bls_to_execution_changes(state, changes, verify_signatures, spec)?;
    }

    if let Ok(requests) = block_body.execution_requests() {
        // Request processing looks validators up by pubkey throughout.
        state.update_pubkey_cache()?;
        process_deposit_requests(state, &requests.deposits)?;
        process_withdrawal_requests(state, &requests.withdrawals, spec)?;
        process_consolidation_requests(state, &requests.consolidations, spec)?;
    }

    Ok(())
}

/// Verify and apply each proposer slashing, rejecting the block on the first
/// invalid one.
pub fn process_proposer_slashings<E: EthSpec>(
    state: &mut BeaconState<E>,
    proposer_slashings: &[ProposerSlashing],
    verify_signatures: VerifySignatures,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    state.build_slashings_cache()?;

    // One at a time: a block may carry two slashings for one proposer, and
    // the second must see the first applied to be rejected.
    for (i, slashing) in proposer_slashings.iter().enumerate() {
        verify_proposer_slashing(slashing, state, verify_signatures, spec)
            .map_err(|e| e.into_with_index(i))?;

        let offender = slashing.signed_header_1.message.proposer_index as usize;
        slash_validator(state, offender, None, ctxt, spec)?;
    }

    Ok(())
}

/// Verify and apply each attester slashing, slashing every validator that
/// signed both conflicting attestations and is still slashable.
pub fn process_attester_slashings<'a, E: EthSpec, I>(
    state: &mut BeaconState<E>,
    attester_slashings: I,
    verify_signatures: VerifySignatures,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError>
where
    I: Iterator<Item = AttesterSlashingRef<'a, E>>,
{
    state.build_slashings_cache()?;

    for (i, slashing) in attester_slashings.enumerate() {
        let offenders = verify_attester_slashing(state, slashing, verify_signatures, spec)
            .map_err(|e| e.into_with_index(i))?;

        for offender in offenders {
            slash_validator(state, offender as usize, None, ctxt, spec)?;
        }
    }

    Ok(())
}

/// Apply the block's attestations, via the participation-flag accounting
/// from Altair onwards and the pending-attestation queue before it.
pub fn process_attestations<E: EthSpec>(
    state: &mut BeaconState<E>,
    block_body: BeaconBlockBodyRef<'_, E>,
    verify_signatures: VerifySignatures,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    if state.fork_name_unchecked().altair_enabled() {
        for (i, attestation) in block_body.attestations().enumerate() {
            process_attestation_altair(state, attestation, i, ctxt, verify_signatures, spec)?;
        }
    } else {
        process_attestations_base(state, block_body.attestations(), verify_signatures, ctxt, spec)?;
    }
    Ok(())
}

/// Phase 0 records each included attestation whole; the epoch transition
/// digests them later.
fn process_attestations_base<'a, E: EthSpec, I>(
    state: &mut BeaconState<E>,
    attestations: I,
    verify_signatures: VerifySignatures,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError>
where
    I: Iterator<Item = AttestationRef<'a, E>>,
{
    state.build_committee_cache(RelativeEpoch::Previous, spec)?;
    state.build_committee_cache(RelativeEpoch::Current, spec)?;
    state.build_slashings_cache()?;

    let proposer_index = ctxt.get_proposer_index(state, spec)?;

    for (i, attestation) in attestations.enumerate() {
        verify_attestation_for_block_inclusion(state, attestation, ctxt, verify_signatures, spec)
            .map_err(|e| e.into_with_index(i))?;

        let AttestationRef::Base(attestation) = attestation else {
            return Err(BlockProcessingError::PendingAttestationInAltair);
        };

        let record = PendingAttestation {
            aggregation_bits: attestation.aggregation_bits.clone(),
            data: attestation.data,
            inclusion_delay: state.slot().safe_sub(attestation.data.slot)?.as_u64(),
            proposer_index,
        };
        let targets_current_epoch = attestation.data.target.epoch == state.current_epoch();

        let pending = state.as_base_mut()?;
        if targets_current_epoch {
            pending.current_epoch_attestations.push(record)?;
        } else {
            pending.previous_epoch_attestations.push(record)?;
        }
    }

    Ok(())
}

/// Award each attester its newly earned participation flags, and the
/// proposer its share of the corresponding rewards.
///
/// A flag a validator already holds earns nothing a second time, which is
/// what makes replayed attestations worthless rather than invalid.
pub fn process_attestation_altair<E: EthSpec>(
    state: &mut BeaconState<E>,
    attestation: AttestationRef<'_, E>,
    att_index: usize,
    ctxt: &mut ConsensusContext<E>,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    state.build_committee_cache(RelativeEpoch::Previous, spec)?;
    state.build_committee_cache(RelativeEpoch::Current, spec)?;
    initialize_epoch_cache(state, spec)?;
    initialize_progressive_balances_cache(state, spec)?;
    state.build_slashings_cache()?;

    let proposer_index = ctxt.get_proposer_index(state, spec)?;
    let previous_epoch = ctxt.previous_epoch;
    let current_epoch = ctxt.current_epoch;

    let indexed =
        verify_attestation_for_block_inclusion(state, attestation, ctxt, verify_signatures, spec)
            .map_err(|e| e.into_with_index(att_index))?;

    let data = attestation.data();
    let inclusion_delay = state.slot().safe_sub(data.slot)?.as_u64();
    let earned_flags =
        get_attestation_participation_flag_indices(state, data, inclusion_delay, spec)?;

    let mut proposer_reward_numerator = 0u64;
    for attester in indexed.attesting_indices_iter() {
        let attester = *attester as usize;
        let effective_balance = state.epoch_cache().get_effective_balance(attester)?;
        let base_reward = state.epoch_cache().get_base_reward(attester)?;
        let slashed = state.slashings_cache().is_slashed(attester);

        for flag_index in earned_flags.iter().copied() {
            let participation = state.get_epoch_participation_mut(
                data.target.epoch,
                previous_epoch,
                current_epoch,
            )?;
            let mut flags = participation
                .get(attester)
                .ok_or(BeaconStateError::ParticipationOutOfBounds(attester))?;
            if flags.has_flag(flag_index)? {
                continue;
            }
            flags.add_flag(flag_index)?;
            participation.set(attester, flags)?;

            let weight = PARTICIPATION_FLAG_WEIGHTS
                .get(flag_index)
                .copied()
                .ok_or(BeaconStateError::InvalidFlagIndex(flag_index))?;
            proposer_reward_numerator.safe_add_assign(base_reward.safe_mul(weight)?)?;

            update_progressive_balances_on_attestation(
                state,
                data.target.epoch,
                flag_index,
                effective_balance,
                slashed,
            )?;
        }
    }

    let proposer_reward = proposer_reward_numerator.safe_div(proposer_reward_denominator()?)?;
    increase_balance(state, proposer_index as usize, proposer_reward)?;
    Ok(())
}

/// The attesters' reward numerators convert to the proposer's reward by this
/// fixed ratio of the incentive weights.
fn proposer_reward_denominator() -> Result<u64, ArithError> {
    WEIGHT_DENOMINATOR
        .safe_sub(PROPOSER_WEIGHT)?
        .safe_mul(WEIGHT_DENOMINATOR)?
        .safe_div(PROPOSER_WEIGHT)
}

/// Check the block carries exactly the deposits the eth1 bridge still owes,
/// prove each against `eth1_data.deposit_root`, and apply them in order.
pub fn process_deposits<E: EthSpec>(
    state: &mut BeaconState<E>,
    deposits: &[Deposit],
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    // The bridge stops at whichever comes first: the contract's deposit
    // count, or the point where Electra's execution-layer requests take
    // over the numbering.
    let bridge_limit = std::cmp::min(
        state.deposit_requests_start_index().unwrap_or(u64::MAX),
        state.eth1_data().deposit_count,
    );
    let outstanding = bridge_limit.saturating_sub(state.eth1_deposit_index());
    let expected = std::cmp::min(E::MaxDeposits::to_u64(), outstanding);

    block_verify!(
        deposits.len() as u64 == expected,
        BlockProcessingError::DepositCountInvalid {
            expected: expected as usize,
            found: deposits.len(),
        }
    );

    // All proofs are checked before any deposit is applied; the deposit tree
    // root does not move within a block.
    for (i, deposit) in deposits.iter().enumerate() {
        verify_deposit_merkle_proof(
            state,
            deposit,
            state.eth1_deposit_index().safe_add(i as u64)?,
            spec,
        )
        .map_err(|e| e.into_with_index(i))?;
    }

    for deposit in deposits {
        apply_deposit(state, deposit.data.clone(), None, true, spec)?;
    }

    Ok(())
}

/// Apply one deposit to the state, optionally verifying a merkle proof for
/// it first.
///
/// A deposit whose proof of possession fails is silently dropped (the
/// deposit contract cannot check BLS signatures, so bad ones are expected
/// on-chain); everything else either tops up an existing validator or
/// creates a new one. Electra defers both effects into the pending-deposit
/// queue.
pub fn apply_deposit<E: EthSpec>(
    state: &mut BeaconState<E>,
    deposit_data: DepositData,
    proof: Option<FixedVector<Hash256, U33>>,
    increment_eth1_deposit_index: bool,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let deposit_index = state.eth1_deposit_index();
    if let Some(proof) = proof {
        let deposit = Deposit {
            proof,
            data: deposit_data.clone(),
        };
        verify_deposit_merkle_proof(state, &deposit, deposit_index, spec)
            .map_err(|e| e.into_with_index(deposit_index as usize))?;
    }

    if increment_eth1_deposit_index {
        *state.eth1_deposit_index_mut() = deposit_index.safe_add(1)?;
    }

    state.update_pubkey_cache()?;
    let known_validator = get_existing_validator_index(state, &deposit_data.pubkey)
        .map_err(|e| e.into_with_index(deposit_index as usize))?;
    let electra_enabled = state.fork_name_unchecked().electra_enabled();

    match known_validator {
        Some(_) if electra_enabled => queue_bridge_deposit(state, &deposit_data, spec)?,
        Some(index) => increase_balance(state, index as usize, deposit_data.amount)?,
        None => {
            if is_valid_deposit_signature(&deposit_data, spec).is_err() {
                return Ok(());
            }
            // Electra validators enter with zero balance; the queued deposit
            // credits them once it clears the churn.
            let initial_balance = if electra_enabled { 0 } else { deposit_data.amount };
            state.add_validator_to_registry(
                deposit_data.pubkey,
                deposit_data.withdrawal_credentials,
                initial_balance,
                spec,
            )?;
            if electra_enabled {
                queue_bridge_deposit(state, &deposit_data, spec)?;
            }
        }
    }

    Ok(())
}

/// Push an eth1-bridge deposit onto the Electra pending queue.
///
/// Bridge entries are stamped with the genesis slot, which is how the queue
/// distinguishes them from execution-layer deposit requests.
fn queue_bridge_deposit<E: EthSpec>(
    state: &mut BeaconState<E>,
    deposit_data: &DepositData,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    state.pending_deposits_mut()?.push(PendingDeposit {
        pubkey: deposit_data.pubkey,
        withdrawal_credentials: deposit_data.withdrawal_credentials,
        amount: deposit_data.amount,
        signature: deposit_data.signature,
        slot: spec.genesis_slot,
    })?;
    Ok(())
}

/// Verify and apply each voluntary exit, rejecting the block on the first
/// invalid one.
pub fn process_exits<E: EthSpec>(
    state: &mut BeaconState<E>,
    voluntary_exits: &[SignedVoluntaryExit],
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    // Sequential: an earlier exit shifts the exit queue that a later exit
    // for the same validator would be judged against.
    for (i, exit) in voluntary_exits.iter().enumerate() {
        verify_exit(state, None, exit, verify_signatures, spec)
            .map_err(|e| e.into_with_index(i))?;

        initiate_validator_exit(state, exit.message.validator_index as usize, spec)?;
    }
    Ok(())
}

/// Verify and apply each BLS-to-execution credential change.
pub fn process_bls_to_execution_changes<E: EthSpec>(
    state: &mut BeaconState<E>,
    bls_to_execution_changes: &[SignedBlsToExecutionChange],
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    for (i, signed_change) in bls_to_execution_changes.iter().enumerate() {
        verify_bls_to_execution_change(state, signed_change, verify_signatures, spec)
            .map_err(|e| e.into_with_index(i))?;

        let index = signed_change.message.validator_index as usize;
        let mut validator = state.get_validator(index)?;
        validator
            .change_withdrawal_credentials(&signed_change.message.to_execution_address, spec);
        state.update_validator(index, validator)?;
    }

    Ok(())
}

/// Queue execution-layer deposit receipts, recording where their numbering
/// starts so the eth1 bridge can be retired at that index.
pub fn process_deposit_requests<E: EthSpec>(
    state: &mut BeaconState<E>,
    deposit_requests: &[DepositRequest],
) -> Result<(), BlockProcessingError> {
    for request in deposit_requests {
        if state.deposit_requests_start_index()? == UNSET_DEPOSIT_REQUESTS_START_INDEX {
            *state.deposit_requests_start_index_mut()? = request.index;
        }

        let slot = state.slot();
        state.pending_deposits_mut()?.push(PendingDeposit {
            pubkey: request.pubkey,
            withdrawal_credentials: request.withdrawal_credentials,
            amount: request.amount,
            signature: request.signature,
            slot,
        })?;
    }

    Ok(())
}

/// Handle execution-layer withdrawal requests: full exits, and partial
/// withdrawals for compounding validators with excess balance.
///
/// Requests that fail any precondition are skipped rather than fatal: the
/// execution layer cannot pre-validate against the beacon state, so invalid
/// requests are an expected part of the stream.
pub fn process_withdrawal_requests<E: EthSpec>(
    state: &mut BeaconState<E>,
    withdrawal_requests: &[WithdrawalRequest],
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let current_epoch = state.current_epoch();

    for request in withdrawal_requests {
        let is_full_exit = request.amount == FULL_EXIT_REQUEST_AMOUNT;

        // A saturated partial-withdrawal queue still accepts full exits.
        let queue_is_full = state.pending_partial_withdrawals()?.len()
            == E::PendingPartialWithdrawalsLimit::to_usize();
        if queue_is_full && !is_full_exit {
            continue;
        }

        let Some(validator_index) = state.get_validator_index(&request.validator_pubkey)? else {
            continue;
        };
        let validator = state.get_validator(validator_index)?;

        // The request must originate from the validator's own withdrawal
        // address, and the validator must be exitable at all.
        if !withdrawal_request_is_authorized(&validator, request, spec)
            || !validator.is_active_at(current_epoch)
            || validator.exit_epoch != spec.far_future_epoch
            || current_epoch
                < validator
                    .activation_epoch
                    .safe_add(spec.shard_committee_period)?
        {
            continue;
        }

        let queued_balance = state.get_pending_balance_to_withdraw(validator_index)?;

        if is_full_exit {
            if queued_balance == 0 {
                initiate_validator_exit(state, validator_index, spec)?;
            }
            continue;
        }

        // Partial withdrawals are reserved for compounding validators whose
        // balance exceeds the activation minimum even after everything
        // already queued.
        let balance = state.get_balance(validator_index)?;
        let fully_staked = validator.effective_balance >= spec.min_activation_balance;
        let spare_balance = balance
            > spec
                .min_activation_balance
                .safe_add(queued_balance)?;
        if !(validator.has_compounding_withdrawal_credential(spec) && fully_staked && spare_balance)
        {
            continue;
        }

        let amount = std::cmp::min(
            balance
                .safe_sub(spec.min_activation_balance)?
                .safe_sub(queued_balance)?,
            request.amount,
        );
        let exit_queue_epoch =
            crate::common::compute_exit_epoch_and_update_churn(state, amount, spec)?;

        state
            .pending_partial_withdrawals_mut()?
            .push(PendingPartialWithdrawal {
                validator_index: validator_index as u64,
                amount,
                withdrawable_epoch: exit_queue_epoch
                    .safe_add(spec.min_validator_withdrawability_delay)?,
            })?;
    }

    Ok(())
}

fn withdrawal_request_is_authorized(
    validator: &Validator,
    request: &WithdrawalRequest,
    spec: &ChainSpec,
) -> bool {
    validator
        .get_execution_withdrawal_address(spec)
        .map(|address| address == request.source_address)
        .unwrap_or(false)
}

/// Handle execution-layer consolidation requests.
///
/// As with withdrawal requests, failed preconditions skip the request.
pub fn process_consolidation_requests<E: EthSpec>(
    state: &mut BeaconState<E>,
    consolidation_requests: &[ConsolidationRequest],
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    for request in consolidation_requests {
        process_consolidation_request(state, request, spec)?;
    }

    Ok(())
}

pub fn process_consolidation_request<E: EthSpec>(
    state: &mut BeaconState<E>,
    request: &ConsolidationRequest,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    // A validator consolidating into itself is asking to upgrade its own
    // credentials to compounding.
    if request.source_pubkey == request.target_pubkey {
        if let Some(source_index) = switch_to_compounding_index(state, request, spec)? {
            state.switch_to_compounding_validator(source_index, spec)?;
        }
        return Ok(());
    }

    // Consolidations queue against the balance churn; a full queue or an
    // exhausted churn drops the request.
    if state.pending_consolidations()?.len() == E::PendingConsolidationsLimit::to_usize() {
        return Ok(());
    }
    if spec.get_activation_exit_churn_limit(state.get_total_active_balance()?)?
        <= spec.min_activation_balance
    {
        return Ok(());
    }

    let (Some(source_index), Some(target_index)) = (
        state.get_validator_index(&request.source_pubkey)?,
        state.get_validator_index(&request.target_pubkey)?,
    ) else {
        return Ok(());
    };
    let source = state.get_validator(source_index)?;
    let target = state.get_validator(target_index)?;
    let current_epoch = state.current_epoch();

    // The source must be controlled by the requesting address, the target
    // must already be compounding, and both must be active with no exit
    // underway.
    let source_authorized = source
        .get_execution_withdrawal_address(spec)
        .map(|address| address == request.source_address)
        .unwrap_or(false);
    if !source_authorized
        || !target.has_compounding_withdrawal_credential(spec)
        || !source.is_active_at(current_epoch)
        || !target.is_active_at(current_epoch)
        || source.exit_epoch != spec.far_future_epoch
        || target.exit_epoch != spec.far_future_epoch
    {
        return Ok(());
    }
    // The source must have served its minimum period and have nothing
    // already queued for withdrawal.
    if current_epoch
        < source
            .activation_epoch
            .safe_add(spec.shard_committee_period)?
        || state.get_pending_balance_to_withdraw(source_index)? > 0
    {
        return Ok(());
    }

    // Exit the source through the balance churn and queue the transfer.
    let exit_epoch = crate::common::compute_exit_epoch_and_update_churn(
        state,
        source.effective_balance,
        spec,
    )?;
    let mut source = state.get_validator(source_index)?;
    source.exit_epoch = exit_epoch;
    source.withdrawable_epoch =
        exit_epoch.safe_add(spec.min_validator_withdrawability_delay)?;
    state.update_validator(source_index, source)?;

    state
        .pending_consolidations_mut()?
        .push(PendingConsolidation {
            source_index: source_index as u64,
            target_index: target_index as u64,
        })?;

    Ok(())
}

/// Validate a self-consolidation as a switch to compounding credentials,
/// returning the validator's index when acceptable.
fn switch_to_compounding_index<E: EthSpec>(
    state: &BeaconState<E>,
    request: &ConsolidationRequest,
    spec: &ChainSpec,
) -> Result<Option<usize>, BlockProcessingError> {
    let Some(source_index) = state.get_validator_index(&request.source_pubkey)? else {
        return Ok(None);
    };
    let source = state.get_validator(source_index)?;

    // Only an active, not-yet-compounding validator with 0x01 credentials
    // controlled by the requesting address qualifies.
    let authorized = source
        .get_execution_withdrawal_address(spec)
        .map(|address| address == request.source_address)
        .unwrap_or(false);
    let acceptable = authorized
        && !source.has_compounding_withdrawal_credential(spec)
        && source.is_active_at(state.current_epoch())
        && source.exit_epoch == spec.far_future_epoch;

    Ok(acceptable.then_some(source_index))
}
