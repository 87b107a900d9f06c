use safe_arith::SafeArith;
use std::mem;
use types::{
    BeaconState, BeaconStateElectra, BeaconStateError as Error, ChainSpec, Epoch, EpochCache,
    EthSpec, ExecutionPayloadHeaderElectra, Fork, List,
    consts::electra::UNSET_DEPOSIT_REQUESTS_START_INDEX,
};

/// Transform a `Deneb` state into an `Electra` state.
pub fn upgrade_to_electra<E: EthSpec>(
    pre_state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let epoch = pre_state.current_epoch();

    // The earliest exit epoch is the maximum of all current exit epochs, plus one.
    let earliest_exit_epoch = pre_state
        .validators()
        .iter()
        .filter(|v| v.exit_epoch != spec.far_future_epoch)
        .map(|v| v.exit_epoch)
        .max()
        .unwrap_or(epoch)
        .safe_add(1u64)?;

    // Grab the total active balance before the variant change: the churn
    // limits below are seeded from it.
    pre_state.build_total_active_balance_cache(spec)?;
    let total_active_balance = pre_state.get_total_active_balance()?;
    let earliest_consolidation_epoch =
        crate::common::compute_activation_exit_epoch(epoch, spec)?;

    // Validators whose activation is pending, ordered by eligibility epoch
    // then index, re-enter via the pending deposit queue.
    let pre_activation_indices: Vec<(Epoch, usize)> = {
        let mut indices: Vec<(Epoch, usize)> = pre_state
            .validators()
            .iter()
            .enumerate()
            .filter(|(_, validator)| validator.activation_epoch == spec.far_future_epoch)
            .map(|(index, validator)| (validator.activation_eligibility_epoch, index))
            .collect();
        indices.sort();
        indices
    };

    let pre = pre_state.as_deneb_mut()?;

    let previous_header = &pre.latest_execution_payload_header;
    let latest_execution_payload_header = ExecutionPayloadHeaderElectra {
        parent_hash: previous_header.parent_hash,
        fee_recipient: previous_header.fee_recipient,
        state_root: previous_header.state_root,
        receipts_root: previous_header.receipts_root,
        logs_bloom: previous_header.logs_bloom.clone(),
        prev_randao: previous_header.prev_randao,
        block_number: previous_header.block_number,
        gas_limit: previous_header.gas_limit,
        gas_used: previous_header.gas_used,
        timestamp: previous_header.timestamp,
        extra_data: previous_header.extra_data.clone(),
        base_fee_per_gas: previous_header.base_fee_per_gas,
        block_hash: previous_header.block_hash,
        transactions_root: previous_header.transactions_root,
        withdrawals_root: previous_header.withdrawals_root,
        blob_gas_used: previous_header.blob_gas_used,
        excess_blob_gas: previous_header.excess_blob_gas,
    };

    let mut post = BeaconState::Electra(BeaconStateElectra {
        // Versioning
        genesis_time: pre.genesis_time,
        genesis_validators_root: pre.genesis_validators_root,
        slot: pre.slot,
        fork: Fork {
            previous_version: pre.fork.current_version,
            current_version: spec.electra_fork_version,
            epoch,
        },
        // History
        latest_block_header: pre.latest_block_header.clone(),
        block_roots: pre.block_roots.clone(),
        state_roots: pre.state_roots.clone(),
        historical_roots: mem::take(&mut pre.historical_roots),
        // Eth1
        eth1_data: pre.eth1_data.clone(),
        eth1_data_votes: mem::take(&mut pre.eth1_data_votes),
        eth1_deposit_index: pre.eth1_deposit_index,
        // Registry
        validators: mem::take(&mut pre.validators),
        balances: mem::take(&mut pre.balances),
        // Randomness
        randao_mixes: pre.randao_mixes.clone(),
        // Slashings
        slashings: pre.slashings.clone(),
        // Participation
        previous_epoch_participation: mem::take(&mut pre.previous_epoch_participation),
        current_epoch_participation: mem::take(&mut pre.current_epoch_participation),
        // Finality
        justification_bits: pre.justification_bits.clone(),
        previous_justified_checkpoint: pre.previous_justified_checkpoint,
        current_justified_checkpoint: pre.current_justified_checkpoint,
        finalized_checkpoint: pre.finalized_checkpoint,
        // Inactivity
        inactivity_scores: mem::take(&mut pre.inactivity_scores),
        // Sync committees
        current_sync_committee: pre.current_sync_committee.clone(),
        next_sync_committee: pre.next_sync_committee.clone(),
        // Execution
        latest_execution_payload_header,
        // Capella
        next_withdrawal_index: pre.next_withdrawal_index,
        next_withdrawal_validator_index: pre.next_withdrawal_validator_index,
        historical_summaries: mem::take(&mut pre.historical_summaries),
        // Electra
        deposit_requests_start_index: UNSET_DEPOSIT_REQUESTS_START_INDEX,
        deposit_balance_to_consume: 0,
        exit_balance_to_consume: spec.get_activation_exit_churn_limit(total_active_balance)?,
        earliest_exit_epoch,
        consolidation_balance_to_consume: spec.get_balance_churn_limit(total_active_balance)?,
        earliest_consolidation_epoch,
        pending_deposits: List::default(),
        pending_partial_withdrawals: List::default(),
        pending_consolidations: List::default(),
        // Caches
        total_active_balance: pre.total_active_balance,
        progressive_balances_cache: mem::take(&mut pre.progressive_balances_cache),
        committee_caches: mem::take(&mut pre.committee_caches),
        pubkey_cache: mem::take(&mut pre.pubkey_cache),
        exit_cache: mem::take(&mut pre.exit_cache),
        slashings_cache: mem::take(&mut pre.slashings_cache),
        epoch_cache: EpochCache::default(),
    });

    // Move pre-activation validators into the pending deposit queue, zeroing
    // their balances.
    for (_, index) in pre_activation_indices {
        let validator = post.get_validator(index)?;
        let balance = post.get_balance(index)?;
        post.set_balance(index, 0)?;

        let mut validator = validator;
        validator.effective_balance = 0;
        validator.activation_eligibility_epoch = spec.far_future_epoch;
        let pubkey = validator.pubkey;
        let withdrawal_credentials = validator.withdrawal_credentials;
        post.update_validator(index, validator)?;

        post.pending_deposits_mut()?.push(types::PendingDeposit {
            pubkey,
            withdrawal_credentials,
            amount: balance,
            signature: bls::SignatureBytes::infinity(),
            slot: spec.genesis_slot,
        })?;
    }

    // Queue the excess balance of compounding validators.
    for index in 0..post.validators().len() {
        if post
            .get_validator(index)?
            .has_compounding_withdrawal_credential(spec)
        {
            post.queue_excess_active_balance(index, spec)?;
        }
    }

    *pre_state = post;

    Ok(())
}
