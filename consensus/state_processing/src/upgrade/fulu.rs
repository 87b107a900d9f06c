use std::mem;
use types::{
    BeaconState, BeaconStateError as Error, BeaconStateFulu, ChainSpec, EpochCache, EthSpec,
    ExecutionPayloadHeaderFulu, Fork, Unsigned, Vector,
};

/// Transform an `Electra` state into a `Fulu` state.
pub fn upgrade_to_fulu<E: EthSpec>(
    pre_state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let epoch = pre_state.current_epoch();

    // Seed the lookahead with the proposers of the current and next epoch.
    let mut proposer_lookahead =
        Vec::with_capacity(E::ProposerLookaheadSlots::to_usize());
    for lookahead_epoch in [epoch, epoch.saturating_add(1u64)] {
        for proposer in pre_state.get_beacon_proposer_indices(lookahead_epoch, spec)? {
            proposer_lookahead.push(proposer as u64);
        }
    }

    let pre = pre_state.as_electra_mut()?;

    let previous_header = &pre.latest_execution_payload_header;
    let latest_execution_payload_header = ExecutionPayloadHeaderFulu {
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

    let post = BeaconState::Fulu(BeaconStateFulu {
        // Versioning
        genesis_time: pre.genesis_time,
        genesis_validators_root: pre.genesis_validators_root,
        slot: pre.slot,
        fork: Fork {
            previous_version: pre.fork.current_version,
            current_version: spec.fulu_fork_version,
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
        deposit_requests_start_index: pre.deposit_requests_start_index,
        deposit_balance_to_consume: pre.deposit_balance_to_consume,
        exit_balance_to_consume: pre.exit_balance_to_consume,
        earliest_exit_epoch: pre.earliest_exit_epoch,
        consolidation_balance_to_consume: pre.consolidation_balance_to_consume,
        earliest_consolidation_epoch: pre.earliest_consolidation_epoch,
        pending_deposits: mem::take(&mut pre.pending_deposits),
        pending_partial_withdrawals: mem::take(&mut pre.pending_partial_withdrawals),
        pending_consolidations: mem::take(&mut pre.pending_consolidations),
        // Fulu
        proposer_lookahead: Vector::new(proposer_lookahead)?,
        // Caches
        total_active_balance: pre.total_active_balance,
        progressive_balances_cache: mem::take(&mut pre.progressive_balances_cache),
        committee_caches: mem::take(&mut pre.committee_caches),
        pubkey_cache: mem::take(&mut pre.pubkey_cache),
        exit_cache: mem::take(&mut pre.exit_cache),
        slashings_cache: mem::take(&mut pre.slashings_cache),
        epoch_cache: EpochCache::default(),
    });

    *pre_state = post;

    Ok(())
}
