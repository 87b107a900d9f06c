use crate::metrics::{
    PARTICIPATION_CURR_EPOCH_TARGET_ATTESTING_GWEI_PROGRESSIVE_TOTAL,
    PARTICIPATION_PREV_EPOCH_TARGET_ATTESTING_GWEI_PROGRESSIVE_TOTAL,
};
use types::consts::altair::TIMELY_TARGET_FLAG_INDEX;
use types::{
    BeaconState, BeaconStateError, ChainSpec, Epoch, EpochTotalBalances, EthSpec,
    ParticipationFlags,
};

/// Initializes the `ProgressiveBalancesCache` if it is unbuilt.
pub fn initialize_progressive_balances_cache<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), BeaconStateError> {
    if !state.fork_name_unchecked().altair_enabled() {
        return Ok(());
    }
    if state
        .progressive_balances_cache()
        .is_initialized_at(state.current_epoch())
    {
        return Ok(());
    }

    // Calculate the total flag balances for previous & current epoch in a single iteration.
    // This calculates `get_total_balance(unslashed_participating_indices(..))` for each flag in
    // the previous and current epoch.
    let current_epoch = state.current_epoch();
    let previous_epoch = state.previous_epoch();
    let mut previous_epoch_cache = EpochTotalBalances::new(spec);
    let mut current_epoch_cache = EpochTotalBalances::new(spec);

    let previous_participation = state.previous_epoch_participation()?.to_vec();
    let current_participation = state.current_epoch_participation()?.to_vec();

    for (index, validator) in state.validators().iter().enumerate() {
        if !validator.slashed {
            let previous_flags = previous_participation
                .get(index)
                .copied()
                .unwrap_or_default();
            let current_flags = current_participation.get(index).copied().unwrap_or_default();
            if validator.is_active_at(previous_epoch) {
                accumulate_flags(
                    &mut previous_epoch_cache,
                    previous_flags,
                    validator.effective_balance,
                )?;
            }
            if validator.is_active_at(current_epoch) {
                accumulate_flags(
                    &mut current_epoch_cache,
                    current_flags,
                    validator.effective_balance,
                )?;
            }
        }
    }

    state.progressive_balances_cache_mut().initialize(
        current_epoch,
        previous_epoch_cache,
        current_epoch_cache,
    );

    update_progressive_balances_metrics(state.progressive_balances_cache())?;

    Ok(())
}

fn accumulate_flags(
    cache: &mut EpochTotalBalances,
    flags: ParticipationFlags,
    effective_balance: u64,
) -> Result<(), BeaconStateError> {
    for flag_index in 0..types::consts::altair::NUM_FLAG_INDICES {
        if flags
            .has_flag(flag_index)
            .map_err(|_| BeaconStateError::InvalidFlagIndex(flag_index))?
        {
            cache.on_new_attestation(false, flag_index, effective_balance)?;
        }
    }
    Ok(())
}

/// Updates the `ProgressiveBalancesCache` when a new target attestation has been processed.
pub fn update_progressive_balances_on_attestation<E: EthSpec>(
    state: &mut BeaconState<E>,
    epoch: Epoch,
    flag_index: usize,
    validator_effective_balance: u64,
    validator_slashed: bool,
) -> Result<(), BeaconStateError> {
    if state.progressive_balances_cache().is_initialized() {
        state.progressive_balances_cache_mut().on_new_attestation(
            epoch,
            validator_slashed,
            flag_index,
            validator_effective_balance,
        )?;
    }
    Ok(())
}

pub fn update_progressive_balances_metrics(
    cache: &types::ProgressiveBalancesCache,
) -> Result<(), BeaconStateError> {
    metrics::set_gauge(
        &PARTICIPATION_PREV_EPOCH_TARGET_ATTESTING_GWEI_PROGRESSIVE_TOTAL,
        cache.previous_epoch_flag_attesting_balance(TIMELY_TARGET_FLAG_INDEX)? as i64,
    );
    metrics::set_gauge(
        &PARTICIPATION_CURR_EPOCH_TARGET_ATTESTING_GWEI_PROGRESSIVE_TOTAL,
        cache.current_epoch_target_attesting_balance()? as i64,
    );
    Ok(())
}
