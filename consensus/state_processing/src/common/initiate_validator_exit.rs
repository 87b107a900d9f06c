use super::compute_activation_exit_epoch;
use safe_arith::SafeArith;
use std::cmp::max;
use types::{BeaconState, BeaconStateError as Error, ChainSpec, Epoch, EthSpec};

/// Initiate the exit of the validator of the given `index`.
pub fn initiate_validator_exit<E: EthSpec>(
    state: &mut BeaconState<E>,
    index: usize,
    spec: &ChainSpec,
) -> Result<(), Error> {
    // We do things in a slightly different order to the spec here. Since our health caches
    // are built on the validator registry, we check the validator against the registry
    // before mutating any other part of the state.
    let mut validator = state.get_validator(index)?;

    // Return if the validator already initiated exit
    if validator.exit_epoch != spec.far_future_epoch {
        return Ok(());
    }

    let exit_queue_epoch = if state.fork_name_unchecked().electra_enabled() {
        let effective_balance = validator.effective_balance;
        compute_exit_epoch_and_update_churn(state, effective_balance, spec)?
    } else {
        // Ensure the exit cache is built.
        state.build_exit_cache(spec)?;

        // Compute exit queue epoch
        let delayed_epoch = compute_activation_exit_epoch(state.current_epoch(), spec)?;
        let mut exit_queue_epoch = state
            .exit_cache()
            .max_epoch()?
            .map_or(delayed_epoch, |epoch| max(epoch, delayed_epoch));
        let exit_queue_churn = state.exit_cache().get_churn_at(exit_queue_epoch)?;

        if exit_queue_churn >= state.get_validator_churn_limit(spec)? {
            exit_queue_epoch.safe_add_assign(1)?;
        }

        state
            .exit_cache_mut()
            .record_validator_exit(exit_queue_epoch)?;
        exit_queue_epoch
    };

    validator.exit_epoch = exit_queue_epoch;
    validator.withdrawable_epoch =
        exit_queue_epoch.safe_add(spec.min_validator_withdrawability_delay)?;

    state.update_validator(index, validator)?;

    Ok(())
}

/// Electra's balance-weighted exit queue (EIP-7251): consume the per-epoch
/// exit churn with the exiting balance, spilling into later epochs.
pub fn compute_exit_epoch_and_update_churn<E: EthSpec>(
    state: &mut BeaconState<E>,
    exit_balance: u64,
    spec: &ChainSpec,
) -> Result<Epoch, Error> {
    let mut earliest_exit_epoch = max(
        state.earliest_exit_epoch()?,
        compute_activation_exit_epoch(state.current_epoch(), spec)?,
    );

    let per_epoch_churn = spec.get_activation_exit_churn_limit(state.get_total_active_balance()?)?;
    // New epoch for exits
    let mut exit_balance_to_consume = if state.earliest_exit_epoch()? < earliest_exit_epoch {
        per_epoch_churn
    } else {
        state.exit_balance_to_consume()?
    };

    // Exit doesn't fit in the current earliest epoch
    if exit_balance > exit_balance_to_consume {
        let balance_to_process = exit_balance.safe_sub(exit_balance_to_consume)?;
        let additional_epochs = balance_to_process
            .safe_sub(1)?
            .safe_div(per_epoch_churn)?
            .safe_add(1)?;
        earliest_exit_epoch.safe_add_assign(additional_epochs)?;
        exit_balance_to_consume
            .safe_add_assign(additional_epochs.safe_mul(per_epoch_churn)?)?;
    }

    // Consume the balance and update state variables
    *state.exit_balance_to_consume_mut()? =
        exit_balance_to_consume.safe_sub(exit_balance)?;
    *state.earliest_exit_epoch_mut()? = earliest_exit_epoch;

    Ok(earliest_exit_epoch)
}
