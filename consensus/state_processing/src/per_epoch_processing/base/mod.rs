use super::{
    Error, EpochProcessingSummary, JustificationAndFinalizationState,
    process_historical_roots_update,
    resets::{process_eth1_data_reset, process_randao_mixes_reset, process_slashings_reset},
    weigh_justification_and_finalization,
};
use crate::common::{compute_activation_exit_epoch, decrease_balance, initiate_validator_exit};
use crate::metrics;
use safe_arith::SafeArith;
use types::{BeaconState, ChainSpec, EthSpec, RelativeEpoch, Unsigned, Validator};

pub use validator_statuses::{InclusionInfo, TotalBalances, ValidatorStatus, ValidatorStatuses};
pub use rewards_and_penalties::{
    AttestationDelta, get_attestation_deltas, process_rewards_and_penalties,
};

pub mod rewards_and_penalties;
pub mod validator_statuses;

/// The phase 0 epoch transition.
pub fn process_epoch<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<EpochProcessingSummary, Error> {
    // Ensure the committee caches are built.
    state.build_committee_cache(RelativeEpoch::Previous, spec)?;
    state.build_committee_cache(RelativeEpoch::Current, spec)?;
    state.build_committee_cache(RelativeEpoch::Next, spec)?;
    state.build_total_active_balance_cache(spec)?;

    // Load the struct we use to assign validators into sets based on their participation.
    //
    // E.g., attestation in the previous epoch, attested to the head, etc.
    let mut validator_statuses = ValidatorStatuses::new(state, spec)?;
    validator_statuses.process_attestations(state)?;

    // Justification and finalization.
    let timer = metrics::start_timer_vec(
        &metrics::EPOCH_TRANSITION_STEP_SECONDS,
        &["justification_and_finalization"],
    );
    let justification_and_finalization_state =
        process_justification_and_finalization(state, &validator_statuses.total_balances)?;
    justification_and_finalization_state.apply_changes_to_state(state);
    metrics::stop_timer(timer);

    // Rewards and Penalties.
    let timer = metrics::start_timer_vec(
        &metrics::EPOCH_TRANSITION_STEP_SECONDS,
        &["rewards_and_penalties"],
    );
    process_rewards_and_penalties(state, &validator_statuses, spec)?;
    metrics::stop_timer(timer);

    // Registry Updates.
    let timer = metrics::start_timer_vec(
        &metrics::EPOCH_TRANSITION_STEP_SECONDS,
        &["registry_updates"],
    );
    let registry_summary = process_registry_updates(state, spec)?;
    metrics::stop_timer(timer);

    // Slashings.
    let timer =
        metrics::start_timer_vec(&metrics::EPOCH_TRANSITION_STEP_SECONDS, &["slashings"]);
    process_slashings(
        state,
        validator_statuses.total_balances.current_epoch(),
        spec,
    )?;
    metrics::stop_timer(timer);

    // Reset eth1 data votes.
    process_eth1_data_reset(state)?;

    // Update effective balances with hysteresis (lag).
    process_effective_balance_updates(state, spec)?;

    // Reset slashings
    process_slashings_reset(state)?;

    // Set randao mix
    process_randao_mixes_reset(state)?;

    // Set historical root accumulator
    process_historical_roots_update(state)?;

    // Rotate current/previous epoch attestations
    process_participation_record_updates(state)?;

    // Rotate the epoch caches to suit the epoch transition.
    state.advance_caches();

    let total_balances = &validator_statuses.total_balances;
    Ok(EpochProcessingSummary {
        previous_epoch: state.previous_epoch(),
        current_epoch: state.current_epoch(),
        total_active_balance: total_balances.current_epoch(),
        previous_epoch_target_attesting_balance: total_balances
            .previous_epoch_target_attesters(),
        validators_in_activation_queue: registry_summary.activation_queue_len,
        validators_in_exit_queue: registry_summary.exit_queue_len,
    })
}

/// Update the justified and finalized checkpoints for matching target attestations.
pub fn process_justification_and_finalization<E: EthSpec>(
    state: &BeaconState<E>,
    total_balances: &TotalBalances,
) -> Result<JustificationAndFinalizationState<E>, Error> {
    let justification_and_finalization_state = JustificationAndFinalizationState::new(state);

    if state.current_epoch() <= E::genesis_epoch().safe_add(1)? {
        return Ok(justification_and_finalization_state);
    }

    weigh_justification_and_finalization(
        justification_and_finalization_state,
        total_balances.current_epoch(),
        total_balances.previous_epoch_target_attesters(),
        total_balances.current_epoch_target_attesters(),
    )
}

/// Outcome counts from registry processing, for the summary and metrics.
pub struct RegistrySummary {
    pub activation_queue_len: usize,
    pub exit_queue_len: usize,
}

/// Performs a validator registry update, if required.
///
/// NOTE: unchanged in Altair.
pub fn process_registry_updates<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<RegistrySummary, Error> {
    // Process activation eligibility and ejections.
    // Collect eligible and exiting validators (we need to avoid mutating the state while iterating).
    //
    // We assume it's safe to re-order the change in eligibility and `initiate_validator_exit`.
    // Rest assured exiting validators will still be exited in the same order as in the spec.
    let current_epoch = state.current_epoch();
    let is_ejectable = |validator: &Validator| {
        validator.is_active_at(current_epoch)
            && validator.effective_balance <= spec.ejection_balance
    };
    let fork_name = state.fork_name_unchecked();
    let indices_to_update: Vec<usize> = state
        .validators()
        .iter()
        .enumerate()
        .filter(|(_, validator)| {
            validator.is_eligible_for_activation_queue(fork_name, spec)
                || is_ejectable(validator)
        })
        .map(|(idx, _)| idx)
        .collect();

    for index in indices_to_update {
        let validator = state.get_validator(index)?;
        if validator.is_eligible_for_activation_queue(fork_name, spec) {
            let mut validator = validator;
            validator.activation_eligibility_epoch = current_epoch.safe_add(1)?;
            state.update_validator(index, validator)?;
        } else if is_ejectable(&validator) {
            initiate_validator_exit(state, index, spec)?;
        }
    }

    // Queue validators eligible for activation and not dequeued for activation prior to finalized
    // epoch.
    let activation_queue: Vec<usize> = {
        let mut queue: Vec<(types::Epoch, usize)> = state
            .validators()
            .iter()
            .enumerate()
            .filter(|(_, validator)| validator.is_eligible_for_activation(state, spec))
            .map(|(index, validator)| (validator.activation_eligibility_epoch, index))
            .collect();
        queue.sort();
        queue.into_iter().map(|(_, index)| index).collect()
    };
    let activation_queue_len = activation_queue.len();

    // Dequeue validators for activation up to churn limit
    let churn_limit = state.get_activation_churn_limit(spec)? as usize;
    let delayed_activation_epoch = compute_activation_exit_epoch(current_epoch, spec)?;
    for index in activation_queue.into_iter().take(churn_limit) {
        let mut validator = state.get_validator(index)?;
        validator.activation_epoch = delayed_activation_epoch;
        state.update_validator(index, validator)?;
    }

    let exit_queue_len = state
        .validators()
        .iter()
        .filter(|validator| {
            validator.exit_epoch != spec.far_future_epoch && validator.exit_epoch > current_epoch
        })
        .count();

    metrics::set_gauge(
        &metrics::VALIDATORS_IN_ACTIVATION_QUEUE,
        activation_queue_len as i64,
    );
    metrics::set_gauge(&metrics::VALIDATORS_IN_EXIT_QUEUE, exit_queue_len as i64);

    Ok(RegistrySummary {
        activation_queue_len,
        exit_queue_len,
    })
}

/// Process slashings.
pub fn process_slashings<E: EthSpec>(
    state: &mut BeaconState<E>,
    total_balance: u64,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let epoch = state.current_epoch();
    let sum_slashings = state.get_total_slashings()?;
    let fork_name = state.fork_name_unchecked();

    let adjusted_total_slashing_balance = std::cmp::min(
        sum_slashings.safe_mul(spec.proportional_slashing_multiplier_for_fork(fork_name))?,
        total_balance,
    );

    let target_withdrawable_epoch =
        epoch.safe_add(E::EpochsPerSlashingsVector::to_u64().safe_div(2)?)?;
    let indices: Vec<(usize, u64)> = state
        .validators()
        .iter()
        .enumerate()
        .filter(|(_, validator)| {
            validator.slashed && target_withdrawable_epoch == validator.withdrawable_epoch
        })
        .map(|(index, validator)| (index, validator.effective_balance))
        .collect();

    for (index, validator_effective_balance) in indices {
        let increment = spec.effective_balance_increment;
        let penalty_numerator = validator_effective_balance
            .safe_div(increment)?
            .safe_mul(adjusted_total_slashing_balance)?;
        let penalty = penalty_numerator
            .safe_div(total_balance)?
            .safe_mul(increment)?;

        decrease_balance(state, index, penalty)?;
    }

    Ok(())
}

/// Update the effective balances with hysteresis.
///
/// NOTE: unchanged in Altair; Electra raises the maximum via the fork-aware
/// per-validator cap.
pub fn process_effective_balance_updates<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let hysteresis_increment = spec
        .effective_balance_increment
        .safe_div(spec.hysteresis_quotient)?;
    let downward_threshold =
        hysteresis_increment.safe_mul(spec.hysteresis_downward_multiplier)?;
    let upward_threshold = hysteresis_increment.safe_mul(spec.hysteresis_upward_multiplier)?;
    let fork_name = state.fork_name_unchecked();

    for index in 0..state.validators().len() {
        let balance = state.get_balance(index)?;
        let mut validator = state.get_validator(index)?;
        let max_effective_balance = validator.get_max_effective_balance(spec, fork_name);

        if balance.safe_add(downward_threshold)? < validator.effective_balance
            || validator.effective_balance.safe_add(upward_threshold)? < balance
        {
            validator.effective_balance = std::cmp::min(
                balance.safe_sub(balance.safe_rem(spec.effective_balance_increment)?)?,
                max_effective_balance,
            );
            state.update_validator(index, validator)?;
        }
    }
    Ok(())
}

/// Rotate the current epoch's pending attestations into the previous epoch.
pub fn process_participation_record_updates<E: EthSpec>(
    state: &mut BeaconState<E>,
) -> Result<(), Error> {
    let base_state = state.as_base_mut()?;
    base_state.previous_epoch_attestations =
        std::mem::take(&mut base_state.current_epoch_attestations);
    Ok(())
}
