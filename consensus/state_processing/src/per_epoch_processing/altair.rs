use super::{
    Error, EpochProcessingSummary, JustificationAndFinalizationState,
    process_historical_roots_update, process_historical_summaries_update,
    resets::{process_eth1_data_reset, process_randao_mixes_reset, process_slashings_reset},
    single_pass::{
        SinglePassConfig, process_epoch_single_pass, process_pending_consolidations,
        process_pending_deposits, process_proposer_lookahead,
    },
    weigh_justification_and_finalization,
};
use crate::common::update_progressive_balances_cache::{
    initialize_progressive_balances_cache, update_progressive_balances_metrics,
};
use crate::epoch_cache::initialize_epoch_cache;
use crate::metrics;
use std::sync::Arc;
use types::{BeaconState, ChainSpec, EthSpec, List, ParticipationFlags, RelativeEpoch};

/// The Altair-onwards epoch transition, ordered exactly as the sub-steps are
/// specified: justification, the single-pass core, the resets, history,
/// participation and sync-committee rotation, then the Electra queues and the
/// Fulu lookahead.
pub fn process_epoch<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<EpochProcessingSummary, Error> {
    // Ensure the committee caches are built.
    state.build_committee_cache(RelativeEpoch::Previous, spec)?;
    state.build_committee_cache(RelativeEpoch::Current, spec)?;
    state.build_committee_cache(RelativeEpoch::Next, spec)?;
    state.build_total_active_balance_cache(spec)?;
    initialize_epoch_cache(state, spec)?;
    initialize_progressive_balances_cache(state, spec)?;

    let total_active_balance = state.get_total_active_balance()?;
    let previous_epoch_target_attesting_balance = state
        .progressive_balances_cache()
        .previous_epoch_target_attesting_balance()?;

    // Justification and finalization.
    let timer = metrics::start_timer_vec(
        &metrics::EPOCH_TRANSITION_STEP_SECONDS,
        &["justification_and_finalization"],
    );
    let justification_and_finalization_state =
        process_justification_and_finalization(state)?;
    justification_and_finalization_state.apply_changes_to_state(state);
    metrics::stop_timer(timer);

    // In a single pass: inactivity updates, rewards and penalties, registry
    // updates, slashings and effective balance updates.
    let timer =
        metrics::start_timer_vec(&metrics::EPOCH_TRANSITION_STEP_SECONDS, &["single_pass"]);
    process_epoch_single_pass(state, spec, SinglePassConfig::default())?;
    metrics::stop_timer(timer);

    // Reset eth1 data votes.
    process_eth1_data_reset(state)?;

    // Reset slashings.
    process_slashings_reset(state)?;

    // Set randao mix.
    process_randao_mixes_reset(state)?;

    // Set historical root accumulator: summaries from Capella, full batches
    // before.
    if state.fork_name_unchecked().capella_enabled() {
        process_historical_summaries_update(state)?;
    } else {
        process_historical_roots_update(state)?;
    }

    // Rotate current/previous epoch participation.
    process_participation_flag_updates(state)?;

    // Rotate the sync committees at period boundaries.
    process_sync_committee_updates(state, spec)?;

    // Electra deposit and consolidation queues.
    if state.fork_name_unchecked().electra_enabled() {
        let timer = metrics::start_timer_vec(
            &metrics::EPOCH_TRANSITION_STEP_SECONDS,
            &["pending_deposits"],
        );
        process_pending_deposits(state, spec)?;
        metrics::stop_timer(timer);

        let timer = metrics::start_timer_vec(
            &metrics::EPOCH_TRANSITION_STEP_SECONDS,
            &["pending_consolidations"],
        );
        process_pending_consolidations(state, spec)?;
        metrics::stop_timer(timer);
    }

    // Fulu proposer lookahead.
    if state.fork_name_unchecked().fulu_enabled() {
        process_proposer_lookahead(state, spec)?;
    }

    // Roll the progressive balances into the next epoch and rotate the
    // committee caches.
    state.progressive_balances_cache_mut().on_epoch_transition(spec)?;
    update_progressive_balances_metrics(state.progressive_balances_cache())?;
    state.advance_caches();

    let validators_in_exit_queue = state
        .validators()
        .iter()
        .filter(|validator| {
            validator.exit_epoch != spec.far_future_epoch
                && validator.exit_epoch > state.current_epoch()
        })
        .count();
    metrics::set_gauge(
        &metrics::VALIDATORS_IN_EXIT_QUEUE,
        validators_in_exit_queue as i64,
    );

    Ok(EpochProcessingSummary {
        previous_epoch: state.previous_epoch(),
        current_epoch: state.current_epoch(),
        total_active_balance,
        previous_epoch_target_attesting_balance,
        validators_in_activation_queue: 0,
        validators_in_exit_queue,
    })
}

/// Update the justified and finalized checkpoints using the progressive
/// balances cache for the attesting balances.
pub fn process_justification_and_finalization<E: EthSpec>(
    state: &BeaconState<E>,
) -> Result<JustificationAndFinalizationState<E>, Error> {
    let justification_and_finalization_state = JustificationAndFinalizationState::new(state);

    if state.current_epoch() <= E::genesis_epoch().saturating_add(1u64) {
        return Ok(justification_and_finalization_state);
    }

    let progressive_balances = state.progressive_balances_cache();
    let previous_target_balance =
        progressive_balances.previous_epoch_target_attesting_balance()?;
    let current_target_balance = progressive_balances.current_epoch_target_attesting_balance()?;
    let total_active_balance = state.get_total_active_balance()?;

    weigh_justification_and_finalization(
        justification_and_finalization_state,
        total_active_balance,
        previous_target_balance,
        current_target_balance,
    )
}

/// Rotate the participation lists: current becomes previous, and a blank
/// current list is created.
pub fn process_participation_flag_updates<E: EthSpec>(
    state: &mut BeaconState<E>,
) -> Result<(), Error> {
    *state.previous_epoch_participation_mut()? =
        std::mem::take(state.current_epoch_participation_mut()?);
    *state.current_epoch_participation_mut()? = List::try_from_iter(
        (0..state.validators().len()).map(|_| ParticipationFlags::default()),
    )?;
    Ok(())
}

/// Rotate the sync committees at the end of each sync committee period.
pub fn process_sync_committee_updates<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let next_epoch = state.next_epoch()?;
    if next_epoch
        .safe_rem(spec.epochs_per_sync_committee_period.as_u64())?
        .as_u64()
        == 0
    {
        *state.current_sync_committee_mut()? = state.next_sync_committee()?.clone();

        *state.next_sync_committee_mut()? = Arc::new(state.get_next_sync_committee(spec)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::state_at_fork;
    use types::{ForkName, Slot};

    #[test]
    fn full_participation_is_rewarded_and_rotated() {
        // Last slot of epoch 1, everyone attested to the target in the
        // previous epoch.
        let (mut state, spec) = state_at_fork(ForkName::Altair, 32, 15);
        let num_validators = state.validators().len();
        let full_flags = ParticipationFlags::from(0b111);
        for index in 0..num_validators {
            state
                .previous_epoch_participation_mut()
                .unwrap()
                .set(index, full_flags)
                .unwrap();
            state
                .current_epoch_participation_mut()
                .unwrap()
                .set(index, full_flags)
                .unwrap();
        }

        let balance_before = state.get_balance(0).unwrap();
        process_epoch(&mut state, &spec).unwrap();

        assert!(
            state.get_balance(0).unwrap() > balance_before,
            "a fully participating validator earns rewards"
        );

        // Participation rotated: previous now carries the old current flags,
        // current is blank.
        assert_eq!(
            state
                .previous_epoch_participation()
                .unwrap()
                .get(0)
                .unwrap(),
            full_flags
        );
        assert_eq!(
            state.current_epoch_participation().unwrap().get(0).unwrap(),
            ParticipationFlags::default()
        );
    }

    #[test]
    fn absent_validators_are_penalised() {
        let (mut state, spec) = state_at_fork(ForkName::Altair, 32, 15);

        let balance_before = state.get_balance(0).unwrap();
        process_epoch(&mut state, &spec).unwrap();

        assert!(
            state.get_balance(0).unwrap() < balance_before,
            "a validator with no participation is penalised"
        );
    }

    #[test]
    fn sync_committees_rotate_at_the_period_boundary() {
        // Minimal preset: the sync committee period is 8 epochs. A state in
        // the last slot of epoch 7 rotates on processing.
        let (mut state, spec) = state_at_fork(ForkName::Altair, 32, 63);
        let next_before = state.next_sync_committee().unwrap().clone();

        process_epoch(&mut state, &spec).unwrap();

        assert_eq!(*state.current_sync_committee().unwrap(), next_before);
    }
}
