use crate::common::base::{SqrtTotalActiveBalance, get_base_reward};
use crate::per_epoch_processing::{
    Delta, Error,
    base::{TotalBalances, ValidatorStatus, ValidatorStatuses},
};
use safe_arith::SafeArith;
use types::{BeaconState, ChainSpec, EthSpec};

/// Combination of several deltas for different components of an attestation reward.
///
/// Exists only for testing and reward-tracking purposes.
#[derive(Default, Clone)]
pub struct AttestationDelta {
    pub source_delta: Delta,
    pub target_delta: Delta,
    pub head_delta: Delta,
    pub inclusion_delay_delta: Delta,
    pub inactivity_penalty_delta: Delta,
}

impl AttestationDelta {
    /// Flatten into a single delta.
    pub fn flatten(self) -> Result<Delta, Error> {
        let AttestationDelta {
            source_delta,
            target_delta,
            head_delta,
            inclusion_delay_delta,
            inactivity_penalty_delta,
        } = self;
        let mut result = Delta::default();
        for delta in [
            source_delta,
            target_delta,
            head_delta,
            inclusion_delay_delta,
            inactivity_penalty_delta,
        ] {
            result.combine(delta)?;
        }
        Ok(result)
    }
}

/// Apply attester and proposer rewards.
pub fn process_rewards_and_penalties<E: EthSpec>(
    state: &mut BeaconState<E>,
    validator_statuses: &ValidatorStatuses,
    spec: &ChainSpec,
) -> Result<(), Error> {
    if state.current_epoch() == E::genesis_epoch() {
        return Ok(());
    }

    // Guard against an out-of-bounds during the validator balance update.
    if validator_statuses.statuses.len() != state.balances().len()
        || validator_statuses.statuses.len() != state.validators().len()
    {
        return Err(Error::ValidatorStatusesInconsistent);
    }

    let deltas = get_attestation_deltas(state, validator_statuses, spec)?;

    // Apply the deltas, erroring on overflow above but not on overflow below (saturating at 0
    // instead).
    for (i, delta) in deltas.into_iter().enumerate() {
        let combined_delta = delta.flatten()?;
        let balance = state.get_balance(i)?;
        state.set_balance(
            i,
            balance
                .safe_add(combined_delta.rewards)?
                .saturating_sub(combined_delta.penalties),
        )?;
    }

    Ok(())
}

/// Apply rewards for participation in attestations during the previous epoch, computing the
/// component deltas separately.
pub fn get_attestation_deltas<E: EthSpec>(
    state: &BeaconState<E>,
    validator_statuses: &ValidatorStatuses,
    spec: &ChainSpec,
) -> Result<Vec<AttestationDelta>, Error> {
    let finality_delay = state
        .previous_epoch()
        .safe_sub(state.finalized_checkpoint().epoch)?
        .as_u64();

    let mut deltas = vec![AttestationDelta::default(); state.validators().len()];

    let total_balances = &validator_statuses.total_balances;
    let sqrt_total_active_balance = SqrtTotalActiveBalance::new(total_balances.current_epoch());

    for (index, validator) in validator_statuses.statuses.iter().enumerate() {
        // Ignore ineligible validators. All sub-functions of the spec do this except for
        // `get_inclusion_delay_deltas`. It's safe to do so here because any validator that is in
        // the unslashed indices of the matching source attestations is active, and therefore
        // eligible.
        if !validator.is_active_in_previous_epoch
            && !(validator.is_slashed && !validator.is_withdrawable_in_current_epoch)
        {
            continue;
        }

        let base_reward = get_base_reward(
            validator.current_epoch_effective_balance,
            sqrt_total_active_balance,
            spec,
        )?;

        let source_delta =
            get_source_delta(validator, base_reward, total_balances, finality_delay, spec)?;
        let target_delta =
            get_target_delta(validator, base_reward, total_balances, finality_delay, spec)?;
        let head_delta =
            get_head_delta(validator, base_reward, total_balances, finality_delay, spec)?;
        let (inclusion_delay_delta, proposer_delta) =
            get_inclusion_delay_delta(validator, base_reward, spec)?;
        let inactivity_penalty_delta =
            get_inactivity_penalty_delta(validator, base_reward, finality_delay, spec)?;

        let delta = deltas.get_mut(index).ok_or(Error::DeltaOutOfBounds(index))?;
        delta.source_delta.combine(source_delta)?;
        delta.target_delta.combine(target_delta)?;
        delta.head_delta.combine(head_delta)?;
        delta.inclusion_delay_delta.combine(inclusion_delay_delta)?;
        delta
            .inactivity_penalty_delta
            .combine(inactivity_penalty_delta)?;

        if let Some((proposer_index, proposer_delta)) = proposer_delta {
            deltas
                .get_mut(proposer_index)
                .ok_or(Error::ValidatorStatusesInconsistent)?
                .inclusion_delay_delta
                .combine(proposer_delta)?;
        }
    }

    Ok(deltas)
}

/// Reward or penalise the validator for its source vote.
fn get_source_delta(
    validator: &ValidatorStatus,
    base_reward: u64,
    total_balances: &TotalBalances,
    finality_delay: u64,
    spec: &ChainSpec,
) -> Result<Delta, Error> {
    get_attestation_component_delta(
        validator.is_previous_epoch_attester && !validator.is_slashed,
        total_balances.previous_epoch_attesters(),
        total_balances,
        base_reward,
        finality_delay,
        spec,
    )
}

fn get_target_delta(
    validator: &ValidatorStatus,
    base_reward: u64,
    total_balances: &TotalBalances,
    finality_delay: u64,
    spec: &ChainSpec,
) -> Result<Delta, Error> {
    get_attestation_component_delta(
        validator.is_previous_epoch_target_attester && !validator.is_slashed,
        total_balances.previous_epoch_target_attesters(),
        total_balances,
        base_reward,
        finality_delay,
        spec,
    )
}

fn get_head_delta(
    validator: &ValidatorStatus,
    base_reward: u64,
    total_balances: &TotalBalances,
    finality_delay: u64,
    spec: &ChainSpec,
) -> Result<Delta, Error> {
    get_attestation_component_delta(
        validator.is_previous_epoch_head_attester && !validator.is_slashed,
        total_balances.previous_epoch_head_attesters(),
        total_balances,
        base_reward,
        finality_delay,
        spec,
    )
}

/// The shared reward/penalty rule for the source, target and head components.
fn get_attestation_component_delta(
    index_in_unslashed_attesting_indices: bool,
    attesting_balance: u64,
    total_balances: &TotalBalances,
    base_reward: u64,
    finality_delay: u64,
    spec: &ChainSpec,
) -> Result<Delta, Error> {
    let mut delta = Delta::default();

    let total_balance = total_balances.current_epoch();

    if index_in_unslashed_attesting_indices {
        if finality_delay > spec.min_epochs_to_inactivity_penalty {
            // Since full base reward will be canceled out by inactivity penalty deltas,
            // optimal participation receives full base reward compensation here.
            delta.reward(base_reward)?;
        } else {
            let reward_numerator = base_reward
                .safe_mul(attesting_balance.safe_div(spec.effective_balance_increment)?)?;
            delta.reward(
                reward_numerator
                    .safe_div(total_balance.safe_div(spec.effective_balance_increment)?)?,
            )?;
        }
    } else {
        delta.penalize(base_reward)?;
    }

    Ok(delta)
}

/// The attester's inclusion-delay reward, plus the proposer's cut if the
/// attestation was included.
fn get_inclusion_delay_delta(
    validator: &ValidatorStatus,
    base_reward: u64,
    spec: &ChainSpec,
) -> Result<(Delta, Option<(usize, Delta)>), Error> {
    // Spec: `get_inclusion_delay_deltas`
    if validator.is_previous_epoch_attester && !validator.is_slashed {
        let mut delta = Delta::default();
        let mut proposer_delta = Delta::default();

        let inclusion_info = validator
            .inclusion_info
            .ok_or(Error::ValidatorStatusesInconsistent)?;

        let proposer_reward = get_proposer_reward(base_reward, spec)?;
        proposer_delta.reward(proposer_reward)?;

        let max_attester_reward = base_reward.safe_sub(proposer_reward)?;
        delta.reward(max_attester_reward.safe_div(inclusion_info.delay)?)?;

        let proposer_index = inclusion_info.proposer_index;
        Ok((delta, Some((proposer_index, proposer_delta))))
    } else {
        Ok((Delta::default(), None))
    }
}

/// The quadratic inactivity leak penalty.
fn get_inactivity_penalty_delta(
    validator: &ValidatorStatus,
    base_reward: u64,
    finality_delay: u64,
    spec: &ChainSpec,
) -> Result<Delta, Error> {
    let mut delta = Delta::default();

    if finality_delay > spec.min_epochs_to_inactivity_penalty {
        // If validator is performing optimally this cancels all rewards for a neutral balance.
        delta.penalize(
            spec.base_rewards_per_epoch
                .safe_mul(base_reward)?
                .safe_sub(get_proposer_reward(base_reward, spec)?)?,
        )?;

        // Additionally, all validators whose FFG target didn't match are penalized extra
        // This condition is equivalent to this condition from the spec:
        // `index not in get_unslashed_attesting_indices(state, matching_target_attestations)`
        if validator.is_slashed || !validator.is_previous_epoch_target_attester {
            delta.penalize(
                validator
                    .current_epoch_effective_balance
                    .safe_mul(finality_delay)?
                    .safe_div(spec.inactivity_penalty_quotient)?,
            )?;
        }
    }

    Ok(delta)
}

/// The proposer's share of an attester's base reward.
pub fn get_proposer_reward(base_reward: u64, spec: &ChainSpec) -> Result<u64, Error> {
    Ok(base_reward.safe_div(spec.proposer_reward_quotient)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{E, base_state};
    use ssz_types::BitList;
    use types::{AttestationData, Checkpoint, Epoch, PendingAttestation, Slot};

    /// A state in epoch 2 where committee 0 of the first slot of the
    /// previous epoch attested perfectly and nobody else attested at all.
    fn state_with_previous_epoch_attestation()
    -> (types::BeaconState<E>, types::ChainSpec, Vec<usize>) {
        let (mut state, spec) = base_state(32, 17);
        let attestation_slot = Slot::new(8);

        let committee = state
            .get_beacon_committee(attestation_slot, 0)
            .unwrap()
            .committee
            .to_vec();
        let mut aggregation_bits = BitList::with_capacity(committee.len()).unwrap();
        for i in 0..committee.len() {
            aggregation_bits.set(i, true).unwrap();
        }

        let pending_attestation = PendingAttestation {
            aggregation_bits,
            data: AttestationData {
                slot: attestation_slot,
                index: 0,
                beacon_block_root: state.get_block_root(attestation_slot).unwrap(),
                source: state.previous_justified_checkpoint(),
                target: Checkpoint {
                    epoch: Epoch::new(1),
                    root: state.get_block_root_at_epoch(Epoch::new(1)).unwrap(),
                },
            },
            inclusion_delay: 1,
            proposer_index: 0,
        };
        state
            .as_base_mut()
            .unwrap()
            .previous_epoch_attestations
            .push(pending_attestation)
            .unwrap();

        (state, spec, committee)
    }

    #[test]
    fn the_component_deltas_sum_to_the_applied_delta() {
        let (state, spec, _) = state_with_previous_epoch_attestation();
        let mut statuses = ValidatorStatuses::new(&state, &spec).unwrap();
        statuses.process_attestations(&state).unwrap();

        let deltas = get_attestation_deltas(&state, &statuses, &spec).unwrap();
        for delta in deltas {
            let manual_rewards = delta.source_delta.rewards
                + delta.target_delta.rewards
                + delta.head_delta.rewards
                + delta.inclusion_delay_delta.rewards
                + delta.inactivity_penalty_delta.rewards;
            let manual_penalties = delta.source_delta.penalties
                + delta.target_delta.penalties
                + delta.head_delta.penalties
                + delta.inclusion_delay_delta.penalties
                + delta.inactivity_penalty_delta.penalties;

            let flattened = delta.flatten().unwrap();
            assert_eq!(flattened.rewards, manual_rewards);
            assert_eq!(flattened.penalties, manual_penalties);
        }
    }

    #[test]
    fn attesters_are_rewarded_and_absentees_penalised() {
        let (state, spec, committee) = state_with_previous_epoch_attestation();
        let mut statuses = ValidatorStatuses::new(&state, &spec).unwrap();
        statuses.process_attestations(&state).unwrap();

        let deltas = get_attestation_deltas(&state, &statuses, &spec).unwrap();
        for (index, delta) in deltas.into_iter().enumerate() {
            if committee.contains(&index) {
                assert!(
                    delta.source_delta.rewards > 0
                        && delta.target_delta.rewards > 0
                        && delta.head_delta.rewards > 0,
                    "attester {index} earns all three component rewards"
                );
                assert!(delta.inclusion_delay_delta.rewards > 0);
            } else if index == 0 {
                // The proposer of the attestation collects the inclusion reward
                // even without attesting itself.
                assert!(delta.inclusion_delay_delta.rewards > 0);
            } else {
                assert!(
                    delta.source_delta.penalties > 0
                        && delta.target_delta.penalties > 0
                        && delta.head_delta.penalties > 0,
                    "absentee {index} is penalised on every component"
                );
            }
        }
    }

    #[test]
    fn applying_the_deltas_moves_the_balances() {
        let (mut state, spec, committee) = state_with_previous_epoch_attestation();
        let mut statuses = ValidatorStatuses::new(&state, &spec).unwrap();
        statuses.process_attestations(&state).unwrap();

        let balance_before = state.get_balance(committee[0]).unwrap();
        process_rewards_and_penalties(&mut state, &statuses, &spec).unwrap();
        assert_ne!(state.get_balance(committee[0]).unwrap(), balance_before);
    }
}
