use crate::common::{
    decrease_balance, increase_balance,
    initiate_validator_exit,
    update_progressive_balances_cache::initialize_progressive_balances_cache,
};
use crate::epoch_cache::{PreEpochCache, initialize_epoch_cache};
use crate::per_block_processing::is_valid_deposit_signature;
use crate::per_epoch_processing::{Delta, Error};
use safe_arith::SafeArith;
use std::cmp::min;
use std::collections::{BTreeSet, HashMap};
use tracing::instrument;
use types::{
    ActivationQueue, BeaconState, BeaconStateError, ChainSpec, Checkpoint, DepositData, Epoch,
    EthSpec, ForkName, List, ParticipationFlags, PendingDeposit, RelativeEpoch, Unsigned,
    Validator, Vector,
    consts::altair::{
        NUM_FLAG_INDICES, PARTICIPATION_FLAG_WEIGHTS, TIMELY_HEAD_FLAG_INDEX,
        TIMELY_TARGET_FLAG_INDEX, WEIGHT_DENOMINATOR,
    },
};

/// Which epoch sub-steps the single pass should run; disabling steps is only
/// used by tests that exercise one step in isolation.
pub struct SinglePassConfig {
    pub inactivity_updates: bool,
    pub rewards_and_penalties: bool,
    pub registry_updates: bool,
    pub slashings: bool,
    pub effective_balance_updates: bool,
}

impl Default for SinglePassConfig {
    fn default() -> SinglePassConfig {
        Self::enable_all()
    }
}

impl SinglePassConfig {
    pub fn enable_all() -> SinglePassConfig {
        Self {
            inactivity_updates: true,
            rewards_and_penalties: true,
            registry_updates: true,
            slashings: true,
            effective_balance_updates: true,
        }
    }

    pub fn disable_all() -> SinglePassConfig {
        SinglePassConfig {
            inactivity_updates: false,
            rewards_and_penalties: false,
            registry_updates: false,
            slashings: false,
            effective_balance_updates: false,
        }
    }
}

/// Values from the state that are immutable throughout epoch processing.
struct StateContext {
    current_epoch: Epoch,
    next_epoch: Epoch,
    finalized_checkpoint: Checkpoint,
    is_in_inactivity_leak: bool,
    total_active_balance: u64,
    churn_limit: u64,
    fork_name: ForkName,
}

struct RewardsAndPenaltiesContext {
    unslashed_participating_increments_array: [u64; NUM_FLAG_INDICES],
    active_increments: u64,
}

struct SlashingsContext {
    adjusted_total_slashing_balance: u64,
    target_withdrawable_epoch: Epoch,
}

struct EffectiveBalancesContext {
    downward_threshold: u64,
    upward_threshold: u64,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ValidatorInfo {
    pub index: usize,
    pub effective_balance: u64,
    pub base_reward: u64,
    pub is_eligible: bool,
    pub is_slashed: bool,
    pub is_active_current_epoch: bool,
    pub is_active_previous_epoch: bool,
    // Used for determining rewards.
    pub previous_epoch_participation: ParticipationFlags,
    // Used for updating the progressive balances cache for next epoch.
    pub current_epoch_participation: ParticipationFlags,
}

impl ValidatorInfo {
    #[inline]
    pub fn is_unslashed_participating_index(&self, flag_index: usize) -> Result<bool, Error> {
        Ok(self.is_active_previous_epoch
            && !self.is_slashed
            && self
                .previous_epoch_participation
                .has_flag(flag_index)
                .map_err(|_| Error::InvalidFlagIndex(flag_index))?)
    }
}

/// The Altair-onwards epoch transition core: inactivity updates, rewards and
/// penalties, registry updates, slashings and effective balance updates in a
/// single loop over the validator set.
#[instrument(skip_all)]
pub fn process_epoch_single_pass<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
    conf: SinglePassConfig,
) -> Result<(), Error> {
    initialize_epoch_cache(state, spec)?;
    initialize_progressive_balances_cache(state, spec)?;
    state.build_exit_cache(spec)?;
    state.build_committee_cache(RelativeEpoch::Previous, spec)?;
    state.build_committee_cache(RelativeEpoch::Current, spec)?;
    state.update_pubkey_cache()?;

    let previous_epoch = state.previous_epoch();
    let current_epoch = state.current_epoch();
    let next_epoch = state.next_epoch()?;
    let is_in_inactivity_leak = state.is_in_inactivity_leak(previous_epoch, spec)?;
    let total_active_balance = state.get_total_active_balance()?;
    let churn_limit = state.get_validator_churn_limit(spec)?;
    let activation_churn_limit = state.get_activation_churn_limit(spec)?;
    let finalized_checkpoint = state.finalized_checkpoint();
    let fork_name = state.fork_name_unchecked();

    let state_ctxt = &StateContext {
        current_epoch,
        next_epoch,
        finalized_checkpoint,
        is_in_inactivity_leak,
        total_active_balance,
        churn_limit,
        fork_name,
    };

    // Contexts that require immutable access to `state`.
    let slashings_ctxt = &SlashingsContext::new(state, state_ctxt, spec)?;
    let mut next_epoch_cache = PreEpochCache::new_for_next_epoch(state)?;

    let mut earliest_exit_epoch = state.earliest_exit_epoch().ok();
    let mut exit_balance_to_consume = state.exit_balance_to_consume().ok();

    // Compute shared values required for different parts of epoch processing.
    let rewards_ctxt =
        &RewardsAndPenaltiesContext::new(state.progressive_balances_cache(), state_ctxt, spec)?;

    let mut activation_queues = if !fork_name.electra_enabled() {
        let activation_queue = state
            .epoch_cache()
            .activation_queue()?
            .get_validators_eligible_for_activation(
                finalized_checkpoint.epoch,
                activation_churn_limit as usize,
            );
        let next_epoch_activation_queue = ActivationQueue::default();
        Some((activation_queue, next_epoch_activation_queue))
    } else {
        None
    };
    let effective_balances_ctxt = &EffectiveBalancesContext::new(spec)?;

    // Snapshot the participation lists once; the loop reads them by index.
    let previous_epoch_participation = state.previous_epoch_participation()?.to_vec();
    let current_epoch_participation = state.current_epoch_participation()?.to_vec();

    let num_validators = state.validators().len();

    // Iterate over the validators and related fields in one pass, writing
    // back only entries that changed.
    for index in 0..num_validators {
        let mut validator = state.get_validator(index)?;
        let mut balance = state.get_balance(index)?;
        let validator_before = validator.clone();
        let balance_before = balance;

        let previous_participation = previous_epoch_participation
            .get(index)
            .copied()
            .unwrap_or_default();
        let current_participation = current_epoch_participation
            .get(index)
            .copied()
            .unwrap_or_default();

        let is_active_current_epoch = validator.is_active_at(current_epoch);
        let is_active_previous_epoch = validator.is_active_at(previous_epoch);
        let is_eligible = is_active_previous_epoch
            || (validator.slashed && previous_epoch.safe_add(1)? < validator.withdrawable_epoch);

        let base_reward = if is_eligible {
            state.epoch_cache().get_base_reward(index)?
        } else {
            0
        };

        let validator_info = &ValidatorInfo {
            index,
            effective_balance: validator.effective_balance,
            base_reward,
            is_eligible,
            is_slashed: validator.slashed,
            is_active_current_epoch,
            is_active_previous_epoch,
            previous_epoch_participation: previous_participation,
            current_epoch_participation: current_participation,
        };

        if current_epoch != E::genesis_epoch() {
            // `process_inactivity_updates`
            if conf.inactivity_updates {
                let mut inactivity_score = state
                    .inactivity_scores()?
                    .get(index)
                    .ok_or(BeaconStateError::InactivityScoresOutOfBounds(index))?;
                let before = inactivity_score;
                process_single_inactivity_update(
                    &mut inactivity_score,
                    validator_info,
                    state_ctxt,
                    spec,
                )?;
                if inactivity_score != before {
                    state.inactivity_scores_mut()?.set(index, inactivity_score)?;
                }
            }

            // `process_rewards_and_penalties`
            if conf.rewards_and_penalties {
                let inactivity_score = state
                    .inactivity_scores()?
                    .get(index)
                    .ok_or(BeaconStateError::InactivityScoresOutOfBounds(index))?;
                process_single_reward_and_penalty(
                    &mut balance,
                    &inactivity_score,
                    validator_info,
                    rewards_ctxt,
                    state_ctxt,
                    spec,
                )?;
            }
        }

        // `process_registry_updates`
        if conf.registry_updates {
            let exited = process_single_registry_update(
                &mut validator,
                validator_info,
                activation_queues
                    .as_mut()
                    .map(|(current_queue, next_queue)| (&*current_queue, next_queue)),
                state_ctxt,
                earliest_exit_epoch.as_mut(),
                exit_balance_to_consume.as_mut(),
                spec,
            )?;
            // Pre-Electra ejections go through the exit queue, which needs
            // mutable state access and is handled outside the loop body.
            if let PendingExit::Queue = exited {
                state.update_validator(index, validator.clone())?;
                initiate_validator_exit(state, index, spec)?;
                validator = state.get_validator(index)?;
            }
        }

        // `process_slashings`
        if conf.slashings {
            process_single_slashing(&mut balance, &validator, slashings_ctxt, state_ctxt, spec)?;
        }

        // `process_effective_balance_updates`
        if conf.effective_balance_updates {
            process_single_effective_balance_update(
                state,
                index,
                balance,
                &mut validator,
                current_participation,
                &mut next_epoch_cache,
                effective_balances_ctxt,
                state_ctxt,
                spec,
            )?;
        }

        if validator != validator_before {
            state.update_validator(index, validator)?;
        }
        if balance != balance_before {
            state.set_balance(index, balance)?;
        }
    }

    if conf.registry_updates && fork_name.electra_enabled() {
        if let Some(earliest_exit_epoch) = earliest_exit_epoch {
            *state.earliest_exit_epoch_mut()? = earliest_exit_epoch;
        }
        if let Some(exit_balance_to_consume) = exit_balance_to_consume {
            *state.exit_balance_to_consume_mut()? = exit_balance_to_consume;
        }
    }

    // Finally, finish updating effective balance caches.
    if conf.effective_balance_updates {
        let next_epoch_total_active_balance = next_epoch_cache.get_total_active_balance();
        state.set_total_active_balance(next_epoch, next_epoch_total_active_balance, spec);
        let next_epoch_activation_queue =
            activation_queues.map_or_else(ActivationQueue::default, |(_, queue)| queue);
        *state.epoch_cache_mut() =
            next_epoch_cache.into_epoch_cache(
                next_epoch_total_active_balance,
                next_epoch_activation_queue,
                spec,
            )?;
    }

    Ok(())
}

/// Apply any deposits that the finalized checkpoint and the deposit churn
/// allow, postponing the rest (Electra onwards).
pub fn process_pending_deposits<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let next_epoch = state.next_epoch()?;
    let available_for_processing = state.deposit_balance_to_consume()?.safe_add(
        spec.get_activation_exit_churn_limit(state.get_total_active_balance()?)?,
    )?;
    let finalized_slot = state
        .finalized_checkpoint()
        .epoch
        .start_slot(E::slots_per_epoch());

    let mut processed_amount = 0u64;
    let mut next_deposit_index = 0usize;
    let mut deposits_to_postpone: Vec<PendingDeposit> = Vec::new();
    let mut is_churn_limit_reached = false;

    // Amounts to credit to existing validators and deposits that create new
    // validators, applied after the scan so the list is only rewritten once.
    let mut validator_deposits_to_process: HashMap<usize, u64> = HashMap::new();
    let mut new_validator_deposits: Vec<PendingDeposit> = Vec::new();

    state.update_pubkey_cache()?;

    let pending_deposits = state.pending_deposits()?.to_vec();
    for deposit in &pending_deposits {
        // Do not process deposit requests if the Eth1 bridge deposits are not yet applied.
        if deposit.slot > spec.genesis_slot
            && state.eth1_deposit_index() < state.deposit_requests_start_index()?
        {
            break;
        }

        // Check if deposit has been finalized, otherwise, stop processing.
        if deposit.slot > finalized_slot {
            break;
        }

        // Check if number of processed deposits has not reached the limit, otherwise, stop
        // processing.
        if next_deposit_index >= spec.max_pending_deposits_per_epoch as usize {
            break;
        }

        // Read the validator state.
        let validator_index = state.get_validator_index(&deposit.pubkey)?;
        let (is_validator_exited, is_validator_withdrawn) = validator_index
            .map(|index| {
                let validator = state.get_validator(index);
                match validator {
                    Ok(validator) => (
                        validator.exit_epoch < spec.far_future_epoch,
                        validator.withdrawable_epoch < next_epoch,
                    ),
                    Err(_) => (false, false),
                }
            })
            .unwrap_or((false, false));

        if is_validator_withdrawn {
            // Deposited balance will never become active; increase balance but do not consume
            // churn.
            if let Some(index) = validator_index {
                validator_deposits_to_process
                    .entry(index)
                    .or_insert(0)
                    .safe_add_assign(deposit.amount)?;
            }
        } else if is_validator_exited {
            // Validator is exiting; postpone the deposit until after the withdrawable epoch.
            deposits_to_postpone.push(deposit.clone());
        } else {
            // Check if deposit fits in the churn, otherwise, do no more deposit processing in
            // this epoch.
            is_churn_limit_reached =
                processed_amount.safe_add(deposit.amount)? > available_for_processing;
            if is_churn_limit_reached {
                break;
            }
            processed_amount.safe_add_assign(deposit.amount)?;

            // Consume churn and apply deposit.
            if let Some(index) = validator_index {
                validator_deposits_to_process
                    .entry(index)
                    .or_insert(0)
                    .safe_add_assign(deposit.amount)?;
            } else {
                new_validator_deposits.push(deposit.clone());
            }
        }

        // Regardless of how the deposit was handled, we move on in the queue.
        next_deposit_index.safe_add_assign(1)?;
    }

    // Rewrite the queue: unprocessed deposits plus the postponed ones.
    let mut new_pending_deposits =
        List::try_from_iter(state.pending_deposits()?.iter_from(next_deposit_index)?)?;
    for deposit in deposits_to_postpone {
        new_pending_deposits.push(deposit)?;
    }
    *state.pending_deposits_mut()? = new_pending_deposits;

    // Accumulate the churn that is left over for the next epoch.
    if is_churn_limit_reached {
        *state.deposit_balance_to_consume_mut()? =
            available_for_processing.safe_sub(processed_amount)?;
    } else {
        *state.deposit_balance_to_consume_mut()? = 0;
    }

    // Credit top-ups.
    for (validator_index, amount) in validator_deposits_to_process {
        increase_balance(state, validator_index, amount)?;
    }

    // Add new validators. `new_validator_deposits` may contain several
    // deposits for one pubkey, where the first creates the validator and the
    // rest top it up.
    for deposit in new_validator_deposits {
        let deposit_data = DepositData {
            pubkey: deposit.pubkey,
            withdrawal_credentials: deposit.withdrawal_credentials,
            amount: deposit.amount,
            signature: deposit.signature,
        };
        if let Some(validator_index) = state.get_validator_index(&deposit_data.pubkey)? {
            increase_balance(state, validator_index, deposit_data.amount)?;
        } else if is_valid_deposit_signature(&deposit_data, spec).is_ok() {
            // Only check the signature on the deposit that creates the validator, following
            // `apply_pending_deposit` in the spec.
            state.add_validator_to_registry(
                deposit_data.pubkey,
                deposit_data.withdrawal_credentials,
                deposit_data.amount,
                spec,
            )?;
        }
    }

    Ok(())
}

/// Apply any consolidations whose source has become withdrawable (Electra
/// onwards).
pub fn process_pending_consolidations<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let next_epoch = state.next_epoch()?;
    let mut next_pending_consolidation = 0usize;

    let pending_consolidations = state.pending_consolidations()?.to_vec();
    for pending_consolidation in &pending_consolidations {
        let source_index = pending_consolidation.source_index as usize;
        let target_index = pending_consolidation.target_index as usize;
        let source_validator = state.get_validator(source_index)?;

        if source_validator.slashed {
            next_pending_consolidation.safe_add_assign(1)?;
            continue;
        }
        if source_validator.withdrawable_epoch > next_epoch {
            break;
        }

        // Calculate the consolidated balance.
        let source_effective_balance = min(
            state.get_balance(source_index)?,
            source_validator.effective_balance,
        );

        // Move active balance to target. Excess balance is withdrawable.
        decrease_balance(state, source_index, source_effective_balance)?;
        increase_balance(state, target_index, source_effective_balance)?;

        next_pending_consolidation.safe_add_assign(1)?;
    }

    let remaining = List::try_from_iter(
        state
            .pending_consolidations()?
            .iter_from(next_pending_consolidation)?,
    )?;
    *state.pending_consolidations_mut()? = remaining;

    Ok(())
}

/// Shift the proposer lookahead forward one epoch and fill in the proposers
/// of the newly visible epoch (Fulu onwards).
pub fn process_proposer_lookahead<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let mut lookahead = state.proposer_lookahead()?.to_vec();

    // Shift out proposers in the first epoch.
    lookahead.copy_within((E::slots_per_epoch() as usize).., 0);

    let next_epoch = state
        .current_epoch()
        .safe_add(spec.min_seed_lookahead.as_u64())?
        .safe_add(1u64)?;
    let last_epoch_proposers = state.get_beacon_proposer_indices(next_epoch, spec)?;

    // Fill in the last epoch with new proposer indices.
    let last_epoch_start =
        E::proposer_lookahead_slots().safe_sub(E::slots_per_epoch() as usize)?;
    for (i, proposer) in last_epoch_proposers.into_iter().enumerate() {
        let index = last_epoch_start.safe_add(i)?;
        *lookahead
            .get_mut(index)
            .ok_or(Error::ProposerLookaheadOutOfBounds(index))? = proposer as u64;
    }

    *state.proposer_lookahead_mut()? = Vector::new(lookahead)?;

    Ok(())
}

fn process_single_inactivity_update(
    inactivity_score: &mut u64,
    validator_info: &ValidatorInfo,
    state_ctxt: &StateContext,
    spec: &ChainSpec,
) -> Result<(), Error> {
    if !validator_info.is_eligible {
        return Ok(());
    }

    // Increase inactivity score of inactive validators
    if validator_info.is_unslashed_participating_index(TIMELY_TARGET_FLAG_INDEX)? {
        // Avoid mutating when the inactivity score is 0 and can't go any lower -- the common
        // case.
        if *inactivity_score == 0 {
            return Ok(());
        }
        inactivity_score.safe_sub_assign(1)?;
    } else {
        inactivity_score.safe_add_assign(spec.inactivity_score_bias)?;
    }

    // Decrease the score of all validators for forgiveness when not during a leak
    if !state_ctxt.is_in_inactivity_leak {
        let deduction = min(spec.inactivity_score_recovery_rate, *inactivity_score);
        inactivity_score.safe_sub_assign(deduction)?;
    }

    Ok(())
}

fn process_single_reward_and_penalty(
    balance: &mut u64,
    inactivity_score: &u64,
    validator_info: &ValidatorInfo,
    rewards_ctxt: &RewardsAndPenaltiesContext,
    state_ctxt: &StateContext,
    spec: &ChainSpec,
) -> Result<(), Error> {
    if !validator_info.is_eligible {
        return Ok(());
    }

    let mut delta = Delta::default();
    for flag_index in 0..NUM_FLAG_INDICES {
        get_flag_index_delta(
            &mut delta,
            validator_info,
            flag_index,
            rewards_ctxt,
            state_ctxt,
        )?;
    }
    get_inactivity_penalty_delta(
        &mut delta,
        validator_info,
        inactivity_score,
        state_ctxt,
        spec,
    )?;

    if delta.rewards != 0 || delta.penalties != 0 {
        balance.safe_add_assign(delta.rewards)?;
        *balance = balance.saturating_sub(delta.penalties);
    }

    Ok(())
}

fn get_flag_index_delta(
    delta: &mut Delta,
    validator_info: &ValidatorInfo,
    flag_index: usize,
    rewards_ctxt: &RewardsAndPenaltiesContext,
    state_ctxt: &StateContext,
) -> Result<(), Error> {
    let base_reward = validator_info.base_reward;
    let weight = get_flag_weight(flag_index)?;
    let unslashed_participating_increments =
        rewards_ctxt.get_unslashed_participating_increments(flag_index)?;

    if validator_info.is_unslashed_participating_index(flag_index)? {
        if !state_ctxt.is_in_inactivity_leak {
            let reward_numerator = base_reward
                .safe_mul(weight)?
                .safe_mul(unslashed_participating_increments)?;
            delta.reward(
                reward_numerator.safe_div(
                    rewards_ctxt
                        .active_increments
                        .safe_mul(WEIGHT_DENOMINATOR)?,
                )?,
            )?;
        }
    } else if flag_index != TIMELY_HEAD_FLAG_INDEX {
        delta.penalize(base_reward.safe_mul(weight)?.safe_div(WEIGHT_DENOMINATOR)?)?;
    }
    Ok(())
}

/// Get the weight for a `flag_index` from the constant list of all weights.
fn get_flag_weight(flag_index: usize) -> Result<u64, Error> {
    PARTICIPATION_FLAG_WEIGHTS
        .get(flag_index)
        .copied()
        .ok_or(Error::InvalidFlagIndex(flag_index))
}

fn get_inactivity_penalty_delta(
    delta: &mut Delta,
    validator_info: &ValidatorInfo,
    inactivity_score: &u64,
    state_ctxt: &StateContext,
    spec: &ChainSpec,
) -> Result<(), Error> {
    if !validator_info.is_unslashed_participating_index(TIMELY_TARGET_FLAG_INDEX)? {
        let penalty_numerator = validator_info
            .effective_balance
            .safe_mul(*inactivity_score)?;
        let penalty_denominator = spec
            .inactivity_score_bias
            .safe_mul(spec.inactivity_penalty_quotient_for_fork(state_ctxt.fork_name))?;
        delta.penalize(penalty_numerator.safe_div(penalty_denominator)?)?;
    }
    Ok(())
}

impl RewardsAndPenaltiesContext {
    fn new(
        progressive_balances: &types::ProgressiveBalancesCache,
        state_ctxt: &StateContext,
        spec: &ChainSpec,
    ) -> Result<Self, Error> {
        let mut unslashed_participating_increments_array = [0; NUM_FLAG_INDICES];
        for flag_index in 0..NUM_FLAG_INDICES {
            let unslashed_participating_balance =
                progressive_balances.previous_epoch_flag_attesting_balance(flag_index)?;
            let unslashed_participating_increments =
                unslashed_participating_balance.safe_div(spec.effective_balance_increment)?;

            *unslashed_participating_increments_array
                .get_mut(flag_index)
                .ok_or(Error::InvalidFlagIndex(flag_index))? = unslashed_participating_increments;
        }
        let active_increments = state_ctxt
            .total_active_balance
            .safe_div(spec.effective_balance_increment)?;

        Ok(Self {
            unslashed_participating_increments_array,
            active_increments,
        })
    }

    fn get_unslashed_participating_increments(&self, flag_index: usize) -> Result<u64, Error> {
        self.unslashed_participating_increments_array
            .get(flag_index)
            .copied()
            .ok_or(Error::InvalidFlagIndex(flag_index))
    }
}

/// How a registry update wants the validator's exit handled outside the loop.
enum PendingExit {
    None,
    /// The pre-Electra exit queue: `initiate_validator_exit` runs on the state.
    Queue,
}

#[allow(clippy::too_many_arguments)]
fn process_single_registry_update(
    validator: &mut Validator,
    validator_info: &ValidatorInfo,
    activation_queues: Option<(&BTreeSet<usize>, &mut ActivationQueue)>,
    state_ctxt: &StateContext,
    earliest_exit_epoch: Option<&mut Epoch>,
    exit_balance_to_consume: Option<&mut u64>,
    spec: &ChainSpec,
) -> Result<PendingExit, Error> {
    let current_epoch = state_ctxt.current_epoch;
    let fork_name = state_ctxt.fork_name;

    if validator.is_eligible_for_activation_queue(fork_name, spec) {
        validator.activation_eligibility_epoch = current_epoch.safe_add(1)?;
    }

    if validator.is_active_at(current_epoch)
        && validator.effective_balance <= spec.ejection_balance
        && validator.exit_epoch == spec.far_future_epoch
    {
        if fork_name.electra_enabled() {
            // Electra computes the exit epoch from the balance churn without
            // touching the exit cache.
            let exit_epoch = compute_exit_epoch_inline(
                validator.effective_balance,
                state_ctxt,
                earliest_exit_epoch,
                exit_balance_to_consume,
                spec,
            )?;
            validator.exit_epoch = exit_epoch;
            validator.withdrawable_epoch =
                exit_epoch.safe_add(spec.min_validator_withdrawability_delay)?;
        } else {
            return Ok(PendingExit::Queue);
        }
    }

    if !fork_name.electra_enabled() {
        if let Some((activation_queue, next_epoch_activation_queue)) = activation_queues {
            // Activate dequeued validators.
            if activation_queue.contains(&validator_info.index) {
                validator.activation_epoch =
                    crate::common::compute_activation_exit_epoch(current_epoch, spec)?;
            }

            // Maintain the next-epoch queue.
            next_epoch_activation_queue.add_if_could_be_eligible_for_activation(
                validator_info.index,
                validator,
                state_ctxt.next_epoch,
                spec,
            );
        }
    } else {
        // Electra drops the churn-limited activation queue: any validator
        // whose eligibility is finalized simply activates.
        if validator.activation_epoch == spec.far_future_epoch
            && validator.activation_eligibility_epoch <= state_ctxt.finalized_checkpoint.epoch
        {
            validator.activation_epoch =
                crate::common::compute_activation_exit_epoch(current_epoch, spec)?;
        }
    }

    Ok(PendingExit::None)
}

/// The Electra exit-churn computation, operating on the loop's running
/// `earliest_exit_epoch` / `exit_balance_to_consume` values.
fn compute_exit_epoch_inline(
    exit_balance: u64,
    state_ctxt: &StateContext,
    earliest_exit_epoch: Option<&mut Epoch>,
    exit_balance_to_consume: Option<&mut u64>,
    spec: &ChainSpec,
) -> Result<Epoch, Error> {
    let earliest_exit_epoch =
        earliest_exit_epoch.ok_or(Error::MissingEarliestExitEpoch)?;
    let exit_balance_to_consume =
        exit_balance_to_consume.ok_or(Error::MissingExitBalanceToConsume)?;

    let activation_exit_epoch =
        crate::common::compute_activation_exit_epoch(state_ctxt.current_epoch, spec)?;
    let per_epoch_churn =
        spec.get_activation_exit_churn_limit(state_ctxt.total_active_balance)?;

    if *earliest_exit_epoch < activation_exit_epoch {
        *earliest_exit_epoch = activation_exit_epoch;
        *exit_balance_to_consume = per_epoch_churn;
    }

    if exit_balance > *exit_balance_to_consume {
        let balance_to_process = exit_balance.safe_sub(*exit_balance_to_consume)?;
        let additional_epochs = balance_to_process
            .safe_sub(1)?
            .safe_div(per_epoch_churn)?
            .safe_add(1)?;
        earliest_exit_epoch.safe_add_assign(additional_epochs)?;
        exit_balance_to_consume
            .safe_add_assign(additional_epochs.safe_mul(per_epoch_churn)?)?;
    }

    *exit_balance_to_consume = exit_balance_to_consume.safe_sub(exit_balance)?;
    Ok(*earliest_exit_epoch)
}

impl SlashingsContext {
    fn new<E: EthSpec>(
        state: &BeaconState<E>,
        state_ctxt: &StateContext,
        spec: &ChainSpec,
    ) -> Result<Self, Error> {
        let sum_slashings = state.get_total_slashings()?;
        let adjusted_total_slashing_balance = min(
            sum_slashings.safe_mul(
                spec.proportional_slashing_multiplier_for_fork(state_ctxt.fork_name),
            )?,
            state_ctxt.total_active_balance,
        );

        let target_withdrawable_epoch = state_ctxt
            .current_epoch
            .safe_add(E::EpochsPerSlashingsVector::to_u64().safe_div(2)?)?;

        Ok(Self {
            adjusted_total_slashing_balance,
            target_withdrawable_epoch,
        })
    }
}

fn process_single_slashing(
    balance: &mut u64,
    validator: &Validator,
    slashings_ctxt: &SlashingsContext,
    state_ctxt: &StateContext,
    spec: &ChainSpec,
) -> Result<(), Error> {
    if validator.slashed && slashings_ctxt.target_withdrawable_epoch == validator.withdrawable_epoch
    {
        let increment = spec.effective_balance_increment;
        let penalty_numerator = validator
            .effective_balance
            .safe_div(increment)?
            .safe_mul(slashings_ctxt.adjusted_total_slashing_balance)?;
        let penalty = penalty_numerator
            .safe_div(state_ctxt.total_active_balance)?
            .safe_mul(increment)?;

        *balance = balance.saturating_sub(penalty);
    }
    Ok(())
}

impl EffectiveBalancesContext {
    fn new(spec: &ChainSpec) -> Result<Self, Error> {
        let hysteresis_increment = spec
            .effective_balance_increment
            .safe_div(spec.hysteresis_quotient)?;
        let downward_threshold =
            hysteresis_increment.safe_mul(spec.hysteresis_downward_multiplier)?;
        let upward_threshold =
            hysteresis_increment.safe_mul(spec.hysteresis_upward_multiplier)?;

        Ok(Self {
            downward_threshold,
            upward_threshold,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn process_single_effective_balance_update<E: EthSpec>(
    state: &mut BeaconState<E>,
    index: usize,
    balance: u64,
    validator: &mut Validator,
    current_epoch_participation: ParticipationFlags,
    next_epoch_cache: &mut PreEpochCache,
    eb_ctxt: &EffectiveBalancesContext,
    state_ctxt: &StateContext,
    spec: &ChainSpec,
) -> Result<(), Error> {
    // Use the higher effective balance limit for compounding withdrawal credentials from
    // Electra onwards.
    let max_effective_balance =
        validator.get_max_effective_balance(spec, state_ctxt.fork_name);

    let old_effective_balance = validator.effective_balance;
    let new_effective_balance = if balance.safe_add(eb_ctxt.downward_threshold)?
        < validator.effective_balance
        || validator
            .effective_balance
            .safe_add(eb_ctxt.upward_threshold)?
            < balance
    {
        min(
            balance.safe_sub(balance.safe_rem(spec.effective_balance_increment)?)?,
            max_effective_balance,
        )
    } else {
        old_effective_balance
    };

    let is_active_next_epoch = validator.is_active_at(state_ctxt.next_epoch);

    if new_effective_balance != old_effective_balance {
        validator.effective_balance = new_effective_balance;

        // Update the progressive balances cache for the *current* epoch, which is almost always
        // the epoch the change applies to.
        if state.progressive_balances_cache().is_initialized() {
            state
                .progressive_balances_cache_mut()
                .on_effective_balance_change(
                    validator.slashed,
                    current_epoch_participation,
                    old_effective_balance,
                    new_effective_balance,
                )?;
        }
    }

    next_epoch_cache.push_effective_balance(new_effective_balance, is_active_next_epoch)?;

    Ok(())
}
