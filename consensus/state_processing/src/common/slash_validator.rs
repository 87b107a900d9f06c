use crate::ConsensusContext;
use crate::common::{decrease_balance, increase_balance, initiate_validator_exit};
use crate::per_block_processing::errors::BlockProcessingError;
use safe_arith::SafeArith;
use std::cmp;
use types::{BeaconState, ChainSpec, EthSpec};

/// Slash the validator with index `slashed_index`.
pub fn slash_validator<E: EthSpec>(
    state: &mut BeaconState<E>,
    slashed_index: usize,
    opt_whistleblower_index: Option<usize>,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let epoch = state.current_epoch();
    let latest_block_slot = state.latest_block_header().slot;
    let fork_name = state.fork_name_unchecked();

    initiate_validator_exit(state, slashed_index, spec)?;

    let mut validator = state.get_validator(slashed_index)?;
    validator.slashed = true;
    validator.withdrawable_epoch = cmp::max(
        validator.withdrawable_epoch,
        epoch.safe_add(E::epochs_per_slashings_vector() as u64)?,
    );
    let validator_effective_balance = validator.effective_balance;
    state.update_validator(slashed_index, validator)?;

    state.slashings_cache_mut().record_validator_slashing(latest_block_slot, slashed_index)?;

    let current_slashings = state.get_slashings_at(epoch)?;
    state.set_slashings_at(
        epoch,
        current_slashings.safe_add(validator_effective_balance)?,
    )?;

    // Keep the progressive balances cache consistent: a slashed validator no
    // longer contributes its participating balance.
    if fork_name.altair_enabled() {
        let previous_epoch_participation = state
            .previous_epoch_participation()?
            .get(slashed_index)
            .ok_or(types::BeaconStateError::ParticipationOutOfBounds(slashed_index))?;
        let current_epoch_participation = state
            .current_epoch_participation()?
            .get(slashed_index)
            .ok_or(types::BeaconStateError::ParticipationOutOfBounds(slashed_index))?;
        if state.progressive_balances_cache().is_initialized() {
            state.progressive_balances_cache_mut().on_slashing(
                previous_epoch_participation,
                current_epoch_participation,
                validator_effective_balance,
            )?;
        }
    }

    let min_slashing_penalty_quotient = spec.min_slashing_penalty_quotient_for_fork(fork_name);
    decrease_balance(
        state,
        slashed_index,
        validator_effective_balance.safe_div(min_slashing_penalty_quotient)?,
    )?;

    // Apply proposer and whistleblower rewards
    let proposer_index = ctxt.get_proposer_index(state, spec)? as usize;
    let whistleblower_index = opt_whistleblower_index.unwrap_or(proposer_index);
    let whistleblower_reward = validator_effective_balance
        .safe_div(spec.whistleblower_reward_quotient_for_fork(fork_name))?;
    let proposer_reward = if fork_name.altair_enabled() {
        whistleblower_reward
            .safe_mul(types::consts::altair::PROPOSER_WEIGHT)?
            .safe_div(types::consts::altair::WEIGHT_DENOMINATOR)?
    } else {
        whistleblower_reward.safe_div(spec.proposer_reward_quotient)?
    };

    increase_balance(state, proposer_index, proposer_reward)?;
    increase_balance(
        state,
        whistleblower_index,
        whistleblower_reward.safe_sub(proposer_reward)?,
    )?;

    Ok(())
}
