mod get_attestation_participation;
mod initiate_validator_exit;
mod slash_validator;

pub mod altair;
pub mod base;
pub mod update_progressive_balances_cache;

pub use get_attestation_participation::get_attestation_participation_flag_indices;
pub use initiate_validator_exit::{
    compute_exit_epoch_and_update_churn, initiate_validator_exit,
};
pub use slash_validator::slash_validator;

use safe_arith::SafeArith;
use types::{BeaconState, BeaconStateError as Error, EthSpec};

/// Increase the balance of a validator, erroring upon overflow, as per the spec.
pub fn increase_balance<E: EthSpec>(
    state: &mut BeaconState<E>,
    index: usize,
    delta: u64,
) -> Result<(), Error> {
    let balance = state.get_balance(index)?;
    state.set_balance(index, balance.safe_add(delta)?)
}

/// Decrease the balance of a validator, saturating upon overflow, as per the spec.
pub fn decrease_balance<E: EthSpec>(
    state: &mut BeaconState<E>,
    index: usize,
    delta: u64,
) -> Result<(), Error> {
    let balance = state.get_balance(index)?;
    state.set_balance(index, balance.saturating_sub(delta))
}

/// Compute the epoch at which an activation or exit triggered now takes effect.
pub fn compute_activation_exit_epoch(
    epoch: types::Epoch,
    spec: &types::ChainSpec,
) -> Result<types::Epoch, safe_arith::ArithError> {
    epoch.safe_add(1u64)?.safe_add(spec.max_seed_lookahead.as_u64())
}
