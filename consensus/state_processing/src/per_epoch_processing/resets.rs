use super::errors::EpochProcessingError as Error;
use safe_arith::SafeArith;
use types::{BeaconState, EthSpec, List, Unsigned};

/// Start a new eth1 voting period at the end of each one.
pub fn process_eth1_data_reset<E: EthSpec>(state: &mut BeaconState<E>) -> Result<(), Error> {
    if state
        .slot()
        .safe_add(1)?
        .safe_rem(E::SlotsPerEth1VotingPeriod::to_u64())?
        == 0
    {
        *state.eth1_data_votes_mut() = List::empty();
    }
    Ok(())
}

/// Zero the slashings slot for the epoch about to begin.
pub fn process_slashings_reset<E: EthSpec>(state: &mut BeaconState<E>) -> Result<(), Error> {
    let next_epoch = state.next_epoch()?;
    state.set_slashings_at(next_epoch, 0)?;
    Ok(())
}

/// Seed the next epoch's randao mix with the current one.
pub fn process_randao_mixes_reset<E: EthSpec>(state: &mut BeaconState<E>) -> Result<(), Error> {
    let current_epoch = state.current_epoch();
    let next_epoch = state.next_epoch()?;
    let current_mix = state.get_randao_mix(current_epoch)?;
    state.set_randao_mix(next_epoch, current_mix)?;
    Ok(())
}
