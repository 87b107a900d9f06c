#![deny(clippy::wildcard_imports)]

use crate::metrics;
pub use epoch_processing_summary::EpochProcessingSummary;
pub use errors::EpochProcessingError as Error;
pub use justification_and_finalization_state::JustificationAndFinalizationState;
use safe_arith::SafeArith;
pub use weigh_justification_and_finalization::weigh_justification_and_finalization;

pub mod altair;
pub mod base;
pub mod epoch_processing_summary;
pub mod errors;
pub mod justification_and_finalization_state;
pub mod resets;
pub mod single_pass;
pub mod weigh_justification_and_finalization;

use tracing::instrument;
use tree_hash::TreeHash;
use types::{BeaconState, ChainSpec, EthSpec, HistoricalBatch, HistoricalSummary, Unsigned};

/// Performs per-epoch processing on some BeaconState.
///
/// Mutates the given `BeaconState`, returning early if an error is encountered. If an error is
/// returned, a state might be "half-processed" and therefore in an invalid state.
#[instrument(skip_all)]
pub fn process_epoch<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<EpochProcessingSummary, Error> {
    let _timer = metrics::start_timer(&metrics::EPOCH_TRANSITION_SECONDS);

    // Verify that the `BeaconState` instantiation matches the fork at `state.slot()`.
    state
        .fork_name(spec)
        .map_err(Error::InconsistentStateFork)?;

    let summary = if state.fork_name_unchecked().altair_enabled() {
        altair::process_epoch(state, spec)?
    } else {
        base::process_epoch(state, spec)?
    };

    let commit_timer = metrics::start_timer(&metrics::EPOCH_TRANSITION_COMMIT_SECONDS);
    state.update_tree_hash_cache()?;
    metrics::stop_timer(commit_timer);

    Ok(summary)
}

/// Rotate `historical_roots` (phase 0 through Bellatrix) once per
/// `SLOTS_PER_HISTORICAL_ROOT` slots.
pub fn process_historical_roots_update<E: EthSpec>(
    state: &mut BeaconState<E>,
) -> Result<(), Error> {
    let next_epoch = state.next_epoch()?;
    if next_epoch
        .as_u64()
        .safe_rem(E::SlotsPerHistoricalRoot::to_u64().safe_div(E::slots_per_epoch())?)?
        == 0
    {
        let historical_batch = HistoricalBatch::<E> {
            block_roots: state.block_roots().clone(),
            state_roots: state.state_roots().clone(),
        };
        state
            .historical_roots_mut()
            .push(historical_batch.tree_hash_root())?;
    }
    Ok(())
}

/// Rotate `historical_summaries` (Capella onwards) once per
/// `SLOTS_PER_HISTORICAL_ROOT` slots.
pub fn process_historical_summaries_update<E: EthSpec>(
    state: &mut BeaconState<E>,
) -> Result<(), Error> {
    let next_epoch = state.next_epoch()?;
    if next_epoch
        .as_u64()
        .safe_rem(E::SlotsPerHistoricalRoot::to_u64().safe_div(E::slots_per_epoch())?)?
        == 0
    {
        let summary = HistoricalSummary {
            block_summary_root: state.block_roots().commit(),
            state_summary_root: state.state_roots().commit(),
        };
        return state
            .historical_summaries_mut()?
            .push(summary)
            .map_err(Into::into);
    }
    Ok(())
}

/// Used to track the changes to a validator's balance.
#[derive(Default, Clone)]
pub struct Delta {
    pub rewards: u64,
    pub penalties: u64,
}

impl Delta {
    /// Reward the validator with the `reward`.
    pub fn reward(&mut self, reward: u64) -> Result<(), Error> {
        self.rewards = self.rewards.safe_add(reward)?;
        Ok(())
    }

    /// Penalize the validator with the `penalty`.
    pub fn penalize(&mut self, penalty: u64) -> Result<(), Error> {
        self.penalties = self.penalties.safe_add(penalty)?;
        Ok(())
    }

    /// Combine two deltas.
    pub fn combine(&mut self, other: Delta) -> Result<(), Error> {
        self.reward(other.rewards)?;
        self.penalize(other.penalties)
    }
}
