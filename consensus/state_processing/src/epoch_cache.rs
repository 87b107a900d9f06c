use crate::common::altair::BaseRewardPerIncrement;
use crate::common::base::SqrtTotalActiveBalance;
use crate::common::{altair, base};
use safe_arith::SafeArith;
use types::{
    ActivationQueue, BeaconState, ChainSpec, Epoch, EpochCache, EpochCacheError, EpochCacheKey,
    EthSpec, Hash256,
};

/// Precursor to an `EpochCache`: the per-validator effective balances for the
/// *next* epoch, accumulated during epoch processing.
pub struct PreEpochCache {
    epoch_key: EpochCacheKey,
    effective_balances: Vec<u64>,
    next_epoch_total_active_balance: u64,
}

impl PreEpochCache {
    pub fn new_for_next_epoch<E: EthSpec>(
        state: &mut BeaconState<E>,
    ) -> Result<Self, EpochCacheError> {
        // The decision block root for the next epoch is the latest block root from this epoch.
        let latest_block_header = state.latest_block_header();

        let decision_block_root = if !latest_block_header.state_root.is_zero() {
            latest_block_header.canonical_root()
        } else {
            // State root should already have been filled in by `process_slot`, except in the case
            // of a `partial_state_advance`. Once we have tree-states this can be an error, and
            // `self` can be immutable.
            let state_root = state.update_tree_hash_cache().map_err(|e| {
                EpochCacheError::BeaconState(format!("{e:?}"))
            })?;
            let mut header = state.latest_block_header().clone();
            header.state_root = state_root;
            state.latest_block_header_mut().state_root = state_root;
            header.canonical_root()
        };

        let epoch_key = EpochCacheKey {
            epoch: state.next_epoch().map_err(|e| {
                EpochCacheError::BeaconState(format!("{e:?}"))
            })?,
            decision_block_root,
        };

        Ok(Self {
            epoch_key,
            effective_balances: Vec::with_capacity(state.validators().len()),
            next_epoch_total_active_balance: 0,
        })
    }

    /// Record the next-epoch effective balance of the next validator, adding
    /// it to the next-epoch total if the validator will be active.
    pub fn push_effective_balance(
        &mut self,
        effective_balance: u64,
        is_active_next_epoch: bool,
    ) -> Result<(), EpochCacheError> {
        if is_active_next_epoch {
            self.next_epoch_total_active_balance
                .safe_add_assign(effective_balance)?;
        }
        self.effective_balances.push(effective_balance);
        Ok(())
    }

    pub fn get_total_active_balance(&self) -> u64 {
        self.next_epoch_total_active_balance
    }

    pub fn into_epoch_cache(
        self,
        total_active_balance: u64,
        activation_queue: ActivationQueue,
        spec: &ChainSpec,
    ) -> Result<EpochCache, EpochCacheError> {
        let epoch = self.epoch_key.epoch;
        let max_effective_balance_eth = spec
            .max_effective_balance_electra
            .safe_div(spec.effective_balance_increment)?;

        let base_reward_per_increment = BaseRewardPerIncrement::new(total_active_balance, spec)?;

        let mut base_rewards = Vec::with_capacity(max_effective_balance_eth.safe_add(1)? as usize);

        for effective_balance_eth in 0..=max_effective_balance_eth {
            let effective_balance =
                effective_balance_eth.safe_mul(spec.effective_balance_increment)?;
            let base_reward = if epoch < spec.altair_fork_epoch.unwrap_or(Epoch::new(u64::MAX)) {
                base::get_base_reward(
                    effective_balance,
                    SqrtTotalActiveBalance::new(total_active_balance),
                    spec,
                )?
            } else {
                altair::get_base_reward(effective_balance, base_reward_per_increment, spec)?
            };
            base_rewards.push(base_reward);
        }

        Ok(EpochCache::new(
            self.epoch_key,
            self.effective_balances,
            base_rewards,
            activation_queue,
            spec,
        ))
    }
}

/// Initialize the epoch cache if it isn't already initialized, from scratch.
pub fn initialize_epoch_cache<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), EpochCacheError> {
    let current_epoch = state.current_epoch();
    let next_epoch = state
        .next_epoch()
        .map_err(|e| EpochCacheError::BeaconState(format!("{e:?}")))?;
    let decision_block_root = state
        .proposer_shuffling_decision_root()
        .map_err(|e| EpochCacheError::BeaconState(format!("{e:?}")))?;

    if state
        .epoch_cache()
        .check_validity(current_epoch, decision_block_root)
        .is_ok()
    {
        // `EpochCache` has already been initialized and is valid, no need to initialize.
        return Ok(());
    }

    // Compute state-dependent values.
    state
        .build_total_active_balance_cache(spec)
        .map_err(|e| EpochCacheError::BeaconState(format!("{e:?}")))?;
    let total_active_balance = state
        .get_total_active_balance_at_epoch(current_epoch)
        .map_err(|e| EpochCacheError::BeaconState(format!("{e:?}")))?;

    // Collect effective balances and the tentative activation queue in a
    // single pass over the validators.
    let mut effective_balances = Vec::with_capacity(state.validators().len());
    let mut activation_queue = ActivationQueue::default();
    for (index, validator) in state.validators().iter().enumerate() {
        effective_balances.push(validator.effective_balance);
        activation_queue.add_if_could_be_eligible_for_activation(
            index,
            &validator,
            next_epoch,
            spec,
        );
    }

    // Compute base rewards.
    let pre_epoch_cache = PreEpochCache {
        epoch_key: EpochCacheKey {
            epoch: current_epoch,
            decision_block_root,
        },
        effective_balances,
        next_epoch_total_active_balance: 0,
    };
    *state.epoch_cache_mut() =
        pre_epoch_cache.into_epoch_cache(total_active_balance, activation_queue, spec)?;

    Ok(())
}
