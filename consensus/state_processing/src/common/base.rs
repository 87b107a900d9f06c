use integer_sqrt::IntegerSquareRoot;
use safe_arith::SafeArith;
use types::{BeaconState, BeaconStateError as Error, ChainSpec, EthSpec};

/// The phase 0 base reward denominator, memoising the square root of the
/// total active balance.
#[derive(Debug, Clone, Copy)]
pub struct SqrtTotalActiveBalance(u64);

impl SqrtTotalActiveBalance {
    pub fn new(total_active_balance: u64) -> Self {
        Self(total_active_balance.integer_sqrt())
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Returns the phase 0 base reward for some validator.
pub fn get_base_reward(
    validator_effective_balance: u64,
    sqrt_total_active_balance: SqrtTotalActiveBalance,
    spec: &ChainSpec,
) -> Result<u64, safe_arith::ArithError> {
    validator_effective_balance
        .safe_mul(spec.base_reward_factor)?
        .safe_div(sqrt_total_active_balance.as_u64())?
        .safe_div(spec.base_rewards_per_epoch)
}

/// Convenience wrapper reading the effective balance from the state.
pub fn get_base_reward_from_state<E: EthSpec>(
    state: &BeaconState<E>,
    index: usize,
    sqrt_total_active_balance: SqrtTotalActiveBalance,
    spec: &ChainSpec,
) -> Result<u64, Error> {
    get_base_reward(
        state.get_validator(index)?.effective_balance,
        sqrt_total_active_balance,
        spec,
    )
    .map_err(Into::into)
}
