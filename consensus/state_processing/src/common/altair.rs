use integer_sqrt::IntegerSquareRoot;
use safe_arith::{ArithError, SafeArith};
use types::ChainSpec;

/// The reward for a single effective-balance increment in one epoch
/// (`get_base_reward_per_increment` from the Altair specs).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseRewardPerIncrement(u64);

impl BaseRewardPerIncrement {
    pub fn new(total_active_balance: u64, spec: &ChainSpec) -> Result<Self, ArithError> {
        spec.effective_balance_increment
            .safe_mul(spec.base_reward_factor)?
            .safe_div(total_active_balance.integer_sqrt())
            .map(Self)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// The Altair base reward for a validator with the given effective balance
/// (`get_base_reward` from the Altair specs).
pub fn get_base_reward(
    validator_effective_balance: u64,
    base_reward_per_increment: BaseRewardPerIncrement,
    spec: &ChainSpec,
) -> Result<u64, ArithError> {
    validator_effective_balance
        .safe_div(spec.effective_balance_increment)?
        .safe_mul(base_reward_per_increment.as_u64())
}
