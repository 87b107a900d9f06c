use types::Epoch;

/// Information about the state produced by an epoch transition, for callers
/// that want to report on participation without re-reading the state.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochProcessingSummary {
    pub previous_epoch: Epoch,
    pub current_epoch: Epoch,
    /// Total effective balance of validators active in the closed epoch.
    pub total_active_balance: u64,
    /// Unslashed balance that attested to the correct target in the closed epoch.
    pub previous_epoch_target_attesting_balance: u64,
    /// Number of validators that newly entered the activation queue.
    pub validators_in_activation_queue: usize,
    /// Number of validators with a pending (non-default) exit epoch.
    pub validators_in_exit_queue: usize,
}
