use crate::common::base::{SqrtTotalActiveBalance, get_base_reward};
use crate::per_epoch_processing::Error;
use safe_arith::SafeArith;
use types::{BeaconState, ChainSpec, Epoch, EthSpec, PendingAttestation, Slot};

/// Sets the boolean `var` on `self` to be true if it is true on `other`. Otherwise leaves `self`
/// as is.
macro_rules! set_self_if_other_is_true {
    ($self_: ident, $other: ident, $var: ident) => {
        if $other.$var {
            $self_.$var = true;
        }
    };
}

/// The information required to reward a block producer for including an attestation in a block.
#[derive(Debug, Copy, Clone)]
pub struct InclusionInfo {
    /// The distance between the attestation slot and the slot that attestation was included in a
    /// block.
    pub delay: u64,
    /// The index of the proposer at the slot where the attestation was included.
    pub proposer_index: usize,
}

impl Default for InclusionInfo {
    /// Defaults to `delay` at its maximum value and `proposer_index` at zero.
    fn default() -> Self {
        Self {
            delay: u64::MAX,
            proposer_index: 0,
        }
    }
}

impl InclusionInfo {
    /// Tests if some `other` `InclusionInfo` has a lower inclusion slot than `self`. If so,
    /// replaces `self` with `other`.
    pub fn update(&mut self, other: &Self) {
        if other.delay < self.delay {
            self.delay = other.delay;
            self.proposer_index = other.proposer_index;
        }
    }
}

/// Information about a single validator during a single epoch.
#[derive(Debug, Default, Clone)]
pub struct ValidatorStatus {
    /// True if the validator has been slashed, ever.
    pub is_slashed: bool,
    /// True if the validator can withdraw in the current epoch.
    pub is_withdrawable_in_current_epoch: bool,
    /// True if the validator was active in the state's _current_ epoch.
    pub is_active_in_current_epoch: bool,
    /// True if the validator was active in the state's _previous_ epoch.
    pub is_active_in_previous_epoch: bool,
    /// The validator's effective balance in the _current_ epoch.
    pub current_epoch_effective_balance: u64,

    /// True if the validator had an attestation included in the _previous_ epoch.
    pub is_previous_epoch_attester: bool,
    /// True if the validator's beacon block root attestation for the first slot of the _previous_
    /// epoch matches the block root known to the state.
    pub is_previous_epoch_target_attester: bool,
    /// True if the validator's beacon block root attestation in the _previous_ epoch at the
    /// attestation's slot (`attestation_data.slot`) matches the block root known to the state.
    pub is_previous_epoch_head_attester: bool,
    /// True if the validator had an attestation included in the _current_ epoch.
    pub is_current_epoch_attester: bool,
    /// True if the validator's beacon block root attestation for the first slot of the _current_
    /// epoch matches the block root known to the state.
    pub is_current_epoch_target_attester: bool,

    /// Information used to reward the block producer of this validators earliest-included
    /// attestation.
    pub inclusion_info: Option<InclusionInfo>,
}

impl ValidatorStatus {
    /// Accepts some `other` `ValidatorStatus` and updates `self` if required.
    ///
    /// Will never set one of the `bool` fields to `false`, it will only set it to `true` if other
    /// contains a `true` field.
    ///
    /// Note: inclusion info is updated so that the earliest inclusion is retained.
    pub fn update(&mut self, other: &Self) {
        // Update all the bool fields, only updating `self` if `other` is true (never setting
        // `self` to false).
        set_self_if_other_is_true!(self, other, is_slashed);
        set_self_if_other_is_true!(self, other, is_withdrawable_in_current_epoch);
        set_self_if_other_is_true!(self, other, is_active_in_current_epoch);
        set_self_if_other_is_true!(self, other, is_active_in_previous_epoch);
        set_self_if_other_is_true!(self, other, is_previous_epoch_attester);
        set_self_if_other_is_true!(self, other, is_previous_epoch_target_attester);
        set_self_if_other_is_true!(self, other, is_previous_epoch_head_attester);
        set_self_if_other_is_true!(self, other, is_current_epoch_attester);
        set_self_if_other_is_true!(self, other, is_current_epoch_target_attester);

        if let Some(other_info) = other.inclusion_info {
            if let Some(self_info) = self.inclusion_info.as_mut() {
                self_info.update(&other_info);
            } else {
                self.inclusion_info = other.inclusion_info;
            }
        }
    }
}

/// The total effective balances for different sets of validators during the previous and current
/// epochs.
#[derive(Default, Debug, Clone)]
pub struct TotalBalances {
    /// The effective balance increment from the spec.
    effective_balance_increment: u64,
    /// The total effective balance of all active validators during the _current_ epoch.
    current_epoch: u64,
    /// The total effective balance of all active validators during the _previous_ epoch.
    previous_epoch: u64,
    /// The total effective balance of all validators who attested during the _current_ epoch.
    current_epoch_attesters: u64,
    /// The total effective balance of all validators who attested during the _current_ epoch and
    /// agreed with the state about the beacon block at the first slot of the _current_ epoch.
    current_epoch_target_attesters: u64,
    /// The total effective balance of all validators who attested during the _previous_ epoch.
    previous_epoch_attesters: u64,
    /// The total effective balance of all validators who attested during the _previous_ epoch and
    /// agreed with the state about the beacon block at the first slot of the _previous_ epoch.
    previous_epoch_target_attesters: u64,
    /// The total effective balance of all validators who attested during the _previous_ epoch and
    /// agreed with the state about the beacon block at the time of attestation.
    previous_epoch_head_attesters: u64,
}

// Generate a safe accessor for a balance in `TotalBalances`, as per spec `get_total_balance`.
macro_rules! balance_accessor {
    ($field_name:ident) => {
        pub fn $field_name(&self) -> u64 {
            std::cmp::max(self.effective_balance_increment, self.$field_name)
        }
    };
}

impl TotalBalances {
    pub fn new(spec: &ChainSpec) -> Self {
        Self {
            effective_balance_increment: spec.effective_balance_increment,
            ..Self::default()
        }
    }

    balance_accessor!(current_epoch);
    balance_accessor!(previous_epoch);
    balance_accessor!(current_epoch_attesters);
    balance_accessor!(current_epoch_target_attesters);
    balance_accessor!(previous_epoch_attesters);
    balance_accessor!(previous_epoch_target_attesters);
    balance_accessor!(previous_epoch_head_attesters);
}

/// Contains the status of attestations for a single epoch.
#[derive(Clone)]
pub struct ValidatorStatuses {
    /// Information about each individual validator from the state's validator registry.
    pub statuses: Vec<ValidatorStatus>,
    /// Summed balances for various sets of validators.
    pub total_balances: TotalBalances,
}

impl ValidatorStatuses {
    /// Initializes a new instance, determining:
    ///
    /// - Active validators
    /// - Total balances for the current and previous epochs.
    pub fn new<E: EthSpec>(
        state: &BeaconState<E>,
        spec: &ChainSpec,
    ) -> Result<Self, Error> {
        let mut statuses = Vec::with_capacity(state.validators().len());
        let mut total_balances = TotalBalances::new(spec);

        let current_epoch = state.current_epoch();
        let previous_epoch = state.previous_epoch();

        for validator in state.validators().iter() {
            let effective_balance = validator.effective_balance;
            let mut status = ValidatorStatus {
                is_slashed: validator.slashed,
                is_withdrawable_in_current_epoch: validator
                    .is_withdrawable_at(current_epoch),
                current_epoch_effective_balance: effective_balance,
                ..ValidatorStatus::default()
            };

            if validator.is_active_at(current_epoch) {
                status.is_active_in_current_epoch = true;
                total_balances
                    .current_epoch
                    .safe_add_assign(effective_balance)?;
            }

            if validator.is_active_at(previous_epoch) {
                status.is_active_in_previous_epoch = true;
                total_balances
                    .previous_epoch
                    .safe_add_assign(effective_balance)?;
            }

            statuses.push(status);
        }

        Ok(Self {
            statuses,
            total_balances,
        })
    }

    /// Process some attestations from the given `state` updating the `statuses` and
    /// `total_balances` fields.
    pub fn process_attestations<E: EthSpec>(
        &mut self,
        state: &BeaconState<E>,
    ) -> Result<(), Error> {
        let base_state = state.as_base()?;
        let attestations = base_state
            .previous_epoch_attestations
            .iter()
            .chain(base_state.current_epoch_attestations.iter());

        for attestation in attestations {
            let committee =
                state.get_beacon_committee(attestation.data.slot, attestation.data.index)?;
            let attesting_indices =
                get_attesting_indices(&committee.committee, &attestation.aggregation_bits)?;

            let mut status = ValidatorStatus::default();

            // Profile this attestation, updating the total balances and generating an
            // `ValidatorStatus` object that applies to all participants in the attestation.
            if attestation.data.target.epoch == state.current_epoch() {
                status.is_current_epoch_attester = true;

                if target_matches_epoch_start_block(attestation, state, state.current_epoch())? {
                    status.is_current_epoch_target_attester = true;
                }
            } else if attestation.data.target.epoch == state.previous_epoch() {
                status.is_previous_epoch_attester = true;

                // The inclusion delay and proposer index are used in the
                // phase 0 inclusion rewards.
                status.inclusion_info = Some(InclusionInfo {
                    delay: attestation.inclusion_delay,
                    proposer_index: attestation.proposer_index as usize,
                });

                if target_matches_epoch_start_block(attestation, state, state.previous_epoch())? {
                    status.is_previous_epoch_target_attester = true;

                    if header_matches_attn_target(attestation, state)? {
                        status.is_previous_epoch_head_attester = true;
                    }
                }
            }

            for &validator_index in &attesting_indices {
                self.statuses
                    .get_mut(validator_index)
                    .ok_or(Error::ValidatorStatusesInconsistent)?
                    .update(&status);
            }
        }

        // Compute the total balances
        for (index, v) in self.statuses.iter().enumerate() {
            // According to the spec, we only count unslashed validators towards the totals.
            if !v.is_slashed {
                let validator_balance = state.get_validator(index)?.effective_balance;

                if v.is_current_epoch_attester {
                    self.total_balances
                        .current_epoch_attesters
                        .safe_add_assign(validator_balance)?;
                }
                if v.is_current_epoch_target_attester {
                    self.total_balances
                        .current_epoch_target_attesters
                        .safe_add_assign(validator_balance)?;
                }
                if v.is_previous_epoch_attester {
                    self.total_balances
                        .previous_epoch_attesters
                        .safe_add_assign(validator_balance)?;
                }
                if v.is_previous_epoch_target_attester {
                    self.total_balances
                        .previous_epoch_target_attesters
                        .safe_add_assign(validator_balance)?;
                }
                if v.is_previous_epoch_head_attester {
                    self.total_balances
                        .previous_epoch_head_attesters
                        .safe_add_assign(validator_balance)?;
                }
            }
        }

        Ok(())
    }

    /// The phase 0 base reward for the validator at `index`.
    pub fn base_reward(
        &self,
        index: usize,
        sqrt_total_active_balance: SqrtTotalActiveBalance,
        spec: &ChainSpec,
    ) -> Result<u64, Error> {
        let status = self
            .statuses
            .get(index)
            .ok_or(Error::ValidatorStatusesInconsistent)?;
        get_base_reward(
            status.current_epoch_effective_balance,
            sqrt_total_active_balance,
            spec,
        )
        .map_err(Into::into)
    }
}

/// Returns the indices of the attesting members of `committee` per `aggregation_bits`.
fn get_attesting_indices<E: EthSpec>(
    committee: &[usize],
    aggregation_bits: &ssz_types::BitList<E::MaxValidatorsPerCommittee>,
) -> Result<Vec<usize>, Error> {
    if committee.len() != aggregation_bits.len() {
        return Err(Error::ValidatorStatusesInconsistent);
    }
    let mut indices = Vec::with_capacity(aggregation_bits.num_set_bits());
    for (i, &validator_index) in committee.iter().enumerate() {
        if aggregation_bits.get(i)? {
            indices.push(validator_index);
        }
    }
    Ok(indices)
}

/// Returns `true` if the attestation's FFG target is equal to the hash of the `state`'s first
/// beacon block in the given `epoch`.
fn target_matches_epoch_start_block<E: EthSpec>(
    a: &PendingAttestation<E>,
    state: &BeaconState<E>,
    epoch: Epoch,
) -> Result<bool, Error> {
    let slot = epoch.start_slot(E::slots_per_epoch());
    let state_boundary_root = state.get_block_root(slot)?;

    Ok(a.data.target.root == state_boundary_root)
}

/// Returns `true` if a `PendingAttestation` and `BeaconState` share the same beacon block hash for
/// the current slot of the `PendingAttestation`.
fn header_matches_attn_target<E: EthSpec>(
    a: &PendingAttestation<E>,
    state: &BeaconState<E>,
) -> Result<bool, Error> {
    let attestation_slot: Slot = a.data.slot;
    let state_block_root = state.get_block_root(attestation_slot)?;

    Ok(a.data.beacon_block_root == state_block_root)
}
