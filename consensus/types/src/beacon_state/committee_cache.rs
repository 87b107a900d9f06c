use super::{BeaconState, Error};
use crate::{ChainSpec, Domain, Epoch, EthSpec, Slot};
use std::num::NonZeroUsize;
use std::ops::Range;
use swap_or_not_shuffle::shuffle_list;

/// A fully-shuffled committee assignment for one epoch.
///
/// Built once per (epoch, shuffling seed) and shared between states via
/// `Arc`, so cloning states never recomputes the shuffling.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct CommitteeCache {
    initialized_epoch: Option<Epoch>,
    /// The active validator indices, shuffled into their committee ordering.
    shuffling: Vec<usize>,
    /// `shuffling_positions[v]` is the position of validator `v` in
    /// `shuffling`, offset by one so the default is "absent".
    shuffling_positions: Vec<Option<NonZeroUsize>>,
    committees_per_slot: u64,
    slots_per_epoch: u64,
}

/// A committee of validators, assigned to attest at a specific slot.
#[derive(Debug, Clone, PartialEq)]
pub struct BeaconCommittee<'a> {
    pub slot: Slot,
    pub index: u64,
    pub committee: &'a [usize],
}

impl<'a> BeaconCommittee<'a> {
    pub fn into_owned(self) -> OwnedBeaconCommittee {
        OwnedBeaconCommittee {
            slot: self.slot,
            index: self.index,
            committee: self.committee.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OwnedBeaconCommittee {
    pub slot: Slot,
    pub index: u64,
    pub committee: Vec<usize>,
}

impl CommitteeCache {
    /// Return a new, fully initialized cache for the shuffling at `epoch`.
    ///
    /// The state must contain the randao mix that seeds `epoch`'s shuffling.
    pub fn initialized<E: EthSpec>(
        state: &BeaconState<E>,
        epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<CommitteeCache, Error> {
        // Check the cache is initialized for an epoch that the state can reach: the state must
        // be able to produce the shuffling seed.
        if epoch.saturating_add(1u64) < state.current_epoch()
            || epoch > state.next_epoch()?
        {
            return Err(Error::EpochOutOfBounds);
        }

        let active_validator_indices = state.get_active_validator_indices(epoch)?;

        if active_validator_indices.is_empty() {
            return Err(Error::InsufficientValidators);
        }

        let committees_per_slot =
            E::get_committee_count_per_slot(active_validator_indices.len(), spec)? as u64;

        let seed = state.get_seed(epoch, Domain::BeaconAttester, spec)?;

        let shuffling = shuffle_list(
            active_validator_indices,
            spec.shuffle_round_count,
            seed.as_slice(),
            false,
        )
        .ok_or(Error::UnableToShuffle)?;

        let mut shuffling_positions = vec![None; state.validators().len()];
        for (i, &v) in shuffling.iter().enumerate() {
            *shuffling_positions
                .get_mut(v)
                .ok_or(Error::ShuffleIndexOutOfBounds(v))? = NonZeroUsize::new(i + 1);
        }

        Ok(CommitteeCache {
            initialized_epoch: Some(epoch),
            shuffling,
            shuffling_positions,
            committees_per_slot,
            slots_per_epoch: E::slots_per_epoch(),
        })
    }

    /// Returns `true` if the cache has been initialized at the supplied `epoch`.
    pub fn is_initialized_at(&self, epoch: Epoch) -> bool {
        Some(epoch) == self.initialized_epoch
    }

    /// Returns the shuffled list of active validator indices for the initialized epoch.
    pub fn shuffling(&self) -> &[usize] {
        &self.shuffling
    }

    /// Returns the epoch this cache is initialized for, if any.
    pub fn initialized_epoch(&self) -> Option<Epoch> {
        self.initialized_epoch
    }

    /// Returns the number of active validators in the initialized epoch.
    pub fn active_validator_count(&self) -> usize {
        self.shuffling.len()
    }

    pub fn committees_per_slot(&self) -> u64 {
        self.committees_per_slot
    }

    /// Returns the total number of committees in the initialized epoch.
    pub fn epoch_committee_count(&self) -> usize {
        (self.committees_per_slot * self.slots_per_epoch) as usize
    }

    /// Get the Beacon committee for the given `slot` and `index`.
    pub fn get_beacon_committee(&self, slot: Slot, index: u64) -> Option<BeaconCommittee<'_>> {
        let epoch = self.initialized_epoch?;
        if !slot
            .epoch(self.slots_per_epoch)
            .eq(&epoch)
            || index >= self.committees_per_slot
        {
            return None;
        }

        let committee_index =
            (slot.as_u64() % self.slots_per_epoch) * self.committees_per_slot + index;
        let committee = self.compute_committee(committee_index as usize)?;

        Some(BeaconCommittee {
            slot,
            index,
            committee,
        })
    }

    /// Get all the Beacon committees at a given `slot`.
    pub fn get_beacon_committees_at_slot(
        &self,
        slot: Slot,
    ) -> Result<Vec<BeaconCommittee<'_>>, Error> {
        if self.initialized_epoch.is_none() {
            return Err(Error::CommitteeCacheUninitialized(None));
        }

        (0..self.committees_per_slot)
            .map(|index| {
                self.get_beacon_committee(slot, index)
                    .ok_or(Error::NoCommittee { slot, index })
            })
            .collect()
    }

    /// The position of `validator_index` in the shuffling, if it is active.
    pub fn shuffled_position(&self, validator_index: usize) -> Option<usize> {
        self.shuffling_positions
            .get(validator_index)?
            .map(|p| p.get() - 1)
    }

    /// Returns the range of validators in `shuffling` that form the committee
    /// at `index` within the epoch.
    fn compute_committee_range(&self, index: usize) -> Option<Range<usize>> {
        let count = self.epoch_committee_count();
        if count == 0 || index >= count {
            return None;
        }

        let num_validators = self.shuffling.len();
        let start = (num_validators * index) / count;
        let end = (num_validators * (index + 1)) / count;
        Some(start..end)
    }

    fn compute_committee(&self, index: usize) -> Option<&[usize]> {
        self.shuffling.get(self.compute_committee_range(index)?)
    }
}

/// Returns a list of all `validators` indices where the validator is active at the given
/// `epoch`.
pub fn get_active_validator_indices<I>(validators: I, epoch: Epoch) -> Vec<usize>
where
    I: IntoIterator<Item = crate::Validator>,
{
    let mut active = Vec::new();
    for (index, validator) in validators.into_iter().enumerate() {
        if validator.is_active_at(epoch) {
            active.push(index)
        }
    }
    active
}
