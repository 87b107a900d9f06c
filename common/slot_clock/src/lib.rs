//! Translates between wall-clock time and beacon chain slots.

mod manual_slot_clock;
mod system_time_slot_clock;

use std::time::Duration;

pub use crate::manual_slot_clock::ManualSlotClock;
pub use crate::system_time_slot_clock::SystemTimeSlotClock;
pub use types::Slot;

/// A clock that reports the current slot.
///
/// The clock is not required to be monotonically increasing and may go
/// backwards if the underlying clock does.
pub trait SlotClock: Send + Sync + Sized + Clone {
    /// Creates a new slot clock where the first slot is `genesis_slot`, genesis occurred
    /// `genesis_duration` after the `UNIX_EPOCH` and each slot is `slot_duration` apart.
    fn new(genesis_slot: Slot, genesis_duration: Duration, slot_duration: Duration) -> Self;

    /// Returns the slot at this present time.
    ///
    /// Returns `None` if the present time is before genesis.
    fn now(&self) -> Option<Slot>;

    /// Returns the present time as a duration since the `UNIX_EPOCH`.
    ///
    /// Returns `None` if the present time is before the `UNIX_EPOCH`.
    fn now_duration(&self) -> Option<Duration>;

    /// Returns the slot of the given duration since the `UNIX_EPOCH`.
    fn slot_of(&self, now: Duration) -> Option<Slot>;

    /// Indicates if the current time is prior to genesis time.
    ///
    /// Returns `None` if the present time is before the `UNIX_EPOCH`.
    fn is_prior_to_genesis(&self) -> Option<bool>;

    /// Returns the duration between slots.
    fn slot_duration(&self) -> Duration;

    /// Returns the duration from now until `slot`.
    ///
    /// Will return `None` if `slot` has already started.
    fn duration_to_slot(&self, slot: Slot) -> Option<Duration>;

    /// Returns the duration until the next slot.
    fn duration_to_next_slot(&self) -> Option<Duration>;

    /// Returns the duration until the first slot of the next epoch.
    fn duration_to_next_epoch(&self, slots_per_epoch: u64) -> Option<Duration>;

    /// Returns the duration between UNIX epoch and the start of `slot`.
    fn start_of(&self, slot: Slot) -> Option<Duration>;

    /// Returns the first slot to be returned at the genesis time.
    fn genesis_slot(&self) -> Slot;

    /// Returns the duration between UNIX epoch and genesis.
    fn genesis_duration(&self) -> Duration;

    /// Returns the slot if the internal clock were advanced by `tolerance`.
    ///
    /// `tolerance` is the configured gossip clock disparity
    /// (`ChainSpec::maximum_gossip_clock_disparity`), accepting messages for
    /// a slot that has not quite started on the local clock.
    fn now_with_future_tolerance(&self, tolerance: Duration) -> Option<Slot> {
        self.slot_of(self.now_duration()?.checked_add(tolerance)?)
    }

    /// Returns the slot if the internal clock were reversed by `tolerance`.
    ///
    /// A tolerance that reaches back past genesis saturates to the genesis
    /// slot rather than failing.
    fn now_with_past_tolerance(&self, tolerance: Duration) -> Option<Slot> {
        let now = self
            .now_duration()?
            .checked_sub(tolerance)
            .unwrap_or_else(|| self.genesis_duration());
        self.slot_of(std::cmp::max(now, self.genesis_duration()))
    }
}
