use super::{ManualSlotClock, SlotClock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use types::Slot;

/// Determines the present slot based upon the present system time.
#[derive(Clone)]
pub struct SystemTimeSlotClock {
    clock: ManualSlotClock,
}

impl SlotClock for SystemTimeSlotClock {
    fn new(genesis_slot: Slot, genesis_duration: Duration, slot_duration: Duration) -> Self {
        Self {
            clock: ManualSlotClock::new(genesis_slot, genesis_duration, slot_duration),
        }
    }

    fn now(&self) -> Option<Slot> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
        self.clock.slot_of(now)
    }

    fn is_prior_to_genesis(&self) -> Option<bool> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
        Some(now < self.clock.genesis_duration())
    }

    fn now_duration(&self) -> Option<Duration> {
        SystemTime::now().duration_since(UNIX_EPOCH).ok()
    }

    fn slot_of(&self, now: Duration) -> Option<Slot> {
        self.clock.slot_of(now)
    }

    fn duration_to_next_slot(&self) -> Option<Duration> {
        let now = self.now_duration()?;
        self.clock.duration_to_next_slot_from(now)
    }

    fn duration_to_next_epoch(&self, slots_per_epoch: u64) -> Option<Duration> {
        let now = self.now_duration()?;
        self.clock.duration_to_next_epoch_from(now, slots_per_epoch)
    }

    fn slot_duration(&self) -> Duration {
        self.clock.slot_duration()
    }

    fn duration_to_slot(&self, slot: Slot) -> Option<Duration> {
        let now = self.now_duration()?;
        self.clock.duration_to_slot(slot, now)
    }

    fn start_of(&self, slot: Slot) -> Option<Duration> {
        self.clock.start_of(slot)
    }

    fn genesis_slot(&self) -> Slot {
        self.clock.genesis_slot()
    }

    fn genesis_duration(&self) -> Duration {
        self.clock.genesis_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: these tests are using a clock that is dependent on the OS's clock. There is a small
    // chance they will fail if the slot boundary is crossed mid-test.

    #[test]
    fn now_is_ahead_of_genesis_in_the_past() {
        let genesis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .checked_sub(Duration::from_secs(120))
            .unwrap();
        let clock = SystemTimeSlotClock::new(Slot::new(0), genesis, Duration::from_secs(12));
        let slot = clock.now().unwrap();
        assert!(slot == Slot::new(10) || slot == Slot::new(9));
    }

    #[test]
    fn now_is_none_when_genesis_is_in_the_future() {
        let genesis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .checked_add(Duration::from_secs(3600))
            .unwrap();
        let clock = SystemTimeSlotClock::new(Slot::new(0), genesis, Duration::from_secs(12));
        assert_eq!(clock.now(), None);
        assert_eq!(clock.is_prior_to_genesis(), Some(true));
    }
}
