use super::SlotClock;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use types::Slot;

/// A `SlotClock` whose notion of "now" only moves when a caller tells it to.
///
/// Clones share the frozen timestamp, so a clock handed to the component
/// under test can be advanced from the outside.
#[derive(Clone)]
pub struct ManualSlotClock {
    genesis_slot: Slot,
    /// Duration from the UNIX epoch to genesis.
    genesis: Duration,
    /// Length of a slot.
    slot_duration: Duration,
    /// The instant this clock currently reports, shared across clones.
    frozen_now: Arc<RwLock<Duration>>,
}

impl ManualSlotClock {
    /// Freeze the clock at the first instant of `slot`.
    ///
    /// Panics on slots before `genesis_slot`: a manual clock pointed at a
    /// pre-genesis slot is a broken test, not an input to tolerate.
    pub fn set_slot(&self, slot: Slot) {
        let start = self
            .start_of(slot)
            .expect("slot must not precede the genesis slot");
        *self.frozen_now.write() = start;
    }

    pub fn set_current_time(&self, now: Duration) {
        *self.frozen_now.write() = now;
    }

    pub fn advance_time(&self, by: Duration) {
        let mut frozen_now = self.frozen_now.write();
        *frozen_now = frozen_now.saturating_add(by);
    }

    pub fn advance_slot(&self) {
        self.advance_time(self.slot_duration)
    }

    pub fn genesis_duration(&self) -> Duration {
        self.genesis
    }

    /// Time remaining from `now` until the start of `slot`, if it has not
    /// already begun.
    pub fn duration_to_slot(&self, slot: Slot, now: Duration) -> Option<Duration> {
        self.start_of(slot)?.checked_sub(now)
    }

    /// Time remaining from `now` until the next slot boundary. Before
    /// genesis, the next boundary is genesis itself.
    pub fn duration_to_next_slot_from(&self, now: Duration) -> Option<Duration> {
        match self.slot_of(now) {
            Some(slot) => self.duration_to_slot(slot + 1u64, now),
            None => self.genesis.checked_sub(now),
        }
    }

    /// Time remaining from `now` until the first slot of the next epoch.
    pub fn duration_to_next_epoch_from(
        &self,
        now: Duration,
        slots_per_epoch: u64,
    ) -> Option<Duration> {
        match self.slot_of(now) {
            Some(slot) => {
                let next_epoch = slot.epoch(slots_per_epoch) + 1u64;
                self.duration_to_slot(next_epoch.start_slot(slots_per_epoch), now)
            }
            None => self.genesis.checked_sub(now),
        }
    }
}

impl SlotClock for ManualSlotClock {
    fn new(genesis_slot: Slot, genesis_duration: Duration, slot_duration: Duration) -> Self {
        assert!(
            slot_duration.as_millis() > 0,
            "slot duration must be nonzero"
        );

        Self {
            genesis_slot,
            genesis: genesis_duration,
            slot_duration,
            frozen_now: Arc::new(RwLock::new(genesis_duration)),
        }
    }

    fn now(&self) -> Option<Slot> {
        self.slot_of(*self.frozen_now.read())
    }

    fn now_duration(&self) -> Option<Duration> {
        Some(*self.frozen_now.read())
    }

    /// The slot in progress at `now`: whole slot durations elapsed since
    /// genesis, offset by the genesis slot. `None` before genesis.
    fn slot_of(&self, now: Duration) -> Option<Slot> {
        let since_genesis = now.checked_sub(self.genesis)?;
        let slots = since_genesis.as_millis() / self.slot_duration.as_millis();
        Some(self.genesis_slot + slots as u64)
    }

    fn is_prior_to_genesis(&self) -> Option<bool> {
        Some(*self.frozen_now.read() < self.genesis)
    }

    fn slot_duration(&self) -> Duration {
        self.slot_duration
    }

    fn duration_to_slot(&self, slot: Slot) -> Option<Duration> {
        self.duration_to_slot(slot, *self.frozen_now.read())
    }

    fn duration_to_next_slot(&self) -> Option<Duration> {
        self.duration_to_next_slot_from(*self.frozen_now.read())
    }

    fn duration_to_next_epoch(&self, slots_per_epoch: u64) -> Option<Duration> {
        self.duration_to_next_epoch_from(*self.frozen_now.read(), slots_per_epoch)
    }

    /// The instant `slot` begins, as a duration since the UNIX epoch.
    /// `None` for slots before the genesis slot.
    fn start_of(&self, slot: Slot) -> Option<Duration> {
        let slots_after_genesis =
            u32::try_from(slot.as_u64().checked_sub(self.genesis_slot.as_u64())?).ok()?;
        self.genesis
            .checked_add(self.slot_duration.checked_mul(slots_after_genesis)?)
    }

    fn genesis_slot(&self) -> Slot {
        self.genesis_slot
    }

    fn genesis_duration(&self) -> Duration {
        self.genesis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn twelve_second_clock(genesis_secs: u64) -> ManualSlotClock {
        ManualSlotClock::new(
            Slot::new(0),
            Duration::from_secs(genesis_secs),
            Duration::from_secs(12),
        )
    }

    #[test]
    fn a_fresh_clock_sits_at_genesis() {
        let clock = twelve_second_clock(100);
        assert_eq!(clock.now(), Some(Slot::new(0)));
        assert_eq!(clock.is_prior_to_genesis(), Some(false));
    }

    #[test]
    fn the_clock_does_not_move_on_its_own() {
        let clock = twelve_second_clock(0);
        assert_eq!(clock.now(), clock.now());
        clock.advance_slot();
        assert_eq!(clock.now(), Some(Slot::new(1)));
    }

    #[test]
    fn clones_share_the_frozen_instant() {
        let clock = twelve_second_clock(0);
        let observer = clock.clone();
        clock.set_slot(Slot::new(9));
        assert_eq!(observer.now(), Some(Slot::new(9)));
    }

    #[test]
    fn now_is_none_before_genesis() {
        let clock = twelve_second_clock(100);
        clock.set_current_time(Duration::from_secs(99));
        assert_eq!(clock.now(), None);
        assert_eq!(clock.is_prior_to_genesis(), Some(true));
    }

    #[test]
    fn mid_slot_instants_round_down() {
        let clock = twelve_second_clock(0);
        clock.set_current_time(Duration::from_secs(35));
        assert_eq!(clock.now(), Some(Slot::new(2)));
        clock.set_current_time(Duration::from_secs(36));
        assert_eq!(clock.now(), Some(Slot::new(3)));
    }

    #[test]
    fn start_of_respects_a_nonzero_genesis_slot() {
        let clock = ManualSlotClock::new(
            Slot::new(5),
            Duration::from_secs(60),
            Duration::from_secs(12),
        );
        assert_eq!(clock.start_of(Slot::new(4)), None, "pre-genesis slot");
        assert_eq!(clock.start_of(Slot::new(5)), Some(Duration::from_secs(60)));
        assert_eq!(clock.start_of(Slot::new(7)), Some(Duration::from_secs(84)));
    }

    #[test]
    fn duration_to_next_slot_counts_down_to_genesis_first() {
        let clock = twelve_second_clock(100);
        clock.set_current_time(Duration::from_secs(40));
        assert_eq!(
            clock.duration_to_next_slot(),
            Some(Duration::from_secs(60)),
            "before genesis the next boundary is genesis"
        );

        clock.set_current_time(Duration::from_secs(103));
        assert_eq!(clock.duration_to_next_slot(), Some(Duration::from_secs(9)));
    }

    #[test]
    fn duration_to_next_epoch_spans_the_remaining_slots() {
        let clock = twelve_second_clock(0);
        // Part-way into slot 1 of an 8-slot epoch: 7 slots minus 3 seconds remain.
        clock.set_current_time(Duration::from_secs(15));
        assert_eq!(
            clock.duration_to_next_epoch(8),
            Some(Duration::from_secs(7 * 12 - 3))
        );
    }

    #[test]
    fn future_tolerance_only_matters_near_the_boundary() {
        let clock = twelve_second_clock(0);
        clock.set_current_time(Duration::from_secs(23));

        // One second short of slot 2; half a second of tolerance is not enough.
        assert_eq!(
            clock.now_with_future_tolerance(Duration::from_millis(500)),
            Some(Slot::new(1))
        );
        // A full second of tolerance tips it over.
        assert_eq!(
            clock.now_with_future_tolerance(Duration::from_secs(1)),
            Some(Slot::new(2))
        );
    }

    #[test]
    fn past_tolerance_saturates_at_genesis() {
        let clock = twelve_second_clock(10);
        clock.set_current_time(Duration::from_secs(11));
        assert_eq!(
            clock.now_with_past_tolerance(Duration::from_secs(2)),
            Some(Slot::new(0)),
            "a tolerance reaching past genesis reports the genesis slot"
        );
    }
}
