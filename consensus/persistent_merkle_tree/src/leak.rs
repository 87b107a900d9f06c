//! Allocation tracking for the node pool.
//!
//! Refcounted arenas leak quietly: a forgotten `unref` keeps a whole subtree
//! alive with no owner. The tracker records allocation sites and ref/unref
//! history for a configurable sample of nodes so a leak report can name the
//! call site that allocated each orphan. `Paranoid` tracks every node and is
//! what the test suites run under.

use std::collections::HashMap;
use std::panic::Location;

/// How much of the pool's traffic to track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeakCheck {
    Off,
    /// Track one in `interval` allocations.
    Sampling(u32),
    /// Track every allocation and keep freed-node history for
    /// use-after-free diagnostics.
    Paranoid,
}

impl Default for LeakCheck {
    fn default() -> Self {
        // The interval trades diagnostic coverage against the size of the
        // history maps.
        LeakCheck::Sampling(128)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Alloc,
    Ref,
    Unref,
    Free,
}

#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub kind: EventKind,
    pub location: &'static Location<'static>,
}

/// A live tracked node, reported by `NodePool::leak_report`.
#[derive(Debug, Clone)]
pub struct LeakReport {
    pub slot_index: u32,
    pub refcount: u32,
    pub allocated_at: &'static Location<'static>,
    pub history: Vec<Event>,
}

#[derive(Debug, Clone)]
struct Record {
    allocated_at: &'static Location<'static>,
    history: Vec<Event>,
}

pub(crate) struct LeakTracker {
    check: LeakCheck,
    allocation_counter: u64,
    live: HashMap<u32, Record>,
    /// Paranoid mode only: history of freed slots, evicted when the slot is
    /// reallocated.
    freed: HashMap<u32, Record>,
}

impl LeakTracker {
    pub fn new(check: LeakCheck) -> Self {
        Self {
            check,
            allocation_counter: 0,
            live: HashMap::new(),
            freed: HashMap::new(),
        }
    }

    pub fn on_alloc(&mut self, slot_index: u32, pinned: bool, location: &'static Location<'static>) {
        self.freed.remove(&slot_index);
        if pinned {
            return;
        }
        let track = match self.check {
            LeakCheck::Off => false,
            LeakCheck::Paranoid => true,
            LeakCheck::Sampling(interval) => {
                self.allocation_counter += 1;
                interval != 0 && self.allocation_counter % u64::from(interval) == 0
            }
        };
        if track {
            self.live.insert(
                slot_index,
                Record {
                    allocated_at: location,
                    history: vec![Event {
                        kind: EventKind::Alloc,
                        location,
                    }],
                },
            );
        }
    }

    pub fn on_ref(&mut self, slot_index: u32, location: &'static Location<'static>) {
        if let Some(record) = self.live.get_mut(&slot_index) {
            record.history.push(Event {
                kind: EventKind::Ref,
                location,
            });
        }
    }

    pub fn on_unref(&mut self, slot_index: u32, location: &'static Location<'static>) {
        if let Some(record) = self.live.get_mut(&slot_index) {
            record.history.push(Event {
                kind: EventKind::Unref,
                location,
            });
        }
    }

    pub fn on_free(&mut self, slot_index: u32, location: &'static Location<'static>) {
        if let Some(mut record) = self.live.remove(&slot_index) {
            if self.check == LeakCheck::Paranoid {
                record.history.push(Event {
                    kind: EventKind::Free,
                    location,
                });
                self.freed.insert(slot_index, record);
            }
        }
    }

    /// Builds a report of every tracked node that is still live.
    pub fn live_reports(&self, refcount_of: impl Fn(u32) -> u32) -> Vec<LeakReport> {
        let mut reports: Vec<LeakReport> = self
            .live
            .iter()
            .map(|(&slot_index, record)| LeakReport {
                slot_index,
                refcount: refcount_of(slot_index),
                allocated_at: record.allocated_at,
                history: record.history.clone(),
            })
            .collect();
        reports.sort_by_key(|r| r.slot_index);
        reports
    }

    /// Aborts with as much history as the tracker has for the freed slot.
    pub fn panic_use_after_free(&self, slot_index: u32) -> ! {
        if let Some(record) = self.freed.get(&slot_index) {
            panic!(
                "use of freed node at slot {slot_index}; allocated at {}; history: {:?}",
                record.allocated_at, record.history
            );
        }
        panic!("use of freed node at slot {slot_index}");
    }
}

#[cfg(test)]
mod tests {
    use crate::{LeakCheck, NodePool};

    #[test]
    fn paranoid_mode_reports_unreleased_nodes() {
        let mut pool = NodePool::with_leak_check(LeakCheck::Paranoid);
        let a = pool.new_leaf([1; 32]).unwrap();
        let b = pool.new_leaf([2; 32]).unwrap();
        pool.unref(a);

        let report = pool.leak_report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].slot_index, b.as_u32());
        assert_eq!(report[0].refcount, 1);
        assert!(report[0].allocated_at.file().ends_with("leak.rs"));

        pool.unref(b);
        assert!(pool.leak_report().is_empty());
    }

    #[test]
    fn paranoid_mode_records_ref_history() {
        let mut pool = NodePool::with_leak_check(LeakCheck::Paranoid);
        let a = pool.new_leaf([1; 32]).unwrap();
        pool.ref_node(a);
        pool.unref(a);

        let report = pool.leak_report();
        assert_eq!(report.len(), 1);
        // Alloc, Ref, Unref.
        assert_eq!(report[0].history.len(), 3);
    }

    #[test]
    fn zero_nodes_are_exempt() {
        let mut pool = NodePool::with_leak_check(LeakCheck::Paranoid);
        let root = pool.fill_with_contents(4, &[]).unwrap();
        pool.unref(root);
        // The interned zero chain is pinned by design, not leaked.
        assert!(pool.leak_report().is_empty());
    }

    #[test]
    fn sampling_tracks_a_subset() {
        let mut pool = NodePool::with_leak_check(LeakCheck::Sampling(4));
        let nodes: Vec<_> = (0..16)
            .map(|i| pool.new_leaf([i as u8; 32]).unwrap())
            .collect();
        assert_eq!(pool.leak_report().len(), 4);
        for node in nodes {
            pool.unref(node);
        }
        assert!(pool.leak_report().is_empty());
    }

    #[test]
    fn off_tracks_nothing() {
        let mut pool = NodePool::with_leak_check(LeakCheck::Off);
        let _leaked = pool.new_leaf([1; 32]).unwrap();
        assert!(pool.leak_report().is_empty());
    }

    #[test]
    #[should_panic(expected = "use of freed node")]
    fn paranoid_use_after_free_panics_with_history() {
        let mut pool = NodePool::with_leak_check(LeakCheck::Paranoid);
        let a = pool.new_leaf([1; 32]).unwrap();
        pool.unref(a);
        pool.ref_node(a);
    }
}
