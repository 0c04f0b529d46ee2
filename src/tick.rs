//! Default [`TickScheduler`] implementation: a binary heap ordered so the
//! earliest-due event is always popped first.
//!
//! Grounded on `topo/worldgen/mod.rs`'s `BinaryHeap<KeyedOrd<GeneratorCommand,
//! GenerationPriority>>` priority queue idiom.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::external::{ScheduledTick, TickScheduler};
use crate::util::{Keyed, KeyedOrd};

/// Binary-heap-backed [`TickScheduler`]. The default used by
/// [`crate::chunk::Chunk::new`] when no caller-supplied scheduler is given.
#[derive(Default)]
pub struct BinaryHeapTickScheduler {
    heap: BinaryHeap<KeyedOrd<Entry, Reverse<u64>>>,
}

struct Entry {
    kind: u32,
    due_tick: u64,
    key: Reverse<u64>,
}

impl Keyed<Reverse<u64>> for Entry {
    type Key = Reverse<u64>;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

impl BinaryHeapTickScheduler {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }
}

impl TickScheduler for BinaryHeapTickScheduler {
    fn schedule(&mut self, kind: u32, tick_offset: u32) {
        let due_tick = tick_offset as u64;
        self.heap.push(KeyedOrd::new(Entry {
            kind,
            due_tick,
            key: Reverse(due_tick),
        }));
    }

    fn process(&mut self, current_tick: u64) -> Vec<u32> {
        let mut fired = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.due_tick > current_tick {
                break;
            }
            let entry = self.heap.pop().unwrap().into_inner();
            fired.push(entry.kind);
        }
        fired
    }

    fn normalize(&mut self, current_tick: u64) {
        let entries: Vec<Entry> = self.heap.drain().map(KeyedOrd::into_inner).collect();
        self.heap = entries
            .into_iter()
            .map(|entry| {
                let due_tick = entry.due_tick.saturating_sub(current_tick);
                KeyedOrd::new(Entry {
                    kind: entry.kind,
                    due_tick,
                    key: Reverse(due_tick),
                })
            })
            .collect();
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn snapshot(&mut self, current_tick: u64) -> Vec<ScheduledTick> {
        self.normalize(current_tick);
        self.heap
            .iter()
            .map(|entry| ScheduledTick {
                kind: entry.kind,
                tick_offset: entry.due_tick as u32,
            })
            .collect()
    }

    fn restore(&mut self, entries: Vec<ScheduledTick>) {
        for entry in entries {
            self.schedule(entry.kind, entry.tick_offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn process_fires_only_elapsed_events_in_due_order() {
        let mut scheduler = BinaryHeapTickScheduler::new();
        scheduler.schedule(1, 5);
        scheduler.schedule(2, 2);
        scheduler.schedule(3, 9);

        assert_eq!(scheduler.process(1), Vec::<u32>::new());
        assert_eq!(scheduler.process(5), vec![2, 1]);
        assert!(!scheduler.is_empty());
        assert_eq!(scheduler.process(9), vec![3]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn normalize_rebases_remaining_offsets_against_the_given_tick() {
        let mut scheduler = BinaryHeapTickScheduler::new();
        scheduler.schedule(1, 10);
        scheduler.normalize(4);
        assert_eq!(scheduler.process(5), Vec::<u32>::new());
        assert_eq!(scheduler.process(6), vec![1]);
    }
}
