//! Bounded per-category slot allocator used to cap how much background work
//! (loading, generation, decoration, saving) is in flight at once.
//!
//! Grounded on the capacity-bounded worker pools in
//! `topo/world/chunk_populator/worldgen.rs` and `topo/worldgen/mod.rs`,
//! simplified here to a plain counting semaphore since the actual future
//! execution is handled by a shared [`bevy_tasks`] pool rather than a
//! hand-rolled channel worker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A named category of background work with a fixed concurrency ceiling.
pub struct TaskPool {
    label: &'static str,
    limit: usize,
    in_flight: Arc<AtomicUsize>,
}

impl TaskPool {
    pub fn new(label: &'static str, limit: usize) -> Self {
        Self {
            label,
            limit,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Attempts to reserve one slot. Returns `None` (without side effects)
    /// if the pool is already at capacity.
    pub fn try_allocate(&self) -> Option<Slot> {
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current >= self.limit {
                tracing::trace!(pool = self.label, current, limit = self.limit, "task pool saturated");
                return None;
            }

            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(Slot {
                        in_flight: self.in_flight.clone(),
                    })
                }
                Err(observed) => current = observed,
            }
        }
    }
}

/// A single reserved slot in a [`TaskPool`]; releases its permit on drop.
pub struct Slot {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn allocation_is_bounded_by_the_configured_limit() {
        let pool = TaskPool::new("test", 1);
        let first = pool.try_allocate();
        assert!(first.is_some());
        assert!(pool.try_allocate().is_none());

        drop(first);
        assert!(pool.try_allocate().is_some());
    }

    #[test]
    fn in_flight_tracks_live_slots() {
        let pool = TaskPool::new("test", 3);
        let a = pool.try_allocate().unwrap();
        let b = pool.try_allocate().unwrap();
        assert_eq!(pool.in_flight(), 2);
        drop(a);
        assert_eq!(pool.in_flight(), 1);
        drop(b);
        assert_eq!(pool.in_flight(), 0);
    }
}
