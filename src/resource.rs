//! Two-mode (read/write) lock used for a chunk's core and extended data,
//! with guards that can be moved between owners rather than tied to a
//! borrow — the mechanism [`crate::chunk::Chunk::try_steal_access`] relies
//! on to hand a chunk's write access to another chunk's in-flight work.
//!
//! Grounded on the access-level/strategy shape of the reference engine's
//! `util::sync::{StrategicReadLock, StrategicWriteLock}`, but a guard here
//! owns an `Arc` to its resource instead of borrowing it, so it can be
//! relocated out of one state and into another by ordinary move semantics.

use std::cell::UnsafeCell;
use std::sync::Arc;

use parking_lot::Mutex;

/// The level of access a [`ChunkState`](crate::chunk::state::ChunkState)
/// declares it needs, or a caller requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Access {
    None,
    Read,
    Write,
}

#[derive(Debug, Default)]
struct LockState {
    readers: u32,
    writer: bool,
}

impl LockState {
    fn can_acquire(&self, access: Access) -> bool {
        match access {
            Access::None => true,
            Access::Read => !self.writer,
            Access::Write => !self.writer && self.readers == 0,
        }
    }
}

/// A resource guarded by read/write accounting; always handled behind an
/// `Arc` so acquired [`Guard`]s can outlive any particular reference to the
/// resource and be relocated between owners.
pub struct Resource<T> {
    state: Mutex<LockState>,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is only ever granted through a `Guard` whose
// existence is accounted for in `state`, which enforces the usual
// shared-xor-mutable discipline.
unsafe impl<T: Send> Send for Resource<T> {}
unsafe impl<T: Send> Sync for Resource<T> {}

impl<T> Resource<T> {
    pub fn new(data: T) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LockState::default()),
            data: UnsafeCell::new(data),
        })
    }

    /// Non-blocking check; does not itself acquire anything.
    pub fn can_acquire(self: &Arc<Self>, access: Access) -> bool {
        self.state.lock().can_acquire(access)
    }

    /// Attempts to acquire `access`. Never blocks: returns `None` if an
    /// incompatible holder currently exists.
    pub fn try_acquire(self: &Arc<Self>, access: Access) -> Option<Guard<T>> {
        match access {
            Access::None => Some(Guard::None),
            Access::Read => self.try_acquire_read().map(Guard::Read),
            Access::Write => self.try_acquire_write().map(Guard::Write),
        }
    }

    pub fn try_acquire_read(self: &Arc<Self>) -> Option<ReadGuard<T>> {
        let mut state = self.state.lock();
        if state.writer {
            return None;
        }
        state.readers += 1;
        drop(state);
        Some(ReadGuard {
            resource: self.clone(),
        })
    }

    pub fn try_acquire_write(self: &Arc<Self>) -> Option<WriteGuard<T>> {
        let mut state = self.state.lock();
        if state.writer || state.readers != 0 {
            return None;
        }
        state.writer = true;
        drop(state);
        Some(WriteGuard {
            resource: self.clone(),
        })
    }
}

/// A held access token for some [`Access`] level; `None` carries no guard
/// at all since no locking was required.
pub enum Guard<T> {
    None,
    Read(ReadGuard<T>),
    Write(WriteGuard<T>),
}

impl<T> Guard<T> {
    pub fn access(&self) -> Access {
        match self {
            Guard::None => Access::None,
            Guard::Read(_) => Access::Read,
            Guard::Write(_) => Access::Write,
        }
    }

    pub fn as_write(&self) -> Option<&WriteGuard<T>> {
        match self {
            Guard::Write(guard) => Some(guard),
            _ => None,
        }
    }

    pub fn into_write(self) -> Option<WriteGuard<T>> {
        match self {
            Guard::Write(guard) => Some(guard),
            _ => None,
        }
    }
}

pub struct ReadGuard<T> {
    resource: Arc<Resource<T>>,
}

impl<T> ReadGuard<T> {
    pub fn get(&self) -> &T {
        // SAFETY: a live ReadGuard guarantees no WriteGuard exists for this
        // resource (see LockState::can_acquire).
        unsafe { &*self.resource.data.get() }
    }

    /// Whether `self` and `other` guard the same underlying resource.
    pub fn is_held_of(&self, resource: &Arc<Resource<T>>) -> bool {
        Arc::ptr_eq(&self.resource, resource)
    }
}

impl<T> Drop for ReadGuard<T> {
    fn drop(&mut self) {
        let mut state = self.resource.state.lock();
        state.readers -= 1;
    }
}

pub struct WriteGuard<T> {
    resource: Arc<Resource<T>>,
}

impl<T> WriteGuard<T> {
    pub fn get(&self) -> &T {
        // SAFETY: see `get_mut`.
        unsafe { &*self.resource.data.get() }
    }

    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: a live WriteGuard is the unique holder of write access to
        // this resource (see LockState::can_acquire), and `&mut self` here
        // proves unique access to the guard itself.
        unsafe { &mut *self.resource.data.get() }
    }

    pub fn is_held_of(&self, resource: &Arc<Resource<T>>) -> bool {
        Arc::ptr_eq(&self.resource, resource)
    }
}

impl<T> Drop for WriteGuard<T> {
    fn drop(&mut self) {
        let mut state = self.resource.state.lock();
        state.writer = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn write_excludes_further_acquisitions_until_dropped() {
        let resource = Resource::new(0u32);
        let write = resource.try_acquire_write().unwrap();
        assert!(resource.try_acquire_read().is_none());
        assert!(resource.try_acquire_write().is_none());
        drop(write);
        assert!(resource.try_acquire_write().is_some());
    }

    #[test]
    fn multiple_readers_coexist() {
        let resource = Resource::new(0u32);
        let r1 = resource.try_acquire_read().unwrap();
        let r2 = resource.try_acquire_read().unwrap();
        assert!(resource.try_acquire_write().is_none());
        drop(r1);
        assert!(resource.try_acquire_write().is_none());
        drop(r2);
        assert!(resource.try_acquire_write().is_some());
    }

    #[test]
    fn write_guard_can_be_moved_to_a_new_owner() {
        let resource = Resource::new(5u32);
        let guard = resource.try_acquire_write().unwrap();

        struct Holder<T> {
            guard: Option<WriteGuard<T>>,
        }
        let mut source = Holder { guard: Some(guard) };
        let mut dest = Holder { guard: None };

        dest.guard = source.guard.take();
        assert!(source.guard.is_none());
        assert_eq!(*dest.guard.as_ref().unwrap().get(), 5);

        // resource still reports exclusive write held.
        assert!(resource.try_acquire_read().is_none());
    }

    #[test]
    fn get_mut_observes_prior_writes() {
        let resource = Resource::new(vec![1, 2, 3]);
        {
            let mut guard = resource.try_acquire_write().unwrap();
            guard.get_mut().push(4);
        }
        let guard = resource.try_acquire_write().unwrap();
        assert_eq!(guard.get(), &vec![1, 2, 3, 4]);
    }
}
