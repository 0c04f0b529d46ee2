//! Small shared helpers with no home of their own.
//!
//! `Keyed`/`KeyedOrd` are carried over verbatim in spirit from
//! `util/keyed_ord.rs`: a way to get `Ord` on a wrapper type by delegating
//! to one of its fields, used to build priority queues without writing a
//! bespoke `Ord` impl for every queued item.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

pub trait Keyed<Id = ()> {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
}

pub struct KeyedOrd<T: Keyed<K>, K = ()> {
    data: T,
    _marker: PhantomData<K>,
}

impl<T: Keyed<K>, K> KeyedOrd<T, K> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            _marker: PhantomData,
        }
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

impl<T: Keyed<K>, K> Deref for KeyedOrd<T, K> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T: Keyed<K>, K> DerefMut for KeyedOrd<T, K> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl<T: Keyed<K>, K> PartialEq for KeyedOrd<T, K> {
    fn eq(&self, other: &Self) -> bool {
        self.data.key().eq(other.data.key())
    }
}

impl<T: Keyed<K>, K> Eq for KeyedOrd<T, K> {}

impl<T: Keyed<K>, K> PartialOrd for KeyedOrd<T, K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Keyed<K>, K> Ord for KeyedOrd<T, K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data.key().cmp(other.data.key())
    }
}

/// Three-dimensional index conversion for the 3x3x3 neighbor grids used by
/// decoration, grounded on `topo/neighbors.rs`'s `to_1d`.
pub fn neighbor_grid_index(x: i32, y: i32, z: i32) -> Option<usize> {
    if !(-1..=1).contains(&x) || !(-1..=1).contains(&y) || !(-1..=1).contains(&z) {
        return None;
    }
    let (x, y, z) = ((x + 1) as usize, (y + 1) as usize, (z + 1) as usize);
    Some(x * 9 + y * 3 + z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BinaryHeap;

    struct Item(u32);

    impl Keyed for Item {
        type Key = u32;

        fn key(&self) -> &u32 {
            &self.0
        }
    }

    #[test]
    fn keyed_ord_drives_binary_heap_by_the_delegated_key() {
        let mut heap = BinaryHeap::new();
        heap.push(KeyedOrd::new(Item(3)));
        heap.push(KeyedOrd::new(Item(7)));
        heap.push(KeyedOrd::new(Item(1)));

        assert_eq!(heap.pop().unwrap().into_inner().0, 7);
        assert_eq!(heap.pop().unwrap().into_inner().0, 3);
        assert_eq!(heap.pop().unwrap().into_inner().0, 1);
    }

    #[test]
    fn neighbor_grid_index_covers_all_27_offsets_uniquely() {
        let mut seen = std::collections::HashSet::new();
        for x in -1..=1 {
            for y in -1..=1 {
                for z in -1..=1 {
                    let idx = neighbor_grid_index(x, y, z).unwrap();
                    assert!(idx < 27);
                    assert!(seen.insert(idx));
                }
            }
        }
    }

    #[test]
    fn neighbor_grid_index_rejects_out_of_range_offsets() {
        assert!(neighbor_grid_index(2, 0, 0).is_none());
    }
}
