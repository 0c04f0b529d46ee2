//! The world-level decoration planner: evaluates whether a `Hidden` chunk
//! has enough available neighbors to decorate one or more of its 8 corners,
//! acquires their write guards, and hands the plan off to
//! [`crate::chunk::states::begin_decoration`].
//!
//! Grounded on `topo/neighbors.rs`'s `Neighbors<C>` 3x3x3 array and
//! `localspace_to_chunk_pos`/`to_1d` indexing idiom, generalized to operate
//! over a [`ChunkSet`] instead of a fixed in-memory neighbor array.

use smallvec::SmallVec;

use crate::chunk::{states, Chunk, ChunkPosition, DecorationFlags, ExtendedData};
use crate::resource::Access;
use crate::world::ChunkSet;

/// Attempts to advance decoration for the `Hidden` chunk at `center`.
/// Returns `true` if a decoration pass was started (the chunk is now
/// `Decorating`), `false` if no corner was decoratable right now.
pub fn try_plan<E: ExtendedData>(chunk_set: &ChunkSet<E>, center: ChunkPosition) -> bool {
    let Some(center_ref) = chunk_set.get_any(center) else {
        return false;
    };

    let eligible = center_ref.with(|chunk| {
        chunk.state_kind() == crate::chunk::state::StateKind::Hidden && !chunk.decoration().is_complete()
    });
    if !eligible {
        return false;
    }

    let Some(self_guard) = center_ref.with(|chunk: &Chunk<E>| chunk.core_resource().ok().and_then(|r| r.try_acquire_write())) else {
        return false;
    };

    let mut available = [[[false; 3]; 3]; 3];
    for dx in -1..=1i32 {
        for dy in -1..=1i32 {
            for dz in -1..=1i32 {
                let idx = (ofs(dx), ofs(dy), ofs(dz));
                available[idx.0][idx.1][idx.2] = if (dx, dy, dz) == (0, 0, 0) {
                    true
                } else {
                    let pos = center.offset(dx, dy, dz);
                    chunk_set
                        .get_any(pos)
                        .map(|r| r.with(|chunk| chunk.can_acquire_core(Access::Write)))
                        .unwrap_or(false)
                };
            }
        }
    }

    let existing = center_ref.with(|chunk| chunk.decoration());
    let mut decoratable = SmallVec::<[DecorationFlags; 8]>::new();
    let mut needed: SmallVec<[(i32, i32, i32); 8]> = SmallVec::new();

    for cx in 0..2u8 {
        for cy in 0..2u8 {
            for cz in 0..2u8 {
                let flag = DecorationFlags::corner(cx, cy, cz);
                if existing.contains(flag) {
                    continue;
                }

                let (ddx, ddy, ddz) = (dir(cx), dir(cy), dir(cz));
                let mut block = SmallVec::<[(i32, i32, i32); 8]>::new();
                let mut corner_available = true;
                for ox in [0, ddx] {
                    for oy in [0, ddy] {
                        for oz in [0, ddz] {
                            if !available[ofs(ox)][ofs(oy)][ofs(oz)] {
                                corner_available = false;
                            }
                            block.push((ox, oy, oz));
                        }
                    }
                }

                if corner_available {
                    decoratable.push(flag);
                    for offset in block {
                        if !needed.contains(&offset) {
                            needed.push(offset);
                        }
                    }
                }
            }
        }
    }

    if decoratable.is_empty() {
        drop(self_guard);
        tracing::trace!(%center, "no corner decoratable this attempt");
        return false;
    }

    needed.retain(|offset| *offset != (0, 0, 0));

    let mut neighbor_guards = Vec::with_capacity(needed.len());
    for (dx, dy, dz) in needed {
        let pos = center.offset(dx, dy, dz);
        let neighbor_ref = chunk_set
            .get_any(pos)
            .expect("availability check above guarantees this chunk exists");
        let guard = neighbor_ref
            .with(|chunk: &Chunk<E>| chunk.core_resource().ok().and_then(|r| r.try_acquire_write()))
            .expect("availability check above guarantees this resource is free");
        neighbor_guards.push((pos, guard));
    }

    tracing::debug!(%center, corners = decoratable.len(), neighbors = neighbor_guards.len(), "beginning decoration");

    center_ref.with_mut(|chunk| {
        states::begin_decoration(chunk, self_guard, decoratable, neighbor_guards);
    });

    true
}

fn dir(c: u8) -> i32 {
    if c == 0 {
        -1
    } else {
        1
    }
}

fn ofs(n: i32) -> usize {
    (n + 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_maps_corner_bit_to_signed_offset() {
        assert_eq!(dir(0), -1);
        assert_eq!(dir(1), 1);
    }

    #[test]
    fn ofs_shifts_signed_offset_into_array_index() {
        assert_eq!(ofs(-1), 0);
        assert_eq!(ofs(0), 1);
        assert_eq!(ofs(1), 2);
    }
}
