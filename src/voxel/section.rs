//! Fixed-size `N^3` grid of [`Cell`]s, the unit a [`super::Generator`] and
//! [`super::Decorator`] operate on.

use glam::IVec3;
use rand::Rng;

use super::cell::Cell;

/// Side length of a [`Section`] in cells.
pub const SECTION_DIM: usize = 16;
const SECTION_DIM_LOG2: u32 = 4;
const SECTION_VOLUME: usize = SECTION_DIM * SECTION_DIM * SECTION_DIM;

static_assertions::const_assert_eq!(1 << SECTION_DIM_LOG2, SECTION_DIM);

/// The position of a [`Section`] within its chunk, in section units, not
/// cell units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Constructor)]
pub struct SectionPosition {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SectionPosition {
    pub fn as_ivec3(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }
}

/// A local cell-space coordinate out of `[0, SECTION_DIM)^3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalPos {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl LocalPos {
    pub fn new(x: usize, y: usize, z: usize) -> Option<Self> {
        if x < SECTION_DIM && y < SECTION_DIM && z < SECTION_DIM {
            Some(Self { x, y, z })
        } else {
            None
        }
    }

    #[inline]
    fn to_1d(self) -> usize {
        (self.x << (SECTION_DIM_LOG2 * 2)) | (self.y << SECTION_DIM_LOG2) | self.z
    }
}

/// A flat `N^3` array of [`Cell`]s.
#[derive(Clone)]
pub struct Section {
    cells: Box<[Cell; SECTION_VOLUME]>,
}

impl Section {
    pub fn empty() -> Self {
        Self {
            cells: Box::new([Cell::EMPTY; SECTION_VOLUME]),
        }
    }

    #[inline]
    pub fn get(&self, pos: LocalPos) -> Cell {
        self.cells[pos.to_1d()]
    }

    #[inline]
    pub fn set(&mut self, pos: LocalPos, cell: Cell) {
        self.cells[pos.to_1d()] = cell;
    }

    pub fn iter(&self) -> impl Iterator<Item = (LocalPos, Cell)> + '_ {
        (0..SECTION_DIM).flat_map(move |x| {
            (0..SECTION_DIM).flat_map(move |y| {
                (0..SECTION_DIM).map(move |z| {
                    let pos = LocalPos { x, y, z };
                    (pos, self.get(pos))
                })
            })
        })
    }

    /// Samples a fixed number of random positions in this section, the way
    /// the reference engine drives per-tick random block updates.
    pub fn sample_random_positions(&self, count: usize, rng: &mut impl Rng) -> Vec<LocalPos> {
        (0..count)
            .map(|_| LocalPos {
                x: rng.gen_range(0..SECTION_DIM),
                y: rng.gen_range(0..SECTION_DIM),
                z: rng.gen_range(0..SECTION_DIM),
            })
            .collect()
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_then_get_round_trips_without_disturbing_neighbors() {
        let mut section = Section::empty();
        let target = LocalPos::new(3, 7, 11).unwrap();
        let cell = Cell::encode(42, 1, 0, super::super::cell::LiquidLevel::One, false).unwrap();
        section.set(target, cell);

        assert_eq!(section.get(target), cell);
        assert_eq!(section.get(LocalPos::new(3, 7, 10).unwrap()), Cell::EMPTY);
        assert_eq!(section.get(LocalPos::new(4, 7, 11).unwrap()), Cell::EMPTY);
    }

    #[test]
    fn local_pos_rejects_out_of_range_components() {
        assert!(LocalPos::new(SECTION_DIM, 0, 0).is_none());
        assert!(LocalPos::new(0, SECTION_DIM, 0).is_none());
        assert!(LocalPos::new(0, 0, SECTION_DIM).is_none());
    }
}
