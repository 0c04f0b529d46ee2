//! Packed 32-bit voxel cell encoding.
//!
//! Layout (lowest bit first):
//! `block:12 | data:6 | fluid:5 | level:3 | static:1 | reserved:5`

use std::fmt;

use bytemuck::{Pod, Zeroable};

const BLOCK_BITS: u32 = 12;
const DATA_BITS: u32 = 6;
const FLUID_BITS: u32 = 5;
const LEVEL_BITS: u32 = 3;

const BLOCK_SHIFT: u32 = 0;
const DATA_SHIFT: u32 = BLOCK_SHIFT + BLOCK_BITS;
const FLUID_SHIFT: u32 = DATA_SHIFT + DATA_BITS;
const LEVEL_SHIFT: u32 = FLUID_SHIFT + FLUID_BITS;
const STATIC_SHIFT: u32 = LEVEL_SHIFT + LEVEL_BITS;

const BLOCK_MASK: u32 = (1 << BLOCK_BITS) - 1;
const DATA_MASK: u32 = (1 << DATA_BITS) - 1;
const FLUID_MASK: u32 = (1 << FLUID_BITS) - 1;
const LEVEL_MASK: u32 = (1 << LEVEL_BITS) - 1;

/// Maximum exclusive value a block id may hold.
pub const MAX_BLOCK_ID: u32 = 1 << BLOCK_BITS;
/// Maximum exclusive value block data may hold.
pub const MAX_BLOCK_DATA: u32 = 1 << DATA_BITS;
/// Maximum exclusive value a fluid id may hold.
pub const MAX_FLUID_ID: u32 = 1 << FLUID_BITS;

/// A fluid fill level, one of eight discrete steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LiquidLevel {
    One = 0,
    Two = 1,
    Three = 2,
    Four = 3,
    Five = 4,
    Six = 5,
    Seven = 6,
    Eight = 7,
}

impl LiquidLevel {
    pub const ALL: [LiquidLevel; 8] = [
        Self::One,
        Self::Two,
        Self::Three,
        Self::Four,
        Self::Five,
        Self::Six,
        Self::Seven,
        Self::Eight,
    ];

    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        debug_assert!(raw <= LEVEL_MASK);
        // SAFETY: raw is masked to 3 bits by callers and the enum covers 0..=7.
        unsafe { std::mem::transmute(raw as u8) }
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self as u32
    }
}

/// A field write would have overflowed the bits reserved for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OutOfRange {
    #[error("block id {0} exceeds the {max} values a cell can encode", max = MAX_BLOCK_ID)]
    BlockId(u32),
    #[error("block data {0} exceeds the {max} values a cell can encode", max = MAX_BLOCK_DATA)]
    BlockData(u32),
    #[error("fluid id {0} exceeds the {max} values a cell can encode", max = MAX_FLUID_ID)]
    FluidId(u32),
}

/// The decoded fields of a [`Cell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellFields {
    pub block: u32,
    pub data: u32,
    pub fluid: u32,
    pub level: LiquidLevel,
    pub is_static: bool,
}

/// A single packed voxel cell: block id, block data, fluid id, fluid
/// level, and a static flag, packed into 32 bits so a [`Section`](super::section::Section)
/// is a flat, cache-friendly array of these.
#[derive(Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct Cell(u32);

impl Cell {
    pub const EMPTY: Cell = Cell(0);

    #[inline]
    pub fn encode(
        block: u32,
        data: u32,
        fluid: u32,
        level: LiquidLevel,
        is_static: bool,
    ) -> Result<Self, OutOfRange> {
        if block >= MAX_BLOCK_ID {
            return Err(OutOfRange::BlockId(block));
        }
        if data >= MAX_BLOCK_DATA {
            return Err(OutOfRange::BlockData(data));
        }
        if fluid >= MAX_FLUID_ID {
            return Err(OutOfRange::FluidId(fluid));
        }

        let raw = (block << BLOCK_SHIFT)
            | (data << DATA_SHIFT)
            | (fluid << FLUID_SHIFT)
            | (level.raw() << LEVEL_SHIFT)
            | ((is_static as u32) << STATIC_SHIFT);

        Ok(Cell(raw))
    }

    #[inline]
    pub fn block(self) -> u32 {
        (self.0 >> BLOCK_SHIFT) & BLOCK_MASK
    }

    #[inline]
    pub fn data(self) -> u32 {
        (self.0 >> DATA_SHIFT) & DATA_MASK
    }

    #[inline]
    pub fn fluid(self) -> u32 {
        (self.0 >> FLUID_SHIFT) & FLUID_MASK
    }

    #[inline]
    pub fn level(self) -> LiquidLevel {
        LiquidLevel::from_raw((self.0 >> LEVEL_SHIFT) & LEVEL_MASK)
    }

    #[inline]
    pub fn is_static(self) -> bool {
        (self.0 >> STATIC_SHIFT) & 1 != 0
    }

    #[inline]
    pub fn fields(self) -> CellFields {
        CellFields {
            block: self.block(),
            data: self.data(),
            fluid: self.fluid(),
            level: self.level(),
            is_static: self.is_static(),
        }
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Cell(raw)
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields();
        f.debug_struct("Cell")
            .field("block", &fields.block)
            .field("data", &fields.data)
            .field("fluid", &fields.fluid)
            .field("level", &fields.level)
            .field("is_static", &fields.is_static)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trip_covers_the_whole_field_space() {
        for block in [0u32, 1, 4095] {
            for data in [0u32, 1, 63] {
                for fluid in [0u32, 1, 31] {
                    for level in LiquidLevel::ALL {
                        for is_static in [false, true] {
                            let cell = Cell::encode(block, data, fluid, level, is_static).unwrap();
                            assert_eq!(cell.block(), block);
                            assert_eq!(cell.data(), data);
                            assert_eq!(cell.fluid(), fluid);
                            assert_eq!(cell.level(), level);
                            assert_eq!(cell.is_static(), is_static);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn overflowing_block_id_is_rejected() {
        let err = Cell::encode(MAX_BLOCK_ID, 0, 0, LiquidLevel::One, false).unwrap_err();
        assert_eq!(err, OutOfRange::BlockId(MAX_BLOCK_ID));
    }

    #[test]
    fn overflowing_block_data_is_rejected() {
        let err = Cell::encode(0, MAX_BLOCK_DATA, 0, LiquidLevel::One, false).unwrap_err();
        assert_eq!(err, OutOfRange::BlockData(MAX_BLOCK_DATA));
    }

    #[test]
    fn overflowing_fluid_id_is_rejected() {
        let err = Cell::encode(0, 0, MAX_FLUID_ID, LiquidLevel::One, false).unwrap_err();
        assert_eq!(err, OutOfRange::FluidId(MAX_FLUID_ID));
    }

    #[test]
    fn literal_encoding_matches_the_documented_layout() {
        // Stone=5, data=3, Water=2, level=Four (index 3), static=true
        let cell = Cell::encode(5, 3, 2, LiquidLevel::Four, true).unwrap();
        let expected = (1u32 << 26) | (3 << 23) | (2 << 18) | (3 << 12) | 5;
        assert_eq!(cell.raw(), expected);
        assert_eq!(cell.fields(), CellFields {
            block: 5,
            data: 3,
            fluid: 2,
            level: LiquidLevel::Four,
            is_static: true,
        });
    }
}
