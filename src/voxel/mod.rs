//! Packed voxel storage: the [`cell::Cell`] encoding and the [`section::Section`]
//! grid built from it.

pub mod cell;
pub mod section;

pub use cell::{Cell, CellFields, LiquidLevel, OutOfRange};
pub use section::{LocalPos, Section, SectionPosition, SECTION_DIM};
