//! Chunk lifecycle and concurrency core: per-chunk state machines, the
//! resource primitives they acquire, the task pools bounding background
//! work, and the world-level registry driving them all each tick.
//!
//! Callers supply a [`external::Generator`], [`external::Decorator`], and
//! [`external::Codec`]; this crate owns none of the content those produce,
//! only the scheduling and concurrency discipline around them.

pub mod chunk;
pub mod config;
pub mod decoration;
pub mod error;
pub mod external;
pub mod resource;
pub mod task_pool;
pub mod tick;
pub mod util;
pub mod voxel;
pub mod world;

pub use chunk::{Chunk, ChunkPosition};
pub use config::WorldConfig;
pub use error::CoreError;
pub use world::ChunkSet;
