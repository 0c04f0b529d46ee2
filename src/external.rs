//! Traits bridging the chunk lifecycle core to caller-supplied collaborators:
//! world generation, decoration, on-disk encoding, and timed tick
//! scheduling. The core calls these but never defines their semantics.

use std::path::Path;

use crate::chunk::{ChunkPosition, DecorationFlags};
use crate::voxel::{Section, SectionPosition};

/// Populates freshly-created chunks with terrain.
///
/// Grounded on the generator/worker split in
/// `topo/world/chunk_populator/worldgen.rs`: the core only needs a
/// column-oriented fill and a structure pass, both of which may run on a
/// background thread.
pub trait Generator: Send + Sync + 'static {
    /// Fills `section` at `position` with terrain content. Implementations
    /// are expected to be pure functions of world seed and position.
    ///
    /// A generator failure is not recoverable: the chunk's content would be
    /// undefined for every chunk generated from this point on, so the
    /// spawned generation task panics on `Err` rather than returning a
    /// half-generated chunk to `Hidden`.
    fn generate_section(&self, position: SectionPosition, chunk: ChunkPosition, section: &mut Section) -> Result<(), GenerationError>;

    /// Populates deterministic structures that may span multiple sections
    /// within a single chunk. Runs after every section in the chunk has
    /// been filled by [`Generator::generate_section`].
    fn generate_structures(&self, chunk: ChunkPosition, sections: &mut [Section]) -> Result<(), GenerationError>;
}

/// A world generator's content failed to produce a valid chunk. Treated as
/// fatal: see [`Generator`].
#[derive(Debug, thiserror::Error)]
#[error("world generation failed: {0}")]
pub struct GenerationError(pub String);

/// Modifies a section using read access to its 3x3x3 neighborhood, the
/// multi-chunk decoration pass described in the decoration algorithm.
///
/// Grounded on `topo/neighbors.rs`'s `Neighbors<C>` 3x3x3 layout.
pub trait Decorator: Send + Sync + 'static {
    /// `neighbors[13]` is always the center (same indexing as
    /// [`crate::util::neighbor_grid_index`]).
    ///
    /// A decoration failure is treated the same as a generation failure:
    /// fatal, propagated by panicking the spawned decoration task. See
    /// [`Generator::generate_section`].
    fn decorate_section(&self, position: SectionPosition, neighbors: &[Option<&Section>; 27], center: &mut Section) -> Result<(), GenerationError>;
}

/// On-disk chunk encoding. The core only ever calls `load`/`save`; file
/// naming and atomicity are the codec's responsibility.
pub trait Codec: Send + Sync + 'static {
    fn chunk_file_name(position: ChunkPosition) -> String {
        format!("x{}y{}z{}.chunk", position.x(), position.y(), position.z())
    }

    fn load(&self, directory: &Path, position: ChunkPosition) -> LoadingResult;

    fn save(&self, directory: &Path, position: ChunkPosition, data: &PersistedChunk) -> Result<(), SaveError>;
}

/// Everything a codec must round-trip for a chunk to resume exactly where
/// it left off: its sections, its decoration progress, and its pending
/// block/fluid ticks.
pub struct PersistedChunk {
    pub sections: Vec<Section>,
    pub decoration: DecorationFlags,
    pub block_ticks: Vec<ScheduledTick>,
    pub fluid_ticks: Vec<ScheduledTick>,
}

/// One scheduler entry as it crosses the save/load boundary: `tick_offset`
/// is relative to the tick the snapshot was taken at, not an absolute tick.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledTick {
    pub kind: u32,
    pub tick_offset: u32,
}

/// Outcome of attempting to load a chunk from disk.
pub enum LoadingResult {
    Success(PersistedChunk),
    IoError(std::io::Error),
    FormatError(String),
    ValidationError(String),
}

/// A save failed; always logged and never fatal.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("I/O error saving chunk: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error saving chunk: {0}")]
    Encoding(String),
}

/// Drives a chunk's scheduled block/fluid tick events.
///
/// A default implementation, [`crate::tick::BinaryHeapTickScheduler`], is
/// provided and used by [`crate::chunk::Chunk::new`] unless a caller
/// supplies its own.
pub trait TickScheduler: Send + Sync {
    fn schedule(&mut self, kind: u32, tick_offset: u32);

    /// Pops and returns every event whose offset has elapsed as of
    /// `current_tick`.
    fn process(&mut self, current_tick: u64) -> Vec<u32>;

    /// Rebases all pending offsets against tick 0, called before save so
    /// the scheduler's state is meaningful when reloaded later.
    fn normalize(&mut self, current_tick: u64);

    fn is_empty(&self) -> bool;

    /// Snapshots every pending event as an offset from `current_tick`,
    /// without consuming them, so a chunk re-requested mid-save keeps its
    /// live queue intact.
    fn snapshot(&mut self, current_tick: u64) -> Vec<ScheduledTick>;

    /// Restores entries produced by a prior [`TickScheduler::snapshot`],
    /// scheduling each relative to the current tick.
    fn restore(&mut self, entries: Vec<ScheduledTick>);
}
