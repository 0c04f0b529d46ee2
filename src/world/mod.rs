//! The world-level chunk registry: owns every loaded [`Chunk`], drives
//! their per-tick updates, and answers neighbor-availability queries the
//! chunk lifecycle core itself can't (see [`crate::chunk::NeighborView`]).
//!
//! Grounded on `topo/world/chunk_manager.rs` (`LoadedChunkContainer`,
//! neighbor access) and `topo/world/new_chunk_manager/mod.rs`
//! (`ChunkLoadshares` inline storage, `chunk_pos_in_bounds`).

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::chunk::{Chunk, ChunkContext, ChunkPosition, ExtendedData, LoadReasons, NeighborView};
use crate::config::WorldConfig;
use crate::decoration;
use crate::external::{Codec, Decorator, Generator};
use crate::task_pool::TaskPool;
use crate::voxel::SECTION_DIM;

/// World-registry-level failures. Distinct from [`crate::error::CoreError`]
/// so a caller holding only a `ChunkSet` doesn't need the whole crate's
/// error surface in scope.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("{0} is outside the world's size bound")]
    OutOfBounds(ChunkPosition),
}

type ChunkMap<E> = DashMap<ChunkPosition, Mutex<Chunk<E>>, ahash::RandomState>;

/// Implements [`NeighborView`] over the registry's own map so
/// `ChunkContext` can be built before the [`ChunkSet`] that owns it exists.
struct Neighbors<E: ExtendedData> {
    chunks: Arc<ChunkMap<E>>,
}

impl<E: ExtendedData> NeighborView for Neighbors<E> {
    fn neighbor_intends_to_get_ready(&self, center: ChunkPosition) -> bool {
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if (dx, dy, dz) == (0, 0, 0) {
                        continue;
                    }
                    let pos = center.offset(dx, dy, dz);
                    if let Some(entry) = self.chunks.get(&pos) {
                        if entry.value().lock().is_intending_to_get_ready() {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }

    fn notify_active_neighbors(&self, center: ChunkPosition) {
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if (dx, dy, dz) == (0, 0, 0) {
                        continue;
                    }
                    let pos = center.offset(dx, dy, dz);
                    if let Some(entry) = self.chunks.get(&pos) {
                        entry.value().lock().notify_neighbor_activated(center);
                    }
                }
            }
        }
    }
}

/// A handle to one entry in a [`ChunkSet`]'s registry; combines the
/// dashmap shard guard with the chunk's own mutex so callers never see
/// either lock type directly.
///
/// Grounded on `topo/world/chunk_ref.rs`'s `ChunkRef` (a guard bundling a
/// dashmap entry with auxiliary locked state), simplified here since this
/// core attaches no auxiliary metadata to a chunk reference.
pub struct ChunkRef<'a, E: ExtendedData> {
    entry: dashmap::mapref::one::Ref<'a, ChunkPosition, Mutex<Chunk<E>>>,
}

impl<'a, E: ExtendedData> ChunkRef<'a, E> {
    pub fn position(&self) -> ChunkPosition {
        *self.entry.key()
    }

    pub fn with<R>(&self, f: impl FnOnce(&Chunk<E>) -> R) -> R {
        f(&self.entry.value().lock())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Chunk<E>) -> R) -> R {
        f(&mut self.entry.value().lock())
    }
}

/// Owns every loaded chunk for one world and drives their lifecycle.
pub struct ChunkSet<E: ExtendedData> {
    config: Arc<WorldConfig>,
    chunks: Arc<ChunkMap<E>>,
    ctx: ChunkContext,
}

impl<E: ExtendedData> ChunkSet<E> {
    pub fn new(
        config: WorldConfig,
        generator: Arc<dyn Generator>,
        decorator: Arc<dyn Decorator>,
        codec: Arc<dyn Codec>,
        executor: Arc<bevy_tasks::TaskPool>,
    ) -> Self {
        let config = Arc::new(config);
        let chunks: Arc<ChunkMap<E>> = Arc::new(DashMap::with_hasher(ahash::RandomState::default()));

        let ctx = ChunkContext {
            config: config.clone(),
            generator,
            decorator,
            codec,
            loading_pool: Arc::new(TaskPool::new("loading", config.max_loading_tasks)),
            generation_pool: Arc::new(TaskPool::new("generation", config.max_generation_tasks)),
            decoration_pool: Arc::new(TaskPool::new("decoration", config.max_decoration_tasks)),
            saving_pool: Arc::new(TaskPool::new("saving", config.max_saving_tasks)),
            executor,
            neighbors: Arc::new(Neighbors { chunks: chunks.clone() }),
        };

        let set = Self { config, chunks, ctx };
        set.request_with_reason(ChunkPosition::ORIGIN, LoadReasons::MANUAL);
        set
    }

    fn chunks_per_axis_limit(&self) -> i64 {
        self.config.block_limit / (SECTION_DIM as i64 * crate::chunk::SECTIONS_PER_AXIS as i64)
    }

    fn in_bounds(&self, position: ChunkPosition) -> bool {
        let limit = self.chunks_per_axis_limit();
        (position.x() as i64).abs() <= limit && (position.y() as i64).abs() <= limit && (position.z() as i64).abs() <= limit
    }

    /// Marks `position` live under [`LoadReasons::MANUAL`]. Out-of-bounds
    /// positions are silently ignored.
    pub fn request(&self, position: ChunkPosition) {
        self.request_with_reason(position, LoadReasons::MANUAL);
    }

    /// Marks `position` live under a caller-chosen reason; independent
    /// interests (rendering vs. simulation) can request/release without
    /// fighting over a shared boolean. See [`LoadReasons`].
    pub fn request_with_reason(&self, position: ChunkPosition, reason: LoadReasons) {
        if !self.in_bounds(position) {
            tracing::debug!(%position, "request ignored: out of world bounds");
            return;
        }

        self.chunks
            .entry(position)
            .or_insert_with(|| Mutex::new(Chunk::new(position)))
            .value()
            .lock()
            .add_load_reason(reason);
    }

    /// Releases `position` from `reason`. No-op for the origin chunk, which
    /// is never released.
    pub fn release(&self, position: ChunkPosition) {
        self.release_with_reason(position, LoadReasons::all());
    }

    pub fn release_with_reason(&self, position: ChunkPosition, reason: LoadReasons) {
        if position == ChunkPosition::ORIGIN {
            return;
        }

        if let Some(entry) = self.chunks.get(&position) {
            entry.value().lock().remove_load_reason(reason);
        }
    }

    pub fn get_active(&self, position: ChunkPosition) -> Option<ChunkRef<'_, E>> {
        let entry = self.chunks.get(&position)?;
        entry.value().lock().is_active().then(|| ChunkRef { entry })
    }

    pub fn get_any(&self, position: ChunkPosition) -> Option<ChunkRef<'_, E>> {
        self.chunks.get(&position).map(|entry| ChunkRef { entry })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Drives one update tick: advances every chunk's state machine, then
    /// attempts a decoration pass for any `Hidden` chunk, then sweeps
    /// disposed chunks out of the registry.
    pub fn update_all(&self) {
        let mut disposed = Vec::new();

        for entry in self.chunks.iter() {
            let mut chunk = entry.value().lock();
            chunk.update(&self.ctx);
            if chunk.is_disposed() {
                disposed.push(*entry.key());
            }
        }

        let hidden: Vec<ChunkPosition> = self
            .chunks
            .iter()
            .filter(|entry| {
                let chunk = entry.value().lock();
                chunk.state_kind() == crate::chunk::state::StateKind::Hidden && !chunk.decoration().is_complete()
            })
            .map(|entry| *entry.key())
            .collect();

        for position in hidden {
            decoration::try_plan(self, position);
        }

        for position in disposed {
            if position == ChunkPosition::ORIGIN {
                continue;
            }
            self.chunks.remove(&position);
            tracing::trace!(%position, "chunk disposed and removed from registry");
        }
    }

    /// Whether every chunk currently loaded for simulation has reached
    /// `Active`. Used to gate a world-level `Activating` -> `Active`
    /// transition.
    pub fn is_every_chunk_to_simulate_active(&self) -> bool {
        self.chunks.iter().all(|entry| {
            let chunk = entry.value().lock();
            !chunk.is_requested() || chunk.is_active()
        })
    }
}
