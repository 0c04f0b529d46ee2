//! The chunk lifecycle core: per-chunk state, its position and voxel
//! storage, and the generic update driver that advances it.
//!
//! Grounded on `topo/world/chunk.rs`'s `Chunk`/`ChunkFlags`/read-write
//! handle shape, generalized to the tagged-variant state machine this core
//! carries instead of the source's flag-driven, system-scheduled one.

pub mod state;
pub mod states;

use std::sync::Arc;

use bitflags::bitflags;
use glam::IVec3;

use crate::config::WorldConfig;
use crate::external::{Codec, Decorator, Generator};
use crate::resource::{Access, Guard, Resource};
use crate::task_pool::TaskPool;
use crate::tick::BinaryHeapTickScheduler;
use crate::external::TickScheduler;
use crate::voxel::Section;

use self::state::{RequestDescription, RequestQueue, StateKind};
pub use self::states::ChunkState;

/// Side length of a chunk in sections; a chunk holds `SECTIONS_PER_AXIS^3`
/// sections.
pub const SECTIONS_PER_AXIS: i32 = 4;
pub const SECTIONS_PER_CHUNK: usize = (SECTIONS_PER_AXIS * SECTIONS_PER_AXIS * SECTIONS_PER_AXIS) as usize;

/// Maximum state transitions a single [`Chunk::update`] call may perform,
/// guarding against reentrant transition loops.
pub const MAX_TRANSITIONS_PER_UPDATE: u32 = 3;

/// The position of a chunk in chunk units. The origin is sentinel: see
/// [`ChunkSet`](crate::world::ChunkSet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPosition(pub IVec3);

impl ChunkPosition {
    pub const ORIGIN: ChunkPosition = ChunkPosition(IVec3::ZERO);

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self(IVec3::new(x, y, z))
    }

    pub fn x(self) -> i32 {
        self.0.x
    }

    pub fn y(self) -> i32 {
        self.0.y
    }

    pub fn z(self) -> i32 {
        self.0.z
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self(self.0 + IVec3::new(dx, dy, dz))
    }

    /// World-space position, in blocks, of this chunk's first cell.
    pub fn block_origin(self, section_dim: i32) -> IVec3 {
        self.0 * SECTIONS_PER_AXIS * section_dim
    }
}

impl std::fmt::Display for ChunkPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{}y{}z{}", self.0.x, self.0.y, self.0.z)
    }
}

bitflags! {
    /// Which parts of a chunk's decoration have completed. The center flag
    /// covers the chunk's own inner sections; each corner flag covers the
    /// 2x2x2 block of chunks meeting at that corner.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DecorationFlags: u16 {
        const CENTER      = 0b0_0000_0001;
        const CORNER_000  = 0b0_0000_0010;
        const CORNER_001  = 0b0_0000_0100;
        const CORNER_010  = 0b0_0000_1000;
        const CORNER_011  = 0b0_0001_0000;
        const CORNER_100  = 0b0_0010_0000;
        const CORNER_101  = 0b0_0100_0000;
        const CORNER_110  = 0b0_1000_0000;
        const CORNER_111  = 0b1_0000_0000;
    }
}

impl DecorationFlags {
    pub const ALL_CORNERS: DecorationFlags = DecorationFlags::CORNER_000
        .union(DecorationFlags::CORNER_001)
        .union(DecorationFlags::CORNER_010)
        .union(DecorationFlags::CORNER_011)
        .union(DecorationFlags::CORNER_100)
        .union(DecorationFlags::CORNER_101)
        .union(DecorationFlags::CORNER_110)
        .union(DecorationFlags::CORNER_111);

    pub const ALL: DecorationFlags = Self::ALL_CORNERS.union(DecorationFlags::CENTER);

    pub fn corner(cx: u8, cy: u8, cz: u8) -> DecorationFlags {
        let idx = (cx << 2) | (cy << 1) | cz;
        DecorationFlags::from_bits_truncate(0b10 << idx)
    }

    pub fn is_complete(self) -> bool {
        self == Self::ALL
    }
}

bitflags! {
    /// Why a chunk is currently requested; the state machine only ever
    /// consults whether this is non-empty, but callers with independent
    /// interests (rendering vs. simulation) can request/release by reason
    /// without fighting over a shared boolean.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LoadReasons: u8 {
        const MANUAL     = 0b001;
        const RENDER     = 0b010;
        const SIMULATION = 0b100;
    }
}

/// Queried by a chunk with `wait_on_neighbors` set to check whether a
/// neighboring chunk is itself mid-way through becoming ready. Implemented
/// by [`crate::world::ChunkSet`]; kept as a trait here so this module
/// doesn't need to depend on the world registry that depends on it.
pub trait NeighborView {
    fn neighbor_intends_to_get_ready(&self, center: ChunkPosition) -> bool;

    /// Tells every already-active neighbor of `center` that `center` just
    /// activated, via [`ExtendedData::on_neighbor_activation`].
    fn notify_active_neighbors(&self, center: ChunkPosition);
}

/// A chunk's caller-owned auxiliary data (a render mesh, entity handles).
/// The core stores this behind its own [`Resource`] and never reads its
/// content, but calls these hooks at the points `SPEC_FULL.md` names them:
/// on entering `Active`, when a neighboring chunk activates, and on leaving
/// `Active`.
pub trait ExtendedData: Send + Sync + Default + 'static {
    fn on_activation(&mut self) {}

    fn on_neighbor_activation(&mut self, activated: ChunkPosition) {
        let _ = activated;
    }

    fn on_deactivation(&mut self) {}
}

impl ExtendedData for () {}

/// Shared, world-level dependencies every chunk's update needs: pools,
/// the world's generator/decorator/codec, and configuration. Cloned
/// cheaply (an `Arc` bundle) and handed to every [`Chunk::update`] call.
pub struct ChunkContext {
    pub config: Arc<WorldConfig>,
    pub generator: Arc<dyn Generator>,
    pub decorator: Arc<dyn Decorator>,
    pub codec: Arc<dyn Codec>,
    pub loading_pool: Arc<TaskPool>,
    pub generation_pool: Arc<TaskPool>,
    pub decoration_pool: Arc<TaskPool>,
    pub saving_pool: Arc<TaskPool>,
    pub executor: Arc<bevy_tasks::TaskPool>,
    pub neighbors: Arc<dyn NeighborView>,
}

impl ChunkContext {
    fn neighbor_intends_to_get_ready(&self, position: ChunkPosition) -> bool {
        self.neighbors.neighbor_intends_to_get_ready(position)
    }

    fn notify_active_neighbors(&self, position: ChunkPosition) {
        self.neighbors.notify_active_neighbors(position);
    }
}

/// Outcome of running a state's `on_update` for one tick.
pub enum Outcome {
    /// Still waiting on background work or access; try again next update.
    Parked,
    /// The state is done; move on to `declared_next` subject to request
    /// queue resolution.
    Transition {
        declared_next: StateKind,
        desc: state::TransitionDescription,
    },
}

/// One chunk's voxel storage plus lifecycle state.
///
/// `E` is the caller's extended/auxiliary data (e.g. a render mesh); the
/// core stores it behind its own [`Resource`] but never reads it.
pub struct Chunk<E: ExtendedData> {
    position: ChunkPosition,
    core_resource: Arc<Resource<Vec<Section>>>,
    extended_resource: Arc<Resource<E>>,
    core_guard: Option<Guard<Vec<Section>>>,
    extended_guard: Option<Guard<E>>,
    decoration: DecorationFlags,
    load_reasons: LoadReasons,
    pub(crate) block_ticks: Box<dyn TickScheduler>,
    pub(crate) fluid_ticks: Box<dyn TickScheduler>,
    state: ChunkState,
    entered: bool,
    neighbor_wait_count: u32,
    requests: RequestQueue,
    is_disposed: bool,
    disposal_saved: bool,
    tick: u64,
}

/// A chunk whose resource was read/written after it was disposed.
#[derive(Debug, thiserror::Error)]
#[error("operation attempted on a disposed chunk at {0}")]
pub struct UseAfterDisposal(pub ChunkPosition);

impl<E: ExtendedData> Chunk<E> {
    pub fn new(position: ChunkPosition) -> Self {
        Self::with_sections(position, (0..SECTIONS_PER_CHUNK).map(|_| Section::empty()).collect())
    }

    pub fn with_sections(position: ChunkPosition, sections: Vec<Section>) -> Self {
        debug_assert_eq!(sections.len(), SECTIONS_PER_CHUNK);
        Self {
            position,
            core_resource: Resource::new(sections),
            extended_resource: Resource::new(E::default()),
            core_guard: None,
            extended_guard: None,
            decoration: DecorationFlags::empty(),
            load_reasons: LoadReasons::empty(),
            block_ticks: Box::new(BinaryHeapTickScheduler::new()),
            fluid_ticks: Box::new(BinaryHeapTickScheduler::new()),
            state: ChunkState::Unloaded,
            entered: false,
            neighbor_wait_count: 0,
            requests: RequestQueue::default(),
            is_disposed: false,
            disposal_saved: false,
            tick: 0,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn position(&self) -> ChunkPosition {
        self.position
    }

    pub fn decoration(&self) -> DecorationFlags {
        self.decoration
    }

    pub fn state_kind(&self) -> StateKind {
        self.state.kind()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ChunkState::Active(_))
    }

    pub fn is_final(&self) -> bool {
        self.state.kind().descriptor().is_final
    }

    pub fn is_disposed(&self) -> bool {
        self.is_disposed
    }

    pub fn is_requested(&self) -> bool {
        !self.load_reasons.is_empty()
    }

    pub fn add_load_reason(&mut self, reason: LoadReasons) {
        self.load_reasons.insert(reason);
    }

    pub fn remove_load_reason(&mut self, reason: LoadReasons) {
        self.load_reasons.remove(reason);
    }

    pub fn core_resource(&self) -> Result<&Arc<Resource<Vec<Section>>>, UseAfterDisposal> {
        if self.is_disposed {
            return Err(UseAfterDisposal(self.position));
        }
        Ok(&self.core_resource)
    }

    pub fn extended_resource(&self) -> Result<&Arc<Resource<E>>, UseAfterDisposal> {
        if self.is_disposed {
            return Err(UseAfterDisposal(self.position));
        }
        Ok(&self.extended_resource)
    }

    /// Non-mutating check matching the access a state currently declares.
    pub fn can_acquire_core(&self, access: Access) -> bool {
        self.core_resource.can_acquire(access)
    }

    pub fn can_acquire_extended(&self, access: Access) -> bool {
        self.extended_resource.can_acquire(access)
    }

    /// Attempts to acquire the chunk's section storage at `access`. `Ok(None)`
    /// means the resource is currently held elsewhere; `Err` means the chunk
    /// has already been disposed.
    pub fn acquire_core(&self, access: Access) -> Result<Option<Guard<Vec<Section>>>, UseAfterDisposal> {
        Ok(self.core_resource()?.try_acquire(access))
    }

    pub fn acquire_extended(&self, access: Access) -> Result<Option<Guard<E>>, UseAfterDisposal> {
        Ok(self.extended_resource()?.try_acquire(access))
    }

    /// Schedules a block tick `offset` ticks from now, carried in `kind`.
    pub fn schedule_block_tick(&mut self, kind: u32, offset: u32) {
        self.block_ticks.schedule(kind, offset);
    }

    pub fn schedule_fluid_tick(&mut self, kind: u32, offset: u32) {
        self.fluid_ticks.schedule(kind, offset);
    }

    /// Tells this chunk, if it's active and holding its extended guard as
    /// `Write`, that the neighbor at `from` just activated.
    pub(crate) fn notify_neighbor_activated(&mut self, from: ChunkPosition) {
        if !self.is_active() {
            return;
        }
        if let Some(Guard::Write(guard)) = self.extended_guard.as_mut() {
            guard.get_mut().on_neighbor_activation(from);
        }
    }

    pub fn is_intending_to_get_ready(&self) -> bool {
        matches!(
            self.state.kind(),
            StateKind::Loading | StateKind::Generating | StateKind::Decorating
        )
    }

    pub fn request_next_state(&mut self, kind: StateKind, desc: RequestDescription) {
        self.requests.push(kind, desc, self.state.kind(), None, matches!(self.state, ChunkState::Deactivating));
    }

    /// Main-thread-only: atomically relinquish this chunk's write guards
    /// to a caller and park the chunk in [`StateKind::Used`].
    ///
    /// Succeeds only if the current state allows stealing and both guards
    /// are held as `Write`.
    pub fn try_steal_access(&mut self) -> Option<(crate::resource::WriteGuard<Vec<Section>>, crate::resource::WriteGuard<E>)> {
        if !self.state.kind().descriptor().allow_stealing {
            return None;
        }

        let core = self.core_guard.take()?.into_write()?;
        let extended = self.extended_guard.take()?.into_write()?;

        let was_active = matches!(self.state, ChunkState::Active(_));
        self.state = ChunkState::Used(states::Used { was_active });
        self.entered = false;

        Some((core, extended))
    }

    fn ensure_access(&mut self, descriptor: state::StateDescriptor) -> bool {
        if self.core_guard.is_none() && descriptor.core_access != Access::None {
            match self.core_resource.try_acquire(descriptor.core_access) {
                Some(guard) => self.core_guard = Some(guard),
                None => return false,
            }
        }

        if self.extended_guard.is_none() && descriptor.extended_access != Access::None {
            match self.extended_resource.try_acquire(descriptor.extended_access) {
                Some(guard) => self.extended_guard = Some(guard),
                None => return false,
            }
        }

        true
    }

    fn release_guards(&mut self) {
        self.core_guard = None;
        self.extended_guard = None;
    }

    /// Advances the state machine by at most
    /// [`MAX_TRANSITIONS_PER_UPDATE`] steps.
    pub fn update(&mut self, ctx: &ChunkContext) {
        if self.is_disposed {
            return;
        }

        self.tick += 1;

        for _ in 0..MAX_TRANSITIONS_PER_UPDATE {
            let descriptor = self.state.kind().descriptor();

            if !self.ensure_access(descriptor) {
                return;
            }

            if descriptor.wait_on_neighbors && !self.entered {
                if self.neighbor_wait_count < ctx.config.neighbor_wait_timeout_ticks
                    && ctx.neighbor_intends_to_get_ready(self.position)
                {
                    self.neighbor_wait_count += 1;
                    return;
                }
            }

            if !self.entered {
                states::on_enter(self, ctx);
                self.entered = true;
            }

            let outcome = states::on_update(self, ctx);

            let (declared_next, desc) = match outcome {
                Outcome::Parked => return,
                Outcome::Transition { declared_next, desc } => (declared_next, desc),
            };

            let currently_deactivating = matches!(self.state, ChunkState::Deactivating);
            let next_kind = state::choose_next(
                declared_next,
                desc,
                &mut self.requests,
                self.is_requested(),
                currently_deactivating,
            );

            if next_kind != declared_next {
                states::cleanup(self, ctx, declared_next);
            }

            states::on_exit(self, ctx);
            self.release_guards();
            self.entered = false;
            self.neighbor_wait_count = 0;

            self.state = states::construct(next_kind);

            if self.is_disposed {
                return;
            }
        }
    }
}
