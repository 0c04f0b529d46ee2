//! Concrete lifecycle states. Each variant carries only the in-flight data
//! its activity needs (a reserved pool slot, a spawned task); static
//! properties live in [`super::state::StateKind::descriptor`].
//!
//! Grounded on `topo/world/chunk.rs` for the state shapes and
//! `topo/worldgen/mod.rs` for the spawn/`poll_once` background-work idiom.

use bevy_tasks::futures_lite::future::{block_on, poll_once};
use bevy_tasks::Task;
use smallvec::SmallVec;

use crate::external::LoadingResult;
use crate::resource::{Guard, WriteGuard};
use crate::voxel::Section;

use super::state::{StateDescriptor, StateKind, TransitionDescription};
use super::{Chunk, ChunkContext, ChunkPosition, DecorationFlags, ExtendedData, Outcome, SECTIONS_PER_CHUNK};

pub struct Loading {
    slot: Option<crate::task_pool::Slot>,
    task: Option<Task<LoadingResult>>,
}

pub struct Generating {
    slot: Option<crate::task_pool::Slot>,
    task: Option<Task<Vec<Section>>>,
}

pub struct Decorating {
    slot: Option<crate::task_pool::Slot>,
    task: Option<Task<Vec<Section>>>,
    neighbor_guards: Vec<(ChunkPosition, WriteGuard<Vec<Section>>)>,
    corners: SmallVec<[DecorationFlags; 8]>,
}

pub struct Saving {
    slot: Option<crate::task_pool::Slot>,
    task: Option<Task<Result<(), crate::external::SaveError>>>,
}

pub struct Active;

pub struct Used {
    pub was_active: bool,
}

/// The tagged-variant lifecycle state. Replaces the source controller's
/// trait-object state hierarchy.
pub enum ChunkState {
    Unloaded,
    Loading(Loading),
    Generating(Generating),
    Decorating(Decorating),
    Saving(Saving),
    Hidden,
    Active(Active),
    Used(Used),
    Deactivating,
}

impl ChunkState {
    pub fn kind(&self) -> StateKind {
        match self {
            ChunkState::Unloaded => StateKind::Unloaded,
            ChunkState::Loading(_) => StateKind::Loading,
            ChunkState::Generating(_) => StateKind::Generating,
            ChunkState::Decorating(_) => StateKind::Decorating,
            ChunkState::Saving(_) => StateKind::Saving,
            ChunkState::Hidden => StateKind::Hidden,
            ChunkState::Active(_) => StateKind::Active,
            ChunkState::Used(_) => StateKind::Used,
            ChunkState::Deactivating => StateKind::Deactivating,
        }
    }
}

pub(super) fn construct(kind: StateKind) -> ChunkState {
    match kind {
        StateKind::Unloaded => ChunkState::Unloaded,
        StateKind::Loading => ChunkState::Loading(Loading { slot: None, task: None }),
        StateKind::Generating => ChunkState::Generating(Generating { slot: None, task: None }),
        StateKind::Decorating => ChunkState::Decorating(Decorating {
            slot: None,
            task: None,
            neighbor_guards: Vec::new(),
            corners: SmallVec::new(),
        }),
        StateKind::Saving => ChunkState::Saving(Saving { slot: None, task: None }),
        StateKind::Hidden => ChunkState::Hidden,
        StateKind::Active => ChunkState::Active(Active),
        StateKind::Used => ChunkState::Used(Used { was_active: false }),
        StateKind::Deactivating => ChunkState::Deactivating,
    }
}

fn write_guard<E: ExtendedData>(chunk: &mut Chunk<E>) -> Option<&mut WriteGuard<Vec<Section>>> {
    match chunk.core_guard.as_mut()? {
        Guard::Write(guard) => Some(guard),
        _ => None,
    }
}

pub(super) fn on_enter<E: ExtendedData>(chunk: &mut Chunk<E>, ctx: &ChunkContext) {
    match &chunk.state {
        ChunkState::Deactivating => {
            tracing::debug!(position = %chunk.position, "entering deactivating");
        }
        ChunkState::Active(_) => {
            tracing::trace!(position = %chunk.position, "chunk activated");
            if let Some(Guard::Write(guard)) = chunk.extended_guard.as_mut() {
                guard.get_mut().on_activation();
            }
            ctx.notify_active_neighbors(chunk.position);
        }
        _ => {}
    }
}

pub(super) fn on_exit<E: ExtendedData>(chunk: &mut Chunk<E>, _ctx: &ChunkContext) {
    if let ChunkState::Active(_) = &chunk.state {
        tracing::trace!(position = %chunk.position, "chunk deactivated from Active");
        if let Some(Guard::Write(guard)) = chunk.extended_guard.as_mut() {
            guard.get_mut().on_deactivation();
        }
    }
}

/// Invoked when the request-queue resolution overrides a state's declared
/// transition, so the state can release anything it reserved (e.g. a still
/// un-started task's pool slot) without running the original activity.
pub(super) fn cleanup<E: ExtendedData>(chunk: &mut Chunk<E>, _ctx: &ChunkContext, _declared_next: StateKind) {
    match &mut chunk.state {
        ChunkState::Loading(loading) => {
            loading.slot = None;
            loading.task = None;
        }
        ChunkState::Generating(generating) => {
            generating.slot = None;
            generating.task = None;
        }
        ChunkState::Saving(saving) => {
            saving.slot = None;
            saving.task = None;
        }
        ChunkState::Decorating(decorating) => {
            decorating.slot = None;
            decorating.task = None;
            decorating.neighbor_guards.clear();
        }
        _ => {}
    }
}

pub(super) fn on_update<E: ExtendedData>(chunk: &mut Chunk<E>, ctx: &ChunkContext) -> Outcome {
    match chunk.state.kind() {
        StateKind::Unloaded => update_unloaded(),
        StateKind::Loading => update_loading(chunk, ctx),
        StateKind::Generating => update_generating(chunk, ctx),
        StateKind::Decorating => update_decorating(chunk, ctx),
        StateKind::Saving => update_saving(chunk, ctx),
        StateKind::Hidden => update_hidden(chunk),
        StateKind::Active => update_active(chunk),
        StateKind::Used => update_used(chunk),
        StateKind::Deactivating => update_deactivating(chunk),
    }
}

fn update_unloaded() -> Outcome {
    Outcome::Transition {
        declared_next: StateKind::Loading,
        desc: TransitionDescription::REQUIRED,
    }
}

fn update_loading<E: ExtendedData>(chunk: &mut Chunk<E>, ctx: &ChunkContext) -> Outcome {
    let position = chunk.position;
    let ChunkState::Loading(loading) = &mut chunk.state else {
        unreachable!()
    };

    if loading.task.is_none() {
        let Some(slot) = ctx.loading_pool.try_allocate() else {
            return Outcome::Parked;
        };
        let codec = ctx.codec.clone();
        let directory = ctx.config.chunk_directory();
        let task = ctx.executor.spawn(async move { codec.load(&directory, position) });
        loading.slot = Some(slot);
        loading.task = Some(task);
        return Outcome::Parked;
    }

    let task = loading.task.as_mut().unwrap();
    let Some(result) = block_on(poll_once(task)) else {
        return Outcome::Parked;
    };

    loading.slot = None;
    loading.task = None;

    match result {
        LoadingResult::Success(data) => {
            if let Some(guard) = write_guard(chunk) {
                *guard.get_mut() = data.sections;
            }
            chunk.decoration.insert(data.decoration);
            chunk.block_ticks.restore(data.block_ticks);
            chunk.fluid_ticks.restore(data.fluid_ticks);
            Outcome::Transition {
                declared_next: StateKind::Hidden,
                desc: TransitionDescription::ALLOW,
            }
        }
        LoadingResult::IoError(error) => {
            tracing::debug!(%position, %error, "no chunk file on disk, regenerating");
            Outcome::Transition {
                declared_next: StateKind::Generating,
                desc: TransitionDescription::REQUIRED,
            }
        }
        LoadingResult::FormatError(message) | LoadingResult::ValidationError(message) => {
            tracing::error!(%position, message, "chunk file corrupt, regenerating");
            Outcome::Transition {
                declared_next: StateKind::Generating,
                desc: TransitionDescription::REQUIRED,
            }
        }
    }
}

fn update_generating<E: ExtendedData>(chunk: &mut Chunk<E>, ctx: &ChunkContext) -> Outcome {
    let position = chunk.position;
    let ChunkState::Generating(generating) = &mut chunk.state else {
        unreachable!()
    };

    if generating.task.is_none() {
        let Some(slot) = ctx.generation_pool.try_allocate() else {
            return Outcome::Parked;
        };
        let generator = ctx.generator.clone();
        let task = ctx.executor.spawn(async move {
            let mut sections: Vec<Section> = (0..SECTIONS_PER_CHUNK).map(|_| Section::empty()).collect();
            for (index, section) in sections.iter_mut().enumerate() {
                let sp = linear_to_section_position(index);
                generator
                    .generate_section(sp, position, section)
                    .unwrap_or_else(|error| panic!("generation failed for {position} at {sp:?}: {error}"));
            }
            generator
                .generate_structures(position, &mut sections)
                .unwrap_or_else(|error| panic!("structure generation failed for {position}: {error}"));
            sections
        });
        generating.slot = Some(slot);
        generating.task = Some(task);
        return Outcome::Parked;
    }

    let task = generating.task.as_mut().unwrap();
    let Some(sections) = block_on(poll_once(task)) else {
        return Outcome::Parked;
    };

    generating.slot = None;
    generating.task = None;

    if let Some(guard) = write_guard(chunk) {
        *guard.get_mut() = sections;
    }
    chunk.decoration.insert(DecorationFlags::CENTER);

    Outcome::Transition {
        declared_next: StateKind::Hidden,
        desc: TransitionDescription::ALLOW,
    }
}

fn linear_to_section_position(index: usize) -> crate::voxel::SectionPosition {
    let axis = super::SECTIONS_PER_AXIS as usize;
    let x = index / (axis * axis);
    let y = (index / axis) % axis;
    let z = index % axis;
    crate::voxel::SectionPosition::new(x as i32, y as i32, z as i32)
}

/// Builds the 3x3x3 section-neighbor view for `(x, y, z)` purely from
/// `sections`' own in-chunk grid (neighbors across a chunk boundary read as
/// `None`). Scoped simplification: the reference algorithm's corner passes
/// also read and write a neighbor *chunk's* own sections near the shared
/// edge; this core only has one chunk's guard content available to a
/// single decoration task and limits mutation to the center chunk's own
/// sections, while still holding every planned neighbor's write lock for
/// the duration (see `DecorationPlanner`) so no neighbor can progress
/// through a conflicting state concurrently.
fn decorate_in_chunk(decorator: &dyn crate::external::Decorator, sections: &mut [Section]) {
    let dim = super::SECTIONS_PER_AXIS;
    let snapshot = sections.to_vec();

    for x in 0..dim {
        for y in 0..dim {
            for z in 0..dim {
                let idx = section_linear_index(x, y, z);
                let mut neighbors: [Option<&Section>; 27] = [None; 27];

                for dx in -1..=1 {
                    for dy in -1..=1 {
                        for dz in -1..=1 {
                            let (nx, ny, nz) = (x + dx, y + dy, z + dz);
                            if (0..dim).contains(&nx) && (0..dim).contains(&ny) && (0..dim).contains(&nz) {
                                let nidx = section_linear_index(nx, ny, nz);
                                let slot = crate::util::neighbor_grid_index(dx, dy, dz).unwrap();
                                neighbors[slot] = Some(&snapshot[nidx]);
                            }
                        }
                    }
                }

                let mut center = snapshot[idx].clone();
                let position = linear_to_section_position(idx);
                decorator
                    .decorate_section(position, &neighbors, &mut center)
                    .unwrap_or_else(|error| panic!("decoration failed at {position:?}: {error}"));
                sections[idx] = center;
            }
        }
    }
}

fn section_linear_index(x: i32, y: i32, z: i32) -> usize {
    let axis = super::SECTIONS_PER_AXIS;
    (x * axis * axis + y * axis + z) as usize
}

fn update_decorating<E: ExtendedData>(chunk: &mut Chunk<E>, ctx: &ChunkContext) -> Outcome {
    let position = chunk.position;
    let ChunkState::Decorating(decorating) = &mut chunk.state else {
        unreachable!()
    };

    if decorating.task.is_none() {
        let Some(slot) = ctx.decoration_pool.try_allocate() else {
            return Outcome::Parked;
        };

        let mut sections = match chunk.core_guard.as_ref() {
            Some(Guard::Write(guard)) => guard.get().clone(),
            _ => return Outcome::Parked,
        };

        let decorator = ctx.decorator.clone();
        let corner_count = decorating.corners.len();
        tracing::trace!(%position, corners = corner_count, "decorating");

        let task = ctx.executor.spawn(async move {
            decorate_in_chunk(decorator.as_ref(), &mut sections);
            sections
        });

        decorating.slot = Some(slot);
        decorating.task = Some(task);
        return Outcome::Parked;
    }

    let task = decorating.task.as_mut().unwrap();
    let Some(updated_sections) = block_on(poll_once(task)) else {
        return Outcome::Parked;
    };

    decorating.slot = None;
    decorating.task = None;
    let corners = std::mem::take(&mut decorating.corners);
    decorating.neighbor_guards.clear();

    if let Some(Guard::Write(guard)) = chunk.core_guard.as_mut() {
        *guard.get_mut() = updated_sections;
    }

    for corner in corners {
        chunk.decoration.insert(corner);
    }

    Outcome::Transition {
        declared_next: StateKind::Hidden,
        desc: TransitionDescription::ALLOW,
    }
}

fn update_saving<E: ExtendedData>(chunk: &mut Chunk<E>, ctx: &ChunkContext) -> Outcome {
    let position = chunk.position;
    let ChunkState::Saving(saving) = &mut chunk.state else {
        unreachable!()
    };

    if saving.task.is_none() {
        let Some(slot) = ctx.saving_pool.try_allocate() else {
            return Outcome::Parked;
        };

        let sections: Vec<Section> = match chunk.core_guard.as_ref() {
            Some(Guard::Read(guard)) => guard.get().clone(),
            Some(Guard::Write(guard)) => guard.get().clone(),
            _ => return Outcome::Parked,
        };

        let tick = chunk.tick;
        let data = crate::external::PersistedChunk {
            sections,
            decoration: chunk.decoration,
            block_ticks: chunk.block_ticks.snapshot(tick),
            fluid_ticks: chunk.fluid_ticks.snapshot(tick),
        };

        let codec = ctx.codec.clone();
        let directory = ctx.config.chunk_directory();
        let task = ctx.executor.spawn(async move { codec.save(&directory, position, &data) });
        saving.slot = Some(slot);
        saving.task = Some(task);
        return Outcome::Parked;
    }

    let task = saving.task.as_mut().unwrap();
    let Some(result) = block_on(poll_once(task)) else {
        return Outcome::Parked;
    };

    saving.slot = None;
    saving.task = None;

    if let Err(error) = result {
        tracing::error!(%position, %error, "save failed, continuing");
    }

    chunk.disposal_saved = true;

    Outcome::Transition {
        declared_next: StateKind::Hidden,
        desc: TransitionDescription {
            prioritize_deactivation: true,
            prioritize_loop: false,
            required: false,
        },
    }
}

fn update_hidden<E: ExtendedData>(chunk: &mut Chunk<E>) -> Outcome {
    if chunk.decoration.is_complete() {
        Outcome::Transition {
            declared_next: StateKind::Active,
            desc: TransitionDescription::ALLOW,
        }
    } else {
        Outcome::Transition {
            declared_next: StateKind::Hidden,
            desc: TransitionDescription::ALLOW,
        }
    }
}

fn update_active<E: ExtendedData>(chunk: &mut Chunk<E>) -> Outcome {
    let ChunkState::Active(_) = &chunk.state else {
        unreachable!()
    };

    let tick = chunk.tick;
    chunk.block_ticks.process(tick);
    chunk.fluid_ticks.process(tick);

    Outcome::Transition {
        declared_next: StateKind::Active,
        desc: TransitionDescription::ALLOW,
    }
}

fn update_used<E: ExtendedData>(chunk: &mut Chunk<E>) -> Outcome {
    let ChunkState::Used(used) = &chunk.state else {
        unreachable!()
    };

    // [Open question decision] re-activation out of Used is always weak:
    // it goes through the ordinary allow-path rather than forcing its way
    // back ahead of queued requests. See DESIGN.md.
    let declared_next = if used.was_active {
        StateKind::Active
    } else {
        StateKind::Hidden
    };

    Outcome::Transition {
        declared_next,
        desc: TransitionDescription::ALLOW,
    }
}

fn update_deactivating<E: ExtendedData>(chunk: &mut Chunk<E>) -> Outcome {
    if chunk.is_requested() {
        // [Open question decision] re-requesting a deactivating chunk
        // resumes service at ready-but-not-active rather than restarting
        // load/generate, since its sections never left memory. See
        // DESIGN.md.
        chunk.disposal_saved = false;
        return Outcome::Transition {
            declared_next: StateKind::Hidden,
            desc: TransitionDescription::REQUIRED,
        };
    }

    if !chunk.disposal_saved {
        return Outcome::Transition {
            declared_next: StateKind::Saving,
            desc: TransitionDescription {
                prioritize_deactivation: false,
                prioritize_loop: false,
                required: true,
            },
        };
    }

    chunk.is_disposed = true;
    Outcome::Transition {
        declared_next: StateKind::Deactivating,
        desc: TransitionDescription {
            prioritize_deactivation: false,
            prioritize_loop: false,
            required: true,
        },
    }
}

/// Supplies the center chunk's own write guard, the neighbor guards, and
/// the decoratable corners for a chunk whose [`super::state::StateKind::Hidden`]
/// check found itself ready, driven by
/// [`crate::decoration::try_plan`] since planning needs visibility into
/// sibling chunks this module doesn't have.
pub fn begin_decoration<E: ExtendedData>(
    chunk: &mut Chunk<E>,
    core_guard: WriteGuard<Vec<Section>>,
    corners: SmallVec<[DecorationFlags; 8]>,
    neighbor_guards: Vec<(ChunkPosition, WriteGuard<Vec<Section>>)>,
) {
    debug_assert_eq!(chunk.state.kind(), StateKind::Hidden);
    chunk.entered = false;
    chunk.neighbor_wait_count = 0;
    chunk.core_guard = Some(Guard::Write(core_guard));
    chunk.state = ChunkState::Decorating(Decorating {
        slot: None,
        task: None,
        neighbor_guards,
        corners,
    });
}

/// Static descriptor lookup re-exported for callers outside this module
/// that only have a [`StateKind`] in hand (e.g. the decoration planner
/// checking whether a neighbor is stealable).
pub fn descriptor(kind: StateKind) -> StateDescriptor {
    kind.descriptor()
}
