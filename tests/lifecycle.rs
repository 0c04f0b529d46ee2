//! Multi-chunk end-to-end scenarios exercising a real [`ChunkSet`] against
//! fake `Generator`/`Decorator`/`Codec` test doubles, the way the reference
//! engine's own integration-style chunk tests are set up.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use voxel_chunk_core::chunk::{ChunkPosition, DecorationFlags, ExtendedData, SECTIONS_PER_AXIS};
use voxel_chunk_core::config::WorldConfig;
use voxel_chunk_core::external::{Codec, Decorator, GenerationError, Generator, LoadingResult, PersistedChunk, SaveError};
use voxel_chunk_core::resource::Access;
use voxel_chunk_core::voxel::{Cell, LiquidLevel, LocalPos, Section, SectionPosition};
use voxel_chunk_core::world::ChunkSet;

const STONE: u32 = 1;

fn run_until<E: ExtendedData>(set: &ChunkSet<E>, ticks: u32, mut done: impl FnMut(&ChunkSet<E>) -> bool) -> bool {
    for _ in 0..ticks {
        set.update_all();
        if done(set) {
            return true;
        }
    }
    done(set)
}

struct StoneColumnGenerator;

impl Generator for StoneColumnGenerator {
    fn generate_section(&self, position: SectionPosition, _chunk: ChunkPosition, section: &mut Section) -> Result<(), GenerationError> {
        // Fills every cell for y < 32 with Stone; sections are 16 cells tall,
        // so only section rows 0 and 1 receive any stone.
        if position.y >= 2 {
            return Ok(());
        }
        let cell = Cell::encode(STONE, 0, 0, LiquidLevel::One, false).unwrap();
        for x in 0..16 {
            for y in 0..16 {
                for z in 0..16 {
                    section.set(LocalPos::new(x, y, z).unwrap(), cell);
                }
            }
        }
        Ok(())
    }

    fn generate_structures(&self, _chunk: ChunkPosition, _sections: &mut [Section]) -> Result<(), GenerationError> {
        Ok(())
    }
}

struct NoopDecorator;

impl Decorator for NoopDecorator {
    fn decorate_section(&self, _position: SectionPosition, _neighbors: &[Option<&Section>; 27], _center: &mut Section) -> Result<(), GenerationError> {
        Ok(())
    }
}

struct AlwaysMissingCodec;

impl Codec for AlwaysMissingCodec {
    fn load(&self, _directory: &Path, _position: ChunkPosition) -> LoadingResult {
        LoadingResult::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "no chunk file"))
    }

    fn save(&self, _directory: &Path, _position: ChunkPosition, _data: &PersistedChunk) -> Result<(), SaveError> {
        Ok(())
    }
}

#[derive(Default)]
struct CountingSaveCodec {
    saves: Arc<AtomicUsize>,
}

impl Codec for CountingSaveCodec {
    fn load(&self, _directory: &Path, _position: ChunkPosition) -> LoadingResult {
        LoadingResult::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "no chunk file"))
    }

    fn save(&self, _directory: &Path, _position: ChunkPosition, _data: &PersistedChunk) -> Result<(), SaveError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn make_set_with_codec<E: ExtendedData>(codec: Arc<dyn Codec>) -> ChunkSet<E> {
    ChunkSet::new(
        WorldConfig::default(),
        Arc::new(StoneColumnGenerator),
        Arc::new(NoopDecorator),
        codec,
        Arc::new(bevy_tasks::TaskPool::new()),
    )
}

fn make_set<E: ExtendedData>() -> ChunkSet<E> {
    make_set_with_codec(Arc::new(AlwaysMissingCodec))
}

/// S1: a missing save file falls back to generation, and the generated
/// column contains stone below y = 32.
#[test]
fn missing_chunk_file_falls_back_to_generation_and_reaches_active() {
    let set: ChunkSet<()> = make_set();
    let position = ChunkPosition::new(1, 0, 0);
    set.request(position);

    let became_active = run_until(&set, 20, |set| set.get_active(position).is_some());
    assert!(became_active);

    let chunk_ref = set.get_any(position).unwrap();
    let (core_guard, extended_guard) = chunk_ref
        .with_mut(|chunk| chunk.try_steal_access())
        .expect("active chunk should allow stealing");
    let cell = core_guard.get()[0].get(LocalPos::new(0, 0, 0).unwrap());
    assert_eq!(cell.block(), STONE);
    drop(core_guard);
    drop(extended_guard);
}

/// S2: a fully-surrounded 3x3x3 block of requested chunks eventually
/// finishes decorating the center chunk completely.
#[test]
fn a_surrounded_block_of_chunks_fully_decorates_the_center() {
    let set: ChunkSet<()> = make_set();

    for dx in -1..=1 {
        for dy in -1..=1 {
            for dz in -1..=1 {
                set.request(ChunkPosition::new(dx, dy, dz));
            }
        }
    }

    let fully_decorated = run_until(&set, 200, |set| {
        set.get_any(ChunkPosition::ORIGIN)
            .map(|c| c.with(|chunk| chunk.decoration().is_complete()))
            .unwrap_or(false)
    });

    assert!(fully_decorated, "center chunk never reached full decoration");
}

/// S3: stealing access from an active chunk parks it in `Used`, excludes
/// further acquisition until the guards are dropped, and the chunk
/// resumes `Active` afterward.
#[test]
fn stealing_access_from_an_active_chunk_parks_and_resumes() {
    let set: ChunkSet<()> = make_set();
    let position = ChunkPosition::new(3, 0, 0);
    set.request(position);
    assert!(run_until(&set, 20, |set| set.get_active(position).is_some()));

    let chunk_ref = set.get_any(position).unwrap();
    let stolen = chunk_ref.with_mut(|chunk| chunk.try_steal_access());
    let (core_guard, extended_guard) = stolen.expect("active chunk should allow stealing");

    let reacquired = chunk_ref.with(|chunk| chunk.acquire_core(Access::Read));
    assert!(matches!(reacquired, Ok(None)));

    drop(core_guard);
    drop(extended_guard);

    assert!(run_until(&set, 5, |set| set.get_active(position).is_some()));
}

/// S5: releasing a chunk after one update disposes it, saving exactly
/// once along the way.
#[test]
fn released_chunk_saves_exactly_once_before_disposal() {
    let saves = Arc::new(AtomicUsize::new(0));
    let codec: Arc<dyn Codec> = Arc::new(CountingSaveCodec { saves: saves.clone() });
    let set: ChunkSet<()> = make_set_with_codec(codec);

    let position = ChunkPosition::new(4, 0, 0);
    set.request(position);
    set.update_all();
    set.release(position);

    let disposed = run_until(&set, 20, |set| set.get_any(position).is_none());
    assert!(disposed, "released chunk was never disposed");
    assert_eq!(saves.load(Ordering::SeqCst), 1);
}

/// S6: a saturated loading pool (cap 1) still lets every requested chunk
/// reach `Active` eventually, one load in flight at a time.
#[test]
fn saturated_loading_pool_still_lets_every_chunk_activate() {
    let mut config = WorldConfig::default();
    config.max_loading_tasks = 1;
    let set: ChunkSet<()> = ChunkSet::new(
        config,
        Arc::new(StoneColumnGenerator),
        Arc::new(NoopDecorator),
        Arc::new(AlwaysMissingCodec),
        Arc::new(bevy_tasks::TaskPool::new()),
    );

    let positions = [ChunkPosition::new(5, 0, 0), ChunkPosition::new(6, 0, 0), ChunkPosition::new(7, 0, 0)];
    for position in positions {
        set.request(position);
    }

    let all_active = run_until(&set, 60, |set| positions.iter().all(|p| set.get_active(*p).is_some()));
    assert!(all_active, "not every chunk reached active under a saturated loading pool");
}

#[test]
fn decoration_bits_never_clear_across_a_long_update_sequence() {
    let set: ChunkSet<()> = make_set();
    let position = ChunkPosition::new(8, 0, 0);
    set.request(position);

    let mut previous = DecorationFlags::empty();
    for _ in 0..30 {
        set.update_all();
        if let Some(chunk_ref) = set.get_any(position) {
            let current = chunk_ref.with(|chunk| chunk.decoration());
            assert!(previous.difference(current).is_empty(), "a decoration bit cleared");
            previous = current;
        }
    }
}

const _: () = assert!(SECTIONS_PER_AXIS == 4);
