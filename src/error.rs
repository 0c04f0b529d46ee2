//! Top-level error composition. Each subsystem owns a focused error enum
//! (`voxel::OutOfRange`, `config::ConfigError`, `world::WorldError`,
//! `chunk::UseAfterDisposal`); this module only aggregates the ones that can
//! legitimately cross a chunk's own boundary into caller-visible results,
//! mirroring the `#[error(transparent)]`/`#[from]` composition style of
//! `topo/world/error.rs`.

use crate::chunk::UseAfterDisposal;
use crate::config::ConfigError;
use crate::voxel::OutOfRange;
use crate::world::WorldError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Voxel(#[from] OutOfRange),

    #[error(transparent)]
    Chunk(#[from] UseAfterDisposal),
}
