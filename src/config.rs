//! World-level configuration: task pool ceilings, the world size bound,
//! and on-disk layout roots.
//!
//! Shaped after `steel-world`'s `ServerConfig` (validated, serde-backed,
//! with a sane `Default`), adapted to this core's own knobs since the
//! primary source repo has no single equivalent top-level config struct.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration error raised by [`WorldConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("block_limit must be positive, got {0}")]
    NonPositiveBlockLimit(i64),
    #[error("{pool} pool limit must be at least 1, got {limit}")]
    PoolLimitTooSmall { pool: &'static str, limit: usize },
    #[error("neighbor_wait_timeout_ticks must be at least 1, got {0}")]
    NonPositiveNeighborWaitTimeout(u32),
}

/// Per-world tunables governing chunk concurrency and storage layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// The largest absolute block coordinate a chunk may occupy along any
    /// axis; requests for chunks outside this bound are silently ignored.
    pub block_limit: i64,
    pub max_loading_tasks: usize,
    pub max_generation_tasks: usize,
    pub max_decoration_tasks: usize,
    pub max_saving_tasks: usize,
    /// Update ticks a state with `wait_on_neighbors` set will defer entry
    /// while a neighbor intends to ready itself.
    pub neighbor_wait_timeout_ticks: u32,
    pub world_directory: PathBuf,
}

impl WorldConfig {
    pub fn chunk_directory(&self) -> PathBuf {
        self.world_directory.join("Chunks")
    }

    pub fn blob_directory(&self) -> PathBuf {
        self.world_directory.join("Blobs")
    }

    pub fn script_directory(&self) -> PathBuf {
        self.world_directory.join("Scripts")
    }

    pub fn debug_directory(&self) -> PathBuf {
        self.world_directory.join("Debug")
    }

    pub fn info_file(&self) -> PathBuf {
        self.world_directory.join("info.json")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_limit <= 0 {
            return Err(ConfigError::NonPositiveBlockLimit(self.block_limit));
        }

        for (pool, limit) in [
            ("loading", self.max_loading_tasks),
            ("generation", self.max_generation_tasks),
            ("decoration", self.max_decoration_tasks),
            ("saving", self.max_saving_tasks),
        ] {
            if limit == 0 {
                return Err(ConfigError::PoolLimitTooSmall { pool, limit });
            }
        }

        if self.neighbor_wait_timeout_ticks == 0 {
            return Err(ConfigError::NonPositiveNeighborWaitTimeout(
                self.neighbor_wait_timeout_ticks,
            ));
        }

        Ok(())
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            block_limit: 30_000_000,
            max_loading_tasks: 4,
            max_generation_tasks: 4,
            max_decoration_tasks: 2,
            max_saving_tasks: 2,
            neighbor_wait_timeout_ticks: 10,
            world_directory: PathBuf::from("world"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(WorldConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_pool_limit_is_rejected() {
        let mut config = WorldConfig::default();
        config.max_decoration_tasks = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::PoolLimitTooSmall {
                pool: "decoration",
                limit: 0
            })
        );
    }

    #[test]
    fn non_positive_block_limit_is_rejected() {
        let mut config = WorldConfig::default();
        config.block_limit = 0;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveBlockLimit(0)));
    }

    #[test]
    fn directory_layout_is_rooted_at_world_directory() {
        let mut config = WorldConfig::default();
        config.world_directory = PathBuf::from("/srv/myworld");
        assert_eq!(config.chunk_directory(), PathBuf::from("/srv/myworld/Chunks"));
        assert_eq!(config.info_file(), PathBuf::from("/srv/myworld/info.json"));
    }
}
