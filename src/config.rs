/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The CLI surface (spec §6) and its validation.

use crate::error::EngineError;
use crate::kernels::AlgorithmKind;
use std::path::PathBuf;

/// Strategy for materializing a tile's source vertex values (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LocalFetcherMode {
    GlobalFetcher,
    DirectAccess,
    ConstantValue,
    Fake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum GlobalFetcherMode {
    Active,
    ConstantValue,
}

/// Strategy for reducing `ProcessedBlock`s into global vertex state
/// (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LocalReducerMode {
    GlobalReducer,
    Locking,
    Atomic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum TileProcessorMode {
    Active,
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum TileProcessorInputMode {
    VertexFetcher,
    FakeVertexFetcher,
    ConstantValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum TileProcessorOutputMode {
    VertexReducer,
    FakeVertexReducer,
    Noop,
}

/// The full CLI surface of spec §6, one field per flag.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(clap::Parser))]
#[cfg_attr(feature = "cli", command(name = "tilegraph", disable_help_subcommand = true))]
pub struct Config {
    #[cfg_attr(feature = "cli", arg(long, value_enum))]
    pub algorithm: AlgorithmKind,
    #[cfg_attr(feature = "cli", arg(long))]
    pub max_iterations: u64,
    #[cfg_attr(feature = "cli", arg(long))]
    pub nmic: usize,
    #[cfg_attr(feature = "cli", arg(long))]
    pub count_applier: usize,
    #[cfg_attr(feature = "cli", arg(long))]
    pub count_globalreducer: usize,
    #[cfg_attr(feature = "cli", arg(long))]
    pub count_globalfetcher: usize,
    #[cfg_attr(feature = "cli", arg(long))]
    pub count_indexreader: usize,
    #[cfg_attr(feature = "cli", arg(long))]
    pub count_vertex_reducer: usize,
    #[cfg_attr(feature = "cli", arg(long))]
    pub count_vertex_fetcher: usize,
    #[cfg_attr(feature = "cli", arg(long))]
    pub count_tile_processors: usize,
    #[cfg_attr(feature = "cli", arg(long))]
    pub count_followers: usize,
    #[cfg_attr(feature = "cli", arg(long))]
    pub count_tile_reader: usize,
    #[cfg_attr(feature = "cli", arg(long))]
    pub in_memory_mode: u8,
    /// One path per engine, `:`-separated.
    #[cfg_attr(feature = "cli", arg(long))]
    pub paths_meta: String,
    #[cfg_attr(feature = "cli", arg(long))]
    pub paths_tile: String,
    #[cfg_attr(feature = "cli", arg(long))]
    pub path_globals: PathBuf,
    #[cfg_attr(feature = "cli", arg(long))]
    pub use_selective_scheduling: u8,
    #[cfg_attr(feature = "cli", arg(long))]
    pub enable_tile_partitioning: u8,
    #[cfg_attr(feature = "cli", arg(long))]
    pub enable_fault_tolerance: u8,
    #[cfg_attr(feature = "cli", arg(long))]
    pub path_fault_tolerance_output: Option<PathBuf>,
    #[cfg_attr(feature = "cli", arg(long, value_enum))]
    pub local_fetcher_mode: LocalFetcherMode,
    #[cfg_attr(feature = "cli", arg(long, value_enum))]
    pub global_fetcher_mode: GlobalFetcherMode,
    #[cfg_attr(feature = "cli", arg(long, value_enum))]
    pub local_reducer_mode: LocalReducerMode,
    #[cfg_attr(feature = "cli", arg(long, value_enum))]
    pub tile_processor_mode: TileProcessorMode,
    #[cfg_attr(feature = "cli", arg(long, value_enum))]
    pub tile_processor_input_mode: TileProcessorInputMode,
    #[cfg_attr(feature = "cli", arg(long, value_enum))]
    pub tile_processor_output_mode: TileProcessorOutputMode,
    #[cfg_attr(feature = "cli", arg(long))]
    pub host_tiles_rb_size: usize,
    #[cfg_attr(feature = "cli", arg(long))]
    pub processed_rb_size: usize,
    #[cfg_attr(feature = "cli", arg(long))]
    pub read_tiles_rb_size: usize,
    #[cfg_attr(feature = "cli", arg(long))]
    pub use_smt: u8,
    #[cfg_attr(feature = "cli", arg(long))]
    pub log: Option<PathBuf>,
    /// Source vertex for `bfs`/`sssp`, given as an *original* id (spec §8,
    /// S6: "running BFS from source `id = 100`" on a 4-vertex graph — 100
    /// is only meaningful as an original id, resolved against
    /// `global-to-orig.dat` at startup). Not part of spec.md's own CLI flag
    /// table, added here because those two kernels are otherwise
    /// unreachable without it.
    #[cfg_attr(feature = "cli", arg(long))]
    pub source_vertex: Option<u64>,
    /// Random seed threaded through `KernelState` (spec §9: "kernel_state
    /// instead of global mutable state").
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 0))]
    pub seed: u64,
}

impl Config {
    /// Splits a `":"`-joined path list, one entry per engine.
    pub fn split_paths(s: &str) -> Vec<PathBuf> {
        s.split(':').filter(|p| !p.is_empty()).map(PathBuf::from).collect()
    }

    /// Validates cross-field constraints that `clap`'s per-field parsing
    /// cannot express, raising [`EngineError::Config`] on a missing or
    /// inconsistent value (spec §6's "error on missing" / §7's
    /// `ConfigError`).
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_iterations == 0 {
            return Err(EngineError::Config("--max-iterations must be >= 1".into()));
        }
        if self.nmic == 0 {
            return Err(EngineError::Config("--nmic must be >= 1".into()));
        }
        let meta = Self::split_paths(&self.paths_meta);
        let tile = Self::split_paths(&self.paths_tile);
        if meta.len() != self.nmic {
            return Err(EngineError::Config(format!(
                "--paths-meta must list exactly {} path(s), got {}",
                self.nmic,
                meta.len()
            )));
        }
        if tile.len() != self.nmic {
            return Err(EngineError::Config(format!(
                "--paths-tile must list exactly {} path(s), got {}",
                self.nmic,
                tile.len()
            )));
        }
        if self.count_tile_processors == 0 {
            return Err(EngineError::Config("--count-tile-processors must be >= 1".into()));
        }
        if self.local_fetcher_mode != LocalFetcherMode::GlobalFetcher && self.count_globalfetcher > 0 {
            log::warn!("--count-globalfetcher is ignored unless --local-fetcher-mode=GlobalFetcher");
        }
        if self.local_reducer_mode != LocalReducerMode::GlobalReducer && self.count_globalreducer > 0 {
            log::warn!("--count-globalreducer is ignored unless --local-reducer-mode=GlobalReducer");
        }
        if matches!(self.algorithm, crate::kernels::AlgorithmKind::Bfs | crate::kernels::AlgorithmKind::Sssp) && self.source_vertex.is_none() {
            return Err(EngineError::Config("--source-vertex is required for bfs/sssp".into()));
        }
        Ok(())
    }
}
