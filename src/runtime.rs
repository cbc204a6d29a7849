/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The root `Runtime`: owns every pipeline component for one engine shard
//! and drives the iteration loop end to end (spec §9: "a root object owning
//! every component, with a fixed teardown order").

use crate::config::Config;
use crate::error::Result;
use crate::global_reducer::ProcessingRateTracker;
use crate::kernel::{Kernel, KernelState, Vertices};
use crate::offset_table::OffsetTable;
use crate::storage::{BlockFetch, DirBlockFetch, MmapBlockFetch};
use crate::tile::Tile;
use crate::vertex::VertexState;
use crate::vertex_applier;
use crate::vertex_domain;
use crate::vertex_reducer::VertexLockTable;
use dsi_progress_logger::prelude::*;
use std::path::PathBuf;

/// Per-vertex final value, in the format `--log` emits (spec §6:
/// "`<original_id> <value>` lines in ascending global id order"):
/// `dense_id` drives the sort order, `orig_id` is what gets printed.
pub struct LoggedVertex<V> {
    pub dense_id: u64,
    pub orig_id: u64,
    pub value: V,
}

/// Owns the storage backend, vertex state, and offset table for one engine
/// shard. Field order matches the mandated teardown order — appliers (no
/// owned resources, dropped implicitly first), reducers' lock table,
/// processors (stateless), fetchers (stateless), the offset table (readers'
/// output), then the storage handle last (spec §9's fixed teardown:
/// appliers → reducers → processors → fetchers → readers → buffers).
pub struct Runtime<K: Kernel> {
    locks: VertexLockTable,
    offsets: OffsetTable<Tile>,
    fetch: Box<dyn BlockFetch>,
    vertices: VertexState<K::Value>,
    vertex_to_tile_index: Box<[Box<[u64]>]>,
    global_stats: crate::storage::GlobalStats,
    global_to_orig: Box<[u64]>,
    kernel_state: KernelState,
}

impl<K: Kernel> Runtime<K> {
    /// Opens storage for engine shard 0 (spec's multi-engine `nmic` sharding
    /// is accepted by [`Config`] but, per spec.md's Non-goals on distributed
    /// execution, only a single shard is actually driven by this binary).
    pub fn open(config: &Config) -> Result<Self> {
        let paths_tile = Config::split_paths(&config.paths_tile);
        let paths_meta = Config::split_paths(&config.paths_meta);
        // `--in-memory-mode 0` maps tile files read-only instead of copying
        // them onto the heap (spec §6).
        let fetch: Box<dyn BlockFetch> = if config.in_memory_mode == 0 {
            Box::new(MmapBlockFetch::new(paths_tile[0].clone(), paths_meta[0].clone()))
        } else {
            Box::new(DirBlockFetch::new(paths_tile[0].clone(), paths_meta[0].clone()))
        };

        let global_stats = fetch.read_global_stats()?;
        let degrees = fetch.read_degrees()?;
        let vertex_to_tile_index = fetch.read_vertex_to_tile_index()?;

        let count = global_stats.count_vertices as usize;
        let global_to_orig = fetch.read_global_to_orig(count, global_stats.is_index_32_bits)?;

        // `--source-vertex` is given in original-id space (spec §8, S6:
        // "running BFS from source id = 100" on a 4-vertex graph — 100 is
        // not a valid dense id there), so resolve it against the reverse of
        // `global_to_orig` before it reaches the kernel, which only ever
        // sees dense ids.
        let source_vertex = config
            .source_vertex
            .and_then(|orig| global_to_orig.iter().position(|&o| o == orig).map(|dense| dense as u64));
        let kernel_state = KernelState {
            seed: config.seed,
            source_vertex,
        };

        let vertices = VertexState::<K::Value>::new(count, degrees);
        let offsets = OffsetTable::new(global_stats.count_tiles as usize);
        let locks = VertexLockTable::new(count);

        Ok(Runtime {
            locks,
            offsets,
            fetch,
            vertices,
            vertex_to_tile_index,
            global_stats,
            global_to_orig,
            kernel_state,
        })
    }

    /// Runs the full iteration loop, returning the final per-vertex values
    /// in ascending dense id order.
    pub fn run(&mut self, config: &Config) -> Result<Vec<LoggedVertex<K::Value>>> {
        let kernel_state = self.kernel_state.clone();
        let kernel_state = &kernel_state;
        {
            let current_snapshot = self.vertices.current.clone();
            let mut view = Vertices {
                current: &current_snapshot,
                next: &mut self.vertices.next,
                degrees: &self.vertices.degrees,
            };
            K::init_vertices(&mut view, kernel_state);
        }
        self.vertices.swap_and_reset();
        // Seed `active_current` directly (not via another `swap_and_reset`,
        // which would also swap `current`/`next` back and discard the
        // values `init_vertices` just published into `current`).
        use std::sync::atomic::Ordering;
        if let Some(src) = kernel_state.source_vertex {
            if (src as usize) < self.vertices.count {
                self.vertices.active_current.set(src as usize, true, Ordering::Relaxed);
            }
        } else {
            for id in 0..self.vertices.count {
                self.vertices.active_current.set(id, true, Ordering::Relaxed);
            }
        }

        let mut pl = ProgressLogger::default();
        pl.item_name("iteration");
        pl.start("running tilegraph iterations");

        let mut tile_break_point = vertex_domain::MIN_TILE_BREAK_POINT;
        let mut rate_tracker = ProcessingRateTracker::new(0.3);

        for iteration in 0..config.max_iterations {
            let started = vertex_domain::now();
            let outcome = vertex_domain::run_round::<K>(
                self.fetch.as_ref(),
                &self.offsets,
                &mut self.vertices,
                &self.vertex_to_tile_index,
                &self.global_stats,
                tile_break_point,
                config,
                kernel_state,
                &self.locks,
            )?;
            let elapsed = started.elapsed();

            // `apply` must write its output into `vertices.next` before
            // `finish_round`'s swap promotes that buffer to the new
            // `vertices.current` (spec §4.7) — otherwise `K::apply`'s output
            // (e.g. PageRank's/BP's normalization) is swapped away unread.
            vertex_applier::apply_round::<K>(&mut self.vertices, kernel_state, iteration + 1);

            let finish = vertex_domain::finish_round::<K>(
                &mut self.vertices,
                &mut rate_tracker,
                &outcome,
                elapsed,
                iteration,
                config.max_iterations,
                config.host_tiles_rb_size,
                config.count_tile_processors,
                kernel_state,
            );
            tile_break_point = finish.next_tile_break_point;

            pl.update();
            log::info!(
                "iteration {iteration}: {} tiles, {} edges, {} active vertices",
                outcome.tiles_processed,
                outcome.edges_processed,
                finish.active_count
            );

            if finish.should_terminate {
                break;
            }
        }
        pl.done();

        let mut out = Vec::with_capacity(self.vertices.count);
        for id in 0..self.vertices.count {
            out.push(LoggedVertex {
                dense_id: id as u64,
                orig_id: self.global_to_orig[id],
                value: self.vertices.current[id],
            });
        }
        Ok(out)
    }
}

/// Writes the final vertex values to `path` (or stdout when `None`) in the
/// `<original_id> <value>` format of spec §6.
pub fn write_log<V: std::fmt::Debug>(path: Option<&PathBuf>, rows: &[LoggedVertex<V>]) -> Result<()> {
    use std::io::Write;
    let mut out: Box<dyn Write> = match path {
        Some(p) => Box::new(std::fs::File::create(p).map_err(|e| crate::error::EngineError::io(p, e))?),
        None => Box::new(std::io::stdout()),
    };
    for row in rows {
        writeln!(out, "{} {:?}", row.orig_id, row.value).map_err(|e| crate::error::EngineError::io(path.cloned().unwrap_or_default(), e))?;
    }
    Ok(())
}
