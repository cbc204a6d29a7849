/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! `VertexDomain` (spec §4.9): the per-iteration round driver. Ties together
//! the readers, `VertexFetcher`, `TileProcessor`, `VertexReducer`,
//! `GlobalReducer` and `VertexApplier` stages into one synchronous round,
//! then performs the round-boundary bookkeeping (swap, recompute
//! `tile_break_point`, termination check, `pre_processing_per_round`).
//!
//! Tiles within a round are fetched/processed/reduced one at a time rather
//! than fanned out across tiles (each tile's partitions and followers still
//! run in parallel via `tile_processor::run_tile_partition`'s
//! `std::thread::scope`): this keeps `vertices.next` under a single
//! exclusive borrow for the whole round instead of requiring a
//! synchronized shared-write view across tiles. A scope reduction from the
//! teacher's fully pipelined, cross-tile-parallel stages; recorded in
//! `DESIGN.md`.

use crate::config::Config;
use crate::error::Result;
use crate::global_reducer::{self, ProcessingRateTracker};
use crate::kernel::{Kernel, KernelState, Vertices};
use crate::offset_table::OffsetTable;
use crate::storage::{BlockFetch, GlobalStats};
use crate::tile::Tile;
use crate::vertex::VertexState;
use crate::vertex_fetcher;
use crate::vertex_reducer::{self, VertexLockTable};
use std::sync::Arc;
use std::time::Instant;

/// Lower bound on `tile_break_point` so a round always makes progress even
/// when the rate tracker has no samples yet (startup case).
pub const MIN_TILE_BREAK_POINT: u32 = 1024;

/// Recomputes `tile_break_point` from `count_active_tiles`, `min_count_tiles`,
/// `count_tile_processors`, and the smoothed per-edge rate, per spec §4.9
/// step 6 verbatim:
///
/// - `max_tile_size = sizeof(V) * MAX_VERTICES_PER_TILE`
/// - `min_count_tiles = ceil(host_tiles_buffer_capacity / max_tile_size)`
/// - if `count_active_tiles < min_count_tiles / 2`: `MIN_TILE_BREAK_POINT`
/// - else: `t_min = MAX_VERTICES_PER_TILE / rate`,
///   `t_max = t_min * (min_count_tiles - 1) / (count_tile_processors - 1)`,
///   `tile_break_point = round(t_max * rate)`
///
/// `host_tiles_buffer_capacity` is this crate's `--host-tiles-rb-size` ring
/// buffer measured in tile slots rather than bytes (this crate's
/// `RingBuffer` in `vertex_domain::run_round` carries tile ids, not a
/// serialized byte arena — see `DESIGN.md`), so it is used here directly as
/// a tile count instead of being divided by `max_tile_size`; `max_tile_size`
/// itself is computed for documentation/parity with the spec's formula but
/// does not otherwise enter the calculation under this substitution.
pub fn recompute_tile_break_point<V>(rate: f64, host_tiles_buffer_capacity_tiles: usize, count_active_tiles: usize, count_tile_processors: usize) -> u32 {
    if rate <= 0.0 {
        return MIN_TILE_BREAK_POINT;
    }
    let _max_tile_size = std::mem::size_of::<V>() * crate::tile::MAX_VERTICES_PER_TILE as usize;
    let min_count_tiles = host_tiles_buffer_capacity_tiles.max(1);

    if count_active_tiles < min_count_tiles / 2 {
        return MIN_TILE_BREAK_POINT;
    }

    let denom = count_tile_processors.max(2) - 1;
    let t_min = crate::tile::MAX_VERTICES_PER_TILE as f64 / rate;
    let t_max = t_min * (min_count_tiles - 1) as f64 / denom as f64;
    ((t_max * rate).round() as u32).max(MIN_TILE_BREAK_POINT)
}

pub struct RoundOutcome {
    pub edges_processed: u64,
    pub tiles_processed: usize,
    /// Whether at least one partition job this round was marked
    /// `sample_execution_time` (spec §4.2 step 6); gates whether
    /// `finish_round` feeds this round's timing into the rate tracker.
    pub any_sampled: bool,
}

/// Runs one full round over every currently scheduled tile.
#[allow(clippy::too_many_arguments)]
pub fn run_round<K: Kernel>(
    fetch: &dyn BlockFetch,
    offsets: &OffsetTable<Tile>,
    vertices: &mut VertexState<K::Value>,
    vertex_to_tile_index: &[Box<[u64]>],
    global_stats: &GlobalStats,
    tile_break_point: u32,
    config: &Config,
    kernel_state: &KernelState,
    locks: &VertexLockTable,
) -> Result<RoundOutcome> {
    // The reader runs on its own thread so it can block on `host_tiles.put`
    // once the ring buffer fills, while this thread concurrently drains it
    // (spec §4.2/§4.3's reader/fetcher handoff through a bounded transport).
    let host_tiles = crate::ring_buffer::RingBuffer::<u64>::new(config.host_tiles_rb_size.max(1), config.host_tiles_rb_size.max(1));
    let mut scheduled = Vec::new();
    let mut read_result: Result<Vec<u64>> = Ok(Vec::new());
    std::thread::scope(|scope| {
        let host_tiles_ref = &host_tiles;
        let reader = scope.spawn(|| {
            crate::readers::read_round(
                fetch,
                offsets,
                host_tiles_ref,
                global_stats.count_tiles,
                |tile| vertex_fetcher::num_tile_partitions(tile.count_edges, tile_break_point),
                config.use_selective_scheduling != 0,
                vertex_to_tile_index,
                &vertices.active_current,
            )
        });
        crate::readers::drain_host_tiles(host_tiles_ref, |tile_id| scheduled.push(tile_id));
        read_result = reader.join().expect("reader thread panicked");
    });
    let installed = read_result?;

    let mut edges_processed = 0u64;
    let mut any_sampled = false;

    for tile_id in scheduled {
        let slot = offsets.get(tile_id as usize);
        let tile: Arc<Tile> = slot.wait_for_payload();
        let num_tile_partition = vertex_fetcher::num_tile_partitions(tile.count_edges, tile_break_point);
        let ranges = vertex_fetcher::partition_edge_ranges(tile.count_edges, num_tile_partition);

        for (partition_id, range) in ranges.iter().enumerate() {
            let sample_execution_time = crate::tile::should_sample_execution_time(kernel_state.seed, tile_id, partition_id as u32);
            any_sampled |= sample_execution_time;
            let block = vertex_fetcher::build_tile_block::<K>(
                tile.clone(),
                vertices,
                config.local_fetcher_mode,
                config.global_fetcher_mode,
                kernel_state,
                num_tile_partition,
                partition_id as u32,
                sample_execution_time,
            );
            let block = Arc::new(block);
            let processed = crate::tile_processor::run_tile_partition::<K>(block, range.clone(), config.count_followers, kernel_state);
            edges_processed += range.end - range.start;

            let routed = vertex_reducer::apply_reducer_mode::<K>(
                config.local_reducer_mode,
                &tile,
                processed,
                vertices,
                locks,
                kernel_state,
                config.count_globalreducer.max(1),
            );
            if let Some(routed) = routed {
                for index_block in routed {
                    global_reducer::reduce_into::<K>(index_block, vertices, kernel_state);
                }
            }
        }

        let released_fetch = slot.release_fetch();
        let released_process = slot.release_process();
        if released_fetch && released_process {
            if let Some(bundle) = slot.bundle() {
                bundle.release_one();
            }
            slot.clear();
        }
    }

    Ok(RoundOutcome {
        edges_processed,
        tiles_processed: installed.len(),
        any_sampled,
    })
}

/// Round-boundary bookkeeping (spec §4.9 steps 1–9): `reset_vertices`,
/// count active vertices, swap, recompute `tile_break_point`, check
/// termination, `pre_processing_per_round` for the next round.
///
/// Callers must run [`crate::vertex_applier::apply_round`] on `vertices`
/// *before* calling this function: `K::apply`'s output lands in
/// `vertices.next`, and this function's `swap_and_reset` is what promotes
/// that buffer to the new `vertices.current` (spec §4.7: apply runs "after
/// every reducer has folded its contributions into `vertices.next`", i.e.
/// strictly pre-swap).
pub struct RoundFinish {
    pub next_tile_break_point: u32,
    pub active_count: usize,
    pub should_terminate: bool,
}

#[allow(clippy::too_many_arguments)]
pub fn finish_round<K: Kernel>(
    vertices: &mut VertexState<K::Value>,
    rate_tracker: &mut ProcessingRateTracker,
    outcome: &RoundOutcome,
    elapsed: std::time::Duration,
    iteration: u64,
    max_iterations: u64,
    host_tiles_rb_size: usize,
    count_tile_processors: usize,
    config: &KernelState,
) -> RoundFinish {
    let current_snapshot = vertices.current.clone();
    let mut switch = true;
    {
        let mut view = Vertices {
            current: &current_snapshot,
            next: &mut vertices.next,
            degrees: &vertices.degrees,
        };
        K::reset_vertices(&mut view, &mut switch);
    }

    // Read this round's freshly marked `active_next` before `swap_and_reset`
    // swaps it into `active_current` and zero-fills the new `active_next`
    // for the round ahead — reading it after the swap would always observe
    // the just-zeroed buffer (spec §4.9 step 7 means the round that just
    // ran, not the empty one about to start).
    let active_count = vertices.count_active_next();

    if switch {
        vertices.swap_and_reset();
    }

    // Only feed the rate tracker from rounds where at least one partition job
    // was actually marked for timing (spec §4.2 step 6's `SAMPLE_THRESHOLD`
    // sampling decision) — unconditionally timing every round would defeat
    // the point of sampling a subset of partitions instead of all of them.
    if outcome.any_sampled {
        rate_tracker.record(outcome.edges_processed, elapsed);
    }
    let next_tile_break_point = recompute_tile_break_point::<K::Value>(rate_tracker.rate(), host_tiles_rb_size, outcome.tiles_processed, count_tile_processors);

    let should_terminate = iteration + 1 >= max_iterations || (K::terminate_on_no_active_vertices() && active_count == 0);

    {
        let current_snapshot = vertices.current.clone();
        let mut view = Vertices {
            current: &current_snapshot,
            next: &mut vertices.next,
            degrees: &vertices.degrees,
        };
        K::pre_processing_per_round(&mut view, config, iteration + 1);
    }

    RoundFinish {
        next_tile_break_point,
        active_count,
        should_terminate,
    }
}

/// Named helper purely for call-site readability: record before `run_round`
/// and pass the elapsed duration into `finish_round`.
pub fn now() -> Instant {
    Instant::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_break_point_floor_holds_with_no_samples() {
        let tracker = ProcessingRateTracker::new(0.3);
        let bp = recompute_tile_break_point::<u32>(tracker.rate(), 8, 0, 4);
        assert_eq!(bp, MIN_TILE_BREAK_POINT);
    }

    #[test]
    fn tile_break_point_below_half_min_count_tiles_floors() {
        // host_tiles_buffer_capacity (in tiles) = 8, so min_count_tiles/2 = 4;
        // 2 active tiles is below that threshold regardless of rate.
        let bp = recompute_tile_break_point::<u32>(1_000_000.0, 8, 2, 4);
        assert_eq!(bp, MIN_TILE_BREAK_POINT);
    }

    #[test]
    fn tile_break_point_scales_with_min_count_tiles_and_processors() {
        // count_active_tiles (8) >= min_count_tiles/2 (4), so the full
        // formula applies; rate cancels out of `t_max * rate` algebraically
        // (spec §4.9 step 6), leaving a pure count_tiles/count_processors
        // ratio independent of the sampled rate's magnitude.
        let bp_slow = recompute_tile_break_point::<u32>(10.0, 8, 8, 4);
        let bp_fast = recompute_tile_break_point::<u32>(10_000.0, 8, 8, 4);
        assert_eq!(bp_slow, bp_fast);
        // MAX_VERTICES_PER_TILE * (min_count_tiles - 1) / (count_tile_processors - 1)
        // = 65536 * 7 / 3 = 152917 (rounded).
        assert_eq!(bp_slow, 152_917);
    }
}
