/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! `TileProcessor` / `TileProcessorFollower` (spec §4.4): per-edge kernel
//! execution over a stripe of one tile's edges, follower output merging, and
//! the `fetch_refcnt`/`process_refcnt` release protocol.
//!
//! Each partition leader spawns `F` follower threads for the duration of one
//! tile (`std::thread::scope`) rather than maintaining its own persistent
//! pinned follower pool across tiles; the stripe assignment, per-edge
//! procedure, and merge step are exactly as spec §4.4 describes. Persistent
//! pinned followers are an explicit simplification, recorded in
//! `DESIGN.md`.

use crate::kernel::{Kernel, KernelState};
use crate::tile::{BlockHeader, EdgeEncoding, ProcessedBlock, Tile, TileBlock};
use crate::tile::rle::RleCursor;
use std::ops::Range;
use std::sync::Arc;

pub const EDGES_STRIPE_SIZE: u64 = 64;

/// Edge weight for edge index `i`, or `1.0` when the tile carries no weight
/// array (spec §6: `weight` is only present for `HAS_WEIGHTS` tiles).
#[inline]
fn edge_weight(tile: &Tile, i: u64) -> f32 {
    match &tile.weight {
        Some(weights) => weights[i as usize],
        None => 1.0,
    }
}

/// Per-worker output accumulation for one tile partition: a tile-sized
/// target-value array plus active-tgt bitmap, both private until merged.
pub struct FollowerOutput<V> {
    pub tgt_values: Box<[V]>,
    pub active_tgt_next: Box<[bool]>,
    /// Number of edges this worker actually touched, zero-initialized to
    /// close spec §9's Open Question ("`gather_follower_output` reads
    /// `nedges` without initializing it").
    pub nedges: u64,
}

impl<V: Copy + Default> FollowerOutput<V> {
    pub fn new(tile_size: usize) -> Self {
        FollowerOutput {
            tgt_values: vec![V::default(); tile_size].into_boxed_slice(),
            active_tgt_next: vec![false; tile_size].into_boxed_slice(),
            nedges: 0,
        }
    }
}

/// Computes the index set worker `worker_id` of `total_workers` processes
/// within `[start, end)`, in `EDGES_STRIPE_SIZE`-sized interleaved stripes
/// (spec §4.4's stripe assignment formula).
pub fn stripe_indices(range: Range<u64>, worker_id: u64, total_workers: u64, stripe_size: u64) -> Vec<Range<u64>> {
    let mut out = Vec::new();
    let mut n = 0u64;
    loop {
        let lo = range.start + worker_id * stripe_size + n * total_workers * stripe_size;
        if lo >= range.end {
            break;
        }
        let hi = (lo + stripe_size).min(range.end);
        out.push(lo..hi);
        n += 1;
    }
    out
}

/// The per-edge procedure for list-encoded targets (spec §4.4).
pub fn process_edges_range_list<K: Kernel>(
    tile: &Tile,
    block: &TileBlock<K::Value>,
    tgt: &[u16],
    range: Range<u64>,
    out: &mut FollowerOutput<K::Value>,
    config: &KernelState,
) {
    for i in range {
        let src_id = tile.src[i as usize] as usize;
        if K::NEED_ACTIVE_SOURCE_INPUT && !block.active_src[src_id] {
            continue;
        }
        let tgt_id = tgt[i as usize] as usize;
        let changed = K::pull_gather(
            block.src_values[src_id],
            &mut out.tgt_values[tgt_id],
            src_id as u64,
            tgt_id as u64,
            edge_weight(tile, i),
            &block.src_degrees[src_id],
            &block.tgt_degrees[tgt_id],
            config,
        );
        out.nedges += 1;
        if changed {
            out.active_tgt_next[tgt_id] = true;
        }
    }
}

/// The per-edge procedure for RLE-encoded targets (spec §4.4's "For RLE
/// tgt" paragraph): the run cursor advances once per edge in `range`,
/// including skipped edges.
pub fn process_edges_range_rle<K: Kernel>(
    tile: &Tile,
    block: &TileBlock<K::Value>,
    runs: &[(u16, u16)],
    range: Range<u64>,
    out: &mut FollowerOutput<K::Value>,
    config: &KernelState,
) {
    let mut cursor = RleCursor::default();
    // Fast-forward the cursor to the start of this stripe. Each worker
    // processes its own disjoint stripes, so this repeats O(range.start)
    // work per stripe; acceptable for the tile sizes spec §3 bounds
    // (≤ 65535 edges).
    for _ in 0..range.start {
        crate::tile::rle::advance_rle_offset(runs, &mut cursor);
    }
    for i in range {
        let tgt_id = crate::tile::rle::advance_rle_offset(runs, &mut cursor) as usize;
        let src_id = tile.src[i as usize] as usize;
        if K::NEED_ACTIVE_SOURCE_INPUT && !block.active_src[src_id] {
            continue;
        }
        let changed = K::pull_gather(
            block.src_values[src_id],
            &mut out.tgt_values[tgt_id],
            src_id as u64,
            tgt_id as u64,
            edge_weight(tile, i),
            &block.src_degrees[src_id],
            &block.tgt_degrees[tgt_id],
            config,
        );
        out.nedges += 1;
        if changed {
            out.active_tgt_next[tgt_id] = true;
        }
    }
}

/// Merges a follower's private output into the leader's, via
/// `kernel.gather` (value-combining) and bitwise-OR of active bitmaps
/// (spec §4.4).
pub fn gather_follower_output<K: Kernel>(leader: &mut FollowerOutput<K::Value>, follower: FollowerOutput<K::Value>) {
    for i in 0..leader.tgt_values.len() {
        let changed = K::gather(&mut leader.tgt_values[i], follower.tgt_values[i]);
        if changed || follower.active_tgt_next[i] {
            leader.active_tgt_next[i] = leader.active_tgt_next[i] || follower.active_tgt_next[i];
        }
    }
    leader.nedges += follower.nedges;
}

/// Runs one tile partition end to end: splits `[0, count_edges)` across
/// `1 + follower_count` workers, runs each worker's stripes, merges into the
/// leader's output, and produces a [`ProcessedBlock`].
pub fn run_tile_partition<K: Kernel>(
    job: Arc<TileBlock<K::Value>>,
    edge_range: Range<u64>,
    follower_count: usize,
    config: &KernelState,
) -> ProcessedBlock<K::Value> {
    if job.header.shutdown {
        return ProcessedBlock::Shutdown;
    }
    let total_workers = (1 + follower_count) as u64;
    let tile_size = job.tile.count_vertex_tgt as usize;

    let outputs: Vec<FollowerOutput<K::Value>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..total_workers)
            .map(|worker_id| {
                let job = &job;
                let edge_range = edge_range.clone();
                scope.spawn(move || {
                    let mut out = FollowerOutput::<K::Value>::new(tile_size);
                    let stripes = stripe_indices(edge_range, worker_id, total_workers, EDGES_STRIPE_SIZE);
                    match &job.tile.tgt {
                        EdgeEncoding::List { tgt } => {
                            for stripe in stripes {
                                process_edges_range_list::<K>(&job.tile, job, tgt, stripe, &mut out, config);
                            }
                        }
                        EdgeEncoding::Rle { runs } => {
                            for stripe in stripes {
                                process_edges_range_rle::<K>(&job.tile, job, runs, stripe, &mut out, config);
                            }
                        }
                    }
                    out
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("tile worker panicked")).collect()
    });

    let mut iter = outputs.into_iter();
    let mut leader = iter.next().expect("at least the leader worker runs");
    for follower in iter {
        gather_follower_output::<K>(&mut leader, follower);
    }

    ProcessedBlock::Values {
        header: BlockHeader {
            block_id: job.header.block_id,
            num_tile_partition: job.header.num_tile_partition,
            tile_partition_id: job.header.tile_partition_id,
            magic_identifier: crate::tile::MAGIC_IDENTIFIER,
            shutdown: false,
            sample_execution_time: job.header.sample_execution_time,
        },
        active_src: None,
        active_tgt: Some(leader.active_tgt_next),
        tgt_values: leader.tgt_values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripe_indices_cover_range_without_overlap() {
        let ranges = stripe_indices(0..20, 0, 2, 4);
        let ranges2 = stripe_indices(0..20, 1, 2, 4);
        let mut all: Vec<u64> = ranges.iter().flat_map(|r| r.clone()).chain(ranges2.iter().flat_map(|r| r.clone())).collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }
}
