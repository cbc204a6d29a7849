/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! `VertexFetcher` (spec §4.3): materializes a self-contained `TileBlock`
//! from a loaded `Tile` plus the current global vertex state, and decides
//! the tile partition count.

use crate::config::{GlobalFetcherMode, LocalFetcherMode};
use crate::global_fetcher::{self, FetchRequest};
use crate::kernel::{Kernel, KernelState};
use crate::storage::split_global_id;
use crate::tile::{BlockHeader, Tile, TileBlock, MAGIC_IDENTIFIER};
use crate::vertex::VertexState;
use std::sync::Arc;

/// `num_tile_partition = max(1, ceil(edge_count / tile_break_point))`
/// (spec §4.3 step 4).
pub fn num_tile_partitions(count_edges: u32, tile_break_point: u32) -> u32 {
    if tile_break_point == 0 {
        return 1;
    }
    (count_edges.div_ceil(tile_break_point)).max(1)
}

/// Builds the `TileBlock` for one tile, given the current vertex state and
/// the selected [`LocalFetcherMode`] (spec §4.3 step 5).
///
/// `DirectAccess` reads `current[id]` in-process; `ConstantValue`/`Fake`
/// synthesize deterministic test values; `GlobalFetcher` routes the whole
/// source batch through [`crate::global_fetcher::resolve`] (spec §4.8).
pub fn build_tile_block<K: Kernel>(
    tile: Arc<Tile>,
    vertices: &VertexState<K::Value>,
    mode: LocalFetcherMode,
    global_fetcher_mode: GlobalFetcherMode,
    config: &KernelState,
    num_tile_partition: u32,
    tile_partition_id: u32,
    sample_execution_time: bool,
) -> TileBlock<K::Value> {
    let n_src = tile.count_vertex_src as usize;
    let n_tgt = tile.count_vertex_tgt as usize;

    let mut active_src = vec![false; n_src].into_boxed_slice();
    let mut src_degrees = vec![crate::vertex::Degree::default(); n_src].into_boxed_slice();
    let mut src_values = vec![K::Value::default(); n_src].into_boxed_slice();
    let mut src_global_ids = vec![0u64; n_src].into_boxed_slice();

    for local in 0..n_src {
        let (lower, ext) = split_global_id(tile.src_index[local]);
        let global_id = crate::storage::join_global_id(lower, ext) as usize;
        src_global_ids[local] = global_id as u64;
        if global_id < vertices.count {
            active_src[local] = vertices
                .active_current
                .get(global_id, std::sync::atomic::Ordering::Relaxed);
            src_degrees[local] = vertices.degrees[global_id];
            src_values[local] = match mode {
                LocalFetcherMode::DirectAccess => vertices.current[global_id],
                LocalFetcherMode::ConstantValue => K::init_value(config, global_id as u64),
                LocalFetcherMode::Fake => K::Value::default(),
                // Routed through the `GlobalFetcher` pool below instead of
                // read in-process (spec §4.8).
                LocalFetcherMode::GlobalFetcher => K::Value::default(),
            };
        }
    }

    if mode == LocalFetcherMode::GlobalFetcher {
        let requests: Vec<FetchRequest> = src_global_ids.iter().map(|&global_id| FetchRequest { global_id }).collect();
        let resolved = global_fetcher::resolve::<K>(global_fetcher_mode, &requests, vertices, config);
        src_values = resolved.into_boxed_slice();
    }

    let mut tgt_degrees = vec![crate::vertex::Degree::default(); n_tgt].into_boxed_slice();
    for local in 0..n_tgt {
        let (lower, ext) = split_global_id(tile.tgt_index[local]);
        let global_id = crate::storage::join_global_id(lower, ext) as usize;
        if global_id < vertices.count {
            tgt_degrees[local] = vertices.degrees[global_id];
        }
    }
    let active_tgt = vec![false; n_tgt].into_boxed_slice();

    let extension = K::fill_extension_fields(config, tile.block_id);

    TileBlock {
        header: BlockHeader {
            block_id: tile.block_id,
            num_tile_partition,
            tile_partition_id,
            magic_identifier: MAGIC_IDENTIFIER,
            shutdown: false,
            sample_execution_time,
        },
        tile,
        active_src,
        active_tgt,
        src_degrees,
        tgt_degrees,
        src_values,
        extension,
    }
}

/// Splits a tile's edge range `[0, count_edges)` into `num_tile_partition`
/// roughly equal partitions (spec §4.3 step 6).
pub fn partition_edge_ranges(count_edges: u32, num_tile_partition: u32) -> Vec<std::ops::Range<u64>> {
    let count_edges = count_edges as u64;
    let num_tile_partition = num_tile_partition as u64;
    let base = count_edges / num_tile_partition;
    let extra = count_edges % num_tile_partition;
    let mut out = Vec::with_capacity(num_tile_partition as usize);
    let mut start = 0u64;
    for p in 0..num_tile_partition {
        let len = base + if p < extra { 1 } else { 0 };
        out.push(start..start + len);
        start += len;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_cover_all_edges_exactly_once() {
        let ranges = partition_edge_ranges(10, 3);
        let total: u64 = ranges.iter().map(|r| r.end - r.start).sum();
        assert_eq!(total, 10);
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges.last().unwrap().end, 10);
    }

    #[test]
    fn num_tile_partitions_rounds_up() {
        assert_eq!(num_tile_partitions(100, 40), 3);
        assert_eq!(num_tile_partitions(0, 40), 1);
        assert_eq!(num_tile_partitions(40, 40), 1);
        assert_eq!(num_tile_partitions(41, 40), 2);
    }
}
