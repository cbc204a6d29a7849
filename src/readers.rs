/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! `IndexReader` / `TileReader` (spec §4.2): load tiles from storage and
//! install them into the per-engine [`OffsetTable`], honoring selective
//! scheduling and emitting the shutdown sentinel when the corpus is
//! exhausted.

use crate::error::Result;
use crate::offset_table::{Bundle, OffsetTable};
use crate::ring_buffer::RingBuffer;
use crate::storage::BlockFetch;
use crate::tile::Tile;
use std::sync::Arc;

/// Sentinel tile id pushed through the host-tiles ring buffer once a round's
/// corpus has been exhausted (spec §5: "shutdown-sentinel cancellation").
pub const SHUTDOWN_TILE_ID: u64 = u64::MAX;

/// Decides whether a tile can be skipped this round because none of its
/// source vertices are active (spec §4.2/§6: "selective scheduling" using
/// the vertex-to-tile inverted index).
pub fn should_skip_tile(tile_id: u64, vertex_to_tile_index: &[Box<[u64]>], active_current: &sux::bits::AtomicBitVec) -> bool {
    use std::sync::atomic::Ordering;
    !vertex_to_tile_index
        .iter()
        .enumerate()
        .any(|(vertex, tiles)| tiles.contains(&tile_id) && active_current.get(vertex, Ordering::Relaxed))
}

/// Reads every tile in `[0, count_tiles)`, applying selective scheduling
/// when `use_selective_scheduling` is set, installs each one into `offsets`
/// with a fresh single-tile [`Bundle`] (spec §4.2's "bundle a group of
/// tiles read together"; this reader groups tiles one-per-bundle, a scope
/// reduction from the teacher's batched I/O recorded in `DESIGN.md`), and
/// hands its id to `host_tiles` so the `VertexFetcher` side can pull tiles
/// through the bounded transport instead of a shared `Vec` (spec §4.1/§4.2).
///
/// Pushes [`SHUTDOWN_TILE_ID`] once the round's corpus is exhausted.
/// Returns the ids of tiles actually installed, in read order.
pub fn read_round(
    fetch: &dyn BlockFetch,
    offsets: &OffsetTable<Tile>,
    host_tiles: &RingBuffer<u64>,
    count_tiles: u64,
    num_tile_partition_of: impl Fn(&Tile) -> u32,
    use_selective_scheduling: bool,
    vertex_to_tile_index: &[Box<[u64]>],
    active_current: &sux::bits::AtomicBitVec,
) -> Result<Vec<u64>> {
    let mut installed = Vec::new();
    for tile_id in 0..count_tiles {
        if use_selective_scheduling && should_skip_tile(tile_id, vertex_to_tile_index, active_current) {
            continue;
        }
        let tile = fetch.read_tile(tile_id)?;
        let num_tile_partition = num_tile_partition_of(&tile) as i64;
        let slot = offsets.get(tile_id as usize);
        let tile = Arc::new(tile);
        let bundle = Bundle::new(1, || {});
        slot.install(tile, num_tile_partition, bundle);

        if let crate::ring_buffer::RingOutcome::Ready(put) = host_tiles.put(1, true) {
            host_tiles.set_ready(put, tile_id);
        }
        installed.push(tile_id);
    }
    if let crate::ring_buffer::RingOutcome::Ready(put) = host_tiles.put(1, true) {
        host_tiles.set_ready(put, SHUTDOWN_TILE_ID);
    }
    Ok(installed)
}

/// Drains `host_tiles` until the shutdown sentinel, calling `on_tile` for
/// each real tile id (the `VertexFetcher` side of the handoff).
pub fn drain_host_tiles(host_tiles: &RingBuffer<u64>, mut on_tile: impl FnMut(u64)) {
    loop {
        match host_tiles.get(true) {
            crate::ring_buffer::RingOutcome::Ready(got) => {
                let tile_id = got.value;
                host_tiles.set_done(got);
                if tile_id == SHUTDOWN_TILE_ID {
                    break;
                }
                on_tile(tile_id);
            }
            crate::ring_buffer::RingOutcome::Shutdown => break,
            crate::ring_buffer::RingOutcome::WouldBlock => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn skip_tile_when_no_active_source() {
        let active = sux::bits::AtomicBitVec::new(2);
        let vtx_to_tile: Vec<Box<[u64]>> = vec![Box::from([0u64]), Box::from([1u64])];
        assert!(should_skip_tile(0, &vtx_to_tile, &active));
        active.set(0, true, Ordering::Relaxed);
        assert!(!should_skip_tile(0, &vtx_to_tile, &active));
        assert!(should_skip_tile(1, &vtx_to_tile, &active));
    }
}
