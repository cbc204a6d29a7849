/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Run-length encoding of the target side of a tile's edge block.
//!
//! A run is `{count: u16, id: u16}`; `count == 0` denotes a run of 65536
//! (spec §3, §9's Open Question: tile-local counts must be genuinely in
//! `[1, 65536]` on the wire, never a literal zero anywhere else).

/// One decoded run: a target-vertex id repeated `len` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub id: u16,
    pub len: u32,
}

/// Decodes the wire `count` field (`0` means 65536) into a run length.
#[inline]
pub fn decode_run_len(count: u16) -> u32 {
    if count == 0 { 65536 } else { count as u32 }
}

/// Cursor over an RLE run sequence, advanced one edge at a time.
///
/// Mirrors `(tgt_run_index, remaining_in_run)` from spec §4.4: advancing past
/// a skipped edge still consumes one unit of the current run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RleCursor {
    pub run_index: usize,
    pub remaining_in_run: u32,
}

/// A decoded `(src[i], tgt[i])` pair for edge index `i`, reconstructed from a
/// list encoding (`tgt[i]` direct) or an RLE encoding (`runs` walked via
/// [`get_rle_offset`]).
pub fn get_rle_offset(runs: &[(u16, u16)], edge_index: u64) -> (usize, u32) {
    let mut remaining = edge_index;
    for (run_idx, &(count, _id)) in runs.iter().enumerate() {
        let len = decode_run_len(count) as u64;
        if remaining < len {
            return (run_idx, remaining as u32);
        }
        remaining -= len;
    }
    panic!("edge index {edge_index} is out of range for the supplied run sequence");
}

/// Target id for edge index `i` under RLE encoding.
pub fn rle_target_at(runs: &[(u16, u16)], edge_index: u64) -> u16 {
    let (run_idx, _rem) = get_rle_offset(runs, edge_index);
    runs[run_idx].1
}

/// Encodes a flat target-id sequence into the `{count, id}` run sequence a
/// tile writer would emit, splitting any run of more than 65536 repeats (the
/// max a `u16` count field can express via the `count == 0` => 65536
/// convention) into multiple consecutive runs of the same id.
pub fn encode_runs(tgt: &[u16]) -> Vec<(u16, u16)> {
    use itertools::Itertools;
    tgt.iter()
        .chunk_by(|&&id| id)
        .into_iter()
        .flat_map(|(id, group)| {
            let mut remaining = group.count();
            std::iter::from_fn(move || {
                if remaining == 0 {
                    return None;
                }
                let take = remaining.min(65536);
                remaining -= take;
                Some((if take == 65536 { 0 } else { take as u16 }, id))
            })
        })
        .collect()
}

/// Advances an [`RleCursor`] by one edge (the per-edge loop body in spec
/// §4.4's "For RLE tgt" paragraph), returning the target id for the edge
/// that was just consumed.
pub fn advance_rle_offset(runs: &[(u16, u16)], cursor: &mut RleCursor) -> u16 {
    if cursor.remaining_in_run == 0 {
        cursor.remaining_in_run = decode_run_len(runs[cursor.run_index].0);
    }
    let id = runs[cursor.run_index].1;
    cursor.remaining_in_run -= 1;
    if cursor.remaining_in_run == 0 && cursor.run_index + 1 < runs.len() {
        cursor.run_index += 1;
        // remaining_in_run is 0; the next call lazily initializes it for the
        // new run.
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S3: RLE wrap-around.
    #[test]
    fn s3_rle_wrap_around() {
        // Runs: [{count:2,id:A},{count:1,id:B},{count:0,id:C},{count:2,id:D}]
        let runs = [(2u16, 0xA_u16), (1, 0xB), (0, 0xC), (2, 0xD)];

        assert_eq!(get_rle_offset(&runs, 0), (0, 0));
        assert_eq!(get_rle_offset(&runs, 1), (0, 1));
        assert_eq!(get_rle_offset(&runs, 2), (1, 0));
        assert_eq!(get_rle_offset(&runs, 3), (2, 0));
        assert_eq!(get_rle_offset(&runs, 65537), (2, 65534));
        assert_eq!(get_rle_offset(&runs, 65539), (3, 0));
    }

    #[test]
    fn advance_rle_offset_matches_get_rle_offset() {
        let runs = [(2u16, 0u16), (2, 1), (1, 2), (1, 3)];
        let mut cursor = RleCursor::default();
        for i in 0..6u64 {
            let id = advance_rle_offset(&runs, &mut cursor);
            assert_eq!(id, rle_target_at(&runs, i));
        }
    }

    #[test]
    fn decode_run_len_zero_means_65536() {
        assert_eq!(decode_run_len(0), 65536);
        assert_eq!(decode_run_len(1), 1);
        assert_eq!(decode_run_len(65535), 65535);
    }

    /// S2: list vs RLE equivalence for a toy 6-edge PageRank graph.
    #[test]
    fn rle_matches_list_encoding() {
        // list: (0,0),(2,0),(0,1),(1,1),(1,2),(2,3)
        let list_tgt = [0u16, 0, 1, 1, 2, 3];
        // runs: [{count:2,id:0},{count:2,id:1},{count:1,id:2},{count:1,id:3}]
        let runs = [(2u16, 0u16), (2, 1), (1, 2), (1, 3)];
        for i in 0..list_tgt.len() as u64 {
            assert_eq!(rle_target_at(&runs, i), list_tgt[i as usize]);
        }
    }

    #[test]
    fn encode_runs_groups_consecutive_ids() {
        let tgt = [0u16, 0, 1, 1, 2, 3];
        assert_eq!(encode_runs(&tgt), vec![(2, 0), (2, 1), (1, 2), (1, 3)]);
    }

    #[test]
    fn encode_runs_splits_runs_over_65536() {
        let tgt = vec![7u16; 70_000];
        let runs = encode_runs(&tgt);
        assert_eq!(runs, vec![(0, 7), (4464, 7)]);
        let total: u32 = runs.iter().map(|&(count, _)| decode_run_len(count)).sum();
        assert_eq!(total, 70_000);
    }

    #[test]
    fn encode_then_walk_matches_input() {
        let tgt = [5u16, 5, 5, 9, 9, 1, 1, 1, 1];
        let runs = encode_runs(&tgt);
        for (i, &expected) in tgt.iter().enumerate() {
            assert_eq!(rle_target_at(&runs, i as u64), expected);
        }
    }
}
