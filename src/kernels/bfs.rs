/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Breadth-first search kernel: `Value` is a distance, `u32::MAX` meaning
//! "unreached" (the algorithm's neutral element, spec §8 S6).

use crate::kernel::{Kernel, KernelState, Vertices};
use crate::vertex::Degree;

pub const UNREACHED: u32 = u32::MAX;

pub struct Bfs;

impl Kernel for Bfs {
    type Value = u32;
    const NEED_ACTIVE_SOURCE_INPUT: bool = true;
    const CAS_COMPATIBLE: bool = true;

    fn init_value(state: &KernelState, vertex_id: u64) -> u32 {
        if state.source_vertex == Some(vertex_id) { 0 } else { UNREACHED }
    }

    fn pull_gather(
        src_value: u32,
        tgt_acc: &mut u32,
        _src_id: u64,
        _tgt_id: u64,
        _weight: f32,
        _src_degree: &Degree,
        _tgt_degree: &Degree,
        _config: &KernelState,
    ) -> bool {
        if src_value == UNREACHED {
            return false;
        }
        let candidate = src_value + 1;
        if candidate < *tgt_acc {
            *tgt_acc = candidate;
            true
        } else {
            false
        }
    }

    fn gather(leader: &mut u32, follower: u32) -> bool {
        if follower < *leader {
            *leader = follower;
            true
        } else {
            false
        }
    }

    fn reduce(acc: u32, incoming: u32, _vertex_id: u64, _degree: &Degree, _config: &KernelState) -> (u32, bool) {
        if incoming < acc { (incoming, true) } else { (acc, false) }
    }

    fn apply(vertices: &mut Vertices<'_, u32>, vertex_id: usize, _config: &KernelState, _iteration: u64) {
        // Distances are already settled by reduce; apply is a no-op carry
        // forward of whatever reduce produced into `next`.
        let _ = vertices;
        let _ = vertex_id;
    }

    fn init_vertices(vertices: &mut Vertices<'_, u32>, config: &KernelState) {
        vertices.next.fill(UNREACHED);
        if let Some(src) = config.source_vertex {
            if (src as usize) < vertices.next.len() {
                vertices.next[src as usize] = 0;
            }
        }
    }

    fn terminate_on_no_active_vertices() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreached_source_has_distance_zero() {
        let state = KernelState { seed: 0, source_vertex: Some(100) };
        assert_eq!(Bfs::init_value(&state, 100), 0);
        assert_eq!(Bfs::init_value(&state, 101), UNREACHED);
    }

    #[test]
    fn pull_gather_skips_unreached_source() {
        let mut acc = UNREACHED;
        let changed = Bfs::pull_gather(UNREACHED, &mut acc, 0, 1, 1.0, &Degree::default(), &Degree::default(), &KernelState::default());
        assert!(!changed);
        assert_eq!(acc, UNREACHED);
    }
}
