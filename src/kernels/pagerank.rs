/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! PageRank kernel: Gauss–Seidel-style pull-gather over the transpose graph,
//! grounded in `algo/src/rank/pagerank.rs`'s update rule (teacher), adapted
//! to the per-edge/per-tile `Kernel` capability trait instead of a
//! whole-graph Gauss–Seidel sweep.

use crate::kernel::{Kernel, KernelState, Vertices};
use crate::vertex::Degree;

pub const DEFAULT_ALPHA: f64 = 0.85;

pub struct PageRank;

impl Kernel for PageRank {
    type Value = f64;
    const NEED_ACTIVE_SOURCE_INPUT: bool = false;

    fn init_value(_state: &KernelState, _vertex_id: u64) -> f64 {
        0.0
    }

    fn pull_gather(
        src_value: f64,
        tgt_acc: &mut f64,
        _src_id: u64,
        _tgt_id: u64,
        _weight: f32,
        src_degree: &Degree,
        _tgt_degree: &Degree,
        _config: &KernelState,
    ) -> bool {
        if src_degree.out_degree == 0 {
            return false;
        }
        *tgt_acc += src_value / src_degree.out_degree as f64;
        true
    }

    fn gather(leader: &mut f64, follower: f64) -> bool {
        *leader += follower;
        follower != 0.0
    }

    fn reduce(acc: f64, incoming: f64, _vertex_id: u64, _degree: &Degree, _config: &KernelState) -> (f64, bool) {
        (acc + incoming, incoming != 0.0)
    }

    fn apply(vertices: &mut Vertices<'_, f64>, vertex_id: usize, _config: &KernelState, _iteration: u64) {
        let n = vertices.current.len().max(1) as f64;
        vertices.next[vertex_id] = (1.0 - DEFAULT_ALPHA) / n + DEFAULT_ALPHA * vertices.next[vertex_id];
    }

    fn init_vertices(vertices: &mut Vertices<'_, f64>, _config: &KernelState) {
        let n = vertices.current.len().max(1) as f64;
        vertices.next.fill(1.0 / n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S1: PageRank, toy graph — one call to the per-edge kernel.
    #[test]
    fn s1_pagerank_toy_graph() {
        let src_degree = Degree { in_degree: 0, out_degree: 2 };
        let tgt_degree = Degree::default();
        let state = KernelState::default();
        let src_val = 0.15;
        // Edges: (0,0),(2,0),(0,1),(1,1),(1,2),(2,3)
        let edges: [(u64, u64); 6] = [(0, 0), (2, 0), (0, 1), (1, 1), (1, 2), (2, 3)];
        let mut tgt = [0.0f64; 4];
        for (src, tgt_id) in edges {
            PageRank::pull_gather(src_val, &mut tgt[tgt_id as usize], src, tgt_id, 1.0, &src_degree, &tgt_degree, &state);
        }
        assert!((tgt[0] - 0.15).abs() < 1e-4);
        assert!((tgt[1] - 0.15).abs() < 1e-4);
        assert!((tgt[2] - 0.075).abs() < 1e-4);
        assert!((tgt[3] - 0.075).abs() < 1e-4);
    }
}
