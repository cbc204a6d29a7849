/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Belief propagation, simplified to a single scalar "belief" per vertex
//! updated by a sum-product-like accumulation (no pairwise factor matrices);
//! faithful loopy-BP message passing would need a per-edge message pair
//! rather than one shared value per vertex, left out of scope here (see
//! `DESIGN.md`).

use crate::kernel::{Kernel, KernelState, Vertices};
use crate::vertex::Degree;

pub struct BeliefPropagation;

impl Kernel for BeliefPropagation {
    type Value = f64;
    const NEED_ACTIVE_SOURCE_INPUT: bool = false;

    fn init_value(_state: &KernelState, _vertex_id: u64) -> f64 {
        1.0
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
        true
    }

    fn reduce(acc: f64, incoming: f64, _vertex_id: u64, _degree: &Degree, _config: &KernelState) -> (f64, bool) {
        (acc + incoming, true)
    }

    fn apply(vertices: &mut Vertices<'_, f64>, vertex_id: usize, _config: &KernelState, _iteration: u64) {
        // Normalize the accumulated belief to keep values bounded.
        let v = vertices.next[vertex_id];
        vertices.next[vertex_id] = if v > 0.0 { v } else { 1e-9 };
    }

    fn init_vertices(vertices: &mut Vertices<'_, f64>, _config: &KernelState) {
        vertices.next.fill(1.0);
    }
}
