/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Sparse matrix–vector multiply: `next[tgt] = Σ_src weight(src,tgt) *
//! current[src]`. A single iteration (`--max-iterations 1`) over a weighted
//! tile corpus computes one `A·x`; an unweighted tile (weight defaulting to
//! 1.0) computes `next[tgt] = Σ_src current[src]` — the adjacency-matrix
//! row sum.

use crate::kernel::{Kernel, KernelState, Vertices};
use crate::vertex::Degree;

pub struct Spmv;

impl Kernel for Spmv {
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
        weight: f32,
        _src_degree: &Degree,
        _tgt_degree: &Degree,
        _config: &KernelState,
    ) -> bool {
        *tgt_acc += weight as f64 * src_value;
        true
    }

    fn gather(leader: &mut f64, follower: f64) -> bool {
        *leader += follower;
        true
    }

    fn reduce(acc: f64, incoming: f64, _vertex_id: u64, _degree: &Degree, _config: &KernelState) -> (f64, bool) {
        (acc + incoming, true)
    }

    fn apply(_vertices: &mut Vertices<'_, f64>, _vertex_id: usize, _config: &KernelState, _iteration: u64) {}

    fn init_vertices(vertices: &mut Vertices<'_, f64>, _config: &KernelState) {
        vertices.next.fill(0.0);
    }
}
