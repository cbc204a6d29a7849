/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Single-source shortest paths kernel: `Value` is a distance in `f64`,
//! `f64::INFINITY` meaning unreached. `pull_gather` relaxes along the edge's
//! weight, resolved once per edge by `TileProcessor` from the tile's
//! `weight` array (1.0 for an unweighted tile, i.e. plain hop-count SSSP).

use crate::kernel::{Kernel, KernelState, Vertices};
use crate::vertex::Degree;

pub struct Sssp;

/// Relaxes `tgt_acc` against `src_value + weight`, the standard Dijkstra/
/// Bellman-Ford edge relaxation.
#[inline]
pub fn relax(src_value: f64, weight: f32, tgt_acc: &mut f64) -> bool {
    if !src_value.is_finite() {
        return false;
    }
    let candidate = src_value + weight as f64;
    if candidate < *tgt_acc {
        *tgt_acc = candidate;
        true
    } else {
        false
    }
}

impl Kernel for Sssp {
    type Value = f64;
    const NEED_ACTIVE_SOURCE_INPUT: bool = true;

    fn init_value(state: &KernelState, vertex_id: u64) -> f64 {
        if state.source_vertex == Some(vertex_id) { 0.0 } else { f64::INFINITY }
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
        relax(src_value, weight, tgt_acc)
    }

    fn gather(leader: &mut f64, follower: f64) -> bool {
        if follower < *leader {
            *leader = follower;
            true
        } else {
            false
        }
    }

    fn reduce(acc: f64, incoming: f64, _vertex_id: u64, _degree: &Degree, _config: &KernelState) -> (f64, bool) {
        if incoming < acc { (incoming, true) } else { (acc, false) }
    }

    fn apply(_vertices: &mut Vertices<'_, f64>, _vertex_id: usize, _config: &KernelState, _iteration: u64) {}

    fn init_vertices(vertices: &mut Vertices<'_, f64>, config: &KernelState) {
        vertices.next.fill(f64::INFINITY);
        if let Some(src) = config.source_vertex {
            if (src as usize) < vertices.next.len() {
                vertices.next[src as usize] = 0.0;
            }
        }
    }

    fn terminate_on_no_active_vertices() -> bool {
        true
    }
}
