/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! `VertexApplier` (spec §4.7): the per-vertex apply step run once per
//! round, after every `VertexReducer`/`GlobalReducer` has folded its
//! contributions into `vertices.next`.

use crate::kernel::{Kernel, KernelState, Vertices};
use crate::vertex::VertexState;
use rayon::prelude::*;

/// Applies `K::apply` to every vertex in parallel (spec §4.7: "independent
/// per vertex, therefore embarrassingly data-parallel"), using `rayon` the
/// way the teacher's `PageRank::run_with_logging` parallelizes its own
/// per-vertex update loop over `SyncSlice`-backed vectors.
pub fn apply_round<K: Kernel>(vertices: &mut VertexState<K::Value>, config: &KernelState, iteration: u64) {
    let count = vertices.count;
    let degrees = vertices.degrees.clone();
    let current = vertices.current.clone();
    let next = vertices.next.as_mut_slice();

    next.par_chunks_mut(1).enumerate().for_each(|(id, chunk)| {
        let mut view = Vertices {
            current: &current,
            next: chunk,
            degrees: &degrees,
        };
        K::apply(&mut view, id, config, iteration);
    });
    let _ = count;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::pagerank::PageRank;
    use crate::vertex::Degree;

    #[test]
    fn apply_round_runs_over_every_vertex() {
        let degrees = vec![Degree { in_degree: 0, out_degree: 1 }; 4].into_boxed_slice();
        let mut state = VertexState::<f64>::new(4, degrees);
        let config = KernelState::default();
        let mut view = Vertices {
            current: &state.current.clone(),
            next: &mut state.next,
            degrees: &state.degrees,
        };
        PageRank::init_vertices(&mut view, &config);
        apply_round::<PageRank>(&mut state, &config, 0);
        assert!(state.next.iter().all(|&v| v > 0.0));
    }
}
