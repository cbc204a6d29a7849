/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! `GlobalFetcher` (spec §4.8): the optional pool a `VertexFetcher` routes
//! through when `LocalFetcherMode::GlobalFetcher` is selected instead of
//! `DirectAccess`, modelling a remote-memory fetch round trip.
//!
//! Distributed, multi-engine execution is out of scope (spec.md's
//! Non-goals); within a single engine the "remote" fetch is simply another
//! read of the shared [`VertexState`], but it is still routed through this
//! module so the `GlobalFetcherMode::ConstantValue` test double and the
//! request/response shape the `LocalFetcherMode::GlobalFetcher` path
//! expects are both real, not skipped.

use crate::config::GlobalFetcherMode;
use crate::kernel::{Kernel, KernelState};
use crate::vertex::VertexState;

/// One fetch request: the global vertex id whose current value is needed.
pub struct FetchRequest {
    pub global_id: u64,
}

/// Resolves a batch of [`FetchRequest`]s against `vertices.current`, or
/// against the kernel's constant-value fallback in `ConstantValue` mode
/// (spec §4.8: "a constant-value fallback mode for testing the pipeline
/// without the real fetch path").
pub fn resolve<K: Kernel>(
    mode: GlobalFetcherMode,
    requests: &[FetchRequest],
    vertices: &VertexState<K::Value>,
    config: &KernelState,
) -> Vec<K::Value> {
    requests
        .iter()
        .map(|req| match mode {
            GlobalFetcherMode::Active => {
                let id = req.global_id as usize;
                if id < vertices.count {
                    vertices.current[id]
                } else {
                    K::Value::default()
                }
            }
            GlobalFetcherMode::ConstantValue => K::init_value(config, req.global_id),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::pagerank::PageRank;
    use crate::vertex::Degree;

    #[test]
    fn active_mode_reads_current_values() {
        let degrees = vec![Degree::default(); 2].into_boxed_slice();
        let mut state = VertexState::<f64>::new(2, degrees);
        state.current[1] = 0.42;
        let config = KernelState::default();
        let out = resolve::<PageRank>(GlobalFetcherMode::Active, &[FetchRequest { global_id: 1 }], &state, &config);
        assert_eq!(out[0], 0.42);
    }

    #[test]
    fn constant_value_mode_ignores_state() {
        let degrees = vec![Degree::default(); 1].into_boxed_slice();
        let state = VertexState::<f64>::new(1, degrees);
        let config = KernelState::default();
        let out = resolve::<PageRank>(GlobalFetcherMode::ConstantValue, &[FetchRequest { global_id: 0 }], &state, &config);
        assert_eq!(out[0], PageRank::init_value(&config, 0));
    }
}
