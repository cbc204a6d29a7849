/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! `GlobalReducer` (spec §4.6): folds `ProcessedIndexBlock`s routed by a
//! `VertexReducer` into `vertices.next`, and tracks the smoothed per-edge
//! processing rate used to recompute `tile_break_point`.

use crate::kernel::{Kernel, KernelState};
use crate::tile::ProcessedIndexBlock;
use crate::vertex::VertexState;

/// Exponential moving average of the per-edge processing rate, feeding
/// `VertexDomain`'s `tile_break_point` recomputation (spec §4.9 step 6:
/// "adaptively recomputed from a smoothed per-edge processing rate").
pub struct ProcessingRateTracker {
    smoothed_edges_per_sec: f64,
    alpha: f64,
}

impl ProcessingRateTracker {
    pub fn new(alpha: f64) -> Self {
        ProcessingRateTracker {
            smoothed_edges_per_sec: 0.0,
            alpha,
        }
    }

    pub fn record(&mut self, edges: u64, elapsed: std::time::Duration) {
        let secs = elapsed.as_secs_f64().max(1e-9);
        let sample = edges as f64 / secs;
        if self.smoothed_edges_per_sec == 0.0 {
            self.smoothed_edges_per_sec = sample;
        } else {
            self.smoothed_edges_per_sec = self.alpha * sample + (1.0 - self.alpha) * self.smoothed_edges_per_sec;
        }
    }

    pub fn rate(&self) -> f64 {
        self.smoothed_edges_per_sec
    }
}

/// Folds one `ProcessedIndexBlock` into `vertices.next` via `kernel.reduce`
/// (spec §4.6). A `Shutdown` block is a no-op here; the caller is
/// responsible for propagating shutdown through the pipeline's control
/// path, not the data path.
pub fn reduce_into<K: Kernel>(block: ProcessedIndexBlock<K::Value>, vertices: &mut VertexState<K::Value>, config: &KernelState) {
    let ProcessedIndexBlock::Values { global_id, value } = block else {
        return;
    };
    for (gid, val) in global_id.iter().zip(value.iter()) {
        let id = *gid as usize;
        if id >= vertices.count {
            continue;
        }
        let (new_val, changed) = K::reduce(vertices.next[id], *val, *gid, &vertices.degrees[id], config);
        vertices.next[id] = new_val;
        if changed {
            vertices.mark_active_next(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_tracker_smooths_toward_new_samples() {
        let mut tracker = ProcessingRateTracker::new(0.5);
        tracker.record(1000, std::time::Duration::from_secs(1));
        assert!((tracker.rate() - 1000.0).abs() < 1e-6);
        tracker.record(2000, std::time::Duration::from_secs(1));
        assert!((tracker.rate() - 1500.0).abs() < 1e-6);
    }
}
