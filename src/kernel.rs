/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The algorithm capability trait (spec §9: "Polymorphism over algorithm
//! kernels").
//!
//! Each algorithm is a monomorphized implementation of [`Kernel`]; the
//! `--algorithm` flag selects one concrete type at startup (`main`'s
//! `dispatch_algorithm!` macro in `crate::kernels`), and the whole pipeline
//! is generic over `K: Kernel` from then on — no virtual dispatch on the
//! per-edge hot path.

use crate::vertex::Degree;

/// Per-vertex state passed to `apply`/`reset_vertices`/`pre_processing_per_round`.
pub struct Vertices<'a, V> {
    pub current: &'a [V],
    pub next: &'a mut [V],
    pub degrees: &'a [Degree],
}

/// Extra state threaded through every kernel call instead of the module-level
/// globals (`global_info`, `seed`) the original algorithms stash at module
/// scope (spec §9: "Global mutable state").
#[derive(Debug, Default, Clone)]
pub struct KernelState {
    pub seed: u64,
    pub source_vertex: Option<u64>,
}

/// A vertex-centric algorithm kernel: pull-gather / reduce / apply.
pub trait Kernel: Send + Sync + 'static {
    /// Per-vertex accumulated value type.
    type Value: Copy + Default + Send + Sync + std::fmt::Debug;

    /// Whether `pull_gather` needs `active_src` to skip inactive sources.
    const NEED_ACTIVE_SOURCE_INPUT: bool;
    /// Whether the vertex value type fits a CAS-able 32-bit cell, enabling
    /// `LocalReducerMode::Atomic` (spec §4.5).
    const CAS_COMPATIBLE: bool = false;

    /// Neutral/initial value for every vertex before iteration 0.
    fn init_value(state: &KernelState, vertex_id: u64) -> Self::Value;

    /// Per-edge pull-gather (spec §4.4). `weight` is the edge's weight from
    /// the tile's optional `weight` array, or `1.0` for an unweighted tile
    /// (`TileProcessor` resolves this once per edge before the call, spec
    /// §3's "kernel-specific extension fields" sits alongside the edge
    /// weight as per-edge tile payload, not a `Kernel`-specific extra).
    #[allow(clippy::too_many_arguments)]
    fn pull_gather(
        src_value: Self::Value,
        tgt_acc: &mut Self::Value,
        src_id: u64,
        tgt_id: u64,
        weight: f32,
        src_degree: &Degree,
        tgt_degree: &Degree,
        config: &KernelState,
    ) -> bool; // returns true if tgt_acc changed (drives active_tgt_next)

    /// Combines a follower's private accumulation into the leader's
    /// (spec §4.4: "followers' outputs are merged into the leader's via
    /// kernel.gather").
    fn gather(leader: &mut Self::Value, follower: Self::Value) -> bool;

    /// Reduces two partial per-vertex accumulations into one (spec §4.6).
    fn reduce(acc: Self::Value, incoming: Self::Value, vertex_id: u64, degree: &Degree, config: &KernelState) -> (Self::Value, bool);

    /// Per-vertex apply step, invoked once per iteration (spec §4.7).
    fn apply(vertices: &mut Vertices<'_, Self::Value>, vertex_id: usize, config: &KernelState, iteration: u64);

    /// Called once before the very first iteration.
    fn init_vertices(vertices: &mut Vertices<'_, Self::Value>, config: &KernelState);

    /// Called at round boundary; returning `false` vetoes the current ↔ next
    /// swap for this round (spec §4.9 step 2).
    fn reset_vertices(_vertices: &mut Vertices<'_, Self::Value>, switch_current_next: &mut bool) {
        let _ = switch_current_next;
    }

    /// Per-(iteration, partition) reset hook on the `TileProcessor` side.
    fn reset_vertices_tile_processor(_config: &KernelState) {}

    /// Called once per round before it starts (spec §4.9 step 8).
    fn pre_processing_per_round(_vertices: &mut Vertices<'_, Self::Value>, _config: &KernelState, _next_iteration: u64) {}

    /// Populates kernel-specific extension fields on a freshly fetched
    /// `TileBlock` (spec §3's "kernel-specific extension fields").
    fn fill_extension_fields(_config: &KernelState, _tile_block_id: u64) -> Box<[u8]> {
        Box::new([])
    }

    /// Whether the run should terminate given the current vertex-domain
    /// state (spec §4.9 step 7's bfs/cc "no active vertex" clause).
    fn terminate_on_no_active_vertices() -> bool {
        false
    }
}
