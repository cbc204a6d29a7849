/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Global vertex state owned by the [`crate::vertex_domain::VertexDomain`]
//! (spec §3).

use sux::bits::AtomicBitVec;
use sync_cell_slice::SyncSlice;

/// Per-vertex in/out degree, loaded once from `vertex-degrees.dat` (spec §6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Degree {
    pub in_degree: u32,
    pub out_degree: u32,
}

/// The two value arrays, the three bitmaps, and the degree table (spec §3).
///
/// `current`/`next` are exposed as [`SyncSlice`]s so that many reducer
/// threads can write disjoint (or, in `Atomic`/`Locking` reducer mode,
/// overlapping but synchronized) cells without a single global lock,
/// matching the teacher's own `PageRank::run_with_logging` use of
/// `SyncSlice` for its shared rank vector.
pub struct VertexState<V> {
    pub count: usize,
    pub current: Vec<V>,
    pub next: Vec<V>,
    pub active_current: AtomicBitVec,
    pub active_next: AtomicBitVec,
    pub changed: AtomicBitVec,
    pub degrees: Box<[Degree]>,
}

impl<V: Clone + Default> VertexState<V> {
    pub fn new(count: usize, degrees: Box<[Degree]>) -> Self {
        assert_eq!(degrees.len(), count);
        VertexState {
            count,
            current: vec![V::default(); count],
            next: vec![V::default(); count],
            active_current: AtomicBitVec::new(count),
            active_next: AtomicBitVec::new(count),
            changed: AtomicBitVec::new(count),
            degrees,
        }
    }

    /// A [`SyncSlice`] view of `current`, for read access shared across
    /// threads during an iteration (spec §5: "current is read-only during an
    /// iteration").
    pub fn current_sync(&mut self) -> &[sync_cell_slice::SyncCell<V>] {
        self.current.as_sync_slice()
    }

    pub fn next_sync(&mut self) -> &[sync_cell_slice::SyncCell<V>] {
        self.next.as_sync_slice()
    }

    /// Sets a bit in `active_next`, idempotently (spec §8: "setting an
    /// active_next bit that is already set is a no-op").
    #[inline]
    pub fn mark_active_next(&self, id: usize) {
        self.active_next.set(id, true, std::sync::atomic::Ordering::Relaxed);
    }

    /// Swaps `current ↔ next` and `active_current ↔ active_next`, then zeros
    /// the bitmap that becomes the new `next` (spec §4.9 step 2–3).
    pub fn swap_and_reset(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
        std::mem::swap(&mut self.active_current, &mut self.active_next);
        self.active_next.fill(false, std::sync::atomic::Ordering::Relaxed);
        self.changed.fill(false, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn count_active_next(&self) -> usize {
        (0..self.count)
            .filter(|&i| self.active_next.get(i, std::sync::atomic::Ordering::Relaxed))
            .count()
    }
}
