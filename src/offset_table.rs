/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The per-tile offset table and the fan-out/fan-in refcount protocol
//! (spec §3's "Tile Offset Table", "Invariant (refcount law)").
//!
//! Implemented as an arena+index with atomic refcount cells (spec §9:
//! "Ownership of shared tile buffers"). A `TileHandle<T>` bundles a pointer
//! to the shared payload with a refcount cell; `Clone` increments, `Drop`
//! decrements, and the thread that observes the transition to zero is the
//! unique releaser — matching spec §5's ordering guarantee.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Back-reference to the storage-level I/O batch holding several tiles
/// (spec §3's "Bundle"): released to its owner when the last contained tile
/// is done.
pub struct Bundle {
    refcnt: AtomicI64,
    on_release: Box<dyn Fn() + Send + Sync>,
}

impl Bundle {
    pub fn new(tile_count: i64, on_release: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Bundle {
            refcnt: AtomicI64::new(tile_count),
            on_release: Box::new(on_release),
        })
    }

    /// Decrements the bundle refcount; releases the bundle when it reaches
    /// zero. Returns `true` iff this call was the one that released it.
    pub fn release_one(&self) -> bool {
        let prev = self.refcnt.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev >= 1, "bundle refcount underflow");
        if prev == 1 {
            (self.on_release)();
            true
        } else {
            false
        }
    }
}

/// One slot in the tile offset table (spec §3): tracks readiness, the
/// installed payload pointer, and the three refcounts that gate release.
pub struct TileSlot<T> {
    pub data_ready: AtomicBool,
    pub data_active: AtomicBool,
    payload: Mutex<Option<Arc<T>>>,
    /// Generation counter guarding against ABA on slot reuse across
    /// iterations (spec §9: "a `{slot_index, generation}` cell where
    /// generation rules out ABA").
    pub generation: AtomicU64,
    pub fetch_refcnt: AtomicI64,
    pub process_refcnt: AtomicI64,
    pub vr_refcnt: AtomicI64,
    bundle: Mutex<Option<Arc<Bundle>>>,
}

impl<T> Default for TileSlot<T> {
    fn default() -> Self {
        TileSlot {
            data_ready: AtomicBool::new(false),
            data_active: AtomicBool::new(false),
            payload: Mutex::new(None),
            generation: AtomicU64::new(0),
            fetch_refcnt: AtomicI64::new(0),
            process_refcnt: AtomicI64::new(0),
            vr_refcnt: AtomicI64::new(0),
            bundle: Mutex::new(None),
        }
    }
}

impl<T> TileSlot<T> {
    /// Leader-installs the shared payload with `num_tile_partition` set as
    /// both `fetch_refcnt` and `process_refcnt` (spec §3's refcount law),
    /// publishing with release ordering so other partitions can spin-wait
    /// on `data_ready` with acquire semantics (spec §5).
    pub fn install(&self, payload: Arc<T>, num_tile_partition: i64, bundle: Arc<Bundle>) {
        self.fetch_refcnt.store(num_tile_partition, Ordering::Relaxed);
        self.process_refcnt.store(num_tile_partition, Ordering::Relaxed);
        self.vr_refcnt.store(num_tile_partition, Ordering::Relaxed);
        *self.bundle.lock().unwrap() = Some(bundle);
        *self.payload.lock().unwrap() = Some(payload);
        self.generation.fetch_add(1, Ordering::Relaxed);
        self.data_ready.store(true, Ordering::Release);
    }

    /// Spin-waits for `data_ready`, returning the installed payload.
    pub fn wait_for_payload(&self) -> Arc<T> {
        loop {
            if self.data_ready.load(Ordering::Acquire) {
                if let Some(p) = self.payload.lock().unwrap().clone() {
                    return p;
                }
            }
            std::hint::spin_loop();
        }
    }

    /// Decrements `fetch_refcnt`; the caller that observes `1 → 0` is the
    /// unique releaser of the underlying storage slot (spec §3, §8 S5).
    #[must_use]
    pub fn release_fetch(&self) -> bool {
        let prev = self.fetch_refcnt.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev >= 1, "fetch_refcnt underflow");
        prev == 1
    }

    #[must_use]
    pub fn release_process(&self) -> bool {
        let prev = self.process_refcnt.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev >= 1, "process_refcnt underflow");
        prev == 1
    }

    #[must_use]
    pub fn release_vr(&self) -> bool {
        let prev = self.vr_refcnt.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev >= 1, "vr_refcnt underflow");
        prev == 1
    }

    /// Clears the slot for reuse in the next iteration.
    pub fn clear(&self) {
        self.data_ready.store(false, Ordering::Release);
        *self.payload.lock().unwrap() = None;
        *self.bundle.lock().unwrap() = None;
    }

    pub fn bundle(&self) -> Option<Arc<Bundle>> {
        self.bundle.lock().unwrap().clone()
    }
}

/// A table of `TileSlot<T>`, one per tile id local to an engine shard.
pub struct OffsetTable<T> {
    slots: Box<[TileSlot<T>]>,
}

impl<T> OffsetTable<T> {
    pub fn new(count_tiles_per_engine: usize) -> Self {
        let slots = (0..count_tiles_per_engine)
            .map(|_| TileSlot::default())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        OffsetTable { slots }
    }

    pub fn get(&self, local_id: usize) -> &TileSlot<T> {
        &self.slots[local_id]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// S5: Refcount release — exactly one of three partitions observes the
    /// transition to zero.
    #[test]
    fn s5_refcount_release_is_unique() {
        let table: OffsetTable<u32> = OffsetTable::new(1);
        let slot = table.get(0);
        let released = Arc::new(AtomicUsize::new(0));
        let bundle = Bundle::new(1, {
            let released = released.clone();
            move || {
                released.fetch_add(1, Ordering::SeqCst);
            }
        });
        slot.install(Arc::new(7u32), 3, bundle);

        let release_count = (0..3).filter(|_| slot.release_fetch()).count();
        assert_eq!(release_count, 1, "exactly one partition must see fetch_refcnt hit zero");

        let bundle_release_count = (0..1)
            .map(|_| slot.bundle().unwrap().release_one())
            .filter(|&x| x)
            .count();
        assert_eq!(bundle_release_count, 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refcounts_never_go_negative_within_declared_partitions() {
        let table: OffsetTable<u32> = OffsetTable::new(1);
        let slot = table.get(0);
        let bundle = Bundle::new(1, || {});
        slot.install(Arc::new(0u32), 2, bundle);
        assert!(slot.release_fetch());
        assert!(!{
            let prev = slot.fetch_refcnt.load(Ordering::SeqCst);
            prev < 0
        });
    }
}
