/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Bounded MPMC transport with variable-weight slots and cooperative blocking.
//!
//! This is the "two-lock" variant described in spec §4.1: a producer-side
//! lock serializes slot reservation (`head` advancement), a consumer-side
//! lock serializes slot retirement (`tail`/`tail2` advancement), and slot
//! *status* transitions themselves are lock-free, synchronized by
//! acquire/release orderings on a per-slot [`AtomicU8`]. The "combining lock"
//! variant from spec §4.1 is not implemented in this pass (see
//! `DESIGN.md`, Open Questions).
//!
//! Slots are weighted rather than byte-addressed: each producer supplies the
//! `weight` of its payload (e.g. the serialized size a `TileBlock` would
//! occupy) and the buffer enforces `Σ weight ≤ capacity` the same way the
//! byte arena of spec §4.1 enforces `free_space + in_use = capacity`. This
//! keeps payloads as ordinary owned Rust values (`T`) instead of requiring
//! callers to hand-serialize into a raw arena.

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

const INIT: u8 = 0;
const READY: u8 = 1;
const DONE: u8 = 2;

struct Slot<T> {
    status: AtomicU8,
    weight: AtomicUsize,
    payload: UnsafeCell<Option<T>>,
}

// SAFETY: access to `payload` is gated by `status` transitions, which are
// synchronized with acquire/release orderings; at most one side (producer
// before `set_ready`, consumer after `get`) ever touches the cell at a time.
unsafe impl<T: Send> Sync for Slot<T> {}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot {
            status: AtomicU8::new(DONE),
            weight: AtomicUsize::new(0),
            payload: UnsafeCell::new(None),
        }
    }
}

/// Outcome of a non-blocking ring-buffer operation.
///
/// `BackpressureSignal` and `ShutdownSignal` from spec §7 are modelled here
/// rather than as `Err`: neither is an error condition for a well-behaved
/// caller, they are ordinary, expected transport states.
pub enum RingOutcome<T> {
    Ready(T),
    WouldBlock,
    Shutdown,
}

impl<T> RingOutcome<T> {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, RingOutcome::Shutdown)
    }
}

/// A reserved slot handle returned by [`RingBuffer::put`].
///
/// Dropping a `PutSlot` without calling [`RingBuffer::set_ready`] leaves the
/// slot permanently `INIT`-with-no-owner, which would stall the ring; the
/// pipeline stages in this crate always pair `put` with `set_ready` in the
/// same function, never across an early return.
pub struct PutSlot {
    index: u64,
}

/// A retired slot handle returned by [`RingBuffer::get`], carrying the
/// consumed payload.
pub struct GetSlot<T> {
    index: u64,
    pub value: T,
}

struct ProducerSide {
    head: u64,
}

struct ConsumerSide {
    tail: u64,
}

/// A bounded multi-producer / multi-consumer ring buffer of weighted slots.
pub struct RingBuffer<T> {
    slots: Box<[Slot<T>]>,
    capacity_weight: usize,
    in_use: CachePadded<AtomicUsize>,
    tail2: CachePadded<AtomicU64>,
    producer: Mutex<ProducerSide>,
    producer_cv: Condvar,
    consumer: Mutex<ConsumerSide>,
    consumer_cv: Condvar,
    shutdown: CachePadded<std::sync::atomic::AtomicBool>,
    /// FIFO of slot indices whose weight has not yet been reclaimed, kept so
    /// `tail2` can only advance past a *contiguous* `DONE` prefix (spec §4.1:
    /// "reclamation advances tail2 past any prefix of DONE slots").
    reclaim_queue: Mutex<VecDeque<u64>>,
}

impl<T> RingBuffer<T> {
    /// Creates a ring buffer with `slot_count` slots and a total weight
    /// budget of `capacity_weight`.
    pub fn new(slot_count: usize, capacity_weight: usize) -> Self {
        assert!(slot_count > 0, "a ring buffer needs at least one slot");
        let slots = (0..slot_count).map(|_| Slot::default()).collect::<Vec<_>>().into_boxed_slice();
        RingBuffer {
            slots,
            capacity_weight,
            in_use: CachePadded::new(AtomicUsize::new(0)),
            tail2: CachePadded::new(AtomicU64::new(0)),
            producer: Mutex::new(ProducerSide { head: 0 }),
            producer_cv: Condvar::new(),
            consumer: Mutex::new(ConsumerSide { tail: 0 }),
            consumer_cv: Condvar::new(),
            shutdown: CachePadded::new(std::sync::atomic::AtomicBool::new(false)),
            reclaim_queue: Mutex::new(VecDeque::new()),
        }
    }

    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, cursor: u64) -> usize {
        (cursor % self.slot_count() as u64) as usize
    }

    /// Returns an instantaneous estimate of free weight capacity.
    pub fn free_space(&self) -> usize {
        self.capacity_weight.saturating_sub(self.in_use.load(Ordering::Relaxed))
    }

    pub fn is_empty(&self) -> bool {
        let head = self.producer.lock().unwrap().head;
        let tail = self.consumer.lock().unwrap().tail;
        head == tail
    }

    pub fn is_full(&self) -> bool {
        self.free_space() == 0
    }

    /// Marks the buffer unhealthy: all blocked and future `put`/`get` calls
    /// return [`RingOutcome::Shutdown`] once they observe it.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.producer_cv.notify_all();
        self.consumer_cv.notify_all();
    }

    fn would_fit(&self, weight: usize, head: u64, tail2: u64) -> bool {
        head - tail2 < self.slot_count() as u64
            && self.in_use.load(Ordering::Relaxed) + weight <= self.capacity_weight
    }

    /// Reserves a slot of the given `weight`. In blocking mode parks on the
    /// producer condvar until space is available or the buffer shuts down;
    /// in non-blocking mode returns `WouldBlock` immediately.
    pub fn put(&self, weight: usize, blocking: bool) -> RingOutcome<PutSlot> {
        let mut guard = self.producer.lock().unwrap();
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return RingOutcome::Shutdown;
            }
            let tail2 = self.tail2.load(Ordering::Acquire);
            if self.would_fit(weight, guard.head, tail2) {
                let index = guard.head;
                guard.head += 1;
                drop(guard);
                let slot = &self.slots[self.index(index)];
                slot.weight.store(weight, Ordering::Relaxed);
                slot.status.store(INIT, Ordering::Relaxed);
                self.in_use.fetch_add(weight, Ordering::Relaxed);
                self.reclaim_queue.lock().unwrap().push_back(index);
                return RingOutcome::Ready(PutSlot { index });
            }
            if !blocking {
                return RingOutcome::WouldBlock;
            }
            guard = self.producer_cv.wait(guard).unwrap();
        }
    }

    /// Writes the payload into a reserved slot and transitions `INIT → READY`.
    pub fn set_ready(&self, slot: PutSlot, value: T) {
        let s = &self.slots[self.index(slot.index)];
        // SAFETY: we are the unique owner of this slot between `put` and
        // `set_ready`; no other thread reads `payload` before `status`
        // becomes `READY`.
        unsafe { *s.payload.get() = Some(value) };
        s.status.store(READY, Ordering::Release);
        self.consumer_cv.notify_all();
    }

    /// Dequeues the oldest `READY` slot. Blocking and non-blocking variants.
    pub fn get(&self, blocking: bool) -> RingOutcome<GetSlot<T>> {
        let mut guard = self.consumer.lock().unwrap();
        loop {
            let slot = &self.slots[self.index(guard.tail)];
            if slot.status.load(Ordering::Acquire) == READY {
                let index = guard.tail;
                guard.tail += 1;
                drop(guard);
                // SAFETY: status==READY was observed with Acquire, pairing
                // with the producer's Release store in `set_ready`.
                let value = unsafe { (*slot.payload.get()).take() }.expect("ready slot has a payload");
                return RingOutcome::Ready(GetSlot { index, value });
            }
            if self.shutdown.load(Ordering::Acquire) {
                return RingOutcome::Shutdown;
            }
            if !blocking {
                return RingOutcome::WouldBlock;
            }
            guard = self.consumer_cv.wait(guard).unwrap();
        }
    }

    /// Transitions `READY → DONE`, releasing the slot's weight for reuse and
    /// advancing `tail2` past any now-contiguous prefix of `DONE` slots.
    pub fn set_done(&self, slot: GetSlot<T>) {
        let s = &self.slots[self.index(slot.index)];
        // Idempotent: re-invoking on an already-DONE slot is a no-op, as
        // required by spec §8 ("set_done is idempotent").
        if s.status.swap(DONE, Ordering::AcqRel) == DONE {
            return;
        }
        let weight = s.weight.load(Ordering::Relaxed);
        self.in_use.fetch_sub(weight, Ordering::Relaxed);

        let mut q = self.reclaim_queue.lock().unwrap();
        while let Some(&front) = q.front() {
            let front_slot = &self.slots[self.index(front)];
            if front_slot.status.load(Ordering::Acquire) != DONE {
                break;
            }
            q.pop_front();
            self.tail2.fetch_add(1, Ordering::Release);
        }
        drop(q);
        self.producer_cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_done_round_trip() {
        let rb: RingBuffer<u32> = RingBuffer::new(4, 4);
        let slot = match rb.put(1, false) {
            RingOutcome::Ready(s) => s,
            _ => panic!("expected a reserved slot"),
        };
        rb.set_ready(slot, 42);
        let got = match rb.get(false) {
            RingOutcome::Ready(g) => g,
            _ => panic!("expected a ready slot"),
        };
        assert_eq!(got.value, 42);
        rb.set_done(got);
        assert!(rb.is_empty());
        assert_eq!(rb.free_space(), 4);
    }

    #[test]
    fn backpressure_signals_would_block_when_full() {
        let rb: RingBuffer<u32> = RingBuffer::new(2, 2);
        let s0 = match rb.put(1, false) {
            RingOutcome::Ready(s) => s,
            _ => panic!(),
        };
        rb.set_ready(s0, 1);
        let s1 = match rb.put(1, false) {
            RingOutcome::Ready(s) => s,
            _ => panic!(),
        };
        rb.set_ready(s1, 2);
        match rb.put(1, false) {
            RingOutcome::WouldBlock => {}
            _ => panic!("expected WouldBlock, ring is at capacity"),
        }
    }

    #[test]
    fn shutdown_propagates_to_blocked_sides() {
        let rb: RingBuffer<u32> = RingBuffer::new(2, 2);
        rb.shutdown();
        assert!(matches!(rb.put(1, true), RingOutcome::Shutdown));
        assert!(matches!(rb.get(true), RingOutcome::Shutdown));
    }

    #[test]
    fn set_done_is_idempotent() {
        let rb: RingBuffer<u32> = RingBuffer::new(2, 2);
        let slot = match rb.put(1, false) {
            RingOutcome::Ready(s) => s,
            _ => panic!(),
        };
        rb.set_ready(slot, 7);
        let got = match rb.get(false) {
            RingOutcome::Ready(g) => g,
            _ => panic!(),
        };
        let index = got.index;
        rb.set_done(got);
        // Re-invoking set_done on the same index (simulating a racing
        // duplicate release) must not double-free the weight budget.
        rb.set_done(GetSlot { index, value: 0u32 });
        assert_eq!(rb.free_space(), 2);
    }
}
