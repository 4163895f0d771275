//! Adaptive batching single-producer/single-consumer ring.
//!
//! Checking a slot that the other core has just written costs a cache miss.
//! Instead of checking every slot on every operation both sides keep a
//! *batch checkpoint*, a cursor some distance ahead of them that was
//! confirmed free (producer) or filled (consumer). Slots before the
//! checkpoint are accessed unconditionally.
//!
//! The producer always probes a fixed batch size ahead. The consumer starts
//! from its learned `batch_history` and halves the distance on every failed
//! probe, then slowly grows it back each time it completes a lap.
//!
//! Occupancy is read from the slots and the producer only advances into
//! space it confirmed free `B = batch_size` slots ahead. `enqueue` reports
//! full as soon as that probe lands on an occupied slot, which happens once
//! `N - B` elements are held. Elements enqueued after an earlier successful
//! probe may take the count up to `N - 1`, never further. With `B = 1` the
//! two bounds meet.

use core::cell::UnsafeCell;

use crate::{
    backoff::{DEFAULT_CONGESTION_PENALTY, congestion},
    cache::CachePadded,
    error::{Empty, EnqueueError},
    queue::{Consumer, Producer, RawQueue},
    slot::{FlagSlot, Slot},
    trace::{error, trace},
};

/// Default number of slots.
pub const DEFAULT_CAPACITY: usize = 8192;

/// Batched queue of arbitrary values, occupancy kept in a flag per slot.
pub type SpscQueue<T, const N: usize> = BatchQueue<FlagSlot<T>, N>;

/// Batched queue of bare atomic words where zero marks an empty slot.
///
/// `W` is one of `AtomicU32`, `AtomicU64` or `AtomicUsize`.
pub type WordQueue<W, const N: usize> = BatchQueue<W, N>;

/// Tuning knobs of the batching heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BatchConfig {
    /// Distance of the producer probe and upper bound of the consumer look-ahead.
    pub batch_size: usize,

    /// Growth of the consumer look-ahead per completed lap.
    pub batch_increment: usize,

    /// Busy-wait iterations after a failed operation or probe.
    pub congestion_penalty: u32,
}

impl BatchConfig {
    /// Defaults for a ring of `capacity` slots: a batch of a sixteenth of
    /// the ring, growing by half a batch per lap.
    #[must_use]
    pub const fn for_capacity(capacity: usize) -> Self {
        let batch_size = at_least_one(capacity / 16);
        BatchConfig {
            batch_size,
            batch_increment: at_least_one(batch_size / 2),
            congestion_penalty: DEFAULT_CONGESTION_PENALTY,
        }
    }

    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub const fn with_batch_increment(mut self, batch_increment: usize) -> Self {
        self.batch_increment = batch_increment;
        self
    }

    #[must_use]
    pub const fn with_congestion_penalty(mut self, congestion_penalty: u32) -> Self {
        self.congestion_penalty = congestion_penalty;
        self
    }
}

const fn at_least_one(value: usize) -> usize {
    if value == 0 { 1 } else { value }
}

struct HeadCursor {
    head: usize,
    batch_head: usize,
    batch_size: usize,
    congestion_penalty: u32,
}

struct TailCursor {
    tail: usize,
    batch_tail: usize,
    batch_history: usize,
    batch_size: usize,
    batch_increment: usize,
    congestion_penalty: u32,
}

/// Fixed-capacity ring of `N` slots for one producer and one consumer.
///
/// Storage is embedded, the queue never allocates.
/// Use [`BatchQueue::split_mut`] or [`BatchQueue::split_arc`] to obtain the two endpoints.
pub struct BatchQueue<S, const N: usize> {
    // Producer-owned.
    head: CachePadded<UnsafeCell<HeadCursor>>,
    // Consumer-owned.
    tail: CachePadded<UnsafeCell<TailCursor>>,
    slots: CachePadded<[S; N]>,
}

unsafe impl<S, const N: usize> Sync for BatchQueue<S, N>
where
    S: Slot,
    S::Item: Send,
{
}

impl<S, const N: usize> Default for BatchQueue<S, N>
where
    S: Slot,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S, const N: usize> BatchQueue<S, N>
where
    S: Slot,
{
    /// Creates an empty queue with [`BatchConfig::for_capacity`] settings.
    ///
    /// Usable in constant context, so a queue may live in a `static`.
    /// A static queue is driven through the unsafe [`BatchQueue::enqueue`]
    /// and [`BatchQueue::dequeue`], the caller upholding the one-producer,
    /// one-consumer contract.
    #[cfg(not(loom))]
    #[must_use]
    pub const fn new() -> Self {
        const { assert!(N >= 2, "ring needs at least two slots") };

        Self::from_parts(BatchConfig::for_capacity(N), [const { S::VACANT }; N])
    }

    #[cfg(loom)]
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BatchConfig::for_capacity(N))
    }

    /// Creates an empty queue with custom batching.
    ///
    /// # Panics
    ///
    /// Panics if the batch size or increment is zero, or the batch size is not below `N`.
    #[must_use]
    pub fn with_config(config: BatchConfig) -> Self {
        const { assert!(N >= 2, "ring needs at least two slots") };

        if config.batch_size == 0 || config.batch_size >= N || config.batch_increment == 0 {
            invalid_config(config, N);
        }

        Self::from_parts(config, core::array::from_fn(|_| S::vacant()))
    }

    const fn from_parts(config: BatchConfig, slots: [S; N]) -> Self {
        BatchQueue {
            head: CachePadded::new(UnsafeCell::new(HeadCursor {
                head: 0,
                batch_head: 0,
                batch_size: config.batch_size,
                congestion_penalty: config.congestion_penalty,
            })),
            tail: CachePadded::new(UnsafeCell::new(TailCursor {
                tail: 0,
                batch_tail: 0,
                batch_history: config.batch_size,
                batch_size: config.batch_size,
                batch_increment: config.batch_increment,
                congestion_penalty: config.congestion_penalty,
            })),
            slots: CachePadded::new(slots),
        }
    }

    /// Number of slots.
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Splits the queue into its two endpoints borrowing it.
    ///
    /// Cursors live in the queue, so the queue may be split again once both
    /// endpoints are dropped and continues where it left off.
    pub fn split_mut(&mut self) -> (Producer<&Self>, Consumer<&Self>) {
        let me = &*self;
        // Safety: `&mut self` guarantees no other endpoints are alive.
        unsafe { (Producer::new(me), Consumer::new(me)) }
    }

    /// Moves the queue into an `Arc` shared by its two endpoints.
    #[cfg(feature = "alloc")]
    pub fn split_arc(
        self,
    ) -> (
        Producer<alloc::sync::Arc<Self>>,
        Consumer<alloc::sync::Arc<Self>>,
    ) {
        let arc = alloc::sync::Arc::new(self);
        // Safety: the queue was owned, no other endpoints exist.
        unsafe { (Producer::new(arc.clone()), Consumer::new(arc)) }
    }

    /// Current look-ahead distance of the consumer.
    ///
    /// # Safety
    ///
    /// Must not be called concurrently with `dequeue`.
    #[inline]
    pub unsafe fn batch_history(&self) -> usize {
        unsafe { (*self.tail.get()).batch_history }
    }

    /// Index `distance` slots after `cursor`, or 0 if that runs off the end of the ring.
    #[inline(always)]
    fn probe_index(cursor: usize, distance: usize) -> usize {
        let index = cursor + distance;
        if index >= N { 0 } else { index }
    }

    #[inline(always)]
    fn next_index(cursor: usize) -> usize {
        if cursor + 1 == N { 0 } else { cursor + 1 }
    }

    /// Appends `value` after the last element.
    ///
    /// # Safety
    ///
    /// Must not be called concurrently with another `enqueue`.
    #[inline]
    pub unsafe fn enqueue(&self, value: S::Item) -> Result<(), EnqueueError<S::Item>> {
        if !S::admit(&value) {
            error!("rejected value reserved as the empty-slot marker");
            return Err(EnqueueError::Reserved(value));
        }

        // Safety: the producer cursor is only touched by the producer.
        let cursor = unsafe { &mut *self.head.get() };

        if cursor.head == cursor.batch_head {
            let probe = Self::probe_index(cursor.head, cursor.batch_size);
            if self.slots[probe].is_occupied() {
                trace!(head = cursor.head, probe, "queue full");
                congestion(cursor.congestion_penalty);
                return Err(EnqueueError::Full(value));
            }

            // Everything from `head` up to the vacant probe is vacant too.
            cursor.batch_head = probe;
        }

        // Safety: slot is before the confirmed checkpoint and value was admitted.
        unsafe { self.slots[cursor.head].put(value) };
        cursor.head = Self::next_index(cursor.head);

        Ok(())
    }

    /// Removes the first element.
    ///
    /// # Safety
    ///
    /// Must not be called concurrently with another `dequeue` or `front_peek_with`.
    #[inline]
    pub unsafe fn dequeue(&self) -> Result<S::Item, Empty> {
        // Safety: the consumer cursor is only touched by the consumer.
        let cursor = unsafe { &mut *self.tail.get() };

        if cursor.tail == cursor.batch_tail {
            self.find_batch_tail(cursor)?;
        }

        // Safety: slot is before the confirmed checkpoint.
        let value = unsafe { self.slots[cursor.tail].take() };
        cursor.tail = Self::next_index(cursor.tail);

        if cursor.tail == 0 {
            cursor.batch_history =
                (cursor.batch_history + cursor.batch_increment).min(cursor.batch_size);
        }

        Ok(value)
    }

    /// Probes shrinking distances ahead of `tail` for an occupied slot.
    fn find_batch_tail(&self, cursor: &mut TailCursor) -> Result<(), Empty> {
        let mut distance = cursor.batch_history;

        loop {
            let probe = Self::probe_index(cursor.tail, distance);
            if self.slots[probe].is_occupied() {
                // Everything from `tail` up to the occupied probe is occupied too.
                cursor.batch_history = distance;
                cursor.batch_tail = if probe == cursor.tail {
                    Self::next_index(probe)
                } else {
                    probe
                };
                return Ok(());
            }

            congestion(cursor.congestion_penalty);

            if distance == 0 {
                trace!(tail = cursor.tail, "queue empty");
                return Err(Empty);
            }
            distance >>= 1;
        }
    }

    /// Calls `f` with the first element without removing it.
    ///
    /// # Safety
    ///
    /// Must not be called concurrently with `dequeue` or another `front_peek_with`.
    #[inline]
    pub unsafe fn front_peek_with<R>(&self, f: impl FnOnce(&S::Item) -> R) -> Result<R, Empty> {
        // Safety: the consumer cursor is only touched by the consumer.
        let tail = unsafe { (*self.tail.get()).tail };
        unsafe { self.slots[tail].inspect(f) }.ok_or(Empty)
    }
}

unsafe impl<S, const N: usize> RawQueue for BatchQueue<S, N>
where
    S: Slot,
{
    type Item = S::Item;

    #[inline(always)]
    unsafe fn enqueue(&self, value: S::Item) -> Result<(), EnqueueError<S::Item>> {
        unsafe { BatchQueue::enqueue(self, value) }
    }

    #[inline(always)]
    unsafe fn dequeue(&self) -> Result<S::Item, Empty> {
        unsafe { BatchQueue::dequeue(self) }
    }

    #[inline(always)]
    unsafe fn front_peek_with<R>(&self, f: impl FnOnce(&S::Item) -> R) -> Result<R, Empty> {
        unsafe { BatchQueue::front_peek_with(self, f) }
    }
}

impl<S, B, const N: usize> Consumer<B>
where
    S: Slot,
    B: core::ops::Deref<Target = BatchQueue<S, N>>,
{
    /// Current look-ahead distance of the adaptive batching.
    #[inline]
    pub fn batch_history(&self) -> usize {
        // Safety: this is the only consumer and `&self` excludes a concurrent dequeue through it.
        unsafe { self.queue().batch_history() }
    }
}

#[cold]
#[inline(never)]
fn invalid_config(config: BatchConfig, capacity: usize) -> ! {
    error!(?config, capacity, "invalid batch configuration");
    panic!("invalid batch configuration {config:?} for a ring of {capacity} slots");
}

#[cfg(all(test, feature = "std", not(loom)))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sync::AtomicU32;

    const QUIET: BatchConfig = BatchConfig::for_capacity(64).with_congestion_penalty(0);

    #[test]
    fn default_config() {
        let config = BatchConfig::for_capacity(DEFAULT_CAPACITY);
        assert_eq!(config.batch_size, 512);
        assert_eq!(config.batch_increment, 256);
        assert_eq!(config.congestion_penalty, 1000);

        let tiny = BatchConfig::for_capacity(8);
        assert_eq!(tiny.batch_size, 1);
        assert_eq!(tiny.batch_increment, 1);
    }

    #[test]
    #[should_panic(expected = "invalid batch configuration")]
    fn batch_must_fit_the_ring() {
        let _ = SpscQueue::<u32, 8>::with_config(BatchConfig::for_capacity(8).with_batch_size(8));
    }

    #[test]
    fn peek_does_not_consume() {
        let mut queue = SpscQueue::<String, 16>::new();
        let (mut tx, mut rx) = queue.split_mut();

        assert_eq!(rx.front_peek(), Err(Empty));
        tx.enqueue("a".to_owned()).unwrap();
        tx.enqueue("b".to_owned()).unwrap();

        assert_eq!(rx.front_peek().as_deref(), Ok("a"));
        assert_eq!(rx.front_peek_with(String::len), Ok(1));
        assert_eq!(rx.dequeue().as_deref(), Ok("a"));
        assert_eq!(rx.front_peek().as_deref(), Ok("b"));
        assert!(!rx.is_empty());
    }

    #[test]
    fn zero_is_a_value_in_flag_slots() {
        let mut queue = SpscQueue::<u32, 8>::new();
        let (mut tx, mut rx) = queue.split_mut();

        tx.enqueue(0).unwrap();
        assert_eq!(rx.dequeue(), Ok(0));
    }

    #[test]
    fn word_queue_rejects_sentinel() {
        let mut queue = WordQueue::<AtomicU32, 8>::new();
        let (mut tx, mut rx) = queue.split_mut();

        assert_eq!(tx.enqueue(0), Err(EnqueueError::Reserved(0)));
        assert!(rx.is_empty());

        tx.enqueue(3).unwrap();
        assert_eq!(rx.front_peek(), Ok(3));
        assert_eq!(rx.dequeue(), Ok(3));
        assert_eq!(rx.dequeue(), Err(Empty));
    }

    static WORDS: WordQueue<AtomicU32, 16> = WordQueue::<AtomicU32, 16>::new();

    #[test]
    fn lives_in_a_static() {
        unsafe {
            WORDS.enqueue(5).unwrap();
            assert_eq!(WORDS.front_peek_with(|v| *v), Ok(5));
            assert_eq!(WORDS.dequeue(), Ok(5));
            assert_eq!(WORDS.dequeue(), Err(Empty));
        }
    }

    #[test]
    fn held_values_dropped_with_queue() {
        let value = Arc::new(());
        {
            let mut queue = SpscQueue::<Arc<()>, 8>::new();
            let (mut tx, _rx) = queue.split_mut();
            for _ in 0..5 {
                tx.enqueue(Arc::clone(&value)).unwrap();
            }
            assert_eq!(Arc::strong_count(&value), 6);
        }
        assert_eq!(Arc::strong_count(&value), 1);
    }

    #[test]
    fn failed_probes_shrink_history() {
        let mut queue = SpscQueue::<u32, 64>::with_config(QUIET);
        let (mut tx, mut rx) = queue.split_mut();
        assert_eq!(rx.batch_history(), 4);

        tx.enqueue(1).unwrap();
        assert_eq!(rx.dequeue(), Ok(1));
        assert_eq!(rx.batch_history(), 0);

        // Empty must not disturb the cursor.
        assert_eq!(rx.dequeue(), Err(Empty));
        assert_eq!(rx.batch_history(), 0);

        // Zero look-ahead persists until the lap increment.
        tx.enqueue(2).unwrap();
        assert_eq!(rx.dequeue(), Ok(2));
        assert_eq!(rx.batch_history(), 0);
    }

    #[test]
    fn laps_grow_history_back() {
        let mut queue = SpscQueue::<u32, 64>::with_config(QUIET);
        let (mut tx, mut rx) = queue.split_mut();

        // Trickle so the consumer learns a short look-ahead.
        tx.enqueue(1).unwrap();
        assert_eq!(rx.dequeue(), Ok(1));

        let mut sent = 1;
        let mut received = 1;
        let mut history = vec![rx.batch_history()];

        // Keep the ring topped up, one lap per round.
        for _ in 0..3 {
            for _ in 0..64 {
                while tx.enqueue(sent + 1).is_ok() {
                    sent += 1;
                }
                received += 1;
                assert_eq!(rx.dequeue(), Ok(received));
            }
            history.push(rx.batch_history());
        }

        assert_eq!(history, [0, 2, 4, 4]);
    }
}
