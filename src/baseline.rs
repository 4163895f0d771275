//! Unbatched ring used as a reference point.
//!
//! Checks the occupancy of the slot it is about to use on every single
//! operation. Same endpoints and slot types as the batched queue, no adaptive
//! look-ahead and no congestion penalty.

use core::cell::UnsafeCell;

use crate::{
    cache::CachePadded,
    error::{Empty, EnqueueError},
    queue::{Consumer, Producer, RawQueue},
    slot::Slot,
};

/// Default number of slots of the baseline ring.
pub const BASELINE_CAPACITY: usize = 131_072;

pub struct BaselineQueue<S, const N: usize> {
    head: CachePadded<UnsafeCell<usize>>,
    tail: CachePadded<UnsafeCell<usize>>,
    slots: CachePadded<[S; N]>,
}

unsafe impl<S, const N: usize> Sync for BaselineQueue<S, N>
where
    S: Slot,
    S::Item: Send,
{
}

impl<S, const N: usize> Default for BaselineQueue<S, N>
where
    S: Slot,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S, const N: usize> BaselineQueue<S, N>
where
    S: Slot,
{
    /// Creates an empty queue. Usable in constant context.
    #[cfg(not(loom))]
    #[must_use]
    pub const fn new() -> Self {
        const { assert!(N >= 1, "ring needs at least one slot") };

        Self::from_slots([const { S::VACANT }; N])
    }

    #[cfg(loom)]
    #[must_use]
    pub fn new() -> Self {
        const { assert!(N >= 1, "ring needs at least one slot") };

        Self::from_slots(core::array::from_fn(|_| S::vacant()))
    }

    const fn from_slots(slots: [S; N]) -> Self {
        BaselineQueue {
            head: CachePadded::new(UnsafeCell::new(0)),
            tail: CachePadded::new(UnsafeCell::new(0)),
            slots: CachePadded::new(slots),
        }
    }

    pub fn split_mut(&mut self) -> (Producer<&Self>, Consumer<&Self>) {
        let me = &*self;
        // Safety: `&mut self` guarantees no other endpoints are alive.
        unsafe { (Producer::new(me), Consumer::new(me)) }
    }

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

    #[inline(always)]
    fn next_index(cursor: usize) -> usize {
        if cursor + 1 == N { 0 } else { cursor + 1 }
    }
}

unsafe impl<S, const N: usize> RawQueue for BaselineQueue<S, N>
where
    S: Slot,
{
    type Item = S::Item;

    #[inline]
    unsafe fn enqueue(&self, value: S::Item) -> Result<(), EnqueueError<S::Item>> {
        if !S::admit(&value) {
            return Err(EnqueueError::Reserved(value));
        }

        let head = unsafe { &mut *self.head.get() };
        let slot = &self.slots[*head];
        if slot.is_occupied() {
            return Err(EnqueueError::Full(value));
        }

        unsafe { slot.put(value) };
        *head = Self::next_index(*head);
        Ok(())
    }

    #[inline]
    unsafe fn dequeue(&self) -> Result<S::Item, Empty> {
        let tail = unsafe { &mut *self.tail.get() };
        let slot = &self.slots[*tail];
        if !slot.is_occupied() {
            return Err(Empty);
        }

        let value = unsafe { slot.take() };
        *tail = Self::next_index(*tail);
        Ok(value)
    }

    #[inline]
    unsafe fn front_peek_with<R>(&self, f: impl FnOnce(&S::Item) -> R) -> Result<R, Empty> {
        let tail = unsafe { *self.tail.get() };
        unsafe { self.slots[tail].inspect(f) }.ok_or(Empty)
    }
}
