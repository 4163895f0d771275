//! Producer and consumer endpoints shared by the ring queues.
//!
//! A ring queue is safe to use from exactly one producing and one consuming
//! thread. Splitting a queue hands out one [`Producer`] and one [`Consumer`]
//! that cannot be cloned, so the single-producer/single-consumer contract is
//! upheld by the borrow checker instead of by convention.

use core::ops::Deref;

use crate::error::{Empty, EnqueueError};

/// Queue operations on a shared reference.
///
/// # Safety
///
/// Implementors must stay sound while `enqueue` runs on one thread and
/// `dequeue` or `front_peek_with` run on one other thread at the same time.
pub unsafe trait RawQueue {
    type Item;

    /// # Safety
    ///
    /// Must not be called concurrently with another `enqueue`.
    unsafe fn enqueue(&self, value: Self::Item) -> Result<(), EnqueueError<Self::Item>>;

    /// # Safety
    ///
    /// Must not be called concurrently with another `dequeue` or `front_peek_with`.
    unsafe fn dequeue(&self) -> Result<Self::Item, Empty>;

    /// # Safety
    ///
    /// Must not be called concurrently with another `dequeue` or `front_peek_with`.
    unsafe fn front_peek_with<R>(&self, f: impl FnOnce(&Self::Item) -> R) -> Result<R, Empty>;
}

/// Producing end of a ring queue.
pub struct Producer<B> {
    queue: B,
}

impl<B> Producer<B>
where
    B: Deref,
    B::Target: RawQueue,
{
    /// # Safety
    ///
    /// No other producer may exist for the same queue.
    #[inline]
    pub(crate) unsafe fn new(queue: B) -> Self {
        Producer { queue }
    }

    /// Appends `value` to the queue.
    ///
    /// On failure the value is handed back inside the error.
    #[inline]
    pub fn enqueue(
        &mut self,
        value: <B::Target as RawQueue>::Item,
    ) -> Result<(), EnqueueError<<B::Target as RawQueue>::Item>> {
        // Safety: this is the only producer.
        unsafe { self.queue.enqueue(value) }
    }

    #[inline]
    pub fn queue(&self) -> &B::Target {
        &self.queue
    }
}

/// Consuming end of a ring queue.
pub struct Consumer<B> {
    queue: B,
}

impl<B> Consumer<B>
where
    B: Deref,
    B::Target: RawQueue,
{
    /// # Safety
    ///
    /// No other consumer may exist for the same queue.
    #[inline]
    pub(crate) unsafe fn new(queue: B) -> Self {
        Consumer { queue }
    }

    /// Removes the oldest element.
    #[inline]
    pub fn dequeue(&mut self) -> Result<<B::Target as RawQueue>::Item, Empty> {
        // Safety: this is the only consumer.
        unsafe { self.queue.dequeue() }
    }

    /// Returns a copy of the oldest element without removing it.
    #[inline]
    pub fn front_peek(&mut self) -> Result<<B::Target as RawQueue>::Item, Empty>
    where
        <B::Target as RawQueue>::Item: Clone,
    {
        self.front_peek_with(Clone::clone)
    }

    /// Calls `f` with the oldest element without removing it.
    #[inline]
    pub fn front_peek_with<R>(
        &mut self,
        f: impl FnOnce(&<B::Target as RawQueue>::Item) -> R,
    ) -> Result<R, Empty> {
        // Safety: this is the only consumer.
        unsafe { self.queue.front_peek_with(f) }
    }

    /// Returns true if no element is ready at the front of the queue.
    #[inline]
    pub fn is_empty(&mut self) -> bool {
        self.front_peek_with(|_| ()).is_err()
    }

    #[inline]
    pub fn queue(&self) -> &B::Target {
        &self.queue
    }
}
