//! Outcomes of queue operations that did not go through.
//!
//! None of these are fatal. `Full` and `Empty` are ordinary results of a
//! producer running ahead of its consumer or the other way around.

use thiserror::Error;

/// Error returned by `enqueue`.
///
/// Always carries the rejected value back to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum EnqueueError<T> {
    /// No confirmed free space ahead of the producer.
    #[error("queue is full")]
    Full(T),

    /// The value is the marker the slot type uses for "empty".
    /// Storing it would make the slot look vacant to the consumer.
    #[error("value is reserved as the empty-slot marker")]
    Reserved(T),
}

impl<T> EnqueueError<T> {
    /// Returns the value that was not enqueued.
    #[inline]
    pub fn into_inner(self) -> T {
        match self {
            EnqueueError::Full(value) | EnqueueError::Reserved(value) => value,
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        matches!(self, EnqueueError::Full(_))
    }

    #[inline]
    pub fn is_reserved(&self) -> bool {
        matches!(self, EnqueueError::Reserved(_))
    }
}

/// Error returned by `dequeue` and `front_peek` when no element is available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Error)]
#[error("queue is empty")]
pub struct Empty;
