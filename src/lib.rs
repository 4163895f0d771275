//! # qspsc
//!
//! Fixed-capacity synchronization and queueing primitives for fast core-to-core communication.
//! Nothing here allocates after construction and every structure can be embedded by value.
//!
//! ## Available Algorithms
//!
//! ### 🎫 Ticket lock
//! FIFO spin-lock. Each contender draws a ticket and waits until it is served,
//! so the lock is granted strictly in arrival order.
//!
//! ```rust
//! # #[cfg(feature = "std")]
//! # {
//! use qspsc::ticket::TicketMutex;
//!
//! let counter = TicketMutex::new(0);
//!
//! std::thread::scope(|scope| {
//!     for _ in 0..4 {
//!         scope.spawn(|| {
//!             for _ in 0..100 {
//!                 *counter.lock() += 1;
//!             }
//!         });
//!     }
//! });
//!
//! assert_eq!(*counter.lock(), 400);
//! # }
//! ```
//!
//! ### 📚 Queued read-write lock
//! Readers and writers that find the lock free take it with a single atomic operation.
//! Contended callers line up on an embedded ticket lock, which keeps writers from being
//! starved by a steady stream of readers.
//!
//! ```rust
//! use qspsc::qrwlock::QueuedRwLock;
//!
//! let lock = QueuedRwLock::new(vec![1, 2, 3]);
//!
//! {
//!     let a = lock.read();
//!     let b = lock.read();
//!     assert_eq!(a.len() + b.len(), 6);
//! }
//!
//! lock.write().push(4);
//! assert_eq!(*lock.read(), [1, 2, 3, 4]);
//! ```
//!
//! ### 🔗 Batched SPSC queue
//! Ring buffer for exactly one producer and one consumer thread.
//! Both sides confirm free or filled space a whole batch ahead and then access
//! slots without checking them, adapting the consumer look-ahead to the
//! observed production rate.
//!
//! ```rust
//! # #[cfg(feature = "std")]
//! # {
//! use qspsc::spsc::SpscQueue;
//!
//! let mut queue = SpscQueue::<u64, 1024>::new();
//! let (mut producer, mut consumer) = queue.split_mut();
//!
//! std::thread::scope(|scope| {
//!     scope.spawn(move || {
//!         for i in 0..10_000 {
//!             let mut value = i;
//!             while let Err(err) = producer.enqueue(value) {
//!                 value = err.into_inner();
//!             }
//!         }
//!     });
//!
//!     let mut expected = 0;
//!     while expected < 10_000 {
//!         if let Ok(value) = consumer.dequeue() {
//!             assert_eq!(value, expected);
//!             expected += 1;
//!         }
//!     }
//! });
//! # }
//! ```
//!
//! Queues of bare atomic words are available too. They use zero as the empty
//! marker and refuse to enqueue it.
//!
//! ```rust
//! use qspsc::{error::EnqueueError, spsc::WordQueue};
//! use core::sync::atomic::AtomicU32;
//!
//! let mut queue = WordQueue::<AtomicU32, 64>::new();
//! let (mut producer, mut consumer) = queue.split_mut();
//!
//! assert_eq!(producer.enqueue(0), Err(EnqueueError::Reserved(0)));
//! producer.enqueue(42).unwrap();
//! assert_eq!(consumer.dequeue(), Ok(42));
//! ```
//!
//! ## `no-std` support
//!
//! Everything except `split_arc` (`alloc`) and thread yielding in [`backoff::BackOff`] (`std`)
//! works without the standard library.
//!
//! ## Tracing
//!
//! With the `tracing` feature slow-path events and contract violations are reported
//! through the `tracing` crate. See [`trace::init_tracing`].

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(clippy::pedantic)]
#![allow(clippy::inline_always, clippy::module_name_repetitions)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg_attr(not(loom), path = "sync.rs")]
#[cfg_attr(loom, path = "sync_loom.rs")]
mod sync;

pub mod backoff;
pub mod baseline;
pub mod cache;
pub mod error;
pub mod qrwlock;
pub mod queue;
pub mod slot;
pub mod spsc;
pub mod ticket;
pub mod trace;
