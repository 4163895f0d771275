//! FIFO ticket spin-lock.
//!
//! Every contender draws a ticket from `tail` and spins until `head`,
//! the ticket being served, reaches it. Release hands the lock to the next
//! ticket, so the lock is granted strictly in arrival order.

use crate::{
    backoff::BackOff,
    sync::{AtomicU8, Ordering},
    trace::error,
};

/// Raw ticket lock with 8-bit tickets.
///
/// At most [`RawTicketSpin::MAX_WAITERS`] threads may wait while the lock is held.
/// Drawing one ticket more panics instead of handing out a ticket that
/// collides with the one currently being served.
pub struct RawTicketSpin {
    head: AtomicU8,
    tail: AtomicU8,
}

impl Default for RawTicketSpin {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl RawTicketSpin {
    /// Number of threads that may wait for the lock besides the holder.
    ///
    /// One ticket value out of 256 is never handed out so that exhaustion is detectable.
    pub const MAX_WAITERS: usize = u8::MAX as usize - 1;

    #[cfg(loom)]
    pub fn new() -> Self {
        RawTicketSpin {
            head: AtomicU8::new(0),
            tail: AtomicU8::new(0),
        }
    }

    #[cfg(not(loom))]
    pub const fn new() -> Self {
        RawTicketSpin {
            head: AtomicU8::new(0),
            tail: AtomicU8::new(0),
        }
    }

    /// Returns true if the lock is held.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.queue_len() != 0
    }

    /// Number of tickets drawn and not yet released: the holder plus its waiters.
    ///
    /// The value may be outdated by the time it is returned.
    #[inline]
    pub fn queue_len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        usize::from(tail.wrapping_sub(head))
    }

    /// Acquires the lock only if nobody holds or waits for it.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        self.tail
            .compare_exchange(
                head,
                head.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Draws a ticket and spins until it is served.
    ///
    /// Not reentrant. Acquiring a lock already held by the calling thread never returns.
    ///
    /// # Panics
    ///
    /// Panics without drawing a ticket if [`RawTicketSpin::MAX_WAITERS`]
    /// threads already wait for the lock.
    #[inline]
    pub fn acquire(&self) {
        let mut ticket = self.tail.load(Ordering::Relaxed);
        loop {
            let head = self.head.load(Ordering::Acquire);

            if ticket.wrapping_sub(head) == u8::MAX {
                // `ticket` may be stale, only a still current one means exhaustion.
                let current = self.tail.load(Ordering::Relaxed);
                if current == ticket {
                    ticket_exhausted();
                }
                ticket = current;
                continue;
            }

            match self.tail.compare_exchange_weak(
                ticket,
                ticket.wrapping_add(1),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) if head == ticket => return,
                Ok(_) => return self.wait_for(ticket),
                Err(actual) => ticket = actual,
            }
        }
    }

    #[cold]
    fn wait_for(&self, ticket: u8) {
        let mut backoff = BackOff::new();
        while self.head.load(Ordering::Acquire) != ticket {
            backoff.wait();
        }
    }

    /// Passes the lock to the next ticket.
    ///
    /// # Safety
    ///
    /// The calling thread must hold the lock.
    #[inline]
    pub unsafe fn release(&self) {
        self.head.fetch_add(1, Ordering::Release);
    }
}

#[cold]
#[inline(never)]
fn ticket_exhausted() -> ! {
    error!(
        max_waiters = RawTicketSpin::MAX_WAITERS,
        "ticket lock waiter limit exceeded"
    );
    panic!(
        "more than {} threads waiting on a ticket lock",
        RawTicketSpin::MAX_WAITERS
    );
}

#[cfg(not(loom))]
unsafe impl lock_api::RawMutex for RawTicketSpin {
    type GuardMarker = lock_api::GuardSend;

    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    #[inline(always)]
    fn is_locked(&self) -> bool {
        self.is_locked()
    }

    #[inline(always)]
    fn try_lock(&self) -> bool {
        self.try_acquire()
    }

    #[inline(always)]
    fn lock(&self) {
        self.acquire()
    }

    #[inline(always)]
    unsafe fn unlock(&self) {
        unsafe { self.release() }
    }
}

#[cfg(not(loom))]
unsafe impl lock_api::RawMutexFair for RawTicketSpin {
    #[inline(always)]
    unsafe fn unlock_fair(&self) {
        unsafe { self.release() }
    }
}

/// Mutex protected by the FIFO ticket lock.
#[cfg(not(loom))]
pub type TicketMutex<T> = lock_api::Mutex<RawTicketSpin, T>;

#[cfg(not(loom))]
pub type TicketMutexGuard<'a, T> = lock_api::MutexGuard<'a, RawTicketSpin, T>;
