//! Fair queued read-write lock.
//!
//! Uncontended readers and writers take the lock with a single atomic
//! operation on the packed state word. Everyone who fails the fast path
//! lines up on an embedded [`RawTicketSpin`], so contended acquisitions are
//! admitted in FIFO order and a waiting writer cannot be starved by a stream
//! of readers.
//!
//! State word layout:
//!
//! ```text
//!  31                        8 7          0
//! +---------------------------+------------+
//! |       reader count        |   writer   |
//! +---------------------------+------------+
//! ```
//!
//! The writer byte is `FREE`, `WAITING` or `LOCKED`.

use crate::{
    backoff::BackOff,
    sync::{AtomicU32, Ordering},
    ticket::RawTicketSpin,
    trace::{error, trace},
};

const FREE: u32 = 0;
const WAITING: u32 = 0x01;
const LOCKED: u32 = 0xff;
const WRITER_MASK: u32 = 0xff;
const READER_SHIFT: u32 = 8;
const READER_BIAS: u32 = 1 << READER_SHIFT;

#[inline(always)]
fn writer_state(cnts: u32) -> u32 {
    cnts & WRITER_MASK
}

#[inline(always)]
fn reader_count(cnts: u32) -> u32 {
    cnts >> READER_SHIFT
}

pub struct RawQueuedRwLock {
    cnts: AtomicU32,
    wait: RawTicketSpin,
}

impl Default for RawQueuedRwLock {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl RawQueuedRwLock {
    #[cfg(loom)]
    pub fn new() -> Self {
        RawQueuedRwLock {
            cnts: AtomicU32::new(FREE),
            wait: RawTicketSpin::new(),
        }
    }

    #[cfg(not(loom))]
    pub const fn new() -> Self {
        RawQueuedRwLock {
            cnts: AtomicU32::new(FREE),
            wait: RawTicketSpin::new(),
        }
    }

    /// Returns true if the lock is held or a writer is about to take it.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.cnts.load(Ordering::Relaxed) != FREE
    }

    #[inline]
    pub fn is_locked_exclusive(&self) -> bool {
        writer_state(self.cnts.load(Ordering::Relaxed)) == LOCKED
    }

    /// Number of readers holding the lock.
    ///
    /// Includes readers that are about to back out of the fast path.
    #[inline]
    pub fn readers(&self) -> usize {
        reader_count(self.cnts.load(Ordering::Relaxed)) as usize
    }

    /// Number of threads in the slow path queue, including the one at its head.
    #[inline]
    pub fn queue_len(&self) -> usize {
        self.wait.queue_len()
    }

    #[inline]
    pub fn try_read_lock(&self) -> bool {
        let cnts = self.cnts.load(Ordering::Relaxed);
        if writer_state(cnts) != FREE {
            return false;
        }

        self.cnts
            .compare_exchange(
                cnts,
                cnts + READER_BIAS,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    #[inline]
    pub fn read_lock(&self) {
        let cnts = self.cnts.fetch_add(READER_BIAS, Ordering::Acquire);
        if writer_state(cnts) == FREE {
            return;
        }

        self.read_lock_slow();
    }

    #[cold]
    fn read_lock_slow(&self) {
        // The bias was added while a writer holds or waits for the lock.
        self.cnts.fetch_sub(READER_BIAS, Ordering::Relaxed);

        trace!("reader queued behind writer");
        self.wait.acquire();

        let mut backoff = BackOff::new();
        while writer_state(self.cnts.load(Ordering::Relaxed)) != FREE {
            backoff.wait();
        }

        // A fast-path writer may sneak in before the bias lands.
        let mut cnts = self.cnts.fetch_add(READER_BIAS, Ordering::Acquire);
        backoff.reset();
        while writer_state(cnts) == LOCKED {
            backoff.wait();
            cnts = self.cnts.load(Ordering::Acquire);
        }

        unsafe { self.wait.release() };
    }

    /// # Safety
    ///
    /// The calling thread must hold a shared lock.
    #[inline]
    pub unsafe fn read_unlock(&self) {
        let mut cnts = self.cnts.load(Ordering::Relaxed);
        loop {
            // Checked before the subtraction so a misuse leaves the word intact.
            if reader_count(cnts) == 0 {
                unmatched_unlock("read_unlock");
            }

            match self.cnts.compare_exchange_weak(
                cnts,
                cnts - READER_BIAS,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => cnts = actual,
            }
        }
    }

    #[inline]
    pub fn try_write_lock(&self) -> bool {
        self.cnts
            .compare_exchange(FREE, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    pub fn write_lock(&self) {
        if self.try_write_lock() {
            return;
        }

        self.write_lock_slow();
    }

    #[cold]
    fn write_lock_slow(&self) {
        trace!(readers = self.readers(), "writer queued");
        self.wait.acquire();

        if self.try_write_lock() {
            unsafe { self.wait.release() };
            return;
        }

        // Announce the writer so new readers queue up behind it.
        let mut backoff = BackOff::new();
        loop {
            let cnts = self.cnts.load(Ordering::Relaxed);
            if writer_state(cnts) == FREE
                && self
                    .cnts
                    .compare_exchange(cnts, cnts | WAITING, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
            {
                break;
            }
            backoff.wait();
        }

        // Wait for the readers to drain.
        backoff.reset();
        loop {
            if self.cnts.load(Ordering::Relaxed) == WAITING
                && self
                    .cnts
                    .compare_exchange(WAITING, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                break;
            }
            backoff.wait();
        }

        unsafe { self.wait.release() };
    }

    /// # Safety
    ///
    /// The calling thread must hold the exclusive lock.
    #[inline]
    pub unsafe fn write_unlock(&self) {
        let mut cnts = self.cnts.load(Ordering::Relaxed);
        loop {
            if writer_state(cnts) != LOCKED {
                unmatched_unlock("write_unlock");
            }

            // Readers may have added a bias they are about to retract.
            match self.cnts.compare_exchange_weak(
                cnts,
                cnts - LOCKED,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => cnts = actual,
            }
        }
    }
}

#[cold]
#[inline(never)]
fn unmatched_unlock(op: &'static str) -> ! {
    error!(op, "unlock without matching lock");
    panic!("{op} called on a lock not held in that mode");
}

#[cfg(not(loom))]
unsafe impl lock_api::RawRwLock for RawQueuedRwLock {
    type GuardMarker = lock_api::GuardSend;

    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    #[inline(always)]
    fn lock_shared(&self) {
        self.read_lock()
    }

    #[inline(always)]
    fn try_lock_shared(&self) -> bool {
        self.try_read_lock()
    }

    #[inline(always)]
    unsafe fn unlock_shared(&self) {
        unsafe { self.read_unlock() }
    }

    #[inline(always)]
    fn lock_exclusive(&self) {
        self.write_lock()
    }

    #[inline(always)]
    fn try_lock_exclusive(&self) -> bool {
        self.try_write_lock()
    }

    #[inline(always)]
    unsafe fn unlock_exclusive(&self) {
        unsafe { self.write_unlock() }
    }

    #[inline(always)]
    fn is_locked(&self) -> bool {
        self.is_locked()
    }

    #[inline(always)]
    fn is_locked_exclusive(&self) -> bool {
        self.is_locked_exclusive()
    }
}

/// Read-write lock built on [`RawQueuedRwLock`].
#[cfg(not(loom))]
pub type QueuedRwLock<T> = lock_api::RwLock<RawQueuedRwLock, T>;

#[cfg(not(loom))]
pub type QueuedRwLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RawQueuedRwLock, T>;

#[cfg(not(loom))]
pub type QueuedRwLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RawQueuedRwLock, T>;

#[cfg(all(test, feature = "std", not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn state_word_layout() {
        let lock = RawQueuedRwLock::new();

        lock.read_lock();
        lock.read_lock();
        assert_eq!(lock.readers(), 2);
        assert_eq!(lock.cnts.load(Ordering::Relaxed), 2 * READER_BIAS);
        assert!(!lock.try_write_lock());

        unsafe {
            lock.read_unlock();
            lock.read_unlock();
        }

        lock.write_lock();
        assert_eq!(lock.cnts.load(Ordering::Relaxed), LOCKED);
        assert!(lock.is_locked_exclusive());
        assert!(!lock.try_read_lock());
        unsafe { lock.write_unlock() };

        assert!(!lock.is_locked());
    }

    #[test]
    #[should_panic(expected = "read_unlock")]
    fn unmatched_read_unlock_panics() {
        let lock = RawQueuedRwLock::new();
        unsafe { lock.read_unlock() };
    }

    #[test]
    #[should_panic(expected = "write_unlock")]
    fn unmatched_write_unlock_panics() {
        let lock = RawQueuedRwLock::new();
        lock.read_lock();
        unsafe { lock.write_unlock() };
    }

    #[test]
    fn misused_write_unlock_leaves_reader_in_place() {
        let lock = RawQueuedRwLock::new();
        lock.read_lock();

        let result = std::panic::catch_unwind(|| unsafe { lock.write_unlock() });
        assert!(result.is_err());
        assert_eq!(lock.cnts.load(Ordering::Relaxed), READER_BIAS);
        assert_eq!(lock.readers(), 1);

        assert!(lock.try_read_lock());
        unsafe {
            lock.read_unlock();
            lock.read_unlock();
        }

        assert!(!lock.is_locked());
        assert!(lock.try_write_lock());
        unsafe { lock.write_unlock() };
    }

    #[test]
    fn misused_read_unlock_leaves_writer_in_place() {
        let lock = RawQueuedRwLock::new();
        lock.write_lock();

        let result = std::panic::catch_unwind(|| unsafe { lock.read_unlock() });
        assert!(result.is_err());
        assert_eq!(lock.cnts.load(Ordering::Relaxed), LOCKED);

        unsafe { lock.write_unlock() };
        assert!(!lock.is_locked());
        lock.read_lock();
        unsafe { lock.read_unlock() };
        assert!(!lock.is_locked());
    }

    #[test]
    fn waiting_writer_blocks_new_readers() {
        let lock = RawQueuedRwLock::new();
        lock.read_lock();

        std::thread::scope(|scope| {
            let writer = scope.spawn(|| {
                lock.write_lock();
                unsafe { lock.write_unlock() };
            });

            while writer_state(lock.cnts.load(Ordering::Relaxed)) != WAITING {
                std::thread::yield_now();
            }

            assert!(!lock.try_read_lock());
            unsafe { lock.read_unlock() };
            writer.join().unwrap();
        });

        assert!(!lock.is_locked());
    }
}
