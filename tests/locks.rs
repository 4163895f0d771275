#![cfg(not(loom))]

use std::{
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use qspsc::{
    qrwlock::{QueuedRwLock, RawQueuedRwLock},
    ticket::RawTicketSpin,
};

#[test]
fn ticket_late_arrival_does_not_overtake() {
    let lock = RawTicketSpin::new();
    let order = Mutex::new(Vec::new());

    lock.acquire();

    thread::scope(|scope| {
        let lock = &lock;
        let order = &order;

        scope.spawn(move || {
            lock.acquire();
            order.lock().unwrap().push("B");
            unsafe { lock.release() };
        });
        while lock.queue_len() != 2 {
            thread::yield_now();
        }

        scope.spawn(move || {
            lock.acquire();
            order.lock().unwrap().push("C");
            unsafe { lock.release() };
        });
        while lock.queue_len() != 3 {
            thread::yield_now();
        }

        unsafe { lock.release() };
    });

    assert_eq!(*order.lock().unwrap(), ["B", "C"]);
    assert!(!lock.is_locked());
}

#[test]
fn ticket_exhaustion_leaves_queue_intact() {
    let lock = RawTicketSpin::new();
    let served = AtomicUsize::new(0);

    lock.acquire();

    thread::scope(|scope| {
        for _ in 0..RawTicketSpin::MAX_WAITERS {
            scope.spawn(|| {
                lock.acquire();
                served.fetch_add(1, Ordering::Relaxed);
                unsafe { lock.release() };
            });
        }
        while lock.queue_len() != RawTicketSpin::MAX_WAITERS + 1 {
            thread::yield_now();
        }

        let result = std::panic::catch_unwind(|| lock.acquire());
        assert!(result.is_err());
        assert_eq!(lock.queue_len(), RawTicketSpin::MAX_WAITERS + 1);

        unsafe { lock.release() };
    });

    assert_eq!(served.load(Ordering::Relaxed), RawTicketSpin::MAX_WAITERS);
    assert!(!lock.is_locked());
    assert!(lock.try_acquire());
    unsafe { lock.release() };
}

#[test]
fn blocked_writer_takes_over_after_unlock() {
    let lock = RawQueuedRwLock::new();
    let acquired = AtomicBool::new(false);

    lock.write_lock();

    thread::scope(|scope| {
        let b = scope.spawn(|| {
            lock.write_lock();
            acquired.store(true, Ordering::SeqCst);
            assert!(lock.is_locked_exclusive());
            assert!(!lock.try_read_lock());
            unsafe { lock.write_unlock() };
        });

        while lock.queue_len() == 0 {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(20));
        assert!(!acquired.load(Ordering::SeqCst));

        unsafe { lock.write_unlock() };
        b.join().unwrap();
    });

    assert!(acquired.load(Ordering::SeqCst));
    assert!(!lock.is_locked());
}

#[test]
fn queued_writers_served_in_ticket_order() {
    const WRITERS: usize = 6;

    let lock = RawQueuedRwLock::new();
    let order = Mutex::new(Vec::new());

    lock.write_lock();

    thread::scope(|scope| {
        for i in 0..WRITERS {
            let lock = &lock;
            let order = &order;
            scope.spawn(move || {
                lock.write_lock();
                order.lock().unwrap().push(i);
                unsafe { lock.write_unlock() };
            });

            while lock.queue_len() != i + 1 {
                thread::yield_now();
            }
        }

        unsafe { lock.write_unlock() };
    });

    assert_eq!(*order.lock().unwrap(), (0..WRITERS).collect::<Vec<_>>());
}

#[test]
fn readers_share_and_writer_waits_for_them() {
    const READERS: usize = 4;

    let lock = RawQueuedRwLock::new();
    let inside = AtomicUsize::new(0);
    let release = AtomicBool::new(false);
    let writer_done = AtomicBool::new(false);

    thread::scope(|scope| {
        for _ in 0..READERS {
            scope.spawn(|| {
                lock.read_lock();
                inside.fetch_add(1, Ordering::SeqCst);
                while !release.load(Ordering::SeqCst) {
                    thread::yield_now();
                }
                assert!(!writer_done.load(Ordering::SeqCst));
                inside.fetch_sub(1, Ordering::SeqCst);
                unsafe { lock.read_unlock() };
            });
        }

        while inside.load(Ordering::SeqCst) != READERS {
            thread::yield_now();
        }
        assert_eq!(lock.readers(), READERS);

        let writer = scope.spawn(|| {
            lock.write_lock();
            assert_eq!(inside.load(Ordering::SeqCst), 0);
            writer_done.store(true, Ordering::SeqCst);
            unsafe { lock.write_unlock() };
        });

        while lock.queue_len() == 0 {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(20));
        assert!(!writer_done.load(Ordering::SeqCst));

        release.store(true, Ordering::SeqCst);
        writer.join().unwrap();
    });

    assert!(writer_done.load(Ordering::SeqCst));
    assert!(!lock.is_locked());
}

#[test]
fn mixed_readers_and_writers_stay_consistent() {
    let lock = QueuedRwLock::new((0u64, 0u64));

    thread::scope(|scope| {
        for _ in 0..3 {
            scope.spawn(|| {
                for _ in 0..2_000 {
                    let mut pair = lock.write();
                    pair.0 += 1;
                    pair.1 += 1;
                }
            });
        }

        for _ in 0..3 {
            scope.spawn(|| {
                for _ in 0..2_000 {
                    let pair = lock.read();
                    assert_eq!(pair.0, pair.1);
                }
            });
        }
    });

    assert_eq!(*lock.read(), (6_000, 6_000));
}
