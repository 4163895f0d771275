//! Slot storage for the ring queues.
//!
//! The queues never count their elements. Whether a slot holds an element is
//! read from the slot itself, so the whole batching protocol rests on the
//! ordering guarantees of [`Slot`].

use core::mem::MaybeUninit;

use crate::sync::{
    AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering, UnsafeCell, drop_init_cell,
    read_flag, read_init_cell, with_init_cell, write_cell,
};

/// One cell of a ring queue.
///
/// # Safety
///
/// `is_occupied` must load with `Acquire` and observe `true` only after the
/// `Release` publication done by `put`. `take` must read the value before it
/// publishes the slot as vacant with `Release`, so that a producer that sees
/// the slot vacant may overwrite it.
pub unsafe trait Slot {
    type Item;

    /// Empty slot, usable where a constant is required.
    #[cfg(not(loom))]
    const VACANT: Self;

    /// Creates an empty slot.
    fn vacant() -> Self;

    /// Returns false for values that cannot be stored because they would
    /// read back as an empty slot.
    fn admit(value: &Self::Item) -> bool;

    fn is_occupied(&self) -> bool;

    /// Stores `value` and publishes the slot as occupied.
    ///
    /// # Safety
    ///
    /// Slot must be vacant, caller must be the only producer and `value` must be admitted.
    unsafe fn put(&self, value: Self::Item);

    /// Moves the value out and publishes the slot as vacant.
    ///
    /// # Safety
    ///
    /// Slot must be occupied and caller must be the only consumer.
    unsafe fn take(&self) -> Self::Item;

    /// Calls `f` with the stored value, if any.
    ///
    /// # Safety
    ///
    /// Caller must be the only consumer.
    unsafe fn inspect<R>(&self, f: impl FnOnce(&Self::Item) -> R) -> Option<R>;
}

/// Slot with an explicit occupancy flag.
///
/// Any value of `T` can be stored, there is no reserved marker.
pub struct FlagSlot<T> {
    occupied: AtomicBool,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Drop for FlagSlot<T> {
    fn drop(&mut self) {
        if read_flag(&mut self.occupied) {
            // Safety: the flag says the value is initialized and we have exclusive access.
            unsafe { drop_init_cell(&mut self.value) }
        }
    }
}

unsafe impl<T> Slot for FlagSlot<T> {
    type Item = T;

    #[cfg(not(loom))]
    #[allow(clippy::declare_interior_mutable_const)]
    const VACANT: Self = FlagSlot {
        occupied: AtomicBool::new(false),
        value: UnsafeCell::new(MaybeUninit::uninit()),
    };

    #[inline]
    fn vacant() -> Self {
        FlagSlot {
            occupied: AtomicBool::new(false),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    #[inline(always)]
    fn admit(_: &T) -> bool {
        true
    }

    #[inline(always)]
    fn is_occupied(&self) -> bool {
        self.occupied.load(Ordering::Acquire)
    }

    #[inline]
    unsafe fn put(&self, value: T) {
        debug_assert!(!self.occupied.load(Ordering::Relaxed));
        unsafe { write_cell(&self.value, value) };
        self.occupied.store(true, Ordering::Release);
    }

    #[inline]
    unsafe fn take(&self) -> T {
        debug_assert!(self.occupied.load(Ordering::Relaxed));
        let value = unsafe { read_init_cell(&self.value) };
        self.occupied.store(false, Ordering::Release);
        value
    }

    #[inline]
    unsafe fn inspect<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        if self.is_occupied() {
            Some(unsafe { with_init_cell(&self.value, f) })
        } else {
            None
        }
    }
}

macro_rules! word_slot {
    ($atomic:ty, $word:ty) => {
        /// Bare atomic word where zero marks an empty slot.
        ///
        /// Zero is never admitted.
        unsafe impl Slot for $atomic {
            type Item = $word;

            #[cfg(not(loom))]
            #[allow(clippy::declare_interior_mutable_const)]
            const VACANT: Self = <$atomic>::new(0);

            #[inline]
            fn vacant() -> Self {
                <$atomic>::new(0)
            }

            #[inline(always)]
            fn admit(value: &$word) -> bool {
                *value != 0
            }

            #[inline(always)]
            fn is_occupied(&self) -> bool {
                self.load(Ordering::Acquire) != 0
            }

            #[inline]
            unsafe fn put(&self, value: $word) {
                debug_assert_ne!(value, 0);
                self.store(value, Ordering::Release);
            }

            #[inline]
            unsafe fn take(&self) -> $word {
                let value = self.load(Ordering::Acquire);
                self.store(0, Ordering::Release);
                value
            }

            #[inline]
            unsafe fn inspect<R>(&self, f: impl FnOnce(&$word) -> R) -> Option<R> {
                match self.load(Ordering::Acquire) {
                    0 => None,
                    value => Some(f(&value)),
                }
            }
        }
    };
}

word_slot!(AtomicU32, u32);
word_slot!(AtomicU64, u64);
word_slot!(AtomicUsize, usize);

#[cfg(all(test, feature = "std", not(loom)))]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn flag_slot_round_trip() {
        let slot = FlagSlot::<u32>::vacant();
        assert!(!slot.is_occupied());
        assert!(FlagSlot::<u32>::admit(&0));

        unsafe {
            slot.put(0);
            assert!(slot.is_occupied());
            assert_eq!(slot.inspect(|v| *v), Some(0));
            assert_eq!(slot.take(), 0);
            assert_eq!(slot.inspect(|v| *v), None);
        }
    }

    #[test]
    fn word_slot_rejects_zero() {
        assert!(!AtomicU64::admit(&0));
        assert!(AtomicU64::admit(&1));

        let slot = AtomicU32::vacant();
        unsafe {
            slot.put(5);
            assert_eq!(slot.inspect(|v| *v), Some(5));
            assert_eq!(slot.take(), 5);
        }
        assert!(!slot.is_occupied());
    }

    #[test]
    fn flag_slot_drops_held_value() {
        let value = Arc::new(());
        let slot = FlagSlot::vacant();
        unsafe { slot.put(Arc::clone(&value)) };
        assert_eq!(Arc::strong_count(&value), 2);

        drop(slot);
        assert_eq!(Arc::strong_count(&value), 1);
    }
}
