pub use core::{
    cell::UnsafeCell,
    hint::spin_loop,
    sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, AtomicUsize, Ordering},
};

use core::mem::MaybeUninit;

#[inline(always)]
pub fn read_flag(a: &mut AtomicBool) -> bool {
    *a.get_mut()
}

#[inline(always)]
pub unsafe fn write_cell<T>(a: &UnsafeCell<MaybeUninit<T>>, value: T) {
    unsafe {
        (*a.get()).write(value);
    }
}

#[inline(always)]
pub unsafe fn read_init_cell<T>(a: &UnsafeCell<MaybeUninit<T>>) -> T {
    unsafe { (*a.get()).assume_init_read() }
}

#[inline(always)]
pub unsafe fn with_init_cell<T, R>(a: &UnsafeCell<MaybeUninit<T>>, f: impl FnOnce(&T) -> R) -> R {
    unsafe { f((*a.get()).assume_init_ref()) }
}

#[inline(always)]
pub unsafe fn drop_init_cell<T>(a: &mut UnsafeCell<MaybeUninit<T>>) {
    unsafe { a.get_mut().assume_init_drop() }
}
