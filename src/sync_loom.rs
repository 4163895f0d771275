pub use loom::{
    cell::UnsafeCell,
    hint::spin_loop,
    sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, AtomicUsize, Ordering},
};

use core::mem::MaybeUninit;

pub fn read_flag(a: &mut AtomicBool) -> bool {
    a.with_mut(|a| *a)
}

#[inline(always)]
pub unsafe fn write_cell<T>(a: &UnsafeCell<MaybeUninit<T>>, value: T) {
    a.with_mut(|ptr| unsafe {
        (*ptr).write(value);
    });
}

#[inline(always)]
pub unsafe fn read_init_cell<T>(a: &UnsafeCell<MaybeUninit<T>>) -> T {
    a.with(|ptr| unsafe { (*ptr).assume_init_read() })
}

#[inline(always)]
pub unsafe fn with_init_cell<T, R>(a: &UnsafeCell<MaybeUninit<T>>, f: impl FnOnce(&T) -> R) -> R {
    a.with(|ptr| unsafe { f((*ptr).assume_init_ref()) })
}

#[inline(always)]
pub unsafe fn drop_init_cell<T>(a: &mut UnsafeCell<MaybeUninit<T>>) {
    a.with_mut(|ptr| unsafe { (*ptr).assume_init_drop() });
}
