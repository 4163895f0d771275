use crate::sync::spin_loop;

/// Default length of the congestion penalty in spin iterations.
pub const DEFAULT_CONGESTION_PENALTY: u32 = 1000;

/// Waiting hint.
/// Provides common exponential spin logic.
/// When spin count exceeds spin limit it switches to yield when "std" feature is enabled.
#[derive(Default)]
pub struct BackOff {
    spin_count: u32,
}

impl BackOff {
    const SPIN_THRESHOLD: u32 = 6;
    const YIELD_THRESHOLD: u32 = 10;

    #[inline(always)]
    #[must_use]
    pub const fn new() -> Self {
        BackOff { spin_count: 0 }
    }

    #[inline(always)]
    pub fn reset(&mut self) {
        self.spin_count = 0;
    }

    #[inline(always)]
    pub fn wait(&mut self) {
        if self.spin_count < Self::SPIN_THRESHOLD {
            #[cfg(not(loom))]
            for _ in 0..1u32 << self.spin_count {
                spin_loop();
            }

            #[cfg(loom)]
            spin_loop();
        } else {
            #[cfg(all(feature = "std", not(loom)))]
            std::thread::yield_now();

            #[cfg(any(not(feature = "std"), loom))]
            spin_loop();
        }

        if self.spin_count < Self::YIELD_THRESHOLD {
            self.spin_count += 1;
        }
    }
}

/// Busy-waits for a fixed number of spin iterations.
///
/// Applied after a failed queue operation or checkpoint probe so that the
/// losing side stops hammering the contended cache line for a while.
#[inline]
pub fn congestion(spins: u32) {
    for _ in 0..spins {
        spin_loop();
    }
}
