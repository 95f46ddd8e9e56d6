//! Spin lock built on `lock_api`
//!
//! Critical sections in the object model are a handful of loads and stores,
//! so waiters spin with exponential backoff and then yield the time slice
//! instead of parking.

use crossbeam::utils::Backoff;
use parking_lot::lock_api::{self, GuardSend};
use std::sync::atomic::{AtomicBool, Ordering};

/// Raw test-and-set lock
#[derive(Debug)]
pub struct RawSpinLock {
    locked: AtomicBool,
}

impl RawSpinLock {
    #[cold]
    fn wait(&self) {
        let backoff = Backoff::new();
        while self.locked.load(Ordering::Relaxed) {
            backoff.snooze();
        }
    }
}

unsafe impl lock_api::RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: RawSpinLock = RawSpinLock { locked: AtomicBool::new(false) };

    type GuardMarker = GuardSend;

    #[inline]
    fn lock(&self) {
        while self.locked.swap(true, Ordering::Acquire) {
            self.wait();
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        !self.locked.swap(true, Ordering::Acquire)
    }

    #[inline]
    unsafe fn unlock(&self) {
        debug_assert!(self.locked.load(Ordering::Relaxed), "unlocking a free spin lock");
        self.locked.store(false, Ordering::Release);
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

pub type SpinLock<T> = lock_api::Mutex<RawSpinLock, T>;
pub type SpinLockGuard<'a, T> = lock_api::MutexGuard<'a, RawSpinLock, T>;
