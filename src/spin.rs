use std::{
    hint::spin_loop,
    sync::atomic::{AtomicBool, Ordering::*},
};

use lock_api::{GuardSend, RawMutex};

/// Test-and-test-and-set lock for short critical sections that must not
/// park the thread.
pub(crate) struct RawSpinLock(AtomicBool);

unsafe impl RawMutex for RawSpinLock
{
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinLock(AtomicBool::new(false));

    type GuardMarker = GuardSend;

    fn lock(&self)
    {
        while !self.try_lock() {
            while self.0.load(Relaxed) {
                spin_loop();
            }
        }
    }

    fn try_lock(&self) -> bool { self.0.compare_exchange(false, true, Acquire, Relaxed).is_ok() }

    unsafe fn unlock(&self) { self.0.store(false, Release) }

    fn is_locked(&self) -> bool { self.0.load(Relaxed) }
}

pub(crate) type SpinMutex<T> = lock_api::Mutex<RawSpinLock, T>;
