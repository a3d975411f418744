use std::{
    cell::Cell,
    fmt,
    sync::atomic::{fence, AtomicU32, Ordering::*},
};

use crate::verify;

/// Initial strong count of a freshly constructed object: the creator's
/// implicit reference.
pub const COUNTER_INIT: u32 = 1;

/// Strong reference count embedded in a reference-counted object.
///
/// # Safety
/// Implementations must start at [`COUNTER_INIT`], must never let a count
/// that reached zero become positive again, and must report the new count
/// from `decrement` faithfully: the caller destroys the object on zero.
pub unsafe trait Counter: Default
{
    fn count(&self) -> u32;

    /// Add a strong reference. Fatal on a dead object or on overflow.
    fn increment(&self);

    /// Add a strong reference unless the object is already dead.
    fn try_increment(&self) -> bool;

    /// Drop a strong reference and return the remaining count. Fatal if the
    /// count is already zero.
    fn decrement(&self) -> u32;
}

/// Single-threaded count. Objects embedding it are `!Sync`, which keeps
/// pointers to them on one thread.
pub struct RefCount(Cell<u32>);

impl Default for RefCount
{
    fn default() -> Self { Self(Cell::new(COUNTER_INIT)) }
}

unsafe impl Counter for RefCount
{
    fn count(&self) -> u32 { self.0.get() }

    fn increment(&self)
    {
        let n = self.0.get();
        verify!(n > 0, "reference taken on an object with a zero reference count");
        match n.checked_add(1) {
            Some(m) => self.0.set(m),
            None => crate::error::fatal("reference count overflow"),
        }
    }

    fn try_increment(&self) -> bool
    {
        if self.0.get() == 0 {
            return false;
        }
        self.increment();
        true
    }

    fn decrement(&self) -> u32
    {
        let n = self.0.get();
        verify!(n > 0, "reference count decremented past zero");
        self.0.set(n - 1);
        n - 1
    }
}

/// Thread-safe count.
pub struct AtomicRefCount(AtomicU32);

impl Default for AtomicRefCount
{
    fn default() -> Self { Self(AtomicU32::new(COUNTER_INIT)) }
}

unsafe impl Counter for AtomicRefCount
{
    fn count(&self) -> u32 { self.0.load(Relaxed) }

    fn increment(&self)
    {
        let n = self.0.fetch_add(1, Relaxed);
        verify!(n > 0, "reference taken on an object with a zero reference count");
        verify!(n != u32::MAX, "reference count overflow");
    }

    fn try_increment(&self) -> bool
    {
        let mut n = self.0.load(Relaxed);
        loop {
            if n == 0 {
                return false;
            }
            verify!(n != u32::MAX, "reference count overflow");
            match self.0.compare_exchange_weak(n, n + 1, Acquire, Relaxed) {
                Ok(_) => return true,
                Err(current) => n = current,
            }
        }
    }

    fn decrement(&self) -> u32
    {
        let n = self.0.fetch_sub(1, Release);
        verify!(n > 0, "reference count decremented past zero");
        if n == 1 {
            fence(Acquire);
        }
        n - 1
    }
}

macro_rules! debug_count {
    ($($it:ty),+) => {
        $(
            impl fmt::Debug for $it
            {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
                {
                    f.debug_tuple(stringify!($it)).field(&self.count()).finish()
                }
            }
        )+
    };
}

debug_count!(RefCount, AtomicRefCount);
