//! Weak references.
//!
//! A weakly observable object owns a [`WeakAnchor`] which lazily creates one
//! shared [`WeakLink`]. Every [`WeakPtr`] to the object holds a strong
//! reference to that link, never to the object. When the object dies it
//! revokes the link, after which every upgrade attempt comes back empty.
//!
//! The link tolerates concurrent upgrade attempts racing a single revocation:
//! upgraders announce themselves in `consumers` before looking at the target,
//! and the revoker waits for the announced ones to leave before clearing it.

use std::{
    fmt,
    hint::spin_loop,
    marker::PhantomData,
    ptr::{self, NonNull},
    sync::atomic::{AtomicPtr, AtomicU32, Ordering::*},
};

use lock_api::RawMutex;

use crate::{
    counter::{AtomicRefCount, Counter},
    error::ErrorOr,
    must,
    pointers::{try_make_ref_counted, NonNullRefPtr, RefCounted, RefPtr},
    spin::{RawSpinLock, SpinMutex},
    verify,
};

/// Low bit of `WeakLink::consumers`.
const REVOKED: u32 = 1;

/// One in-flight upgrade attempt; keeps clear of the `REVOKED` bit.
const CONSUMER: u32 = 1 << 1;

pub struct WeakLink
{
    count: AtomicRefCount,
    target: AtomicPtr<()>,
    consumers: AtomicU32,
}

unsafe impl RefCounted for WeakLink
{
    type Count = AtomicRefCount;

    fn ref_counter(&self) -> &AtomicRefCount { &self.count }
}

impl WeakLink
{
    fn new<T>(target: &T) -> Self
    {
        Self {
            count: AtomicRefCount::default(),
            target: AtomicPtr::new(target as *const T as *mut ()),
            consumers: AtomicU32::new(0),
        }
    }

    /// Try to obtain a strong reference to the target.
    ///
    /// # Safety
    /// The link must have been created for an object of type `T`.
    unsafe fn strong_ref<T: RefCounted>(&self) -> RefPtr<T>
    {
        let mut res = RefPtr::null();

        if self.consumers.fetch_add(CONSUMER, Acquire) & REVOKED == 0 {
            if let Some(ptr) = NonNull::new(self.target.load(Acquire) as *mut T) {
                if ptr.as_ref().ref_counter().try_increment() {
                    res = RefPtr::from(NonNullRefPtr::adopt(ptr));
                }
            }
        }

        self.consumers.fetch_sub(CONSUMER, Release);
        res
    }

    /// The raw target, or null once revocation has started.
    ///
    /// Racy: a non-null result may be revoked and freed at any moment.
    fn unsafe_ptr<T>(&self) -> *const T
    {
        if self.consumers.load(Relaxed) & REVOKED != 0 {
            return ptr::null();
        }
        self.target.load(Acquire) as *const T
    }

    pub fn is_null(&self) -> bool { self.unsafe_ptr::<()>().is_null() }

    pub fn is_revoked(&self) -> bool { self.consumers.load(Acquire) & REVOKED != 0 }

    /// Number of upgrade attempts currently between announce and leave.
    pub fn in_flight(&self) -> u32 { self.consumers.load(Acquire) >> 1 }

    /// Cut the link. Called exactly once, by the dying target.
    pub fn revoke(&self)
    {
        let mut consumers = self.consumers.fetch_or(REVOKED, AcqRel);
        verify!(consumers & REVOKED == 0, "weak link revoked twice");

        let mut spins = 0usize;
        while consumers & !REVOKED != 0 {
            spin_loop();
            spins += 1;
            consumers = self.consumers.load(Acquire);
        }

        self.target.store(ptr::null_mut(), Release);
        log::debug!("revoked weak link {:p} after {spins} spins", self);
    }
}

impl fmt::Debug for WeakLink
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("WeakLink")
            .field("target", &self.target.load(Relaxed))
            .field("revoked", &self.is_revoked())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// The per-object slot holding its weak link.
pub struct WeakAnchor
{
    link: SpinMutex<RefPtr<WeakLink>>,
}

impl WeakAnchor
{
    pub const fn new() -> Self
    {
        Self {
            link: SpinMutex::const_new(<RawSpinLock as RawMutex>::INIT, RefPtr::null()),
        }
    }

    fn link_for<T>(&self, target: &T) -> ErrorOr<NonNullRefPtr<WeakLink>>
    {
        let mut slot = self.link.lock();
        if let Some(link) = slot.as_nonnull() {
            return Ok(link.clone());
        }

        let link = try_make_ref_counted(WeakLink::new(target))?;
        log::debug!(
            "created weak link {:p} for {:p}",
            link,
            target as *const T
        );
        *slot = RefPtr::from(link.clone());
        Ok(link)
    }

    pub fn has_link(&self) -> bool { !self.link.lock().is_null() }

    /// Revoke and forget the link, if one was ever created.
    pub fn revoke_weak_ptrs(&self)
    {
        let link = self.link.lock().take();
        if let Some(link) = link.pointer() {
            link.revoke();
        }
    }
}

impl Default for WeakAnchor
{
    fn default() -> Self { Self::new() }
}

impl Drop for WeakAnchor
{
    fn drop(&mut self)
    {
        if let Some(link) = self.link.get_mut().take().pointer() {
            link.revoke();
        }
    }
}

impl fmt::Debug for WeakAnchor
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("WeakAnchor")
            .field("has_link", &self.has_link())
            .finish()
    }
}

/// A reference-counted object that can be observed through [`WeakPtr`]s.
///
/// # Safety
/// `weak_anchor` must always return the same anchor, owned by `self`, and
/// the anchor must be revoked no later than when `self` is dropped (dropping
/// the anchor does that).
pub unsafe trait Weakable: RefCounted + Sized
{
    fn weak_anchor(&self) -> &WeakAnchor;
}

/// Implement [`RefCounted`] and [`Weakable`] for a type with embedded count
/// and anchor fields. Weak pointers are revoked before the object's fields
/// are dropped.
#[macro_export]
macro_rules! weakable {
    ($ty:ty, $count_field:ident : $count:ty, $anchor_field:ident) => {
        unsafe impl $crate::RefCounted for $ty {
            type Count = $count;

            fn ref_counter(&self) -> &$count { &self.$count_field }

            fn will_be_destroyed(&self) { self.$anchor_field.revoke_weak_ptrs() }
        }

        unsafe impl $crate::Weakable for $ty {
            fn weak_anchor(&self) -> &$crate::WeakAnchor { &self.$anchor_field }
        }
    };
}

impl<T: Weakable> NonNullRefPtr<T>
{
    pub fn make_weak_ptr(this: &Self) -> WeakPtr<T> { must!(WeakPtr::try_new(this)) }

    pub fn try_make_weak_ptr(this: &Self) -> ErrorOr<WeakPtr<T>> { WeakPtr::try_new(this) }
}

/// Non-owning handle; see the module documentation.
pub struct WeakPtr<T: Weakable>
{
    link: RefPtr<WeakLink>,
    _phantom: PhantomData<*const T>,
}

unsafe impl<T: Weakable + Send + Sync> Send for WeakPtr<T> {}
unsafe impl<T: Weakable + Send + Sync> Sync for WeakPtr<T> {}

impl<T: Weakable> WeakPtr<T>
{
    pub const fn null() -> Self
    {
        Self {
            link: RefPtr::null(),
            _phantom: PhantomData,
        }
    }

    pub fn new(target: &NonNullRefPtr<T>) -> Self { must!(Self::try_new(target)) }

    /// Fails only if the link has to be created and cannot be allocated.
    pub fn try_new(target: &NonNullRefPtr<T>) -> ErrorOr<Self>
    {
        let object: &T = target;
        let link = object.weak_anchor().link_for(object)?;
        Ok(Self {
            link: RefPtr::from(link),
            _phantom: PhantomData,
        })
    }

    /// A null weak pointer for a null `target`.
    pub fn try_new_if_nonnull(target: &RefPtr<T>) -> ErrorOr<Self>
    {
        match target.as_nonnull() {
            Some(target) => Self::try_new(target),
            None => Ok(Self::null()),
        }
    }

    /// Strong reference to the target, or null if it is gone.
    pub fn strong_ref(&self) -> RefPtr<T>
    {
        match self.link.pointer() {
            Some(link) => unsafe { link.strong_ref::<T>() },
            None => RefPtr::null(),
        }
    }

    pub fn upgrade(&self) -> Option<NonNullRefPtr<T>> { self.strong_ref().into_option() }

    /// Raw target without taking a reference.
    ///
    /// Only meaningful when the caller knows the target is alive by other
    /// means; the result may be invalidated concurrently.
    pub fn unsafe_ptr(&self) -> Option<NonNull<T>>
    {
        self.link
            .pointer()
            .and_then(|link| NonNull::new(link.unsafe_ptr::<T>() as *mut T))
    }

    pub fn is_null(&self) -> bool { self.link.pointer().map_or(true, WeakLink::is_null) }

    pub fn has_value(&self) -> bool { !self.is_null() }

    pub fn clear(&mut self) { self.link.clear() }

    pub fn take_link(&mut self) -> RefPtr<WeakLink> { self.link.take() }

    pub fn ptr_eq(&self, other: &Self) -> bool { self.link.ptr_eq(&other.link) }
}

impl<T: Weakable> Clone for WeakPtr<T>
{
    fn clone(&self) -> Self
    {
        Self {
            link: self.link.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T: Weakable> Default for WeakPtr<T>
{
    fn default() -> Self { Self::null() }
}

impl<T: Weakable> From<&NonNullRefPtr<T>> for WeakPtr<T>
{
    fn from(target: &NonNullRefPtr<T>) -> Self { Self::new(target) }
}

impl<T: Weakable> fmt::Debug for WeakPtr<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("WeakPtr")
            .field("ptr", &self.unsafe_ptr())
            .finish()
    }
}

impl<T: Weakable> fmt::Pointer for WeakPtr<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let ptr = self.unsafe_ptr().map_or(ptr::null(), |p| p.as_ptr() as *const T);
        fmt::Pointer::fmt(&ptr, f)
    }
}

pub fn make_weak_ptr_if_nonnull<T: Weakable>(target: &RefPtr<T>) -> WeakPtr<T>
{
    must!(WeakPtr::try_new_if_nonnull(target))
}

#[cfg(test)]
mod tests
{
    use std::{
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst},
            Arc, Barrier,
        },
        thread,
    };

    use super::*;

    struct Target
    {
        count: AtomicRefCount,
        value: u32,
    }
    crate::ref_counted!(Target, count: AtomicRefCount);

    #[test]
    fn revoked_link_refuses_upgrades()
    {
        let target = NonNullRefPtr::new(Target {
            count: AtomicRefCount::default(),
            value: 7,
        });
        let link = NonNullRefPtr::new(WeakLink::new(&*target));

        let strong = unsafe { link.strong_ref::<Target>() };
        assert_eq!(strong.value, 7);
        assert_eq!(NonNullRefPtr::ref_count(&target), 2);
        drop(strong);

        link.revoke();
        assert!(link.is_revoked());
        assert!(link.is_null());
        assert!(unsafe { link.strong_ref::<Target>() }.is_null());
        assert_eq!(link.in_flight(), 0);
        assert_eq!(NonNullRefPtr::ref_count(&target), 1);
    }

    #[test]
    #[should_panic(expected = "revoked twice")]
    fn double_revocation_is_fatal()
    {
        let target = NonNullRefPtr::new(Target {
            count: AtomicRefCount::default(),
            value: 0,
        });
        let link = WeakLink::new(&*target);
        link.revoke();
        link.revoke();
    }

    // Eight upgraders hammer the link while a ninth thread revokes it. Once
    // `revoke` has returned no upgrade may succeed, and it must return.
    #[test]
    fn upgrades_race_revocation()
    {
        const UPGRADERS: usize = 8;

        let target = NonNullRefPtr::new(Target {
            count: AtomicRefCount::default(),
            value: 42,
        });
        let link = Arc::new(WeakLink::new(&*target));
        let revoked = Arc::new(AtomicBool::new(false));
        let upgrades = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(UPGRADERS + 1));

        let workers: Vec<_> = (0..UPGRADERS)
            .map(|_| {
                let link = link.clone();
                let revoked = revoked.clone();
                let upgrades = upgrades.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let mut after = 0;
                    while after < 1000 {
                        let was_revoked = revoked.load(SeqCst);
                        let strong = unsafe { link.strong_ref::<Target>() };
                        if was_revoked {
                            assert!(strong.is_null(), "upgrade succeeded after revoke()");
                            after += 1;
                        } else if let Some(it) = strong.pointer() {
                            assert_eq!(it.value, 42);
                            upgrades.fetch_add(1, SeqCst);
                        }
                    }
                })
            })
            .collect();

        let revoker = {
            let link = link.clone();
            let revoked = revoked.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                thread::sleep(std::time::Duration::from_millis(5));
                link.revoke();
                revoked.store(true, SeqCst);
            })
        };

        revoker.join().unwrap();
        for w in workers {
            w.join().unwrap();
        }

        assert!(link.is_revoked());
        assert_eq!(link.in_flight(), 0);
        assert_eq!(NonNullRefPtr::ref_count(&target), 1);
        assert!(upgrades.load(SeqCst) > 0 || revoked.load(SeqCst));
    }
}
