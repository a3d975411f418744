use std::{
    fmt,
    marker::PhantomData,
    mem,
    ops::Deref,
    ptr::NonNull,
};

use crate::{
    allocator::{allocate_value, free_value},
    counter::{Counter, COUNTER_INIT},
    error::ErrorOr,
    must, verify,
};

/// An object carrying its own strong reference count.
///
/// # Safety
/// `ref_counter` must always return the same cell, owned by `self` and used
/// for nothing else.
pub unsafe trait RefCounted
{
    type Count: Counter;

    fn ref_counter(&self) -> &Self::Count;

    /// Runs once, after the last strong reference is gone and before the
    /// object is dropped.
    fn will_be_destroyed(&self) {}
}

/// Implement [`RefCounted`] for a type with an embedded count field.
///
/// ```
/// use bootstrap_runtime::{ref_counted, RefCount, NonNullRefPtr};
///
/// struct Token { count: RefCount, text: &'static str }
/// ref_counted!(Token, count: RefCount);
///
/// let token = NonNullRefPtr::new(Token { count: RefCount::default(), text: "fn" });
/// assert_eq!(token.text, "fn");
/// ```
#[macro_export]
macro_rules! ref_counted {
    ($ty:ty, $field:ident : $count:ty) => {
        unsafe impl $crate::RefCounted for $ty {
            type Count = $count;

            fn ref_counter(&self) -> &$count { &self.$field }
        }
    };
}

/// Strong, never-null owning pointer.
///
/// Cloning adds a reference, dropping removes one and destroys the target
/// when it was the last. Moving transfers the reference without touching the
/// count.
#[repr(transparent)]
pub struct NonNullRefPtr<T: RefCounted>
{
    ptr: NonNull<T>,
    _phantom: PhantomData<T>,
}

unsafe impl<T: RefCounted + Send + Sync> Send for NonNullRefPtr<T> {}
unsafe impl<T: RefCounted + Send + Sync> Sync for NonNullRefPtr<T> {}

impl<T: RefCounted> NonNullRefPtr<T>
{
    /// Allocate `value` and adopt its initial reference.
    pub fn new(value: T) -> Self { must!(Self::try_new(value)) }

    pub fn try_new(value: T) -> ErrorOr<Self>
    {
        let ptr = allocate_value(value)?;
        unsafe {
            verify!(
                ptr.as_ref().ref_counter().count() == COUNTER_INIT,
                "adopting an object that is already referenced"
            );
            Ok(Self::adopt(ptr))
        }
    }

    /// Take over a reference without incrementing.
    ///
    /// # Safety
    /// `ptr` must come from this crate's object allocation (`try_new`,
    /// `leak_ref`) and carry a strong reference nobody else will release.
    pub unsafe fn adopt(ptr: NonNull<T>) -> Self
    {
        Self {
            ptr,
            _phantom: PhantomData,
        }
    }

    /// Add a strong reference to an object reached through a plain borrow.
    ///
    /// # Safety
    /// `object` must live in an allocation made by this crate (`try_new`,
    /// `make_ref_counted`) whose count is still above zero.
    pub unsafe fn from_ref(object: &T) -> Self
    {
        object.ref_counter().increment();
        Self::adopt(NonNull::from(object))
    }

    /// Give up ownership without decrementing. The caller becomes
    /// responsible for the reference, normally by passing it back to
    /// `adopt`.
    pub fn leak_ref(this: Self) -> NonNull<T>
    {
        let ptr = this.ptr;
        mem::forget(this);
        ptr
    }

    pub fn ref_count(this: &Self) -> u32 { this.ref_counter().count() }

    pub fn as_ptr(this: &Self) -> NonNull<T> { this.ptr }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool { this.ptr == other.ptr }
}

impl<T: RefCounted> Clone for NonNullRefPtr<T>
{
    fn clone(&self) -> Self
    {
        self.ref_counter().increment();
        Self {
            ptr: self.ptr,
            _phantom: PhantomData,
        }
    }
}

impl<T: RefCounted> Drop for NonNullRefPtr<T>
{
    fn drop(&mut self) { unsafe { release(self.ptr) } }
}

impl<T: RefCounted> Deref for NonNullRefPtr<T>
{
    type Target = T;

    fn deref(&self) -> &T { unsafe { self.ptr.as_ref() } }
}

impl<T: RefCounted> AsRef<T> for NonNullRefPtr<T>
{
    fn as_ref(&self) -> &T { self }
}

impl<T: RefCounted> fmt::Debug for NonNullRefPtr<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("NonNullRefPtr")
            .field("ptr", &self.ptr)
            .field("count", &Self::ref_count(self))
            .finish()
    }
}

impl<T: RefCounted + fmt::Display> fmt::Display for NonNullRefPtr<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(&**self, f) }
}

impl<T: RefCounted> fmt::Pointer for NonNullRefPtr<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Pointer::fmt(&self.ptr, f) }
}

/// Drop one strong reference, destroying the object on the last.
unsafe fn release<T: RefCounted>(ptr: NonNull<T>)
{
    let object = ptr.as_ref();
    if object.ref_counter().decrement() == 0 {
        object.will_be_destroyed();
        verify!(
            object.ref_counter().count() == 0,
            "destroying an object with a nonzero reference count"
        );
        free_value(ptr);
    }
}

/// Nullable owning pointer. Same counting rules as [`NonNullRefPtr`].
pub struct RefPtr<T: RefCounted>(Option<NonNullRefPtr<T>>);

impl<T: RefCounted> RefPtr<T>
{
    pub const fn null() -> Self { Self(None) }

    pub fn new(value: T) -> Self { Self(Some(NonNullRefPtr::new(value))) }

    pub fn try_new(value: T) -> ErrorOr<Self> { Ok(Self(Some(NonNullRefPtr::try_new(value)?))) }

    /// # Safety
    /// Same contract as [`NonNullRefPtr::adopt`] for a non-null `ptr`.
    pub unsafe fn adopt(ptr: Option<NonNull<T>>) -> Self
    {
        Self(ptr.map(|p| NonNullRefPtr::adopt(p)))
    }

    pub fn is_null(&self) -> bool { self.0.is_none() }

    pub fn pointer(&self) -> Option<&T> { self.0.as_deref() }

    pub fn as_nonnull(&self) -> Option<&NonNullRefPtr<T>> { self.0.as_ref() }

    pub fn ref_count(&self) -> Option<u32> { self.0.as_ref().map(NonNullRefPtr::ref_count) }

    /// Move the reference out, leaving this pointer null.
    pub fn take(&mut self) -> Self { Self(self.0.take()) }

    /// Release the current reference, if any.
    pub fn clear(&mut self) { self.0 = None; }

    pub fn leak_ref(self) -> Option<NonNull<T>> { self.0.map(NonNullRefPtr::leak_ref) }

    /// Convert into the non-null variant. Fatal if null.
    pub fn release_nonnull(self) -> NonNullRefPtr<T>
    {
        match self.0 {
            Some(it) => it,
            None => crate::error::fatal("release_nonnull() on a null RefPtr"),
        }
    }

    pub fn into_option(self) -> Option<NonNullRefPtr<T>> { self.0 }

    pub fn swap(&mut self, other: &mut Self) { mem::swap(&mut self.0, &mut other.0) }

    pub fn ptr_eq(&self, other: &Self) -> bool
    {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => NonNullRefPtr::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: RefCounted> Default for RefPtr<T>
{
    fn default() -> Self { Self::null() }
}

impl<T: RefCounted> Clone for RefPtr<T>
{
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T: RefCounted> From<NonNullRefPtr<T>> for RefPtr<T>
{
    fn from(it: NonNullRefPtr<T>) -> Self { Self(Some(it)) }
}

impl<T: RefCounted> From<Option<NonNullRefPtr<T>>> for RefPtr<T>
{
    fn from(it: Option<NonNullRefPtr<T>>) -> Self { Self(it) }
}

impl<T: RefCounted> Deref for RefPtr<T>
{
    type Target = T;

    fn deref(&self) -> &T
    {
        match self.0.as_deref() {
            Some(it) => it,
            None => crate::error::fatal("dereferencing a null RefPtr"),
        }
    }
}

impl<T: RefCounted> fmt::Debug for RefPtr<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match &self.0 {
            Some(it) => f.debug_tuple("RefPtr").field(it).finish(),
            None => f.write_str("RefPtr(null)"),
        }
    }
}

impl<T: RefCounted + fmt::Display> fmt::Display for RefPtr<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match &self.0 {
            Some(it) => fmt::Display::fmt(it, f),
            None => f.write_str("null"),
        }
    }
}

/// Allocate `value` and return the owning pointer.
pub fn make_ref_counted<T: RefCounted>(value: T) -> NonNullRefPtr<T> { NonNullRefPtr::new(value) }

pub fn try_make_ref_counted<T: RefCounted>(value: T) -> ErrorOr<NonNullRefPtr<T>>
{
    NonNullRefPtr::try_new(value)
}
