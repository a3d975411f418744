//! Contiguous growable buffer.
//!
//! Slots `[0, size)` always hold live values and slots `[size, capacity)` are
//! uninitialised. Growing relocates every live value into the new buffer
//! bitwise, so reference-counted elements keep their counts unchanged.
//!
//! A vector may carry `INLINE` slots inside itself. Those are used until the
//! first growth past them, after which the elements live in a heap buffer.
//! Clearing the vector returns it to its inline slots.
//!
//! Capacity and allocation failures are reported as [`ErrorOr`]; indexing
//! past `size` is fatal.

use std::{
    fmt,
    iter::FusedIterator,
    marker::PhantomData,
    mem::MaybeUninit,
    ops::{Index, IndexMut},
    ptr::{self, NonNull},
    slice,
};

use crate::{
    allocator::{allocate_array, free_array, Allocator, SystemAllocator},
    error::{Error, ErrorOr},
    must, verify,
};

/// Smallest capacity allocated on first growth.
pub const MINIMUM_CAPACITY: usize = 4;

/// Capacity chosen when a full vector of capacity `capacity` must grow:
/// about 25% geometric growth with a floor.
pub fn padded_capacity(capacity: usize) -> ErrorOr<usize>
{
    capacity
        .checked_add(capacity / 4)
        .and_then(|c| c.checked_add(4))
        .map(|c| c.max(MINIMUM_CAPACITY))
        .ok_or(Error::Overflow {
            what: "vector capacity",
        })
}

pub struct Vector<T, A: Allocator = SystemAllocator, const INLINE: usize = 0>
{
    inline: [MaybeUninit<T>; INLINE],
    outline: Option<NonNull<T>>,
    size: usize,
    capacity: usize,
    alloc: A,
    _phantom: PhantomData<T>,
}

/// A vector on the system heap that keeps its first `INLINE` elements in
/// place.
pub type InlineVector<T, const INLINE: usize> = Vector<T, SystemAllocator, INLINE>;

unsafe impl<T: Send, A: Allocator + Send, const INLINE: usize> Send for Vector<T, A, INLINE> {}
unsafe impl<T: Sync, A: Allocator + Sync, const INLINE: usize> Sync for Vector<T, A, INLINE> {}

impl<T> Vector<T>
{
    pub const fn new() -> Self { Self::new_in(SystemAllocator) }

    pub fn with_capacity(capacity: usize) -> Self { must!(Self::try_with_capacity(capacity)) }

    pub fn try_with_capacity(capacity: usize) -> ErrorOr<Self>
    {
        Self::try_with_capacity_in(capacity, SystemAllocator)
    }
}

impl<T, A: Allocator, const INLINE: usize> Vector<T, A, INLINE>
{
    pub const fn new_in(alloc: A) -> Self
    {
        Self {
            inline: unsafe { MaybeUninit::<[MaybeUninit<T>; INLINE]>::uninit().assume_init() },
            outline: None,
            size: 0,
            capacity: INLINE,
            alloc,
            _phantom: PhantomData,
        }
    }

    pub fn try_with_capacity_in(capacity: usize, alloc: A) -> ErrorOr<Self>
    {
        let mut res = Self::new_in(alloc);
        res.try_ensure_capacity(capacity)?;
        Ok(res)
    }

    pub fn allocator(&self) -> &A { &self.alloc }

    pub fn size(&self) -> usize { self.size }

    pub fn len(&self) -> usize { self.size }

    pub fn capacity(&self) -> usize { self.capacity }

    pub fn is_empty(&self) -> bool { self.size == 0 }

    /// Whether the elements still live in the inline slots.
    pub fn is_inline(&self) -> bool { self.outline.is_none() }

    pub fn as_ptr(&self) -> *const T { self.data() }

    pub fn as_slice(&self) -> &[T] { unsafe { slice::from_raw_parts(self.data(), self.size) } }

    pub fn as_mut_slice(&mut self) -> &mut [T]
    {
        let size = self.size;
        unsafe { slice::from_raw_parts_mut(self.data_mut(), size) }
    }

    pub fn iter(&self) -> slice::Iter<'_, T> { self.as_slice().iter() }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> { self.as_mut_slice().iter_mut() }

    pub fn at(&self, index: usize) -> &T
    {
        verify!(
            index < self.size,
            "index {index} out of bounds for vector of size {}",
            self.size
        );
        unsafe { &*self.data().add(index) }
    }

    pub fn at_mut(&mut self, index: usize) -> &mut T
    {
        verify!(
            index < self.size,
            "index {index} out of bounds for vector of size {}",
            self.size
        );
        unsafe { &mut *self.data_mut().add(index) }
    }

    pub fn get(&self, index: usize) -> Option<&T> { self.as_slice().get(index) }

    pub fn first(&self) -> &T { self.at(0) }

    pub fn last(&self) -> &T
    {
        verify!(self.size > 0, "last() on an empty vector");
        self.at(self.size - 1)
    }

    pub fn first_matching<P>(&self, mut predicate: P) -> Option<&T>
    where
        P: FnMut(&T) -> bool,
    {
        self.iter().find(|it| predicate(it))
    }

    pub fn last_matching<P>(&self, mut predicate: P) -> Option<&T>
    where
        P: FnMut(&T) -> bool,
    {
        self.iter().rev().find(|it| predicate(it))
    }

    /// Make room for at least `needed` elements, allocating exactly `needed`
    /// slots if the buffer has to move.
    pub fn try_ensure_capacity(&mut self, needed: usize) -> ErrorOr<()>
    {
        if self.capacity >= needed {
            return Ok(());
        }

        let buffer = allocate_array::<T, A>(&self.alloc, needed)?;
        unsafe {
            ptr::copy_nonoverlapping(self.data(), buffer.as_ptr(), self.size);
            self.release_outline();
        }
        log::trace!(
            "vector relocated {} elements, capacity {} -> {}",
            self.size,
            self.capacity,
            needed
        );

        self.outline = Some(buffer);
        self.capacity = needed;
        Ok(())
    }

    pub fn ensure_capacity(&mut self, needed: usize) { must!(self.try_ensure_capacity(needed)) }

    /// Make room for at least `needed` elements, growing by the padding
    /// formula so that repeated growth stays amortised.
    pub fn try_grow_capacity(&mut self, needed: usize) -> ErrorOr<()>
    {
        if self.capacity >= needed {
            return Ok(());
        }
        let padded = padded_capacity(self.capacity)?;
        self.try_ensure_capacity(needed.max(padded))
    }

    pub fn grow_capacity(&mut self, needed: usize) { must!(self.try_grow_capacity(needed)) }

    pub fn try_push(&mut self, value: T) -> ErrorOr<()>
    {
        self.try_grow_capacity(self.size_plus(1)?)?;
        self.unchecked_push(value);
        Ok(())
    }

    pub fn push(&mut self, value: T) { must!(self.try_push(value)) }

    /// Push into capacity the caller already reserved. Fatal if full.
    pub fn unchecked_push(&mut self, value: T)
    {
        verify!(self.size < self.capacity, "unchecked_push() on a full vector");
        let size = self.size;
        unsafe { self.data_mut().add(size).write(value) };
        self.size += 1;
    }

    /// Remove and return the last element, or `None` if empty.
    pub fn pop(&mut self) -> Option<T>
    {
        if self.size == 0 {
            return None;
        }
        self.size -= 1;
        Some(unsafe { self.data().add(self.size).read() })
    }

    /// Like `pop`, but an empty vector is a fatal error.
    pub fn take_last(&mut self) -> T
    {
        match self.pop() {
            Some(it) => it,
            None => crate::error::fatal("take_last() on an empty vector"),
        }
    }

    pub fn take_first(&mut self) -> T
    {
        verify!(self.size > 0, "take_first() on an empty vector");
        self.take(0)
    }

    /// Remove the element at `index`, shifting the tail down.
    pub fn take(&mut self, index: usize) -> T
    {
        verify!(
            index < self.size,
            "index {index} out of bounds for vector of size {}",
            self.size
        );
        let tail = self.size - index - 1;
        unsafe {
            let base = self.data_mut();
            let value = base.add(index).read();
            ptr::copy(base.add(index + 1), base.add(index), tail);
            self.size -= 1;
            value
        }
    }

    /// Remove the element at `index` by swapping the last element into it.
    pub fn unstable_take(&mut self, index: usize) -> T
    {
        verify!(
            index < self.size,
            "index {index} out of bounds for vector of size {}",
            self.size
        );
        let last = self.size - 1;
        self.as_mut_slice().swap(index, last);
        self.take_last()
    }

    pub fn remove(&mut self, index: usize) { drop(self.take(index)) }

    pub fn remove_range(&mut self, index: usize, count: usize)
    {
        if count == 0 {
            return;
        }
        let end = index.checked_add(count);
        verify!(
            end.map_or(false, |end| end <= self.size),
            "range {index}+{count} out of bounds for vector of size {}",
            self.size
        );

        let old_size = self.size;
        self.size = index;
        unsafe {
            let base = self.data_mut();
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(base.add(index), count));
            ptr::copy(base.add(index + count), base.add(index), old_size - index - count);
        }
        self.size = old_size - count;
    }

    pub fn remove_first_matching<P>(&mut self, mut predicate: P) -> bool
    where
        P: FnMut(&T) -> bool,
    {
        match self.iter().position(|it| predicate(it)) {
            Some(i) => {
                self.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn remove_all_matching<P>(&mut self, mut predicate: P) -> bool
    where
        P: FnMut(&T) -> bool,
    {
        let mut removed = false;
        let mut i = 0;
        while i < self.size {
            if predicate(self.at(i)) {
                self.remove(i);
                removed = true;
            } else {
                i += 1;
            }
        }
        removed
    }

    /// Insert `value` at `index`, shifting the tail up. `index == size`
    /// appends; anything larger is rejected.
    pub fn try_insert(&mut self, index: usize, value: T) -> ErrorOr<()>
    {
        if index > self.size {
            return Err(Error::InvalidArgument("insertion index past the end"));
        }
        self.try_grow_capacity(self.size_plus(1)?)?;
        let tail = self.size - index;
        unsafe {
            let base = self.data_mut();
            ptr::copy(base.add(index), base.add(index + 1), tail);
            base.add(index).write(value);
        }
        self.size += 1;
        Ok(())
    }

    pub fn insert(&mut self, index: usize, value: T) { must!(self.try_insert(index, value)) }

    /// Insert before the first element at or after `first_index` matching
    /// `predicate`, or append. Returns the index the value landed at.
    pub fn try_insert_before_matching<P>(
        &mut self, value: T, mut predicate: P, first_index: usize,
    ) -> ErrorOr<usize>
    where
        P: FnMut(&T) -> bool,
    {
        for i in first_index..self.size {
            if predicate(self.at(i)) {
                self.try_insert(i, value)?;
                return Ok(i);
            }
        }
        self.try_push(value)?;
        Ok(self.size - 1)
    }

    pub fn try_prepend(&mut self, value: T) -> ErrorOr<()> { self.try_insert(0, value) }

    /// Move every element of `other` to the end of `self`.
    pub fn try_extend<B: Allocator, const OTHER: usize>(
        &mut self, mut other: Vector<T, B, OTHER>,
    ) -> ErrorOr<()>
    {
        let count = other.size;
        self.try_grow_capacity(self.size_plus(count)?)?;
        let size = self.size;
        unsafe {
            ptr::copy_nonoverlapping(other.data(), self.data_mut().add(size), count);
        }
        other.size = 0;
        self.size += count;
        Ok(())
    }

    /// Drop elements from `new_size` on. Shrinking to zero also releases the
    /// buffer.
    pub fn shrink(&mut self, new_size: usize) { self.shrink_to(new_size, false) }

    /// Drop elements from `new_size` on, keeping the buffer even when nothing
    /// is left.
    pub fn shrink_and_keep_capacity(&mut self, new_size: usize) { self.shrink_to(new_size, true) }

    /// Drop every element but keep the buffer.
    pub fn clear_with_capacity(&mut self) { self.truncate(0) }

    /// Drop every element and release the buffer.
    pub fn clear(&mut self)
    {
        self.truncate(0);
        unsafe { self.release_outline() };
        self.capacity = INLINE;
    }

    pub fn reverse(&mut self) { self.as_mut_slice().reverse() }

    pub fn contains<U>(&self, value: &U) -> bool
    where
        T: PartialEq<U>,
    {
        self.iter().any(|it| it == value)
    }

    /// Whether `value` occurs in `start..=end`. Both ends must be in bounds.
    pub fn contains_in_range<U>(&self, value: &U, start: usize, end: usize) -> bool
    where
        T: PartialEq<U>,
    {
        verify!(
            start <= end && end < self.size,
            "range {start}..={end} out of bounds for vector of size {}",
            self.size
        );
        self.as_slice()[start..=end].iter().any(|it| it == value)
    }

    pub fn find_first_index<U>(&self, value: &U) -> Option<usize>
    where
        T: PartialEq<U>,
    {
        self.iter().position(|it| it == value)
    }

    fn shrink_to(&mut self, new_size: usize, keep_capacity: bool)
    {
        verify!(
            new_size <= self.size,
            "shrink() to {new_size} on a vector of size {}",
            self.size
        );
        if new_size == self.size {
            return;
        }
        if new_size == 0 && !keep_capacity {
            self.clear();
        } else {
            self.truncate(new_size);
        }
    }

    fn truncate(&mut self, new_size: usize)
    {
        if new_size >= self.size {
            return;
        }
        let old_size = self.size;
        self.size = new_size;
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.data_mut().add(new_size),
                old_size - new_size,
            ));
        }
    }

    /// # Safety
    /// The heap buffer must hold no live values; the caller resets
    /// `capacity` or installs a new buffer afterwards.
    unsafe fn release_outline(&mut self)
    {
        if let Some(buffer) = self.outline.take() {
            free_array(&self.alloc, buffer, self.capacity);
        }
    }

    fn size_plus(&self, extra: usize) -> ErrorOr<usize>
    {
        self.size.checked_add(extra).ok_or(Error::Overflow {
            what: "vector size",
        })
    }

    fn data(&self) -> *const T
    {
        match self.outline {
            Some(buffer) => buffer.as_ptr(),
            None => self.inline.as_ptr().cast(),
        }
    }

    fn data_mut(&mut self) -> *mut T
    {
        match self.outline {
            Some(buffer) => buffer.as_ptr(),
            None => self.inline.as_mut_ptr().cast(),
        }
    }
}

impl<T: Default, A: Allocator, const INLINE: usize> Vector<T, A, INLINE>
{
    /// Grow with default values or shrink. When growing, capacity is secured
    /// before any element is constructed.
    pub fn try_resize(&mut self, new_size: usize) -> ErrorOr<()> { self.try_resize_to(new_size, false) }

    pub fn resize(&mut self, new_size: usize) { must!(self.try_resize(new_size)) }

    /// Like `try_resize`, but shrinking to zero keeps the buffer.
    pub fn try_resize_and_keep_capacity(&mut self, new_size: usize) -> ErrorOr<()>
    {
        self.try_resize_to(new_size, true)
    }

    pub fn resize_and_keep_capacity(&mut self, new_size: usize)
    {
        must!(self.try_resize_and_keep_capacity(new_size))
    }

    fn try_resize_to(&mut self, new_size: usize, keep_capacity: bool) -> ErrorOr<()>
    {
        if new_size <= self.size {
            self.shrink_to(new_size, keep_capacity);
            return Ok(());
        }
        self.try_ensure_capacity(new_size)?;
        while self.size < new_size {
            self.unchecked_push(T::default());
        }
        Ok(())
    }
}

impl<T: Clone, A: Allocator, const INLINE: usize> Vector<T, A, INLINE>
{
    pub fn try_extend_from_slice(&mut self, values: &[T]) -> ErrorOr<()>
    {
        self.try_grow_capacity(self.size_plus(values.len())?)?;
        for it in values {
            self.unchecked_push(it.clone());
        }
        Ok(())
    }

    pub fn try_clone(&self) -> ErrorOr<Self>
    where
        A: Clone,
    {
        let mut res = Self::try_with_capacity_in(self.size, self.alloc.clone())?;
        res.try_extend_from_slice(self.as_slice())?;
        Ok(res)
    }
}

impl<T, A: Allocator, const INLINE: usize> Drop for Vector<T, A, INLINE>
{
    fn drop(&mut self) { self.clear() }
}

impl<T: Clone, A: Allocator + Clone, const INLINE: usize> Clone for Vector<T, A, INLINE>
{
    fn clone(&self) -> Self { must!(self.try_clone()) }
}

impl<T, A: Allocator + Default, const INLINE: usize> Default for Vector<T, A, INLINE>
{
    fn default() -> Self { Self::new_in(A::default()) }
}

impl<T, A: Allocator, const INLINE: usize> Index<usize> for Vector<T, A, INLINE>
{
    type Output = T;

    fn index(&self, index: usize) -> &T { self.at(index) }
}

impl<T, A: Allocator, const INLINE: usize> IndexMut<usize> for Vector<T, A, INLINE>
{
    fn index_mut(&mut self, index: usize) -> &mut T { self.at_mut(index) }
}

impl<T, U, A, B, const INLINE: usize, const OTHER: usize> PartialEq<Vector<U, B, OTHER>>
    for Vector<T, A, INLINE>
where
    T: PartialEq<U>,
    A: Allocator,
    B: Allocator,
{
    fn eq(&self, other: &Vector<U, B, OTHER>) -> bool { self.as_slice() == other.as_slice() }
}

impl<T: Eq, A: Allocator, const INLINE: usize> Eq for Vector<T, A, INLINE> {}

impl<T: PartialEq<U>, U, A: Allocator, const INLINE: usize> PartialEq<[U]> for Vector<T, A, INLINE>
{
    fn eq(&self, other: &[U]) -> bool { self.as_slice() == other }
}

impl<T: fmt::Debug, A: Allocator, const INLINE: usize> fmt::Debug for Vector<T, A, INLINE>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display, A: Allocator, const INLINE: usize> fmt::Display for Vector<T, A, INLINE>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str("[")?;
        for (i, it) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            fmt::Display::fmt(it, f)?;
        }
        f.write_str("]")
    }
}

impl<T, A: Allocator + Default, const INLINE: usize> FromIterator<T> for Vector<T, A, INLINE>
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self
    {
        let mut res = Self::default();
        res.extend(iter);
        res
    }
}

impl<T, A: Allocator, const INLINE: usize> Extend<T> for Vector<T, A, INLINE>
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I)
    {
        let iter = iter.into_iter();
        must!(self.try_grow_capacity(self.size.saturating_add(iter.size_hint().0)));
        for it in iter {
            self.push(it);
        }
    }
}

impl<'a, T, A: Allocator, const INLINE: usize> IntoIterator for &'a Vector<T, A, INLINE>
{
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter { self.iter() }
}

impl<'a, T, A: Allocator, const INLINE: usize> IntoIterator for &'a mut Vector<T, A, INLINE>
{
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter { self.iter_mut() }
}

impl<T, A: Allocator, const INLINE: usize> IntoIterator for Vector<T, A, INLINE>
{
    type Item = T;
    type IntoIter = IntoIter<T, A, INLINE>;

    fn into_iter(mut self) -> IntoIter<T, A, INLINE>
    {
        let back = self.size;
        self.size = 0;
        IntoIter {
            vector: self,
            front: 0,
            back,
        }
    }
}

/// Owning iterator over a [`Vector`].
///
/// The vector's size is zeroed while the iterator owns it; `front..back`
/// tracks the values not yet handed out.
pub struct IntoIter<T, A: Allocator = SystemAllocator, const INLINE: usize = 0>
{
    vector: Vector<T, A, INLINE>,
    front: usize,
    back: usize,
}

impl<T, A: Allocator, const INLINE: usize> Iterator for IntoIter<T, A, INLINE>
{
    type Item = T;

    fn next(&mut self) -> Option<T>
    {
        if self.front == self.back {
            return None;
        }
        let it = unsafe { self.vector.data().add(self.front).read() };
        self.front += 1;
        Some(it)
    }

    fn size_hint(&self) -> (usize, Option<usize>)
    {
        let n = self.back - self.front;
        (n, Some(n))
    }
}

impl<T, A: Allocator, const INLINE: usize> DoubleEndedIterator for IntoIter<T, A, INLINE>
{
    fn next_back(&mut self) -> Option<T>
    {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(unsafe { self.vector.data().add(self.back).read() })
    }
}

impl<T, A: Allocator, const INLINE: usize> ExactSizeIterator for IntoIter<T, A, INLINE> {}
impl<T, A: Allocator, const INLINE: usize> FusedIterator for IntoIter<T, A, INLINE> {}

impl<T, A: Allocator, const INLINE: usize> Drop for IntoIter<T, A, INLINE>
{
    fn drop(&mut self)
    {
        let remaining = self.back - self.front;
        let front = self.front;
        self.front = self.back;
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.vector.data_mut().add(front),
                remaining,
            ));
        }
    }
}

impl<T: fmt::Debug, A: Allocator, const INLINE: usize> fmt::Debug for IntoIter<T, A, INLINE>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let rest = unsafe {
            slice::from_raw_parts(self.vector.data().add(self.front), self.back - self.front)
        };
        f.debug_tuple("IntoIter").field(&rest).finish()
    }
}
