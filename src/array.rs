//! Shared growable array.
//!
//! An [`Array`] is a handle to reference-counted storage: cloning an array
//! aliases the same elements, and the storage lives until the last handle
//! (array, slice or iterator) is dropped. Storage is created lazily on the
//! first operation that needs it.

use std::{
    cell::{Ref, RefMut},
    fmt,
};

use crate::{
    error::{Error, ErrorOr},
    must,
    pointers::RefPtr,
    storage::Storage,
    vector::Vector,
    verify,
};

type ArrayStorage<T> = Storage<Vector<T>>;

fn element_at<T>(storage: &ArrayStorage<T>, index: usize) -> Ref<'_, T>
{
    Ref::map(storage.read(), |v| v.at(index))
}

fn element_at_mut<T>(storage: &ArrayStorage<T>, index: usize) -> RefMut<'_, T>
{
    RefMut::map(storage.write(), |v| v.at_mut(index))
}

pub struct Array<T>
{
    storage: RefPtr<ArrayStorage<T>>,
}

impl<T> Array<T>
{
    pub const fn new() -> Self
    {
        Self {
            storage: RefPtr::null(),
        }
    }

    /// Take over the elements of `vector`.
    pub fn try_from_vector(vector: Vector<T>) -> ErrorOr<Self>
    {
        let mut res = Self::new();
        res.try_ensure_capacity(vector.size())?;
        res.ensure_storage()?.write().try_extend(vector)?;
        Ok(res)
    }

    pub fn size(&self) -> usize { self.storage.pointer().map_or(0, |s| s.read().size()) }

    pub fn capacity(&self) -> usize { self.storage.pointer().map_or(0, |s| s.read().capacity()) }

    pub fn is_empty(&self) -> bool { self.size() == 0 }

    pub fn try_push(&mut self, value: T) -> ErrorOr<()>
    {
        self.ensure_storage()?.write().try_push(value)
    }

    pub fn push(&mut self, value: T) { must!(self.try_push(value)) }

    pub fn at(&self, index: usize) -> Ref<'_, T>
    {
        verify!(!self.storage.is_null(), "index {index} into an empty array");
        element_at(&self.storage, index)
    }

    pub fn at_mut(&self, index: usize) -> RefMut<'_, T>
    {
        verify!(!self.storage.is_null(), "index {index} into an empty array");
        element_at_mut(&self.storage, index)
    }

    pub fn try_ensure_capacity(&mut self, capacity: usize) -> ErrorOr<()>
    {
        self.ensure_storage()?.write().try_ensure_capacity(capacity)
    }

    /// Reserve room for `extra` elements beyond the current capacity.
    pub fn try_add_capacity(&mut self, extra: usize) -> ErrorOr<()>
    {
        let capacity = self.capacity().checked_add(extra).ok_or(Error::Overflow {
            what: "array capacity",
        })?;
        self.try_ensure_capacity(capacity)
    }

    pub fn pop(&mut self) -> Option<T>
    {
        self.storage.pointer().and_then(|s| s.write().pop())
    }

    pub fn slice(&self, offset: usize, size: usize) -> ArraySlice<T>
    {
        match self.storage.pointer() {
            Some(storage) => {
                verify!(
                    offset <= storage.read().size(),
                    "slice offset {offset} past the end of an array of size {}",
                    storage.read().size()
                );
                ArraySlice {
                    storage: self.storage.clone(),
                    offset,
                    size,
                }
            }
            None => {
                verify!(
                    offset == 0,
                    "slice offset {offset} past the end of an array of size 0"
                );
                ArraySlice::default()
            }
        }
    }

    pub fn iterator(&self) -> ArrayIterator<T>
    {
        ArrayIterator {
            storage: self.storage.clone(),
            index: 0,
        }
    }

    /// Run `f` over the contiguous elements.
    pub fn with_data<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> R
    {
        match self.storage.pointer() {
            Some(storage) => f(storage.write().as_mut_slice()),
            None => f(&mut []),
        }
    }

    pub fn shares_storage(&self, other: &Self) -> bool
    {
        !self.storage.is_null() && self.storage.ptr_eq(&other.storage)
    }

    fn ensure_storage(&mut self) -> ErrorOr<&ArrayStorage<T>>
    {
        if self.storage.is_null() {
            self.storage = RefPtr::try_new(ArrayStorage::default())?;
        }
        Ok(&*self.storage)
    }
}

impl<T: PartialEq> Array<T>
{
    pub fn contains(&self, value: &T) -> bool
    {
        self.storage.pointer().map_or(false, |s| s.read().contains(value))
    }
}

impl<T: Clone> Array<T>
{
    /// An array of `size` copies of `value`.
    pub fn filled(size: usize, value: T) -> ErrorOr<Self>
    {
        let mut res = Self::new();
        res.try_ensure_capacity(size)?;
        {
            let mut elements = res.ensure_storage()?.write();
            for _ in 0..size {
                elements.unchecked_push(value.clone());
            }
        }
        Ok(res)
    }

    pub fn push_values(&mut self, values: &[T]) -> ErrorOr<()>
    {
        self.try_add_capacity(values.len())?;
        self.ensure_storage()?.write().try_extend_from_slice(values)
    }
}

impl<T: Default> Array<T>
{
    pub fn try_resize(&mut self, size: usize) -> ErrorOr<()>
    {
        if size == self.size() {
            return Ok(());
        }
        self.ensure_storage()?.write().try_resize(size)
    }

    pub fn resize(&mut self, size: usize) { must!(self.try_resize(size)) }

    /// Append `extra` default values.
    pub fn try_add_size(&mut self, extra: usize) -> ErrorOr<()>
    {
        let size = self.size().checked_add(extra).ok_or(Error::Overflow {
            what: "array size",
        })?;
        self.try_resize(size)
    }
}

impl<T> Default for Array<T>
{
    fn default() -> Self { Self::new() }
}

impl<T> Clone for Array<T>
{
    fn clone(&self) -> Self
    {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<T> From<Vector<T>> for Array<T>
{
    fn from(vector: Vector<T>) -> Self { must!(Self::try_from_vector(vector)) }
}

impl<T> FromIterator<T> for Array<T>
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self
    {
        Self::from(iter.into_iter().collect::<Vector<T>>())
    }
}

impl<T: PartialEq> PartialEq for Array<T>
{
    fn eq(&self, other: &Self) -> bool
    {
        self.shares_storage(other)
            || (self.size() == other.size() && (0..self.size()).all(|i| *self.at(i) == *other.at(i)))
    }
}

impl<T: fmt::Debug> fmt::Debug for Array<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.storage.pointer() {
            Some(storage) => fmt::Debug::fmt(&*storage.read(), f),
            None => f.write_str("[]"),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Array<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.storage.pointer() {
            Some(storage) => fmt::Display::fmt(&*storage.read(), f),
            None => f.write_str("[]"),
        }
    }
}

/// A window onto an array's storage.
///
/// The window is clamped to the elements the storage actually holds, so it
/// never reports more than are available past `offset`.
pub struct ArraySlice<T>
{
    storage: RefPtr<ArrayStorage<T>>,
    offset: usize,
    size: usize,
}

impl<T> ArraySlice<T>
{
    pub fn size(&self) -> usize
    {
        match self.storage.pointer() {
            Some(storage) => storage
                .read()
                .size()
                .checked_sub(self.offset)
                .map_or(0, |available| available.min(self.size)),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool { self.size() == 0 }

    pub fn at(&self, index: usize) -> Ref<'_, T>
    {
        verify!(
            index < self.size(),
            "index {index} out of bounds for slice of size {}",
            self.size()
        );
        element_at(&self.storage, self.offset + index)
    }

    pub fn at_mut(&self, index: usize) -> RefMut<'_, T>
    {
        verify!(
            index < self.size(),
            "index {index} out of bounds for slice of size {}",
            self.size()
        );
        element_at_mut(&self.storage, self.offset + index)
    }
}

impl<T> Default for ArraySlice<T>
{
    fn default() -> Self
    {
        Self {
            storage: RefPtr::null(),
            offset: 0,
            size: 0,
        }
    }
}

impl<T> Clone for ArraySlice<T>
{
    fn clone(&self) -> Self
    {
        Self {
            storage: self.storage.clone(),
            offset: self.offset,
            size: self.size,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ArraySlice<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let mut list = f.debug_list();
        for i in 0..self.size() {
            list.entry(&*self.at(i));
        }
        list.finish()
    }
}

/// Yields copies of an array's elements. Holds the storage alive, and sees
/// elements pushed after it was created.
pub struct ArrayIterator<T>
{
    storage: RefPtr<ArrayStorage<T>>,
    index: usize,
}

impl<T: Clone> Iterator for ArrayIterator<T>
{
    type Item = T;

    fn next(&mut self) -> Option<T>
    {
        let storage = self.storage.pointer()?;
        if self.index >= storage.read().size() {
            return None;
        }
        let it = element_at(storage, self.index).clone();
        self.index += 1;
        Some(it)
    }
}
