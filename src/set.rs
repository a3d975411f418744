//! Shared hash set.

use std::{borrow::Borrow, collections::HashSet, fmt, hash::Hash};

use crate::{
    error::{reserve_failed, ErrorOr},
    must,
    pointers::NonNullRefPtr,
    storage::Storage,
    vector::{self, Vector},
};

/// Outcome of [`Set::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashSetResult
{
    InsertedNewEntry,
    ReplacedExistingEntry,
}

/// Set of values whose copies alias one reference-counted table.
pub struct Set<T>
{
    storage: NonNullRefPtr<Storage<HashSet<T>>>,
}

impl<T: Eq + Hash> Set<T>
{
    pub fn create_empty() -> ErrorOr<Self>
    {
        Ok(Self {
            storage: NonNullRefPtr::try_new(Storage::default())?,
        })
    }

    pub fn create_with_values<I>(values: I) -> ErrorOr<Self>
    where
        I: IntoIterator<Item = T>,
    {
        let values = values.into_iter();
        let mut res = Self::create_empty()?;
        res.ensure_capacity(values.size_hint().0)?;
        for value in values {
            res.add(value)?;
        }
        Ok(res)
    }

    pub fn size(&self) -> usize { self.storage.read().len() }

    pub fn is_empty(&self) -> bool { self.storage.read().is_empty() }

    pub fn capacity(&self) -> usize { self.storage.read().capacity() }

    pub fn add(&mut self, value: T) -> ErrorOr<HashSetResult>
    {
        let mut table = self.storage.write();
        table.try_reserve(1).map_err(|_| reserve_failed::<T>(1))?;
        Ok(match table.replace(value) {
            Some(_) => HashSetResult::ReplacedExistingEntry,
            None => HashSetResult::InsertedNewEntry,
        })
    }

    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.storage.write().remove(value)
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.storage.read().contains(value)
    }

    /// Make room for `capacity` values in total.
    pub fn ensure_capacity(&mut self, capacity: usize) -> ErrorOr<()>
    {
        let mut table = self.storage.write();
        let additional = capacity.saturating_sub(table.len());
        table
            .try_reserve(additional)
            .map_err(|_| reserve_failed::<T>(additional))
    }

    pub fn clear(&mut self) { self.storage.write().clear() }

    pub fn shares_storage(&self, other: &Self) -> bool
    {
        NonNullRefPtr::ptr_eq(&self.storage, &other.storage)
    }
}

impl<T: Eq + Hash + Clone> Set<T>
{
    /// Iterate over a copy of the values taken now.
    pub fn iterator(&self) -> ErrorOr<vector::IntoIter<T>>
    {
        let table = self.storage.read();
        let mut res = Vector::try_with_capacity(table.len())?;
        for value in table.iter() {
            res.unchecked_push(value.clone());
        }
        Ok(res.into_iter())
    }
}

impl<T: Eq + Hash> Default for Set<T>
{
    fn default() -> Self { must!(Self::create_empty()) }
}

impl<T> Clone for Set<T>
{
    fn clone(&self) -> Self
    {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Set<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_set().entries(self.storage.read().iter()).finish()
    }
}
