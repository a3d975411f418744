//! Shared hash map.

use std::{
    borrow::Borrow,
    cell::{Ref, RefMut},
    collections::HashMap,
    fmt,
    hash::Hash,
};

use crate::{
    error::{reserve_failed, ErrorOr},
    must,
    pointers::NonNullRefPtr,
    storage::Storage,
    vector::{self, Vector},
};

/// Key-value map whose copies alias one reference-counted table.
pub struct Dictionary<K, V>
{
    storage: NonNullRefPtr<Storage<HashMap<K, V>>>,
}

impl<K: Eq + Hash, V> Dictionary<K, V>
{
    pub fn create_empty() -> ErrorOr<Self>
    {
        Ok(Self {
            storage: NonNullRefPtr::try_new(Storage::default())?,
        })
    }

    pub fn create_with_entries<I>(entries: I) -> ErrorOr<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let entries = entries.into_iter();
        let mut res = Self::create_empty()?;
        res.ensure_capacity(entries.size_hint().0)?;
        for (key, value) in entries {
            res.set(key, value)?;
        }
        Ok(res)
    }

    pub fn size(&self) -> usize { self.storage.read().len() }

    pub fn is_empty(&self) -> bool { self.storage.read().is_empty() }

    pub fn capacity(&self) -> usize { self.storage.read().capacity() }

    /// Insert or replace. Returns the value previously stored under `key`.
    pub fn set(&mut self, key: K, value: V) -> ErrorOr<Option<V>>
    {
        let mut map = self.storage.write();
        map.try_reserve(1).map_err(|_| reserve_failed::<(K, V)>(1))?;
        Ok(map.insert(key, value))
    }

    pub fn get<Q>(&self, key: &Q) -> Option<Ref<'_, V>>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        Ref::filter_map(self.storage.read(), |map| map.get(key)).ok()
    }

    pub fn get_mut<Q>(&self, key: &Q) -> Option<RefMut<'_, V>>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        RefMut::filter_map(self.storage.write(), |map| map.get_mut(key)).ok()
    }

    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.storage.write().remove(key).is_some()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.storage.read().contains_key(key)
    }

    /// Make room for `capacity` entries in total.
    pub fn ensure_capacity(&mut self, capacity: usize) -> ErrorOr<()>
    {
        let mut map = self.storage.write();
        let additional = capacity.saturating_sub(map.len());
        map.try_reserve(additional)
            .map_err(|_| reserve_failed::<(K, V)>(additional))
    }

    pub fn clear(&mut self) { self.storage.write().clear() }

    pub fn shares_storage(&self, other: &Self) -> bool
    {
        NonNullRefPtr::ptr_eq(&self.storage, &other.storage)
    }
}

impl<K: Eq + Hash + Clone, V> Dictionary<K, V>
{
    pub fn keys(&self) -> ErrorOr<Vector<K>>
    {
        let map = self.storage.read();
        let mut res = Vector::try_with_capacity(map.len())?;
        for key in map.keys() {
            res.unchecked_push(key.clone());
        }
        Ok(res)
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Dictionary<K, V>
{
    /// Iterate over a copy of the entries taken now. Later changes to the
    /// dictionary are not observed.
    pub fn iterator(&self) -> ErrorOr<vector::IntoIter<(K, V)>>
    {
        let map = self.storage.read();
        let mut res = Vector::try_with_capacity(map.len())?;
        for (key, value) in map.iter() {
            res.unchecked_push((key.clone(), value.clone()));
        }
        Ok(res.into_iter())
    }
}

impl<K: Eq + Hash, V> Default for Dictionary<K, V>
{
    fn default() -> Self { must!(Self::create_empty()) }
}

impl<K, V> Clone for Dictionary<K, V>
{
    fn clone(&self) -> Self
    {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Dictionary<K, V>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_map().entries(self.storage.read().iter()).finish()
    }
}
