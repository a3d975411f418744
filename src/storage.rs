use std::cell::{Ref, RefCell, RefMut};

use crate::{counter::RefCount, pointers::RefCounted};

/// Reference-counted, interior-mutable backing for the shared containers.
pub(crate) struct Storage<C>
{
    count: RefCount,
    contents: RefCell<C>,
}

unsafe impl<C> RefCounted for Storage<C>
{
    type Count = RefCount;

    fn ref_counter(&self) -> &RefCount { &self.count }
}

impl<C: Default> Default for Storage<C>
{
    fn default() -> Self
    {
        Self {
            count: RefCount::default(),
            contents: RefCell::new(C::default()),
        }
    }
}

impl<C> Storage<C>
{
    pub fn read(&self) -> Ref<'_, C>
    {
        match self.contents.try_borrow() {
            Ok(it) => it,
            Err(_) => crate::error::fatal("shared storage read while being modified"),
        }
    }

    pub fn write(&self) -> RefMut<'_, C>
    {
        match self.contents.try_borrow_mut() {
            Ok(it) => it,
            Err(_) => crate::error::fatal("shared storage modified while borrowed"),
        }
    }
}
