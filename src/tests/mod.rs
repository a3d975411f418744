use std::{cell::Cell, rc::Rc};

use crate::{NonNullRefPtr, RefCount};

mod allocation;
mod array;
mod pointers;

pub(crate) fn init_logging() { let _ = env_logger::builder().is_test(true).try_init(); }

/// Bumps a shared counter when dropped.
pub(crate) struct DropIncrementer(pub Rc<Cell<usize>>);

impl Drop for DropIncrementer
{
    fn drop(&mut self) { self.0.set(self.0.get() + 1); }
}

/// A reference-counted object that reports its own destruction.
pub(crate) struct Tracked
{
    count: RefCount,
    pub value: i32,
    _drops: DropIncrementer,
}

crate::ref_counted!(Tracked, count: RefCount);

impl Tracked
{
    pub fn new(value: i32, drops: &Rc<Cell<usize>>) -> NonNullRefPtr<Tracked>
    {
        NonNullRefPtr::new(Tracked {
            count: RefCount::default(),
            value,
            _drops: DropIncrementer(drops.clone()),
        })
    }
}

#[test]
fn user_story()
{
    init_logging();
    let drops = Rc::new(Cell::new(0));

    let parsed = Tracked::new(1, &drops);
    let mut ast = crate::Vector::new();
    for _ in 0..16 {
        ast.push(parsed.clone());
    }
    assert_eq!(NonNullRefPtr::ref_count(&parsed), 17);

    let shared = crate::Array::from(ast);
    let alias = shared.clone();
    assert!(alias.shares_storage(&shared));
    assert_eq!(alias.size(), 16);

    drop(shared);
    assert_eq!(NonNullRefPtr::ref_count(&parsed), 17);
    drop(alias);
    assert_eq!(NonNullRefPtr::ref_count(&parsed), 1);

    drop(parsed);
    assert_eq!(drops.get(), 1);
}
