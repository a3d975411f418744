use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use super::{init_logging, Tracked};
use crate::{counter::Counter, make_ref_counted, NonNullRefPtr, RefCount, RefCounted, RefPtr};

#[test]
fn adopt_copy_and_drop()
{
    let drops = Rc::new(Cell::new(0));

    let p1 = Tracked::new(5, &drops);
    assert_eq!(NonNullRefPtr::ref_count(&p1), 1);

    let p2 = p1.clone();
    assert_eq!(NonNullRefPtr::ref_count(&p2), 2);
    assert!(NonNullRefPtr::ptr_eq(&p1, &p2));

    drop(p1);
    assert_eq!(NonNullRefPtr::ref_count(&p2), 1);
    assert_eq!(drops.get(), 0);
    assert_eq!(p2.value, 5);

    drop(p2);
    assert_eq!(drops.get(), 1);
}

#[test]
fn move_destroys_exactly_once()
{
    let drops = Rc::new(Cell::new(0));

    let a = Tracked::new(1, &drops);
    let b = a;
    assert_eq!(NonNullRefPtr::ref_count(&b), 1);
    drop(b);
    assert_eq!(drops.get(), 1);

    let mut a = RefPtr::from(Tracked::new(2, &drops));
    let b = a.take();
    assert!(a.is_null());
    assert_eq!(b.ref_count(), Some(1));
    drop(a);
    assert_eq!(drops.get(), 1);
    drop(b);
    assert_eq!(drops.get(), 2);
}

#[test]
fn count_matches_live_pointers()
{
    let drops = Rc::new(Cell::new(0));
    let origin = Tracked::new(0, &drops);
    let mut live = Vec::new();

    for round in 0..200usize {
        match round % 5 {
            0 | 1 | 2 => live.push(origin.clone()),
            3 => {
                live.pop();
            }
            _ => {
                if let Some(moved) = live.pop() {
                    live.push(moved);
                }
            }
        }
        assert_eq!(NonNullRefPtr::ref_count(&origin) as usize, live.len() + 1);
    }

    live.clear();
    assert_eq!(NonNullRefPtr::ref_count(&origin), 1);
    assert_eq!(drops.get(), 0);
    drop(origin);
    assert_eq!(drops.get(), 1);
}

#[test]
fn leak_and_adopt_transfer_ownership()
{
    let drops = Rc::new(Cell::new(0));
    let p = Tracked::new(3, &drops);
    let keep = p.clone();

    let raw = NonNullRefPtr::leak_ref(p);
    assert_eq!(NonNullRefPtr::ref_count(&keep), 2);

    let back = unsafe { NonNullRefPtr::adopt(raw) };
    assert_eq!(NonNullRefPtr::ref_count(&keep), 2);
    drop(back);
    drop(keep);
    assert_eq!(drops.get(), 1);
}

#[test]
fn pointer_from_plain_reference_adds_a_count()
{
    let drops = Rc::new(Cell::new(0));
    let owner = Tracked::new(4, &drops);

    let borrowed: &Tracked = &owner;
    let copy = unsafe { NonNullRefPtr::from_ref(borrowed) };
    assert_eq!(NonNullRefPtr::ref_count(&owner), 2);
    assert!(NonNullRefPtr::ptr_eq(&copy, &owner));

    drop(owner);
    assert_eq!(drops.get(), 0);
    assert_eq!(copy.value, 4);
    drop(copy);
    assert_eq!(drops.get(), 1);
}

#[test]
fn nullable_pointer_operations()
{
    let drops = Rc::new(Cell::new(0));
    let mut a: RefPtr<Tracked> = RefPtr::null();
    assert!(a.is_null());
    assert!(a.pointer().is_none());
    assert_eq!(a.ref_count(), None);

    let mut b = RefPtr::from(Tracked::new(9, &drops));
    a.swap(&mut b);
    assert!(b.is_null());
    assert_eq!(a.value, 9);

    let c = a.clone();
    assert!(a.ptr_eq(&c));
    assert!(RefPtr::<Tracked>::null().ptr_eq(&RefPtr::null()));
    assert!(!a.ptr_eq(&b));

    a.clear();
    assert_eq!(drops.get(), 0);
    let strong = c.release_nonnull();
    assert_eq!(NonNullRefPtr::ref_count(&strong), 1);
    drop(strong);
    assert_eq!(drops.get(), 1);
}

#[test]
#[should_panic(expected = "null RefPtr")]
fn deref_of_null_is_fatal()
{
    init_logging();
    let p: RefPtr<Tracked> = RefPtr::null();
    let value = p.value;
    assert_eq!(value, 0);
}

#[test]
#[should_panic(expected = "release_nonnull")]
fn release_nonnull_of_null_is_fatal()
{
    let p: RefPtr<Tracked> = RefPtr::default();
    let _ = p.release_nonnull();
}

struct Noisy
{
    count: RefCount,
    journal: Rc<RefCell<Vec<&'static str>>>,
}

unsafe impl RefCounted for Noisy
{
    type Count = RefCount;

    fn ref_counter(&self) -> &RefCount { &self.count }

    fn will_be_destroyed(&self)
    {
        assert_eq!(self.count.count(), 0);
        self.journal.borrow_mut().push("will_be_destroyed");
    }
}

impl Drop for Noisy
{
    fn drop(&mut self) { self.journal.borrow_mut().push("drop"); }
}

impl fmt::Display for Noisy
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "noisy") }
}

#[test]
fn destruction_hook_runs_once_before_drop()
{
    let journal = Rc::new(RefCell::new(Vec::new()));
    let p = make_ref_counted(Noisy {
        count: RefCount::default(),
        journal: journal.clone(),
    });
    let q = p.clone();

    drop(p);
    assert!(journal.borrow().is_empty());
    drop(q);
    assert_eq!(*journal.borrow(), ["will_be_destroyed", "drop"]);
}

#[test]
fn pointers_format_their_target()
{
    let journal = Rc::new(RefCell::new(Vec::new()));
    let p = make_ref_counted(Noisy {
        count: RefCount::default(),
        journal,
    });

    assert_eq!(format!("{p}"), "noisy");
    assert_eq!(format!("{}", RefPtr::from(p.clone())), "noisy");
    assert_eq!(format!("{}", RefPtr::<Noisy>::null()), "null");
    assert!(format!("{p:?}").contains("count: 1"));
    assert_eq!(format!("{p:p}"), format!("{:p}", NonNullRefPtr::as_ptr(&p)));
}
