use std::{cell::Cell, rc::Rc};

use super::Tracked;
use crate::{Array, Error, NonNullRefPtr, Vector};

#[test]
fn slice_is_clamped_to_storage()
{
    let array: Array<i32> = (1..=3).collect();

    let slice = array.slice(0, 10);
    assert_eq!(slice.size(), 3);
    assert_eq!(*slice.at(2), 3);

    assert_eq!(array.slice(1, 10).size(), 2);
    assert_eq!(array.slice(1, 1).size(), 1);
    assert_eq!(array.slice(3, 5).size(), 0);
    assert!(Array::<i32>::new().slice(0, 4).is_empty());
}

#[test]
fn slice_sees_later_changes()
{
    let mut array: Array<i32> = (0..4).collect();
    let slice = array.slice(2, 2);
    assert_eq!(format!("{slice:?}"), "[2, 3]");

    *slice.at_mut(0) = 20;
    assert_eq!(*array.at(2), 20);

    array.resize(3);
    assert_eq!(slice.size(), 1);
}

#[test]
fn copies_share_storage()
{
    let mut a = Array::new();
    let b = a.clone();
    assert!(!a.shares_storage(&b));

    a.push(1);
    let mut c = a.clone();
    c.push(2);
    assert!(a.shares_storage(&c));
    assert_eq!(a.size(), 2);
    assert_eq!(*a.at(1), 2);
    assert!(b.is_empty());
}

#[test]
fn storage_lives_while_any_handle_does()
{
    let drops = Rc::new(Cell::new(0));
    let object = Tracked::new(1, &drops);

    let mut array = Array::new();
    array.push(object.clone());
    let iterator = array.iterator();
    let slice = array.slice(0, 1);
    drop(array);

    assert_eq!(NonNullRefPtr::ref_count(&object), 2);
    drop(iterator);
    assert_eq!(slice.at(0).value, 1);
    drop(slice);
    assert_eq!(NonNullRefPtr::ref_count(&object), 1);
}

#[test]
fn filled_push_values_and_sizes()
{
    let mut array = Array::filled(3, 7u8).unwrap();
    assert_eq!(array.size(), 3);
    assert!(array.capacity() >= 3);

    array.push_values(&[1, 2]).unwrap();
    assert!(array.contains(&2));
    assert!(!array.contains(&9));

    array.try_add_size(2).unwrap();
    assert_eq!(array.with_data(|d| d.to_vec()), [7, 7, 7, 1, 2, 0, 0]);

    array.try_add_capacity(10).unwrap();
    assert!(array.capacity() >= 17);

    assert_eq!(array.pop(), Some(0));
    assert_eq!(array.size(), 6);
    assert_eq!(Array::<u8>::new().pop(), None);
    assert!(!Array::<u8>::new().contains(&0));
}

#[test]
fn iterator_yields_copies_in_order()
{
    let mut array = Array::from((0..3).collect::<Vector<_>>());
    let mut it = array.iterator();
    assert_eq!(it.next(), Some(0));

    array.push(3);
    assert_eq!(it.collect::<Vec<_>>(), [1, 2, 3]);
    assert_eq!(Array::<i32>::new().iterator().next(), None);
}

#[test]
fn with_data_sorts_in_place()
{
    let array: Array<i32> = [5, 3, 9, 1].into_iter().collect();
    array.with_data(|d| d.sort());
    assert_eq!(format!("{array}"), "[1, 3, 5, 9]");
    assert_eq!(array, [1, 3, 5, 9].into_iter().collect::<Array<_>>());
}

#[test]
#[should_panic(expected = "modified while borrowed")]
fn mutating_while_borrowed_is_fatal()
{
    let array: Array<i32> = (0..3).collect();
    let mut alias = array.clone();
    let first = array.at(0);
    alias.push(*first);
}

#[test]
fn failed_add_size_leaves_the_array_untouched()
{
    let mut array: Array<u64> = (0..3).collect();
    let capacity = array.capacity();

    assert!(matches!(array.try_add_size(1 << 58), Err(Error::OutOfMemory { .. })));
    assert_eq!((array.size(), array.capacity()), (3, capacity));
    assert_eq!(array.with_data(|d| d.to_vec()), [0, 1, 2]);

    assert!(matches!(array.try_add_size(usize::MAX), Err(Error::Overflow { .. })));
    assert_eq!(array.size(), 3);
}

#[test]
#[should_panic(expected = "past the end of an array of size 0")]
fn slicing_past_an_unallocated_array_is_fatal()
{
    let array: Array<i32> = Array::new();
    array.slice(5, 1);
}

#[test]
#[should_panic(expected = "empty array")]
fn indexing_an_empty_array_is_fatal()
{
    let array: Array<i32> = Array::new();
    let first = *array.at(0);
    assert_eq!(first, 0);
}
