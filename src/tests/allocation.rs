use std::{alloc::Layout, collections::HashMap};

use crate::{
    allocator::Allocator, must, Budget, Error, ErrorOr, RuntimeConfig, Stats, SystemAllocator,
};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String>
{
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn config_defaults_when_unset()
{
    assert_eq!(RuntimeConfig::from_lookup(lookup(&[])), Ok(RuntimeConfig::default()));
    assert_eq!(RuntimeConfig::default().heap_limit, None);
    assert!(!RuntimeConfig::default().scrub_freed);
}

#[test]
fn config_parses_values()
{
    let config = RuntimeConfig::from_lookup(lookup(&[
        ("BOOTSTRAP_HEAP_LIMIT", " 4096 "),
        ("BOOTSTRAP_SCRUB_FREED", "Yes"),
    ]))
    .unwrap();
    assert_eq!(config.heap_limit, Some(4096));
    assert!(config.scrub_freed);

    let config = RuntimeConfig::from_lookup(lookup(&[("BOOTSTRAP_SCRUB_FREED", "off")])).unwrap();
    assert!(!config.scrub_freed);
}

#[test]
fn config_rejects_garbage()
{
    assert_eq!(
        RuntimeConfig::from_lookup(lookup(&[("BOOTSTRAP_HEAP_LIMIT", "lots")])),
        Err(Error::InvalidConfiguration {
            key: "BOOTSTRAP_HEAP_LIMIT",
            value: "lots".to_string(),
        })
    );
    assert!(matches!(
        RuntimeConfig::from_lookup(lookup(&[("BOOTSTRAP_SCRUB_FREED", "maybe")])),
        Err(Error::InvalidConfiguration { key: "BOOTSTRAP_SCRUB_FREED", .. })
    ));
}

#[test]
fn budget_tracks_its_blocks()
{
    let budget = Budget::new(100);
    let layout = Layout::from_size_align(40, 8).unwrap();

    let a = budget.allocate(layout).unwrap();
    let b = budget.allocate(layout).unwrap();
    assert_eq!(budget.remaining(), 20);
    assert_eq!(budget.allocate(layout), Err(Error::OutOfMemory { size: 40 }));

    let stats = budget.stats();
    assert_eq!(stats.live_allocations, 2);
    assert_eq!(stats.peak_bytes, 80);
    assert_eq!(stats.total_allocations, 2);
    assert_eq!(stats.failed_allocations, 1);

    unsafe {
        budget.deallocate(a, layout);
        budget.deallocate(b, layout);
    }
    assert_eq!(budget.stats().live_bytes, 0);
    assert_eq!(budget.stats().peak_bytes, 80);
}

#[test]
fn host_refusal_is_booked_as_a_failure()
{
    let budget = Budget::new(usize::MAX);
    let layout = Layout::from_size_align(1 << 62, 8).unwrap();

    assert_eq!(budget.allocate(layout), Err(Error::OutOfMemory { size: 1 << 62 }));
    assert_eq!(
        budget.stats(),
        Stats {
            failed_allocations: 1,
            ..Stats::default()
        }
    );
    assert_eq!(budget.remaining(), usize::MAX);

    #[cfg(feature = "global")]
    assert!(crate::global_stats().peak_bytes < 1 << 62);
}

#[test]
fn system_allocator_round_trip()
{
    let layout = Layout::array::<u32>(16).unwrap();
    let block = SystemAllocator.allocate(layout).unwrap().cast::<u32>();
    unsafe {
        for i in 0..16 {
            block.as_ptr().add(i).write(i as u32);
        }
        assert_eq!(block.as_ptr().add(15).read(), 15);
        SystemAllocator.deallocate(block.cast(), layout);
    }
}

#[test]
#[should_panic(expected = "could never have been allocated")]
fn freeing_an_impossible_capacity_is_fatal()
{
    let buffer = std::ptr::NonNull::<u64>::dangling();
    unsafe { crate::allocator::free_array(&SystemAllocator, buffer, usize::MAX) };
}

#[cfg(feature = "global")]
#[test]
fn global_stats_count_system_allocations()
{
    let before = crate::global_stats();
    let v: crate::Vector<u64> = crate::Vector::with_capacity(32);
    let during = crate::global_stats();
    assert!(during.total_allocations > before.total_allocations);
    assert!(during.peak_bytes >= 32 * 8);
    drop(v);
}

#[cfg(not(feature = "global"))]
#[test]
fn heap_limit_is_not_consulted_per_allocation()
{
    assert!(crate::stats::reserve(1 << 20, Some(0)));
    crate::stats::commit();
    assert_eq!(crate::global_stats(), Stats::default());
}

#[test]
fn errors_describe_themselves()
{
    assert_eq!(
        Error::OutOfMemory { size: 72 }.to_string(),
        "out of memory allocating 72 bytes"
    );
    assert_eq!(
        Error::Overflow { what: "vector size" }.to_string(),
        "arithmetic overflow computing vector size"
    );
    assert_eq!(
        Error::InvalidArgument("index").to_string(),
        "invalid argument: index"
    );
}

fn fails() -> ErrorOr<u32> { Err(Error::InvalidArgument("nope")) }

fn forwards() -> ErrorOr<u32> { Ok(fails()? + 1) }

#[test]
fn errors_propagate_with_question_mark()
{
    assert_eq!(forwards(), Err(Error::InvalidArgument("nope")));
    assert_eq!(must!(Ok::<u32, Error>(3)), 3);
}

#[test]
#[should_panic(expected = "MUST(fails()) failed: invalid argument: nope")]
fn must_turns_errors_fatal()
{
    must!(fails());
}
