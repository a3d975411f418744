//! Host allocator abstraction.
//!
//! Containers and reference-counted objects get their memory through the
//! [`Allocator`] trait so that an exhausted heap surfaces as
//! [`Error::OutOfMemory`] instead of aborting inside `std::alloc`.

use std::{alloc::Layout, ptr::NonNull};

use crate::{
    config::{RuntimeConfig, SCRUB_BYTE},
    error::{Error, ErrorOr},
    stats::{self, LocalStats, Stats},
};

pub trait Allocator
{
    /// Allocate a block for `layout`. `layout` must not be zero-sized.
    fn allocate(&self, layout: Layout) -> ErrorOr<NonNull<u8>>;

    /// Return a block obtained from `allocate` on this allocator.
    ///
    /// # Safety
    /// `ptr` must come from `self.allocate(layout)` with the same `layout`
    /// and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

impl<A: Allocator + ?Sized> Allocator for &A
{
    fn allocate(&self, layout: Layout) -> ErrorOr<NonNull<u8>> { (**self).allocate(layout) }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout)
    {
        (**self).deallocate(ptr, layout)
    }
}

/// The process heap, subject to [`RuntimeConfig::heap_limit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator
{
    fn allocate(&self, layout: Layout) -> ErrorOr<NonNull<u8>>
    {
        crate::verify!(layout.size() != 0, "zero-sized allocation request");
        let size = layout.size();

        if !stats::reserve(size, RuntimeConfig::global().heap_limit) {
            log::trace!("allocation of {size} bytes refused by heap limit");
            return Err(Error::OutOfMemory { size });
        }

        match NonNull::new(unsafe { std::alloc::alloc(layout) }) {
            Some(ptr) => {
                stats::commit();
                log::trace!("allocated {size} bytes at {ptr:p}");
                Ok(ptr)
            }
            None => {
                stats::unreserve_failed(size);
                log::trace!("host allocator failed to provide {size} bytes");
                Err(Error::OutOfMemory { size })
            }
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout)
    {
        if RuntimeConfig::global().scrub_freed {
            ptr.as_ptr().write_bytes(SCRUB_BYTE, layout.size());
        }
        log::trace!("freeing {} bytes at {ptr:p}", layout.size());
        std::alloc::dealloc(ptr.as_ptr(), layout);
        stats::release(layout.size());
    }
}

/// An allocator that refuses requests once `limit` live bytes are out.
///
/// Lets a caller cap one container's footprint without touching the global
/// configuration, and makes out-of-memory paths reproducible.
#[derive(Debug)]
pub struct Budget
{
    limit: usize,
    stats: LocalStats,
}

impl Budget
{
    pub fn new(limit: usize) -> Self
    {
        Self {
            limit,
            stats: LocalStats::default(),
        }
    }

    pub fn limit(&self) -> usize { self.limit }

    pub fn stats(&self) -> Stats { self.stats.get() }

    pub fn remaining(&self) -> usize { self.limit - self.stats.get().live_bytes }
}

impl Allocator for Budget
{
    fn allocate(&self, layout: Layout) -> ErrorOr<NonNull<u8>>
    {
        if !self.stats.try_reserve(layout.size(), Some(self.limit)) {
            return Err(Error::OutOfMemory {
                size: layout.size(),
            });
        }
        match SystemAllocator.allocate(layout) {
            Ok(ptr) => {
                self.stats.commit();
                Ok(ptr)
            }
            Err(err) => {
                self.stats.unreserve_failed(layout.size());
                Err(err)
            }
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout)
    {
        SystemAllocator.deallocate(ptr, layout);
        self.stats.release(layout.size());
    }
}

/// Allocate room for `capacity` values of `T`.
///
/// Zero-sized requests never reach the allocator and yield a dangling pointer.
pub(crate) fn allocate_array<T, A: Allocator>(alloc: &A, capacity: usize) -> ErrorOr<NonNull<T>>
{
    let layout = array_layout::<T>(capacity)?;
    if layout.size() == 0 {
        return Ok(NonNull::dangling());
    }
    Ok(alloc.allocate(layout)?.cast())
}

/// # Safety
/// `ptr` must come from `allocate_array::<T>(alloc, capacity)` and hold no
/// live values.
pub(crate) unsafe fn free_array<T, A: Allocator>(alloc: &A, ptr: NonNull<T>, capacity: usize)
{
    let layout = match array_layout::<T>(capacity) {
        Ok(layout) => layout,
        Err(_) => crate::error::fatal(&format!(
            "freeing a buffer of {capacity} elements that could never have been allocated"
        )),
    };
    if layout.size() != 0 {
        alloc.deallocate(ptr.cast(), layout)
    }
}

fn array_layout<T>(capacity: usize) -> ErrorOr<Layout>
{
    Layout::array::<T>(capacity).map_err(|_| Error::Overflow {
        what: "buffer size",
    })
}

/// Move `value` into a fresh allocation on the system heap.
pub(crate) fn allocate_value<T>(value: T) -> ErrorOr<NonNull<T>>
{
    let ptr = allocate_array::<T, _>(&SystemAllocator, 1)?;
    unsafe { ptr.as_ptr().write(value) };
    Ok(ptr)
}

/// Drop the value behind `ptr` and release its memory.
///
/// # Safety
/// `ptr` must come from `allocate_value` and must not be used afterwards.
pub(crate) unsafe fn free_value<T>(ptr: NonNull<T>)
{
    std::ptr::drop_in_place(ptr.as_ptr());
    free_array(&SystemAllocator, ptr, 1);
}
