//! Heap usage statistics, for diagnosing memory leaks and the like.

#[cfg(feature = "global")]
use lazy_static::lazy_static;
#[cfg(feature = "global")]
use parking_lot::Mutex;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats
{
    /// Blocks currently handed out.
    pub live_allocations: usize,

    /// Bytes currently handed out.
    pub live_bytes: usize,

    /// High-water mark of `live_bytes`.
    pub peak_bytes: usize,

    /// Successful allocations since start-up.
    pub total_allocations: usize,

    /// Requests that were refused.
    pub failed_allocations: usize,
}

impl Stats
{
    fn fits(&self, size: usize, limit: Option<usize>) -> bool
    {
        match limit {
            Some(limit) => self
                .live_bytes
                .checked_add(size)
                .map_or(false, |total| total <= limit),
            None => true,
        }
    }

    /// Hold `size` bytes for a request the host has not served yet.
    fn record_reservation(&mut self, size: usize)
    {
        self.live_allocations += 1;
        self.live_bytes += size;
    }

    /// The host served the reserved request.
    fn record_commit(&mut self)
    {
        self.total_allocations += 1;
        self.peak_bytes = self.peak_bytes.max(self.live_bytes);
    }

    fn record_deallocation(&mut self, size: usize)
    {
        crate::verify!(
            self.live_allocations > 0 && self.live_bytes >= size,
            "deallocating {size} bytes that were never allocated"
        );
        self.live_allocations -= 1;
        self.live_bytes -= size;
    }

    fn record_failure(&mut self) { self.failed_allocations += 1; }

    fn record_host_failure(&mut self, size: usize)
    {
        self.record_deallocation(size);
        self.record_failure();
    }
}

#[cfg(feature = "global")]
lazy_static! {
    static ref GLOBAL_STATS: Mutex<Stats> = Mutex::new(Stats::default());
}

/// Snapshot of the process-wide counters kept by `SystemAllocator`.
///
/// Always zero when the `global` feature is disabled.
pub fn global_stats() -> Stats
{
    #[cfg(feature = "global")]
    {
        *GLOBAL_STATS.lock()
    }
    #[cfg(not(feature = "global"))]
    {
        Stats::default()
    }
}

/// Account for `size` new bytes unless that would exceed `limit`. A
/// successful reservation is followed by `commit` or `unreserve_failed`.
#[cfg(feature = "global")]
pub(crate) fn reserve(size: usize, limit: Option<usize>) -> bool
{
    let mut stats = GLOBAL_STATS.lock();
    if stats.fits(size, limit) {
        stats.record_reservation(size);
        true
    } else {
        stats.record_failure();
        false
    }
}

#[cfg(not(feature = "global"))]
pub(crate) fn reserve(_size: usize, _limit: Option<usize>) -> bool { true }

#[cfg(feature = "global")]
pub(crate) fn commit() { GLOBAL_STATS.lock().record_commit() }

#[cfg(not(feature = "global"))]
pub(crate) fn commit() {}

#[cfg(feature = "global")]
pub(crate) fn release(size: usize) { GLOBAL_STATS.lock().record_deallocation(size) }

#[cfg(not(feature = "global"))]
pub(crate) fn release(_size: usize) {}

#[cfg(feature = "global")]
pub(crate) fn unreserve_failed(size: usize) { GLOBAL_STATS.lock().record_host_failure(size) }

#[cfg(not(feature = "global"))]
pub(crate) fn unreserve_failed(_size: usize) {}

/// Per-allocator bookkeeping for allocators that keep their own books.
#[derive(Debug, Default)]
pub(crate) struct LocalStats(std::cell::Cell<Stats>);

impl LocalStats
{
    pub(crate) fn get(&self) -> Stats { self.0.get() }

    pub(crate) fn try_reserve(&self, size: usize, limit: Option<usize>) -> bool
    {
        let mut stats = self.0.get();
        let ok = stats.fits(size, limit);
        if ok {
            stats.record_reservation(size);
        } else {
            stats.record_failure();
        }
        self.0.set(stats);
        ok
    }

    pub(crate) fn commit(&self) { self.update(Stats::record_commit) }

    pub(crate) fn unreserve_failed(&self, size: usize)
    {
        self.update(|stats| stats.record_host_failure(size))
    }

    pub(crate) fn release(&self, size: usize) { self.update(|stats| stats.record_deallocation(size)) }

    fn update(&self, f: impl FnOnce(&mut Stats))
    {
        let mut stats = self.0.get();
        f(&mut stats);
        self.0.set(stats);
    }
}
