//! Allocation accounting behind the `MEM` command.
//!
//! [`CountingAlloc`] wraps the system allocator and maintains process-wide
//! counters: live bytes, peak live bytes, cumulative allocated bytes, and
//! allocation/free call counts. The binary installs it as the global
//! allocator; the counters read as zero when it is not installed.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

static LIVE: AtomicU64 = AtomicU64::new(0);
static PEAK: AtomicU64 = AtomicU64::new(0);
static TOTAL: AtomicU64 = AtomicU64::new(0);
static ALLOC_COUNT: AtomicU64 = AtomicU64::new(0);
static FREE_COUNT: AtomicU64 = AtomicU64::new(0);

/// System-allocator wrapper that feeds the `MEM` counters.
pub struct CountingAlloc;

fn on_alloc(size: u64) {
    let live = LIVE.fetch_add(size, Ordering::Relaxed) + size;
    PEAK.fetch_max(live, Ordering::Relaxed);
    TOTAL.fetch_add(size, Ordering::Relaxed);
    ALLOC_COUNT.fetch_add(1, Ordering::Relaxed);
}

fn on_free(size: u64) {
    LIVE.fetch_sub(size, Ordering::Relaxed);
    FREE_COUNT.fetch_add(1, Ordering::Relaxed);
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            on_alloc(layout.size() as u64);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        on_free(layout.size() as u64);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            on_free(layout.size() as u64);
            on_alloc(new_size as u64);
        }
        new_ptr
    }
}

/// Bytes currently allocated.
pub fn live() -> u64 {
    LIVE.load(Ordering::Relaxed)
}

/// High-water mark of live bytes.
pub fn peak() -> u64 {
    PEAK.load(Ordering::Relaxed)
}

/// Cumulative bytes allocated since start (or last reset).
pub fn total() -> u64 {
    TOTAL.load(Ordering::Relaxed)
}

/// Number of allocation calls.
pub fn alloc_count() -> u64 {
    ALLOC_COUNT.load(Ordering::Relaxed)
}

/// Number of free calls.
pub fn free_count() -> u64 {
    FREE_COUNT.load(Ordering::Relaxed)
}

/// Resets the peak to the current live count.
pub fn reset_peak() {
    PEAK.store(LIVE.load(Ordering::Relaxed), Ordering::Relaxed);
}

/// Resets the cumulative byte counter.
pub fn reset_total() {
    TOTAL.store(0, Ordering::Relaxed);
}

/// Resets the allocation and free call counters.
pub fn reset_count() {
    ALLOC_COUNT.store(0, Ordering::Relaxed);
    FREE_COUNT.store(0, Ordering::Relaxed);
}
