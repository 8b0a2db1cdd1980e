//! A short-term memory allocator: augments a conventional heap allocator
//! with time-based, deferred reclamation. Application code allocates
//! objects, then *refreshes* them to declare "this object must live at
//! least N more ticks of some clock"; an object with no live refresh is
//! reclaimed at the next tick. This module wires the per-thread
//! `DescriptorRoot` (root.rs) into native thread-local storage and exposes
//! the public surface.

use std::cell::RefCell;

pub mod buffer;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod expire;
pub mod finalizer;
pub mod global;
pub mod header;
pub mod pages;
pub mod raw_alloc;
pub mod region;
pub mod root;
pub mod util;

pub mod c_interface;

#[cfg(test)]
mod test_logger;

pub use config::ScmConfig;
pub use error::ScmError;
pub use finalizer::FinalizerRegistry;
pub use raw_alloc::RawAllocator;

use finalizer::NoopFinalizerRegistry;
use raw_alloc::SystemAllocator;
use root::DescriptorRoot;

/// The concrete root type every `scm_*`/public-function entry point drives:
/// the system allocator plus a no-op finalizer registry. Tests that want an
/// instrumented allocator construct a `DescriptorRoot` directly instead of
/// going through thread-local storage (see `root.rs`'s `root_tests`).
pub type SharedRoot = DescriptorRoot<SystemAllocator, NoopFinalizerRegistry>;

thread_local! {
    static ROOT: RefCell<Option<Box<SharedRoot>>> = RefCell::new(None);
}

fn with_root<T>(f: impl FnOnce(&mut SharedRoot) -> T) -> T {
    ROOT.with(|cell| {
        let mut slot = cell.borrow_mut();
        let root = slot
            .as_mut()
            .expect("thread not registered: call register_thread() first");
        f(root)
    })
}

// ---- Thread lifecycle ----

/// Joins the calling thread to the allocator: recycles a terminated root if
/// one is free, otherwise allocates a fresh one, stamps its base clock and
/// global buffers alive, and joins the global clock protocol.
pub fn register_thread() {
    ROOT.with(|cell| {
        let mut root = global::GLOBAL
            .pop_terminated_root()
            .unwrap_or_else(|| Box::new(SharedRoot::fresh()));
        let new_time = root.current_time.wrapping_add(1);
        root.begin_life(new_time);
        root.global_phase = global::GLOBAL.resume_thread();
        *cell.borrow_mut() = Some(root);
    });
}

/// Leaves the allocator: blocks (so the global phase can't stall waiting on
/// a thread that's gone), then hands the root to the terminated-root
/// free-list for a future `register_thread` to recycle.
pub fn unregister_thread() {
    block_thread();
    ROOT.with(|cell| {
        if let Some(root) = cell.borrow_mut().take() {
            global::GLOBAL.push_terminated_root(root);
        }
    });
}

pub fn block_thread() {
    with_root(|root| {
        let already_ticked = root.global_phase != global::GLOBAL.global_time();
        global::GLOBAL.block_thread(already_ticked);
    });
}

pub fn resume_thread() {
    with_root(|root| {
        root.global_phase = global::GLOBAL.resume_thread();
    });
}

// ---- Allocation surface (heap-style) ----

pub fn alloc(size: usize) -> Result<*mut u8, ScmError> {
    with_root(|root| root.alloc(size))
}

pub fn calloc(nelem: usize, elsize: usize) -> Result<*mut u8, ScmError> {
    with_root(|root| root.calloc(nelem, elsize))
}

/// # Safety
/// `ptr`, if non-null, must be a live payload pointer previously returned by
/// `alloc`/`calloc`/`realloc` on the calling thread's registered root.
pub unsafe fn realloc(ptr: *mut u8, size: usize) -> Result<*mut u8, ScmError> {
    with_root(|root| root.realloc(ptr, size))
}

/// # Safety
/// `ptr` must be a live payload pointer from the calling thread's registered root.
pub unsafe fn free(ptr: *mut u8) {
    with_root(|root| root.free(ptr))
}

/// # Safety
/// `ptr` must be a live payload pointer from the calling thread's registered root.
pub unsafe fn usable_size(ptr: *mut u8) -> usize {
    with_root(|root| root.usable_size(ptr))
}

// ---- Region allocator ----

pub fn create_region() -> Result<i32, ScmError> {
    with_root(|root| root.create_region())
}

pub fn unregister_region(region_id: i32) -> Result<(), ScmError> {
    with_root(|root| root.unregister_region(region_id))
}

pub fn alloc_in_region(size: usize, region_id: i32) -> Result<*mut u8, ScmError> {
    with_root(|root| root.alloc_in_region(size, region_id))
}

// ---- Clock lifecycle ----

pub fn register_clock() -> usize {
    with_root(|root| root.register_clock())
}

pub fn unregister_clock(clock_id: usize) -> Result<(), ScmError> {
    with_root(|root| root.unregister_clock(clock_id))
}

// ---- Refresh ----

/// # Safety
/// See `refresh_with_clock`.
pub unsafe fn refresh(ptr: *mut u8, ext: u32) -> Result<(), ScmError> {
    with_root(|root| root.refresh(ptr, ext))
}

/// # Safety
/// `ptr` must be a live payload pointer from the calling thread's registered root.
pub unsafe fn refresh_with_clock(ptr: *mut u8, ext: u32, clock_id: usize) -> Result<(), ScmError> {
    with_root(|root| root.refresh_with_clock(ptr, ext, clock_id))
}

/// # Safety
/// See `refresh_with_clock`.
pub unsafe fn global_refresh(ptr: *mut u8, ext: u32) -> Result<(), ScmError> {
    with_root(|root| root.global_refresh(ptr, ext))
}

pub fn refresh_region(region_id: i32, ext: u32) -> Result<(), ScmError> {
    with_root(|root| root.refresh_region(region_id, ext))
}

pub fn refresh_region_with_clock(region_id: i32, ext: u32, clock_id: usize) -> Result<(), ScmError> {
    with_root(|root| root.refresh_region_with_clock(region_id, ext, clock_id))
}

pub fn global_refresh_region(region_id: i32, ext: u32) -> Result<(), ScmError> {
    with_root(|root| root.global_refresh_region(region_id, ext))
}

// ---- Clocks and ticking ----

pub fn tick() {
    with_root(|root| root.tick())
}

pub fn tick_clock(clock_id: usize) {
    with_root(|root| root.tick_clock(clock_id))
}

pub fn global_tick() {
    with_root(|root| {
        let global_time = global::GLOBAL.global_time();
        let hit_zero = root.global_tick(global_time, || global::GLOBAL.decrement_countdown());
        if hit_zero {
            global::GLOBAL.advance_global_time();
        }
    });
}

pub fn collect() {
    with_root(|root| root.collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    // These exercise the thread-local entry points end to end, one OS
    // thread at a time so root state stays simple to reason about; the
    // concurrent global-phase scenarios live in `global.rs`'s own tests and
    // the multi-root unit tests in `root.rs`.

    #[test]
    fn register_then_alloc_then_unregister_round_trips() {
        register_thread();
        let p = alloc(32).unwrap();
        unsafe {
            refresh(p, 0).unwrap();
        }
        tick();
        unregister_thread();
    }

    #[test]
    fn region_round_trip_through_public_surface() {
        register_thread();
        let r = create_region().unwrap();
        let _p = alloc_in_region(16, r).unwrap();
        refresh_region(r, 0).unwrap();
        tick();
        unregister_thread();
    }

    #[test]
    #[should_panic(expected = "thread not registered")]
    fn using_the_api_before_registering_panics() {
        // Each #[test] in Rust runs on its own OS thread, so this thread's
        // TLS slot is guaranteed empty here.
        let _ = alloc(8);
    }
}
