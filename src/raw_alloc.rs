//! The byte allocator this crate augments with time-based reclamation.
//!
//! The original redirects `malloc`/`free`/`malloc_usable_size` to its own
//! wrappers via linker `--wrap`, then calls through to the real libc
//! symbols (`__real_malloc`, ...) for the actual bytes. This crate models
//! that seam explicitly as a trait so tests can supply an instrumented
//! double instead of linker tricks.

use libc::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Out-of-scope collaborator: provides raw bytes,
/// frees them, and reports how many usable bytes a previous allocation has.
pub trait RawAllocator: Send + Sync {
    /// # Safety
    /// `size` must be nonzero; the returned pointer (if non-null) must be
    /// freed exactly once via `raw_free`.
    unsafe fn raw_alloc(&self, size: usize) -> *mut u8;

    /// # Safety
    /// `ptr` must have come from `raw_alloc` on the same allocator and must
    /// not have been freed already.
    unsafe fn raw_free(&self, ptr: *mut u8);

    /// # Safety
    /// `ptr` must have come from `raw_alloc` on the same allocator and must
    /// not have been freed yet.
    unsafe fn raw_usable_size(&self, ptr: *mut u8) -> usize;
}

/// Default collaborator: forwards to the system allocator, the user-space
/// equivalent of the original's `__real_malloc`/`__real_free`.
#[derive(Debug, Default)]
pub struct SystemAllocator;

impl RawAllocator for SystemAllocator {
    unsafe fn raw_alloc(&self, size: usize) -> *mut u8 {
        libc::malloc(size) as *mut u8
    }

    unsafe fn raw_free(&self, ptr: *mut u8) {
        libc::free(ptr as *mut c_void)
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    unsafe fn raw_usable_size(&self, ptr: *mut u8) -> usize {
        libc::malloc_usable_size(ptr as *mut c_void)
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    unsafe fn raw_usable_size(&self, _ptr: *mut u8) -> usize {
        // malloc_usable_size is a glibc/bionic extension; elsewhere we have
        // no portable way to recover it, so callers that need exact sizes
        // (usable_size, realloc's copy length) fall back to the size they
        // requested.
        0
    }
}

/// Test double that counts allocations/frees so end-to-end tests can
/// observe reclamation without peeking at freed memory.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    pub allocated: AtomicUsize,
    pub freed: AtomicUsize,
}

impl CountingAllocator {
    pub fn new() -> Self {
        CountingAllocator::default()
    }

    pub fn live(&self) -> usize {
        self.allocated.load(Ordering::SeqCst) - self.freed.load(Ordering::SeqCst)
    }
}

impl RawAllocator for CountingAllocator {
    unsafe fn raw_alloc(&self, size: usize) -> *mut u8 {
        let p = libc::malloc(size) as *mut u8;
        if !p.is_null() {
            self.allocated.fetch_add(1, Ordering::SeqCst);
        }
        p
    }

    unsafe fn raw_free(&self, ptr: *mut u8) {
        self.freed.fetch_add(1, Ordering::SeqCst);
        libc::free(ptr as *mut c_void)
    }

    unsafe fn raw_usable_size(&self, ptr: *mut u8) -> usize {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            libc::malloc_usable_size(ptr as *mut c_void)
        }
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        {
            let _ = ptr;
            0
        }
    }
}

#[cfg(test)]
mod raw_alloc_tests {
    use super::*;

    #[test]
    fn system_allocator_round_trips() {
        unsafe {
            let p = SystemAllocator.raw_alloc(64);
            assert!(!p.is_null());
            SystemAllocator.raw_free(p);
        }
    }

    #[test]
    fn counting_allocator_tracks_live() {
        let a = CountingAllocator::new();
        unsafe {
            let p1 = a.raw_alloc(16);
            let p2 = a.raw_alloc(16);
            assert_eq!(a.live(), 2);
            a.raw_free(p1);
            assert_eq!(a.live(), 1);
            a.raw_free(p2);
            assert_eq!(a.live(), 0);
        }
    }
}
