//! C ABI surface: `#[no_mangle] extern "C" fn scm_*` re-exports of the safe
//! Rust API in `lib.rs`, for embedding into a C host. Names mirror the
//! original's `scm_*` entry points where they overlap with this crate's
//! scope (`scm_malloc`, `scm_free`, `scm_tick`, `scm_refresh`, …).
//!
//! These functions never panic across the FFI boundary for recoverable
//! errors; `Result::Err` collapses to a null pointer or a sentinel
//! int, matching the original's C-side error signaling. The
//! process-fatal cases (clock contingency exceeded) still abort the
//! process, exactly as the original's `exit(-1)` did.

use libc::{c_int, c_void, size_t};

use crate as scm;

#[no_mangle]
pub extern "C" fn scm_register_thread() {
    scm::register_thread();
}

#[no_mangle]
pub extern "C" fn scm_unregister_thread() {
    scm::unregister_thread();
}

#[no_mangle]
pub extern "C" fn scm_block_thread() {
    scm::block_thread();
}

#[no_mangle]
pub extern "C" fn scm_resume_thread() {
    scm::resume_thread();
}

#[no_mangle]
pub extern "C" fn scm_malloc(size: size_t) -> *mut c_void {
    match scm::alloc(size) {
        Ok(ptr) => ptr as *mut c_void,
        Err(_) => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub extern "C" fn scm_calloc(nelem: size_t, elsize: size_t) -> *mut c_void {
    match scm::calloc(nelem, elsize) {
        Ok(ptr) => ptr as *mut c_void,
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
/// `ptr`, if non-null, must have come from `scm_malloc`/`scm_calloc`/`scm_realloc`
/// on the calling thread and not have been freed already.
#[no_mangle]
pub unsafe extern "C" fn scm_realloc(ptr: *mut c_void, size: size_t) -> *mut c_void {
    match scm::realloc(ptr as *mut u8, size) {
        Ok(p) => p as *mut c_void,
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
/// `ptr` must have come from this crate's allocation surface on the calling thread.
#[no_mangle]
pub unsafe extern "C" fn scm_free(ptr: *mut c_void) {
    if !ptr.is_null() {
        scm::free(ptr as *mut u8);
    }
}

/// # Safety
/// `ptr` must have come from this crate's allocation surface on the calling thread.
#[no_mangle]
pub unsafe extern "C" fn scm_usable_size(ptr: *mut c_void) -> size_t {
    if ptr.is_null() {
        return 0;
    }
    scm::usable_size(ptr as *mut u8)
}

#[no_mangle]
pub extern "C" fn scm_create_region() -> c_int {
    scm::create_region().unwrap_or(-1)
}

#[no_mangle]
pub extern "C" fn scm_unregister_region(region_id: c_int) {
    let _ = scm::unregister_region(region_id);
}

#[no_mangle]
pub extern "C" fn scm_alloc_in_region(size: size_t, region_id: c_int) -> *mut c_void {
    match scm::alloc_in_region(size, region_id) {
        Ok(ptr) => ptr as *mut c_void,
        Err(_) => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub extern "C" fn scm_register_clock() -> size_t {
    scm::register_clock()
}

#[no_mangle]
pub extern "C" fn scm_unregister_clock(clock_id: size_t) {
    let _ = scm::unregister_clock(clock_id);
}

#[no_mangle]
pub extern "C" fn scm_tick() {
    scm::tick();
}

#[no_mangle]
pub extern "C" fn scm_tick_clock(clock_id: size_t) {
    scm::tick_clock(clock_id);
}

#[no_mangle]
pub extern "C" fn scm_global_tick() {
    scm::global_tick();
}

#[no_mangle]
pub extern "C" fn scm_collect() {
    scm::collect();
}

/// # Safety
/// `ptr` must have come from this crate's allocation surface on the calling thread.
#[no_mangle]
pub unsafe extern "C" fn scm_refresh(ptr: *mut c_void, ext: u32) -> c_int {
    scm::refresh(ptr as *mut u8, ext).is_ok() as c_int
}

/// # Safety
/// `ptr` must have come from this crate's allocation surface on the calling thread.
#[no_mangle]
pub unsafe extern "C" fn scm_refresh_with_clock(
    ptr: *mut c_void,
    ext: u32,
    clock_id: size_t,
) -> c_int {
    scm::refresh_with_clock(ptr as *mut u8, ext, clock_id).is_ok() as c_int
}

/// # Safety
/// `ptr` must have come from this crate's allocation surface on the calling thread.
#[no_mangle]
pub unsafe extern "C" fn scm_global_refresh(ptr: *mut c_void, ext: u32) -> c_int {
    scm::global_refresh(ptr as *mut u8, ext).is_ok() as c_int
}

#[no_mangle]
pub extern "C" fn scm_refresh_region(region_id: c_int, ext: u32) -> c_int {
    scm::refresh_region(region_id, ext).is_ok() as c_int
}

#[no_mangle]
pub extern "C" fn scm_refresh_region_with_clock(region_id: c_int, ext: u32, clock_id: size_t) -> c_int {
    scm::refresh_region_with_clock(region_id, ext, clock_id).is_ok() as c_int
}

#[no_mangle]
pub extern "C" fn scm_global_refresh_region(region_id: c_int, ext: u32) -> c_int {
    scm::global_refresh_region(region_id, ext).is_ok() as c_int
}
