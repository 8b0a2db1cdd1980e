//! Region allocator: bump allocation into chained pages sharing one
//! collective lifetime.

use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::config::REGION_PAGE_PAYLOAD_SIZE;
use crate::config::REGION_PAGE_SIZE;
use crate::error::ScmError;
use crate::header::ObjectHeader;
use crate::raw_alloc::RawAllocator;
use crate::util::cache_align;

#[repr(C)]
pub struct RegionPage {
    pub(crate) next: *mut RegionPage,
    payload: [u8; REGION_PAGE_PAYLOAD_SIZE],
}

impl RegionPage {
    /// # Safety
    /// `allocator` must return `REGION_PAGE_SIZE` bytes, page-aligned.
    pub unsafe fn alloc(allocator: &dyn RawAllocator) -> *mut RegionPage {
        let raw = allocator.raw_alloc(REGION_PAGE_SIZE) as *mut RegionPage;
        if raw.is_null() {
            return ptr::null_mut();
        }
        (*raw).next = ptr::null_mut();
        ptr::write_bytes((*raw).payload.as_mut_ptr(), 0, REGION_PAGE_PAYLOAD_SIZE);
        raw
    }

    pub unsafe fn payload_start(page: *mut RegionPage) -> *mut u8 {
        (*page).payload.as_mut_ptr()
    }

    pub unsafe fn payload_end(page: *mut RegionPage) -> *mut u8 {
        RegionPage::payload_start(page).add(REGION_PAGE_PAYLOAD_SIZE)
    }
}

/// A per-thread, bounded free-list of region pages, the region-side twin of
/// `pages::PagePool`.
pub struct RegionPagePool {
    head: *mut RegionPage,
    len: usize,
    cap: usize,
}

impl RegionPagePool {
    pub fn new(cap: usize) -> Self {
        RegionPagePool {
            head: ptr::null_mut(),
            len: 0,
            cap,
        }
    }

    pub fn take(&mut self) -> Option<*mut RegionPage> {
        if self.head.is_null() {
            return None;
        }
        unsafe {
            let page = self.head;
            self.head = (*page).next;
            (*page).next = ptr::null_mut();
            self.len -= 1;
            Some(page)
        }
    }

    /// # Safety
    /// `page` must be a page this root owns and no longer references.
    pub unsafe fn give(&mut self, page: *mut RegionPage, allocator: &dyn RawAllocator) {
        if self.len < self.cap {
            (*page).next = self.head;
            self.head = page;
            self.len += 1;
        } else {
            allocator.raw_free(page as *mut u8);
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

/// One of `MAX_REGIONS` per-thread region slots.
pub struct Region {
    pub dc: AtomicI32,
    pub number_of_region_pages: usize,
    pub first_page: *mut RegionPage,
    pub last_page: *mut RegionPage,
    pub age: u64,
    pub next_free_address: *mut u8,
    pub last_address_in_last_page: *mut u8,
}

impl Region {
    pub fn empty() -> Self {
        Region {
            dc: AtomicI32::new(0),
            number_of_region_pages: 0,
            first_page: ptr::null_mut(),
            last_page: ptr::null_mut(),
            age: 0,
            next_free_address: ptr::null_mut(),
            last_address_in_last_page: ptr::null_mut(),
        }
    }

    /// A slot that has never held a region (`firstPage == NULL`).
    pub fn is_unused(&self) -> bool {
        self.first_page.is_null()
    }

    /// A slot whose region has fully expired (`age != current_time`,
    /// `dc == 0`) and so may be silently reused by `create_region`.
    pub fn is_reusable(&self, current_time: u64) -> bool {
        !self.is_unused() && self.age != current_time && self.dc.load(Ordering::Acquire) == 0
    }

    /// Resets bump state after the region's last object has expired
    /// (`expire_reg_descriptor_if_exists`); pages were already
    /// returned to the pool by the caller.
    pub fn clear_bump_state(&mut self) {
        self.first_page = ptr::null_mut();
        self.last_page = ptr::null_mut();
        self.number_of_region_pages = 0;
        self.next_free_address = ptr::null_mut();
        self.last_address_in_last_page = ptr::null_mut();
    }
}

/// Links a fresh region page at the tail of `region` and repositions its
/// bump pointers at the page's start.
///
/// # Safety
/// `region` must not currently be mid-allocation on another thread (regions
/// are thread-owned, like the rest of a descriptor root).
pub unsafe fn init_region_page(
    region: &mut Region,
    pool: &mut RegionPagePool,
    allocator: &dyn RawAllocator,
) -> bool {
    let page = match pool.take() {
        Some(p) => p,
        None => RegionPage::alloc(allocator),
    };
    if page.is_null() {
        return false;
    }
    if region.last_page.is_null() {
        region.first_page = page;
    } else {
        (*region.last_page).next = page;
    }
    region.last_page = page;
    region.number_of_region_pages += 1;
    region.next_free_address = RegionPage::payload_start(page);
    region.last_address_in_last_page = RegionPage::payload_end(page);
    true
}

/// Bump-allocates `size` payload bytes in `region`, writing a region-tagged
/// `ObjectHeader` ahead of it. `region_id` is the slot index, folded
/// into the header's sign-tagged word.
///
/// # Safety
/// `region` must already have at least one page (from `init_region_page`).
pub unsafe fn alloc_in_region(
    region: &mut Region,
    region_id: u32,
    size: usize,
    pool: &mut RegionPagePool,
    allocator: &dyn RawAllocator,
) -> Result<*mut u8, ScmError> {
    let need = cache_align(size + mem::size_of::<ObjectHeader>());
    let max_payload = REGION_PAGE_PAYLOAD_SIZE;
    if need > max_payload {
        return Err(ScmError::SizeTooLargeForRegion {
            requested: size,
            max: max_payload - mem::size_of::<ObjectHeader>(),
        });
    }

    let candidate = region.next_free_address;
    let advanced = candidate.add(need);
    let start = if advanced > region.last_address_in_last_page {
        if !init_region_page(region, pool, allocator) {
            return Err(ScmError::AllocationFailed);
        }
        let start = region.next_free_address;
        region.next_free_address = start.add(need);
        start
    } else {
        region.next_free_address = advanced;
        candidate
    };

    let header_ptr = start as *mut ObjectHeader;
    header_ptr.write(ObjectHeader::new_region(region_id));
    Ok(ObjectHeader::payload(header_ptr))
}

#[cfg(test)]
mod region_tests {
    use super::*;
    use crate::raw_alloc::SystemAllocator;

    #[test]
    fn init_region_page_sets_bump_pointers() {
        let mut region = Region::empty();
        let mut pool = RegionPagePool::new(4);
        unsafe {
            assert!(init_region_page(&mut region, &mut pool, &SystemAllocator));
            assert_eq!(region.number_of_region_pages, 1);
            assert!(region.next_free_address < region.last_address_in_last_page);

            // tear down
            let mut p = region.first_page;
            while !p.is_null() {
                let next = (*p).next;
                SystemAllocator.raw_free(p as *mut u8);
                p = next;
            }
        }
    }

    #[test]
    fn alloc_in_region_tags_header_and_bumps() {
        let mut region = Region::empty();
        let mut pool = RegionPagePool::new(4);
        unsafe {
            init_region_page(&mut region, &mut pool, &SystemAllocator);
            let before = region.next_free_address;
            let payload = alloc_in_region(&mut region, 3, 16, &mut pool, &SystemAllocator).unwrap();
            assert!(region.next_free_address > before);
            let header = ObjectHeader::from_payload(payload);
            match header.owner() {
                crate::header::ObjectOwner::Region(id) => assert_eq!(id, 3),
                other => panic!("expected region owner, got {:?}", other),
            }

            let mut p = region.first_page;
            while !p.is_null() {
                let next = (*p).next;
                SystemAllocator.raw_free(p as *mut u8);
                p = next;
            }
        }
    }

    #[test]
    fn oversized_request_is_rejected() {
        let mut region = Region::empty();
        let mut pool = RegionPagePool::new(4);
        unsafe {
            init_region_page(&mut region, &mut pool, &SystemAllocator);
            let result = alloc_in_region(
                &mut region,
                0,
                REGION_PAGE_PAYLOAD_SIZE,
                &mut pool,
                &SystemAllocator,
            );
            assert!(matches!(result, Err(ScmError::SizeTooLargeForRegion { .. })));

            let mut p = region.first_page;
            while !p.is_null() {
                let next = (*p).next;
                SystemAllocator.raw_free(p as *mut u8);
                p = next;
            }
        }
    }

    #[test]
    fn region_reusable_only_when_aged_out_and_empty() {
        let mut region = Region::empty();
        assert!(region.is_unused());
        assert!(!region.is_reusable(5));

        let mut pool = RegionPagePool::new(4);
        unsafe {
            init_region_page(&mut region, &mut pool, &SystemAllocator);
        }
        region.age = 5;
        assert!(!region.is_reusable(5), "same age: still this phase's region");
        region.age = 4;
        assert!(region.is_reusable(5), "aged out and dc == 0");
        region.dc.store(1, Ordering::SeqCst);
        assert!(!region.is_reusable(5), "still referenced");

        unsafe {
            let mut p = region.first_page;
            while !p.is_null() {
                let next = (*p).next;
                SystemAllocator.raw_free(p as *mut u8);
                p = next;
            }
        }
    }
}
