//! Expired-page lists and the expirer: drains expired descriptor pages,
//! decrements counters, reclaims objects and regions.

use std::sync::atomic::Ordering;

use crate::config::CollectionPolicy;
use crate::finalizer::FinalizerRegistry;
use crate::header::{ObjectHeader, ObjectOwner};
use crate::pages::{DescriptorPageList, PagePool};
use crate::raw_alloc::RawAllocator;
use crate::region::{Region, RegionPage, RegionPagePool};

/// `exp_list` plus `collected`: how many entries in the head page have
/// already been drained, letting expiration proceed one descriptor at a
/// time without walking the list from scratch.
pub struct ExpiredList<T> {
    pages: DescriptorPageList<T>,
    collected: usize,
}

impl<T> ExpiredList<T> {
    pub const fn empty() -> Self {
        ExpiredList {
            pages: DescriptorPageList::empty(),
            collected: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page_list_mut(&mut self) -> &mut DescriptorPageList<T> {
        &mut self.pages
    }
}

/// Drains exactly one descriptor from `list`'s head page, if any exists
/// (`expire_obj_descriptor_if_exists`). Returns whether a descriptor
/// was processed.
///
/// # Safety
/// `list` must only contain pages of live object headers; `pool`/
/// `allocator`/`finalizers` must be the ones this root consistently uses.
pub unsafe fn expire_one_object(
    list: &mut ExpiredList<ObjectHeader>,
    pool: &mut PagePool<ObjectHeader>,
    allocator: &dyn RawAllocator,
    finalizers: &dyn FinalizerRegistry,
) -> bool {
    if list.is_empty() {
        return false;
    }
    let page = list.pages.first;
    let header_ptr = (*page).descriptors[list.collected];
    let header = &*header_ptr;
    let prior = header.decrement_dc();
    if prior == 1 {
        if let ObjectOwner::Heap(_) = header.owner() {
            if header.finalizer_index >= 0 {
                finalizers.run_finalizer(header.finalizer_index);
            }
            allocator.raw_free(header_ptr as *mut u8);
        }
        // region-tagged entries reaching 0 here are orphaned realloc
        // originals; the region itself is tracked by the region expirer.
    }

    list.collected += 1;
    if list.collected == (*page).count {
        list.pages.first = (*page).next;
        if list.pages.first.is_null() {
            list.pages.last = std::ptr::null_mut();
        }
        list.collected = 0;
        pool.give(page, allocator);
    }
    true
}

/// Drains exactly one region descriptor from `list`'s head page
/// (`expire_reg_descriptor_if_exists`).
///
/// # Safety
/// `list` must only contain pages of live region slots belonging to
/// `regions`; `pool`/`region_pool`/`allocator` must be the ones this root
/// consistently uses.
pub unsafe fn expire_one_region(
    list: &mut ExpiredList<Region>,
    regions: &mut [Region],
    pool: &mut PagePool<Region>,
    region_pool: &mut RegionPagePool,
    allocator: &dyn RawAllocator,
) -> bool {
    if list.is_empty() {
        return false;
    }
    let page = list.pages.first;
    let region_ptr = (*page).descriptors[list.collected];
    let region_index = regions
        .iter()
        .position(|r| r as *const Region == region_ptr as *const Region)
        .expect("region descriptor must point into this root's region array");
    let region = &mut regions[region_index];
    let prior = region.dc.fetch_sub(1, Ordering::AcqRel);
    if prior == 1 {
        let mut page_cursor: *mut RegionPage = region.first_page;
        while !page_cursor.is_null() {
            let next = (*page_cursor).next;
            region_pool.give(page_cursor, allocator);
            page_cursor = next;
        }
        region.clear_bump_state();
    }

    list.collected += 1;
    if list.collected == (*page).count {
        list.pages.first = (*page).next;
        if list.pages.first.is_null() {
            list.pages.last = std::ptr::null_mut();
        }
        list.collected = 0;
        pool.give(page, allocator);
    }
    true
}

/// Runs one full collection pass over both expired-lists, per the active
/// `CollectionPolicy`: lazy drains one object and one region descriptor;
/// eager drains both lists to empty.
///
/// # Safety
/// See `expire_one_object`/`expire_one_region`.
#[allow(clippy::too_many_arguments)]
pub unsafe fn collect(
    policy: CollectionPolicy,
    obj_list: &mut ExpiredList<ObjectHeader>,
    reg_list: &mut ExpiredList<Region>,
    regions: &mut [Region],
    obj_pool: &mut PagePool<ObjectHeader>,
    reg_descriptor_pool: &mut PagePool<Region>,
    region_page_pool: &mut RegionPagePool,
    allocator: &dyn RawAllocator,
    finalizers: &dyn FinalizerRegistry,
) {
    match policy {
        CollectionPolicy::Lazy => {
            expire_one_object(obj_list, obj_pool, allocator, finalizers);
            expire_one_region(reg_list, regions, reg_descriptor_pool, region_page_pool, allocator);
        }
        CollectionPolicy::Eager => {
            while expire_one_object(obj_list, obj_pool, allocator, finalizers) {}
            while expire_one_region(reg_list, regions, reg_descriptor_pool, region_page_pool, allocator)
            {}
        }
    }
}
