//! Descriptor pages: fixed-size arrays of pointers sharing one expiration
//! slot.
//!
//! `DescriptorPage<T>` is generic over what it holds a pointer to:
//! `ObjectHeader` for the object-side buffers, `Region` for the region-side
//! ones, mirroring how the original reuses one `descriptor_page_t` layout
//! for both by storing untyped pointers.

use std::ptr;

use crate::config::{DESCRIPTORS_PER_PAGE, DESCRIPTOR_PAGE_SIZE};
use crate::raw_alloc::RawAllocator;

#[repr(C)]
pub struct DescriptorPage<T> {
    pub(crate) next: *mut DescriptorPage<T>,
    pub count: usize,
    pub descriptors: [*mut T; DESCRIPTORS_PER_PAGE],
}

impl<T> DescriptorPage<T> {
    /// Allocates and zero-initializes a fresh page through `allocator`.
    /// Returns null if the allocator is out of memory.
    ///
    /// # Safety
    /// `allocator` must return `DESCRIPTOR_PAGE_SIZE` bytes, word-aligned.
    pub unsafe fn alloc(allocator: &dyn RawAllocator) -> *mut DescriptorPage<T> {
        let raw = allocator.raw_alloc(DESCRIPTOR_PAGE_SIZE) as *mut DescriptorPage<T>;
        if raw.is_null() {
            return ptr::null_mut();
        }
        (*raw).next = ptr::null_mut();
        (*raw).count = 0;
        for slot in (*raw).descriptors.iter_mut() {
            *slot = ptr::null_mut();
        }
        raw
    }

    pub fn is_full(&self) -> bool {
        self.count == DESCRIPTORS_PER_PAGE
    }
}

/// A singly-linked list of descriptor pages all expiring at the same slot.
pub struct DescriptorPageList<T> {
    pub first: *mut DescriptorPage<T>,
    pub last: *mut DescriptorPage<T>,
}

impl<T> DescriptorPageList<T> {
    pub const fn empty() -> Self {
        DescriptorPageList {
            first: ptr::null_mut(),
            last: ptr::null_mut(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_null()
    }

    /// Appends `entry` to the tail page, allocating or recycling a page
    /// first if the tail is full or the list is empty.
    ///
    /// # Safety
    /// All pages already linked into `self` must be valid, and `pool`/
    /// `allocator` must be the ones this root consistently uses.
    pub unsafe fn insert(
        &mut self,
        entry: *mut T,
        pool: &mut PagePool<T>,
        allocator: &dyn RawAllocator,
    ) -> bool {
        let need_new_page = self.last.is_null() || (*self.last).is_full();
        if need_new_page {
            let page = pool.take().unwrap_or_else(|| DescriptorPage::alloc(allocator));
            if page.is_null() {
                return false;
            }
            if self.last.is_null() {
                self.first = page;
            } else {
                (*self.last).next = page;
            }
            self.last = page;
        }
        let page = &mut *self.last;
        page.descriptors[page.count] = entry;
        page.count += 1;
        true
    }

    /// Moves this whole list onto the tail of `other`, leaving `self` empty.
    pub fn splice_onto(&mut self, other: &mut DescriptorPageList<T>) {
        if self.is_empty() {
            return;
        }
        unsafe {
            if other.last.is_null() {
                other.first = self.first;
            } else {
                (*other.last).next = self.first;
            }
        }
        other.last = self.last;
        self.first = ptr::null_mut();
        self.last = ptr::null_mut();
    }
}

/// A per-thread, bounded free-list of descriptor pages, recycled via a
/// per-thread free-list of bounded size. Exclusively owned by the
/// descriptor root; never touched by another thread.
pub struct PagePool<T> {
    head: *mut DescriptorPage<T>,
    len: usize,
    cap: usize,
}

impl<T> PagePool<T> {
    pub fn new(cap: usize) -> Self {
        PagePool {
            head: ptr::null_mut(),
            len: 0,
            cap,
        }
    }

    pub fn take(&mut self) -> Option<*mut DescriptorPage<T>> {
        if self.head.is_null() {
            return None;
        }
        unsafe {
            let page = self.head;
            self.head = (*page).next;
            (*page).next = ptr::null_mut();
            (*page).count = 0;
            self.len -= 1;
            Some(page)
        }
    }

    /// Returns a drained page to the pool, or back to the raw allocator if
    /// the pool is already at capacity.
    ///
    /// # Safety
    /// `page` must be a page this root owns and no longer references.
    pub unsafe fn give(&mut self, page: *mut DescriptorPage<T>, allocator: &dyn RawAllocator) {
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

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod pages_tests {
    use super::*;
    use crate::raw_alloc::SystemAllocator;

    #[test]
    fn fresh_page_is_empty() {
        unsafe {
            let page = DescriptorPage::<u8>::alloc(&SystemAllocator);
            assert!(!page.is_null());
            assert_eq!((*page).count, 0);
            assert!(!(*page).is_full());
            SystemAllocator.raw_free(page as *mut u8);
        }
    }

    #[test]
    fn insert_fills_and_rolls_pages() {
        unsafe {
            let mut list = DescriptorPageList::<u8>::empty();
            let mut pool = PagePool::<u8>::new(4);
            let mut dummy: u8 = 0;
            for _ in 0..(DESCRIPTORS_PER_PAGE + 2) {
                assert!(list.insert(&mut dummy as *mut u8, &mut pool, &SystemAllocator));
            }
            assert!(!(*list.first).next.is_null(), "should have rolled to a second page");
            assert_eq!((*list.first).count, DESCRIPTORS_PER_PAGE);
            assert_eq!((*list.last).count, 2);

            // tear down
            let mut p = list.first;
            while !p.is_null() {
                let next = (*p).next;
                SystemAllocator.raw_free(p as *mut u8);
                p = next;
            }
        }
    }

    #[test]
    fn pool_recycles_up_to_capacity() {
        unsafe {
            let mut pool = PagePool::<u8>::new(1);
            let p1 = DescriptorPage::<u8>::alloc(&SystemAllocator);
            let p2 = DescriptorPage::<u8>::alloc(&SystemAllocator);
            pool.give(p1, &SystemAllocator);
            assert_eq!(pool.len(), 1);
            pool.give(p2, &SystemAllocator); // pool full, goes straight back to allocator
            assert_eq!(pool.len(), 1);
            let taken = pool.take().unwrap();
            assert!(pool.is_empty());
            SystemAllocator.raw_free(taken as *mut u8);
        }
    }

    #[test]
    fn splice_moves_pages_and_empties_source() {
        unsafe {
            let mut a = DescriptorPageList::<u8>::empty();
            let mut b = DescriptorPageList::<u8>::empty();
            let mut pool = PagePool::<u8>::new(4);
            let mut dummy: u8 = 0;
            a.insert(&mut dummy as *mut u8, &mut pool, &SystemAllocator);
            b.insert(&mut dummy as *mut u8, &mut pool, &SystemAllocator);

            let a_first = a.first;
            a.splice_onto(&mut b);
            assert!(a.is_empty());
            assert_eq!((*b.last).next, ptr::null_mut());
            // walk from b.first to confirm a's page is now reachable
            let mut cur = b.first;
            let mut found = false;
            while !cur.is_null() {
                if cur == a_first {
                    found = true;
                }
                cur = (*cur).next;
            }
            assert!(found);

            let mut p = b.first;
            while !p.is_null() {
                let next = (*p).next;
                SystemAllocator.raw_free(p as *mut u8);
                p = next;
            }
        }
    }
}
