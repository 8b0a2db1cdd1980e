//! The object header prepended to every allocation.
//!
//! The original stores one word that is either a non-negative descriptor
//! counter or, with its high bit set, a region id (`HB_MASK = UINT_MAX -
//! INT_MAX`). This crate keeps that single-word wire layout (so the header
//! is still exactly two `i32`s, matching the C struct byte for byte) but
//! exposes it through `owner()`/`ObjectOwner`, an explicit two-variant sum
//! type, instead of callers re-deriving the sign check everywhere.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::util::UIntExtras;

/// `HB_MASK`: the sign bit of a 32-bit word. A tagged region id has this bit
/// set; a heap object's descriptor counter never does (it starts at 0 and
/// only ever increments/decrements, staying non-negative).
pub const HB_MASK: i32 = i32::MIN;

/// What an allocation's header word currently means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectOwner {
    /// A heap-allocated object; the header's word is its descriptor counter.
    Heap(i32),
    /// A region-allocated object; the header's word tags the region index
    /// that owns it. Freeing it individually is a misuse.
    Region(u32),
}

#[repr(C)]
pub struct ObjectHeader {
    /// `dc_or_region_id`. Atomic because both the allocating thread
    /// (refresh) and the expiring thread (which may be a different thread
    /// for globally-clocked descriptors) touch it concurrently.
    word: AtomicI32,
    /// Index into a `FinalizerRegistry`, or `-1` if the object has none.
    /// Written once at allocation time, before the pointer is published to
    /// any other thread, so it does not need to be atomic.
    pub finalizer_index: i32,
}

impl ObjectHeader {
    pub fn new_heap() -> Self {
        ObjectHeader {
            word: AtomicI32::new(0),
            finalizer_index: -1,
        }
    }

    pub fn new_region(region_id: u32) -> Self {
        ObjectHeader {
            word: AtomicI32::new((region_id as i32) | HB_MASK),
            finalizer_index: -1,
        }
    }

    pub fn owner(&self) -> ObjectOwner {
        let w = self.word.load(Ordering::Acquire);
        if w < 0 {
            ObjectOwner::Region((w as u32).clear_tag(HB_MASK as u32))
        } else {
            ObjectOwner::Heap(w)
        }
    }

    /// Raw descriptor counter, valid only for `ObjectOwner::Heap`. Regions
    /// track their own `dc` on the `Region` struct instead.
    pub fn dc(&self) -> i32 {
        self.word.load(Ordering::Acquire)
    }

    /// Atomically increments the descriptor counter, returning the prior
    /// value. Callers must have already checked `dc() != i32::MAX`. The
    /// increment itself is not checked, to keep the hot path a single RMW,
    /// matching the original.
    pub fn increment_dc(&self) -> i32 {
        self.word.fetch_add(1, Ordering::AcqRel)
    }

    /// Atomically decrements the descriptor counter, returning the prior
    /// value. The caller reclaims the object when the prior value was 1.
    pub fn decrement_dc(&self) -> i32 {
        self.word.fetch_sub(1, Ordering::AcqRel)
    }

    /// # Safety
    /// `payload` must point one `ObjectHeader` past the start of a block
    /// allocated by this crate's `alloc`/`realloc`/`calloc`.
    pub unsafe fn from_payload<'a>(payload: *mut u8) -> &'a ObjectHeader {
        &*(payload.sub(std::mem::size_of::<ObjectHeader>()) as *const ObjectHeader)
    }

    /// # Safety
    /// `header` must point to a live `ObjectHeader` immediately followed by
    /// its payload bytes.
    pub unsafe fn payload(header: *mut ObjectHeader) -> *mut u8 {
        (header as *mut u8).add(std::mem::size_of::<ObjectHeader>())
    }
}

#[cfg(test)]
mod header_tests {
    use super::*;

    #[test]
    fn heap_header_starts_at_zero_dc() {
        let h = ObjectHeader::new_heap();
        assert_eq!(h.owner(), ObjectOwner::Heap(0));
        assert_eq!(h.finalizer_index, -1);
    }

    #[test]
    fn region_header_round_trips_id() {
        for id in [0u32, 1, 7, 9] {
            let h = ObjectHeader::new_region(id);
            assert_eq!(h.owner(), ObjectOwner::Region(id));
        }
    }

    #[test]
    fn increment_and_decrement_move_counter() {
        let h = ObjectHeader::new_heap();
        assert_eq!(h.increment_dc(), 0);
        assert_eq!(h.dc(), 1);
        assert_eq!(h.increment_dc(), 1);
        assert_eq!(h.dc(), 2);
        assert_eq!(h.decrement_dc(), 2);
        assert_eq!(h.decrement_dc(), 1);
        assert_eq!(h.dc(), 0);
    }

    #[test]
    fn payload_and_header_are_inverse() {
        let mut buf = [0u8; 64];
        let header_ptr = buf.as_mut_ptr() as *mut ObjectHeader;
        unsafe {
            header_ptr.write(ObjectHeader::new_heap());
            let payload = ObjectHeader::payload(header_ptr);
            let back = ObjectHeader::from_payload(payload) as *const ObjectHeader;
            assert_eq!(back, header_ptr as *const ObjectHeader);
        }
    }
}
