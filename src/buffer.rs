//! Descriptor buffer: a ring of page-lists indexed by expiration offset
//! from a clock's current tick.

use crate::pages::{DescriptorPageList, PagePool};
use crate::raw_alloc::RawAllocator;

/// `not_expired[0..L)` plus the bookkeeping that makes it a ring: where
/// "now" sits (`current_index`), the ring's length (`not_expired_length`,
/// `0` when the buffer is unused), and the `current_time` this buffer was
/// last (re)stamped at (`age`), used to detect zombie buffers.
pub struct DescriptorBuffer<T> {
    not_expired: Vec<DescriptorPageList<T>>,
    pub current_index: usize,
    pub not_expired_length: usize,
    pub age: u64,
}

impl<T> DescriptorBuffer<T> {
    pub fn unused() -> Self {
        DescriptorBuffer {
            not_expired: Vec::new(),
            current_index: 0,
            not_expired_length: 0,
            age: 0,
        }
    }

    /// Marks the buffer live at `age` with `length` slots. The ring is
    /// allocated only the first time a buffer is touched; a buffer that is
    /// already active keeps its current ring position and whatever
    /// descriptors it still holds untouched. This mirrors how the original
    /// only ever reassigns a buffer's `not_expired_length`/`age` fields when
    /// reusing a thread's root or a clock slot, never its queued contents -
    /// clearing them on reuse would drop live descriptors and orphan the
    /// counters they reference.
    pub fn mark_live(&mut self, length: usize, age: u64) {
        if !self.is_active() {
            self.not_expired.resize_with(length, DescriptorPageList::empty);
            self.current_index = 0;
        }
        self.not_expired_length = length;
        self.age = age;
    }

    pub fn is_active(&self) -> bool {
        self.not_expired_length != 0
    }

    /// A buffer is a zombie once the root has moved on to a new
    /// registration without this buffer being re-marked live.
    pub fn is_zombie(&self, current_time: u64) -> bool {
        self.is_active() && self.age != current_time
    }

    pub fn has_descriptors(&self) -> bool {
        self.not_expired.iter().any(|list| !list.is_empty())
    }

    fn slot_for(&self, ext: u32) -> usize {
        (self.current_index + ext as usize) % self.not_expired_length
    }

    /// Inserts `entry` at offset `ext` ticks from now.
    ///
    /// # Safety
    /// `entry` must point to a live header; `pool`/`allocator` must be the
    /// ones this buffer's owning root consistently uses.
    pub unsafe fn insert(
        &mut self,
        entry: *mut T,
        ext: u32,
        pool: &mut PagePool<T>,
        allocator: &dyn RawAllocator,
    ) -> bool {
        let slot = self.slot_for(ext);
        self.not_expired[slot].insert(entry, pool, allocator)
    }

    /// Advances the ring by one slot and splices the page-list just vacated
    /// onto `exp_list`.
    pub fn advance_and_expire(&mut self, exp_list: &mut DescriptorPageList<T>) {
        let pre = self.current_index;
        self.current_index = (self.current_index + 1) % self.not_expired_length;
        self.not_expired[pre].splice_onto(exp_list);
    }
}
