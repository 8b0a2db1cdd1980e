//! The descriptor root: the per-thread container tying clocks, buffers,
//! regions, and pools together.

use std::mem;
use std::ptr;
use std::sync::atomic::Ordering;

use crate::buffer::DescriptorBuffer;
use crate::config::{
    self, CollectionPolicy, BASE_CLOCK, DESCRIPTOR_PAGE_FREELIST_SIZE, GLOBAL_BUFFER_LEN,
    LOCAL_BUFFER_LEN, MAX_CLOCKS, MAX_REGIONS, REGION_PAGE_FREELIST_SIZE,
};
use crate::error::ScmError;
use crate::expire::{self, ExpiredList};
use crate::finalizer::{FinalizerRegistry, NoopFinalizerRegistry};
use crate::header::{ObjectHeader, ObjectOwner};
use crate::pages::PagePool;
use crate::raw_alloc::{RawAllocator, SystemAllocator};
use crate::region::{self, Region, RegionPagePool};

/// Per-thread container: clocks, buffers, regions, pools. Generic over the
/// raw allocator and finalizer registry collaborators so tests can supply
/// instrumented doubles (`CountingAllocator`, `RecordingFinalizerRegistry`)
/// without going through thread-local storage or real OS threads. The
/// crate-wide entry points in `lib.rs` fix both type parameters to their
/// defaults and drive a single instance per OS thread through native TLS.
pub struct DescriptorRoot<A: RawAllocator = SystemAllocator, F: FinalizerRegistry = NoopFinalizerRegistry> {
    /// This thread's view of the global clock.
    pub global_phase: u64,
    /// Incremented on each (re)registration of this root to a thread.
    pub current_time: u64,
    /// Rotates through local-clock slots `[1, MAX_CLOCKS)` for incremental
    /// zombie cleanup; never 0.
    round_robin: usize,
    /// Next slot `register_clock` starts scanning from.
    next_clock_index: usize,
    /// Next slot `create_region` starts scanning from.
    next_reg_index: usize,

    obj_expired: ExpiredList<ObjectHeader>,
    reg_expired: ExpiredList<Region>,

    global_obj_buffer: DescriptorBuffer<ObjectHeader>,
    global_reg_buffer: DescriptorBuffer<Region>,

    local_obj_buffers: Vec<DescriptorBuffer<ObjectHeader>>,
    local_reg_buffers: Vec<DescriptorBuffer<Region>>,

    obj_page_pool: PagePool<ObjectHeader>,
    reg_descriptor_pool: PagePool<Region>,

    regions: Vec<Region>,
    region_page_pool: RegionPagePool,

    allocator: A,
    finalizers: F,
}

impl<A: RawAllocator + Default, F: FinalizerRegistry + Default> DescriptorRoot<A, F> {
    /// A never-before-used root, `current_time == 0`. Its base clock and
    /// global buffers are live from construction, the same way a
    /// freshly-calloc'd root has them pre-sized; every other local clock
    /// slot stays inactive until `register_clock` picks it up.
    /// `register_thread` calls `begin_life` on this (or a recycled root)
    /// before handing it to application code.
    pub fn fresh() -> Self {
        let mut root = DescriptorRoot {
            global_phase: 0,
            current_time: 0,
            round_robin: 1,
            next_clock_index: 1,
            next_reg_index: 0,
            obj_expired: ExpiredList::empty(),
            reg_expired: ExpiredList::empty(),
            global_obj_buffer: DescriptorBuffer::unused(),
            global_reg_buffer: DescriptorBuffer::unused(),
            local_obj_buffers: (0..MAX_CLOCKS).map(|_| DescriptorBuffer::unused()).collect(),
            local_reg_buffers: (0..MAX_CLOCKS).map(|_| DescriptorBuffer::unused()).collect(),
            obj_page_pool: PagePool::new(DESCRIPTOR_PAGE_FREELIST_SIZE),
            reg_descriptor_pool: PagePool::new(DESCRIPTOR_PAGE_FREELIST_SIZE),
            regions: (0..MAX_REGIONS).map(|_| Region::empty()).collect(),
            region_page_pool: RegionPagePool::new(REGION_PAGE_FREELIST_SIZE),
            allocator: A::default(),
            finalizers: F::default(),
        };
        root.mark_base_buffers_live(0);
        root
    }
}

impl<A: RawAllocator, F: FinalizerRegistry> DescriptorRoot<A, F> {
    #[cfg(test)]
    pub fn with_collaborators(allocator: A, finalizers: F) -> Self {
        let mut root = DescriptorRoot {
            global_phase: 0,
            current_time: 0,
            round_robin: 1,
            next_clock_index: 1,
            next_reg_index: 0,
            obj_expired: ExpiredList::empty(),
            reg_expired: ExpiredList::empty(),
            global_obj_buffer: DescriptorBuffer::unused(),
            global_reg_buffer: DescriptorBuffer::unused(),
            local_obj_buffers: (0..MAX_CLOCKS).map(|_| DescriptorBuffer::unused()).collect(),
            local_reg_buffers: (0..MAX_CLOCKS).map(|_| DescriptorBuffer::unused()).collect(),
            obj_page_pool: PagePool::new(DESCRIPTOR_PAGE_FREELIST_SIZE),
            reg_descriptor_pool: PagePool::new(DESCRIPTOR_PAGE_FREELIST_SIZE),
            regions: (0..MAX_REGIONS).map(|_| Region::empty()).collect(),
            region_page_pool: RegionPagePool::new(REGION_PAGE_FREELIST_SIZE),
            allocator,
            finalizers,
        };
        root.mark_base_buffers_live(0);
        root
    }

    fn mark_base_buffers_live(&mut self, age: u64) {
        self.local_obj_buffers[BASE_CLOCK as usize].mark_live(LOCAL_BUFFER_LEN, age);
        self.local_reg_buffers[BASE_CLOCK as usize].mark_live(LOCAL_BUFFER_LEN, age);
        self.global_obj_buffer.mark_live(GLOBAL_BUFFER_LEN, age);
        self.global_reg_buffer.mark_live(GLOBAL_BUFFER_LEN, age);
    }

    /// Re-stamps this root's base clock and global buffers live at
    /// `current_time`, as `register_thread` does for a fresh or recycled
    /// root. Because the buffers are already active by construction,
    /// `mark_live` only updates their `age` here - any descriptors still
    /// queued in them from a previous life of this root (or, for a
    /// recycled root, from the thread that used it before) are kept and
    /// continue to expire on their existing schedule. Every other local
    /// clock slot keeps its old `age` and so becomes a zombie, to be
    /// drained by the round-robin scan as future ticks land. `round_robin`
    /// and `next_clock_index` are deliberately left alone here: they are
    /// only ever reset to `1` when the root itself is brand new.
    pub fn begin_life(&mut self, current_time: u64) {
        self.current_time = current_time;
        self.mark_base_buffers_live(current_time);
    }

    // ---- Allocation surface (heap-style) ----

    pub fn alloc(&self, size: usize) -> Result<*mut u8, ScmError> {
        unsafe {
            let total = size + mem::size_of::<ObjectHeader>();
            let raw = self.allocator.raw_alloc(total);
            if raw.is_null() {
                log::error!("raw_alloc failed for {} requested bytes ({} with header)", size, total);
                return Err(ScmError::AllocationFailed);
            }
            let header_ptr = raw as *mut ObjectHeader;
            header_ptr.write(ObjectHeader::new_heap());
            Ok(ObjectHeader::payload(header_ptr))
        }
    }

    pub fn calloc(&self, nelem: usize, elsize: usize) -> Result<*mut u8, ScmError> {
        let size = nelem
            .checked_mul(elsize)
            .ok_or(ScmError::AllocationFailed)?;
        let payload = self.alloc(size)?;
        unsafe {
            ptr::write_bytes(payload, 0, size);
        }
        Ok(payload)
    }

    /// # Safety
    /// `ptr`, if non-null, must be a payload pointer previously returned by
    /// `alloc`/`calloc`/`realloc` on this root's allocator and not yet freed.
    pub unsafe fn realloc(&self, ptr: *mut u8, size: usize) -> Result<*mut u8, ScmError> {
        if ptr.is_null() {
            return self.alloc(size);
        }
        let old_header_ptr = ObjectHeader::from_payload(ptr) as *const ObjectHeader as *mut u8;
        let old_usable = self
            .allocator
            .raw_usable_size(old_header_ptr)
            .saturating_sub(mem::size_of::<ObjectHeader>());
        let new_ptr = self.alloc(size)?;
        let copy_len = old_usable.min(size);
        if copy_len > 0 {
            ptr::copy_nonoverlapping(ptr, new_ptr, copy_len);
        }
        let old_header = &*(old_header_ptr as *const ObjectHeader);
        if let ObjectOwner::Heap(0) = old_header.owner() {
            self.allocator.raw_free(old_header_ptr);
        }
        // Heap(dc > 0) or Region(_): left for the expirer. The old object's
        // pending descriptors will still decrement it to zero and free it,
        // orphaned but harmless.
        Ok(new_ptr)
    }

    /// # Safety
    /// `ptr` must be a live payload pointer from this root's allocator.
    pub unsafe fn usable_size(&self, ptr: *mut u8) -> usize {
        let header_ptr = ObjectHeader::from_payload(ptr) as *const ObjectHeader as *mut u8;
        self.allocator
            .raw_usable_size(header_ptr)
            .saturating_sub(mem::size_of::<ObjectHeader>())
    }

    /// # Safety
    /// `ptr` must be a live payload pointer from this root's allocator.
    pub unsafe fn free(&self, ptr: *mut u8) {
        let header = ObjectHeader::from_payload(ptr);
        match header.owner() {
            ObjectOwner::Region(_) => {
                log::warn!("free() called on a region-allocated pointer; ignored (misuse)");
            }
            ObjectOwner::Heap(dc) => {
                if dc == 0 {
                    self.allocator
                        .raw_free(header as *const ObjectHeader as *mut u8);
                }
                // dc > 0: still referenced by pending refreshes; deferred to
                // expiration.
            }
        }
    }

    // ---- Region allocator ----

    fn validate_region(&self, region_id: i32) -> Result<usize, ScmError> {
        if region_id < 0 || region_id as usize >= self.regions.len() {
            return Err(ScmError::InvalidRegion(region_id));
        }
        Ok(region_id as usize)
    }

    /// Returns a region's pages to the pool and clears its bump state,
    /// without touching `dc`. Used by `create_region` when reclaiming a slot
    /// whose region aged out with `dc == 0` but whose pages were never
    /// walked by the expirer, because no descriptor was ever inserted for
    /// it.
    unsafe fn free_region_pages(&mut self, idx: usize) {
        let mut cursor = self.regions[idx].first_page;
        while !cursor.is_null() {
            let next = (*cursor).next;
            self.region_page_pool.give(cursor, &self.allocator);
            cursor = next;
        }
        self.regions[idx].clear_bump_state();
    }

    pub fn create_region(&mut self) -> Result<i32, ScmError> {
        let n = self.regions.len();
        for offset in 0..n {
            let idx = (self.next_reg_index + offset) % n;
            let reusable = self.regions[idx].is_reusable(self.current_time);
            if self.regions[idx].is_unused() || reusable {
                unsafe {
                    if reusable {
                        self.free_region_pages(idx);
                    }
                    self.regions[idx].age = self.current_time;
                    if !region::init_region_page(
                        &mut self.regions[idx],
                        &mut self.region_page_pool,
                        &self.allocator,
                    ) {
                        return Err(ScmError::AllocationFailed);
                    }
                }
                self.next_reg_index = (idx + 1) % n;
                return Ok(idx as i32);
            }
        }
        log::warn!("create_region: no reusable slot among {} regions", n);
        Err(ScmError::RegionContingencyExceeded)
    }

    pub fn unregister_region(&mut self, region_id: i32) -> Result<(), ScmError> {
        let idx = self.validate_region(region_id)?;
        self.regions[idx].age = self.current_time.wrapping_sub(1);
        Ok(())
    }

    pub fn alloc_in_region(&mut self, size: usize, region_id: i32) -> Result<*mut u8, ScmError> {
        let idx = self.validate_region(region_id)?;
        unsafe {
            region::alloc_in_region(
                &mut self.regions[idx],
                idx as u32,
                size,
                &mut self.region_page_pool,
                &self.allocator,
            )
        }
    }

    // ---- Clock lifecycle ----

    /// Scans `[1, MAX_CLOCKS)` for a zombie/unused slot and marks it live.
    /// Fails the process on exhaustion: clock contingency is fatal, unlike
    /// region contingency. A recycled slot's `mark_live` only re-stamps its
    /// `age`, so any descriptors it still holds from its previous occupant
    /// keep draining on their existing schedule instead of being dropped.
    pub fn register_clock(&mut self) -> usize {
        let n = self.local_obj_buffers.len();
        if n <= 1 {
            log::error!("register_clock: built with MAX_CLOCKS <= 1, no slots beyond the base clock");
            panic!("clock contingency exceeded: MAX_CLOCKS <= 1");
        }
        for offset in 0..(n - 1) {
            let idx = 1 + (self.next_clock_index - 1 + offset) % (n - 1);
            if self.local_obj_buffers[idx].age != self.current_time {
                self.local_obj_buffers[idx].mark_live(LOCAL_BUFFER_LEN, self.current_time);
                self.local_reg_buffers[idx].mark_live(LOCAL_BUFFER_LEN, self.current_time);
                self.next_clock_index = if idx + 1 >= n { 1 } else { idx + 1 };
                return idx;
            }
        }
        log::error!("register_clock: all {} clock slots are live, none to recycle", n - 1);
        panic!("clock contingency exceeded: no free clock slot");
    }

    pub fn unregister_clock(&mut self, k: usize) -> Result<(), ScmError> {
        if k == BASE_CLOCK as usize || k >= self.local_obj_buffers.len() {
            return Err(ScmError::InvalidClock(k as u32));
        }
        self.local_obj_buffers[k].age = self.current_time.wrapping_sub(1);
        self.local_reg_buffers[k].age = self.current_time.wrapping_sub(1);
        Ok(())
    }

    // ---- Refresh (object and region) ----

    /// # Safety
    /// `ptr` must be a live payload pointer from this root's allocator.
    pub unsafe fn refresh_with_clock(
        &mut self,
        ptr: *mut u8,
        ext: u32,
        k: usize,
    ) -> Result<(), ScmError> {
        let header = ObjectHeader::from_payload(ptr);
        if let ObjectOwner::Region(region_id) = header.owner() {
            return self.refresh_region_with_clock(region_id as i32, ext, k);
        }
        if k >= self.local_obj_buffers.len() {
            return Err(ScmError::InvalidClock(k as u32));
        }
        #[cfg(feature = "check_conditions")]
        {
            if !self.local_obj_buffers[k].is_active()
                || self.local_obj_buffers[k].age != self.current_time
            {
                log::error!("refresh_with_clock: clock {} is zombie or uninitialized", k);
                return Err(ScmError::ZombieClock(k as u32));
            }
        }
        if header.dc() == i32::MAX {
            log::warn!("refresh_with_clock: descriptor counter saturated at i32::MAX");
            return Err(ScmError::CounterSaturated);
        }
        let ext = ext.min(config::MAX_EXPIRATION_EXTENSION);
        header.increment_dc();
        let header_ptr = header as *const ObjectHeader as *mut ObjectHeader;
        self.local_obj_buffers[k].insert(header_ptr, ext, &mut self.obj_page_pool, &self.allocator);
        Ok(())
    }

    /// # Safety
    /// See `refresh_with_clock`.
    pub unsafe fn refresh(&mut self, ptr: *mut u8, ext: u32) -> Result<(), ScmError> {
        self.refresh_with_clock(ptr, ext, BASE_CLOCK as usize)
    }

    /// # Safety
    /// See `refresh_with_clock`. Adds `ext + 2` to give the other threads
    /// time to participate in the global phase.
    pub unsafe fn global_refresh(&mut self, ptr: *mut u8, ext: u32) -> Result<(), ScmError> {
        let header = ObjectHeader::from_payload(ptr);
        if let ObjectOwner::Region(region_id) = header.owner() {
            return self.global_refresh_region(region_id as i32, ext);
        }
        if header.dc() == i32::MAX {
            log::warn!("global_refresh: descriptor counter saturated at i32::MAX");
            return Err(ScmError::CounterSaturated);
        }
        let ext = ext.min(config::MAX_EXPIRATION_EXTENSION);
        header.increment_dc();
        let header_ptr = header as *const ObjectHeader as *mut ObjectHeader;
        self.global_obj_buffer
            .insert(header_ptr, ext + 2, &mut self.obj_page_pool, &self.allocator);
        Ok(())
    }

    pub fn refresh_region_with_clock(
        &mut self,
        region_id: i32,
        ext: u32,
        k: usize,
    ) -> Result<(), ScmError> {
        let idx = self.validate_region(region_id)?;
        if k >= self.local_reg_buffers.len() {
            return Err(ScmError::InvalidClock(k as u32));
        }
        #[cfg(feature = "check_conditions")]
        {
            if !self.local_reg_buffers[k].is_active()
                || self.local_reg_buffers[k].age != self.current_time
            {
                log::error!("refresh_region_with_clock: clock {} is zombie or uninitialized", k);
                return Err(ScmError::ZombieClock(k as u32));
            }
        }
        if self.regions[idx].dc.load(Ordering::Acquire) == i32::MAX {
            log::warn!("refresh_region_with_clock: region {} descriptor counter saturated", idx);
            return Err(ScmError::CounterSaturated);
        }
        let ext = ext.min(config::MAX_EXPIRATION_EXTENSION);
        self.regions[idx].dc.fetch_add(1, Ordering::AcqRel);
        let region_ptr = &mut self.regions[idx] as *mut Region;
        unsafe {
            self.local_reg_buffers[k].insert(
                region_ptr,
                ext,
                &mut self.reg_descriptor_pool,
                &self.allocator,
            );
        }
        Ok(())
    }

    pub fn refresh_region(&mut self, region_id: i32, ext: u32) -> Result<(), ScmError> {
        self.refresh_region_with_clock(region_id, ext, BASE_CLOCK as usize)
    }

    pub fn global_refresh_region(&mut self, region_id: i32, ext: u32) -> Result<(), ScmError> {
        let idx = self.validate_region(region_id)?;
        if self.regions[idx].dc.load(Ordering::Acquire) == i32::MAX {
            log::warn!("global_refresh_region: region {} descriptor counter saturated", idx);
            return Err(ScmError::CounterSaturated);
        }
        let ext = ext.min(config::MAX_EXPIRATION_EXTENSION);
        self.regions[idx].dc.fetch_add(1, Ordering::AcqRel);
        let region_ptr = &mut self.regions[idx] as *mut Region;
        unsafe {
            self.global_reg_buffer.insert(
                region_ptr,
                ext + 2,
                &mut self.reg_descriptor_pool,
                &self.allocator,
            );
        }
        Ok(())
    }

    // ---- Clocks and ticking ----

    fn advance_round_robin(&mut self) {
        let n = self.local_obj_buffers.len();
        self.round_robin = if self.round_robin + 1 >= n {
            1
        } else {
            self.round_robin + 1
        };
    }

    fn increment_and_expire_clock(&mut self, idx: usize) {
        self.local_obj_buffers[idx].advance_and_expire(self.obj_expired.page_list_mut());
        self.local_reg_buffers[idx].advance_and_expire(self.reg_expired.page_list_mut());
    }

    /// One step of the cooperative zombie scan. `avoid`, when set, is the slot the caller is
    /// itself ticking this call; round-robin skips past it first so a
    /// clock never cleans up the very slot it's advancing on its own.
    fn round_robin_cleanup_step(&mut self, avoid: Option<usize>) {
        if self.local_obj_buffers.len() <= 1 {
            return;
        }
        if avoid == Some(self.round_robin) {
            self.advance_round_robin();
        }
        let idx = self.round_robin;
        if self.local_obj_buffers[idx].is_zombie(self.current_time)
            && self.local_obj_buffers[idx].has_descriptors()
        {
            self.increment_and_expire_clock(idx);
        }
        self.advance_round_robin();
    }

    pub fn tick_clock(&mut self, k: usize) {
        self.local_obj_buffers[k].advance_and_expire(self.obj_expired.page_list_mut());
        self.local_reg_buffers[k].advance_and_expire(self.reg_expired.page_list_mut());
        self.round_robin_cleanup_step(Some(k));
        self.collect();
    }

    pub fn tick(&mut self) {
        self.tick_clock(BASE_CLOCK as usize);
    }

    /// `global_time` is the caller's current snapshot
    /// of `GlobalState::global_time`; `decrement_countdown` is the caller's
    /// lock-free fast path (`GlobalState::decrement_countdown`). Returns
    /// `true` when this call observed the countdown hit zero, in which case
    /// the caller must call `GlobalState::advance_global_time`. Kept out of
    /// this module so `root.rs` stays free of the process-wide lock.
    pub fn global_tick(&mut self, global_time: u64, decrement_countdown: impl FnOnce() -> bool) -> bool {
        log::trace!("global_tick: GT={} GP={}", global_time, self.global_phase);
        let mut countdown_hit_zero = false;
        if self.global_phase == global_time {
            self.global_phase += 1;
            self.global_obj_buffer
                .advance_and_expire(self.obj_expired.page_list_mut());
            self.global_reg_buffer
                .advance_and_expire(self.reg_expired.page_list_mut());
            countdown_hit_zero = decrement_countdown();
        }
        self.round_robin_cleanup_step(None);
        self.collect();
        countdown_hit_zero
    }

    pub fn collect(&mut self) {
        unsafe {
            expire::collect(
                CollectionPolicy::current(),
                &mut self.obj_expired,
                &mut self.reg_expired,
                &mut self.regions,
                &mut self.obj_page_pool,
                &mut self.reg_descriptor_pool,
                &mut self.region_page_pool,
                &self.allocator,
                &self.finalizers,
            );
        }
    }
}

#[cfg(test)]
mod root_tests {
    use super::*;
    use crate::config::MAX_EXPIRATION_EXTENSION;
    use crate::finalizer::NoopFinalizerRegistry;
    use crate::raw_alloc::CountingAllocator;

    fn root() -> DescriptorRoot<CountingAllocator, NoopFinalizerRegistry> {
        let mut root = DescriptorRoot::with_collaborators(CountingAllocator::new(), NoopFinalizerRegistry);
        root.begin_life(1);
        root
    }

    #[test]
    fn refresh_extends_object_lifetime_by_exactly_its_ticks() {
        let mut root = root();
        let p = root.alloc(64).unwrap();
        unsafe { root.refresh(p, 2).unwrap() };
        assert_eq!(root.allocator.live(), 1);
        root.tick();
        assert_eq!(root.allocator.live(), 1);
        root.tick();
        assert_eq!(root.allocator.live(), 1);
        root.tick();
        assert_eq!(root.allocator.live(), 0);
    }

    #[test]
    fn second_refresh_outlives_the_first_and_extends_from_its_own_tick() {
        let mut root = root();
        let p = root.alloc(32).unwrap();
        unsafe {
            root.refresh(p, 1).unwrap();
            root.refresh(p, 3).unwrap();
        }
        root.tick();
        assert_eq!(root.allocator.live(), 1, "still alive after first tick");
        root.tick();
        root.tick();
        assert_eq!(root.allocator.live(), 1, "still alive before the fourth tick");
        root.tick();
        assert_eq!(root.allocator.live(), 0);
    }

    #[test]
    fn region_is_immediately_reusable_after_its_refresh_expires() {
        let mut root = root();
        let r = root.create_region().unwrap();
        let _a = root.alloc_in_region(16, r).unwrap();
        let _b = root.alloc_in_region(16, r).unwrap();
        root.refresh_region(r, 0).unwrap();
        root.tick();
        assert!(root.regions[r as usize].is_unused());
        let r2 = root.create_region().unwrap();
        assert_eq!(r2, r, "the slot should be immediately reusable");
    }

    #[test]
    fn realloc_keeps_old_object_alive_until_expiry() {
        let mut root = root();
        let p = root.alloc(16).unwrap();
        unsafe { root.refresh(p, 2).unwrap() };
        let q = unsafe { root.realloc(p, 32).unwrap() };
        assert_ne!(p, q);
        assert_eq!(root.allocator.live(), 2, "old object outlives the realloc");
        root.tick();
        root.tick();
        root.tick();
        assert_eq!(root.allocator.live(), 1, "old object freed, new one remains");
    }

    #[test]
    fn clamp_law_caps_extension_at_max() {
        let mut root = root();
        let p = root.alloc(8).unwrap();
        unsafe {
            root.refresh(p, MAX_EXPIRATION_EXTENSION + 50).unwrap();
        }
        for _ in 0..MAX_EXPIRATION_EXTENSION {
            root.tick();
            assert_eq!(root.allocator.live(), 1);
        }
        root.tick();
        assert_eq!(root.allocator.live(), 0);
    }

    #[test]
    fn free_of_referenced_object_is_a_noop() {
        let mut root = root();
        let p = root.alloc(8).unwrap();
        unsafe {
            root.refresh(p, 1).unwrap();
            root.free(p);
        }
        assert_eq!(root.allocator.live(), 1, "free() deferred to expiration");
        root.tick();
        root.tick();
        assert_eq!(root.allocator.live(), 0);
    }

    #[test]
    fn invalid_region_id_is_rejected() {
        let mut root = root();
        assert_eq!(
            root.alloc_in_region(8, 99),
            Err(ScmError::InvalidRegion(99))
        );
        assert_eq!(
            root.unregister_region(-1),
            Err(ScmError::InvalidRegion(-1))
        );
    }

    #[test]
    fn register_clock_activates_slots_other_than_base() {
        let mut root = root();
        let k1 = root.register_clock();
        let k2 = root.register_clock();
        assert_ne!(k1, 0);
        assert_ne!(k2, 0);
        assert_ne!(k1, k2);
    }

    #[test]
    fn unregister_clock_rejects_base_clock() {
        let mut root = root();
        assert_eq!(
            root.unregister_clock(0),
            Err(ScmError::InvalidClock(0))
        );
    }

    #[test]
    fn refresh_on_clock_other_than_base_reclaims_on_its_own_schedule() {
        let mut root = root();
        let k = root.register_clock();
        let p = root.alloc(8).unwrap();
        unsafe { root.refresh_with_clock(p, 1, k).unwrap() };
        // ticking the base clock shouldn't affect clock k's schedule.
        root.tick();
        root.tick();
        assert_eq!(root.allocator.live(), 1);
        root.tick_clock(k);
        root.tick_clock(k);
        assert_eq!(root.allocator.live(), 0);
    }
}
