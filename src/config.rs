//! Compile-time configuration.
//!
//! The original C library (`libscm`) expresses these as `#ifndef`/`#define`
//! macros (`SCM_MAX_REGIONS`, `SCM_MAX_CLOCKS`, ...) so a host application can
//! override them at build time. Rust has no preprocessor, so the same bounds
//! are expressed as `pub const` values with the original's documented
//! fallbacks, collected into `ScmConfig` for anything that needs to reason
//! about them as a value (diagnostics, tests) rather than as a type-level
//! bound.

/// Maximum extension (in ticks) a single refresh can request.
/// Larger values passed to `refresh*` are silently clamped (see
/// `check_extension` in `root.rs`).
pub const MAX_EXPIRATION_EXTENSION: u32 = 10;

/// Number of per-thread local clocks, including the base clock (index 0).
pub const MAX_CLOCKS: usize = 10;

/// Number of per-thread regions.
pub const MAX_REGIONS: usize = 10;

/// Size, in bytes, of a descriptor page (holds `DESCRIPTORS_PER_PAGE`
/// object-header pointers plus a next-pointer and a count).
pub const DESCRIPTOR_PAGE_SIZE: usize = 4096;

/// Size, in bytes, of a region page (holds a next-pointer plus bump-allocated
/// payload). Region pages are allocated page-aligned.
pub const REGION_PAGE_SIZE: usize = 4096;

/// Bound on the size of a thread's free descriptor-page pool; pages beyond
/// this are returned straight to the raw allocator instead of recycled.
pub const DESCRIPTOR_PAGE_FREELIST_SIZE: usize = 10;

/// Bound on the size of a thread's free region-page pool.
pub const REGION_PAGE_FREELIST_SIZE: usize = 10;

const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// `DESCRIPTORS_PER_PAGE = (PAGE_SIZE - 2*word) / word`, i.e. how many
/// object-header pointers fit in a descriptor page after its next-pointer
/// and count field.
pub const DESCRIPTORS_PER_PAGE: usize = (DESCRIPTOR_PAGE_SIZE - 2 * WORD_SIZE) / WORD_SIZE;

/// `L_local`: length of a locally-clocked descriptor buffer.
pub const LOCAL_BUFFER_LEN: usize = MAX_EXPIRATION_EXTENSION as usize + 1;

/// `L_global`: length of a globally-clocked descriptor buffer.
pub const GLOBAL_BUFFER_LEN: usize = MAX_EXPIRATION_EXTENSION as usize + 2;

/// Maximum payload a region page can hold (page size minus the next-pointer).
pub const REGION_PAGE_PAYLOAD_SIZE: usize = REGION_PAGE_SIZE - WORD_SIZE;

/// The index of the thread-local base clock; it can never be unregistered
/// and is always live (`age == current_time`) for a registered thread.
pub const BASE_CLOCK: u32 = 0;

/// Collection policy, selected at compile time via the `eager_collection`
/// Cargo feature (mirrors `SCM_EAGER_COLLECTION`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionPolicy {
    /// Drain one object descriptor and one region descriptor per call.
    Lazy,
    /// Drain both expired-lists completely.
    Eager,
}

impl CollectionPolicy {
    #[inline]
    pub const fn current() -> Self {
        if cfg!(feature = "eager_collection") {
            CollectionPolicy::Eager
        } else {
            CollectionPolicy::Lazy
        }
    }
}

/// A value-level view of the bounds above, for diagnostics and tests that
/// want to assert on configuration without hard-coding the constants twice.
#[derive(Debug, Clone, Copy)]
pub struct ScmConfig {
    pub max_expiration_extension: u32,
    pub max_clocks: usize,
    pub max_regions: usize,
    pub descriptor_page_size: usize,
    pub region_page_size: usize,
    pub descriptor_page_freelist_size: usize,
    pub region_page_freelist_size: usize,
    pub collection_policy: CollectionPolicy,
}

impl Default for ScmConfig {
    fn default() -> Self {
        ScmConfig {
            max_expiration_extension: MAX_EXPIRATION_EXTENSION,
            max_clocks: MAX_CLOCKS,
            max_regions: MAX_REGIONS,
            descriptor_page_size: DESCRIPTOR_PAGE_SIZE,
            region_page_size: REGION_PAGE_SIZE,
            descriptor_page_freelist_size: DESCRIPTOR_PAGE_FREELIST_SIZE,
            region_page_freelist_size: REGION_PAGE_FREELIST_SIZE,
            collection_policy: CollectionPolicy::current(),
        }
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn descriptors_per_page_fits_in_page() {
        let used = DESCRIPTORS_PER_PAGE * WORD_SIZE + 2 * WORD_SIZE;
        assert!(used <= DESCRIPTOR_PAGE_SIZE);
    }

    #[test]
    fn buffer_lengths_follow_extension() {
        assert_eq!(LOCAL_BUFFER_LEN, MAX_EXPIRATION_EXTENSION as usize + 1);
        assert_eq!(GLOBAL_BUFFER_LEN, MAX_EXPIRATION_EXTENSION as usize + 2);
    }

    #[test]
    fn default_config_matches_consts() {
        let cfg = ScmConfig::default();
        assert_eq!(cfg.max_clocks, MAX_CLOCKS);
        assert_eq!(cfg.max_regions, MAX_REGIONS);
    }
}
