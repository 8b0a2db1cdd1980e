//! Typed errors, replacing the original's `fprintf`+`exit`/return-sentinel
//! mix (see spec ERROR HANDLING DESIGN). Recoverable conditions surface as
//! `ScmError`; conditions the original treats as fatal (clock contingency
//! exceeded, invariant breaches under `SCM_CHECK_CONDITIONS`) still panic,
//! matching its "die loudly" intent, but through `panic!` rather than
//! `exit()` so tests can assert on them with `catch_unwind`/`should_panic`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScmError {
    /// `raw_alloc` returned a null pointer.
    AllocationFailed,
    /// `create_region` scanned every region slot and found none reusable.
    RegionContingencyExceeded,
    /// `alloc_in_region` was asked for more than a region page can hold.
    SizeTooLargeForRegion { requested: usize, max: usize },
    /// A refresh would push an object's or region's descriptor counter past
    /// `i32::MAX`.
    CounterSaturated,
    /// A region id outside `[0, MAX_REGIONS)`.
    InvalidRegion(i32),
    /// A clock id outside `[0, MAX_CLOCKS)`.
    InvalidClock(u32),
    /// Refresh was attempted against a buffer whose `age` doesn't match the
    /// thread's `current_time` (a zombie or never-registered clock).
    ZombieClock(u32),
}

impl fmt::Display for ScmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ScmError::AllocationFailed => write!(f, "raw allocator returned null"),
            ScmError::RegionContingencyExceeded => {
                write!(f, "region contingency exceeded: no reusable region slot")
            }
            ScmError::SizeTooLargeForRegion { requested, max } => write!(
                f,
                "requested size {} exceeds region page payload size {}",
                requested, max
            ),
            ScmError::CounterSaturated => write!(f, "descriptor counter reached i32::MAX"),
            ScmError::InvalidRegion(id) => write!(f, "region id {} is out of range", id),
            ScmError::InvalidClock(id) => write!(f, "clock id {} is out of range", id),
            ScmError::ZombieClock(id) => write!(f, "cannot refresh against zombie clock {}", id),
        }
    }
}

impl std::error::Error for ScmError {}
