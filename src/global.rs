//! Process-wide state shared across all registered threads.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use lazy_static::lazy_static;

use crate::concurrency::stack::ConcurrentStack;
use crate::root::DescriptorRoot;

struct TimeState {
    global_time: u64,
    number_of_threads: u64,
}

/// A terminated root, boxed up for the free-list. `DescriptorRoot` is full
/// of raw pointers (page lists, region pages, pool heads) and so is
/// `!Send`/`!Sync` on its own. The free-list only ever hands a root to one
/// thread at a time, under the stack's own mutex, so there is never a
/// moment where two threads touch the same root concurrently; that
/// single-owner handoff is exactly what `Send` promises, which is why this
/// wrapper is safe to assert even though the compiler can't derive it from
/// the raw pointers inside.
struct RootHandle(Box<DescriptorRoot>);

// Safety: a `RootHandle` only ever exists inside `terminated_roots`, guarded
// by its mutex. `push_terminated_root`/`pop_terminated_root` hand exclusive
// ownership to exactly one thread at a time; the root's raw pointers are
// never read by more than one thread at once.
unsafe impl Send for RootHandle {}

/// `global_time`, `number_of_threads`, and `ticked_threads_countdown`,
/// guarded the way the original guards them: a single `global_time_lock`
/// for `global_time`/`number_of_threads`, plus a lock-free fast path on
/// `ticked_threads_countdown` for the common per-tick decrement. The
/// terminated-root free-list gets its own lock (via `ConcurrentStack`) so
/// the original's lock hierarchy (never hold the free-list lock while
/// taking the time lock) can't be violated by construction.
pub struct GlobalState {
    time: Mutex<TimeState>,
    ticked_threads_countdown: AtomicI64,
    terminated_roots: ConcurrentStack<RootHandle>,
}

impl GlobalState {
    fn new() -> Self {
        GlobalState {
            time: Mutex::new(TimeState {
                global_time: 0,
                number_of_threads: 0,
            }),
            ticked_threads_countdown: AtomicI64::new(1),
            terminated_roots: ConcurrentStack::new(),
        }
    }

    pub fn global_time(&self) -> u64 {
        self.time.lock().unwrap().global_time
    }

    pub fn number_of_threads(&self) -> u64 {
        self.time.lock().unwrap().number_of_threads
    }

    /// Returns the `global_phase` the caller should adopt: the first thread
    /// to join an idle protocol must drive it forward itself; any later
    /// arrival is credited as already-ticked for the phase in progress and
    /// starts fresh next phase.
    pub fn resume_thread(&self) -> u64 {
        log::trace!("resume_thread: acquiring global_time_lock");
        let mut state = self.time.lock().unwrap();
        let phase = if state.number_of_threads == 0 {
            state.global_time
        } else {
            state.global_time + 1
        };
        state.number_of_threads += 1;
        phase
    }

    /// `already_ticked_this_phase` is whether the calling thread's
    /// `global_phase` differs from `global_time` (it has ticked at least
    /// once this phase). A thread that blocks without having ticked yet is
    /// credited with a phantom tick so the remaining threads are not left
    /// waiting on one that is gone.
    pub fn block_thread(&self, already_ticked_this_phase: bool) {
        log::trace!("block_thread: acquiring global_time_lock");
        let mut state = self.time.lock().unwrap();
        state.number_of_threads = state.number_of_threads.saturating_sub(1);
        if !already_ticked_this_phase
            && self.ticked_threads_countdown.fetch_sub(1, Ordering::AcqRel) == 1
        {
            state.global_time += 1;
            let reset = state.number_of_threads.max(1);
            self.ticked_threads_countdown
                .store(reset as i64, Ordering::Release);
        }
    }

    /// Lock-free fast path of `global_tick`. When this returns
    /// `true`, the caller observed the countdown hit zero and is
    /// responsible for calling `advance_global_time`.
    pub fn decrement_countdown(&self) -> bool {
        self.ticked_threads_countdown.fetch_sub(1, Ordering::AcqRel) == 1
    }

    /// Advances `global_time` and resets the countdown to
    /// `number_of_threads`; called only by the thread whose
    /// `decrement_countdown` just returned `true`.
    pub fn advance_global_time(&self) {
        let mut state = self.time.lock().unwrap();
        state.global_time += 1;
        let reset = state.number_of_threads.max(1);
        self.ticked_threads_countdown
            .store(reset as i64, Ordering::Release);
    }

    pub fn push_terminated_root(&self, root: Box<DescriptorRoot>) {
        log::trace!("push_terminated_root: acquiring terminated_roots_lock");
        self.terminated_roots.push(RootHandle(root));
    }

    pub fn pop_terminated_root(&self) -> Option<Box<DescriptorRoot>> {
        log::trace!("pop_terminated_root: acquiring terminated_roots_lock");
        self.terminated_roots.pop().map(|handle| handle.0)
    }
}

lazy_static! {
    pub static ref GLOBAL: GlobalState = GlobalState::new();
}

#[cfg(test)]
mod global_tests {
    use super::*;

    #[test]
    fn first_thread_drives_its_own_phase() {
        let g = GlobalState::new();
        let phase = g.resume_thread();
        assert_eq!(phase, 0);
        assert_eq!(g.number_of_threads(), 1);
        g.block_thread(true);
        assert_eq!(g.number_of_threads(), 0);
    }

    #[test]
    fn second_resuming_thread_waits_for_next_phase() {
        let g = GlobalState::new();
        g.resume_thread();
        let phase2 = g.resume_thread();
        assert_eq!(phase2, 1);
    }

    #[test]
    fn solo_thread_tick_advances_time_immediately() {
        let g = GlobalState::new();
        g.resume_thread();
        assert_eq!(g.global_time(), 0);
        assert!(g.decrement_countdown(), "countdown starts at 1");
        g.advance_global_time();
        assert_eq!(g.global_time(), 1);
    }

    #[test]
    fn a_late_joining_thread_is_credited_for_the_in_flight_phase() {
        let g = GlobalState::new();
        g.resume_thread(); // thread A, phase 0
        g.resume_thread(); // thread B, phase 1 (credited)
        assert!(g.decrement_countdown(), "A's tick finishes the bootstrap phase alone");
        g.advance_global_time();
        assert_eq!(g.global_time(), 1);
        // B's own phase (1) now matches global_time, so its next tick
        // participates in the real two-thread phase.
        assert!(!g.decrement_countdown(), "phase 1 needs both threads");
        assert!(g.decrement_countdown());
    }

    #[test]
    fn block_thread_credits_a_phantom_tick_when_not_yet_ticked() {
        let g = GlobalState::new();
        g.resume_thread();
        g.block_thread(false);
        assert_eq!(g.global_time(), 1);
        assert_eq!(g.number_of_threads(), 0);
    }
}
