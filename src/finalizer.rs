//! The finalizer registry: an out-of-scope collaborator (`run_finalizer`,
//! declared in the original's `threads.h`) invoked when an object's
//! descriptor counter reaches zero and its `finalizer_index >= 0`.
//!
//! Finalizers run in expiration order, which is enqueue order (FIFO) by
//! construction: descriptor pages are appended at the tail of a buffer slot
//! and drained from the head of the expired list.

use std::sync::Mutex;

pub trait FinalizerRegistry: Send + Sync {
    /// Called with the `finalizer_index` stashed in an object's header when
    /// its descriptor counter reaches zero. Never called for negative
    /// indices (no finalizer registered).
    fn run_finalizer(&self, finalizer_index: i32);
}

/// Default registry: finalizers are opt-in, so most objects never have one.
#[derive(Debug, Default)]
pub struct NoopFinalizerRegistry;

impl FinalizerRegistry for NoopFinalizerRegistry {
    fn run_finalizer(&self, _finalizer_index: i32) {}
}

/// Test double recording invocation order, used to verify the FIFO
/// finalizer-ordering law.
#[derive(Debug, Default)]
pub struct RecordingFinalizerRegistry {
    invocations: Mutex<Vec<i32>>,
}

impl RecordingFinalizerRegistry {
    pub fn new() -> Self {
        RecordingFinalizerRegistry::default()
    }

    pub fn invocations(&self) -> Vec<i32> {
        self.invocations.lock().unwrap().clone()
    }
}

impl FinalizerRegistry for RecordingFinalizerRegistry {
    fn run_finalizer(&self, finalizer_index: i32) {
        self.invocations.lock().unwrap().push(finalizer_index);
    }
}

#[cfg(test)]
mod finalizer_tests {
    use super::*;

    #[test]
    fn recording_registry_preserves_order() {
        let reg = RecordingFinalizerRegistry::new();
        reg.run_finalizer(3);
        reg.run_finalizer(1);
        reg.run_finalizer(2);
        assert_eq!(reg.invocations(), vec![3, 1, 2]);
    }

    #[test]
    fn noop_registry_does_nothing() {
        // exists purely so the default path has a concrete, testable type
        NoopFinalizerRegistry.run_finalizer(0);
    }
}
