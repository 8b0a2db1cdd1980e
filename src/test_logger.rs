//! A thread-id-prefixed `log::Log` implementation, used only by tests.
//!
//! The original gates its diagnostics behind `SCM_MT_DEBUG`, which prefixes
//! every `printf` with the calling thread's id (`pthread_self()`) so
//! multithreaded runs stay readable (`scm.c`: "thread %ld BLOCKS on
//! global_time_lock", ...). This crate replaces those `printf`s with `log`
//! macros everywhere (see `root.rs`/`global.rs`), and preserves the
//! thread-prefixing behavior here as a small test-only logger rather than a
//! runtime default, since production hosts normally bring their own `log`
//! backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use log::{Level, Log, Metadata, Record};

pub struct ThreadPrefixedLogger {
    level: Level,
    lines_logged: AtomicUsize,
}

impl ThreadPrefixedLogger {
    pub const fn new(level: Level) -> Self {
        ThreadPrefixedLogger {
            level,
            lines_logged: AtomicUsize::new(0),
        }
    }

    pub fn lines_logged(&self) -> usize {
        self.lines_logged.load(Ordering::SeqCst)
    }
}

impl Log for ThreadPrefixedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.lines_logged.fetch_add(1, Ordering::SeqCst);
        eprintln!(
            "thread {:?} [{}] {}",
            thread::current().id(),
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod test_logger_tests {
    use super::*;
    use log::Log;

    #[test]
    fn respects_its_configured_level() {
        let logger = ThreadPrefixedLogger::new(Level::Warn);
        assert!(logger.enabled(&Metadata::builder().level(Level::Error).build()));
        assert!(logger.enabled(&Metadata::builder().level(Level::Warn).build()));
        assert!(!logger.enabled(&Metadata::builder().level(Level::Debug).build()));
    }

    #[test]
    fn counts_lines_actually_logged() {
        let logger = ThreadPrefixedLogger::new(Level::Trace);
        assert_eq!(logger.lines_logged(), 0);
        logger.log(
            &Record::builder()
                .args(format_args!("hello"))
                .level(Level::Info)
                .target("scm::test_logger_tests")
                .build(),
        );
        assert_eq!(logger.lines_logged(), 1);
    }
}
