//! Completion timeline of a command queue.
//!
//! Every command submitted to a queue receives the next timeline value; the
//! engine raises the signal to that value once the command has completed.
//! Waiting for value `t` therefore waits for every command submitted up to
//! and including `t`.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

/// Monotonic counter that threads can block on.
#[derive(Debug, Default)]
pub(crate) struct TimelineSignal {
    value: AtomicU64,
    /// Held by waiters between checking the value and parking.
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl TimelineSignal {
    pub(crate) fn value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Raise the signal to `value`. Lower values are ignored.
    pub(crate) fn set(&self, value: u64) {
        let _guard = self.mutex.lock();
        self.value.fetch_max(value, Ordering::AcqRel);
        self.condvar.notify_all();
    }

    /// Block until the signal reaches `target`.
    pub(crate) fn wait(&self, target: u64) {
        if self.value() >= target {
            return;
        }
        let mut guard = self.mutex.lock();
        while self.value() < target {
            self.condvar.wait(&mut guard);
        }
    }
}
