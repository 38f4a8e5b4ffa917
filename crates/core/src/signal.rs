//! Park/wake primitive between producers and a channel worker.
//!
//! The waiter re-checks its predicate after every wake, spurious or not.
//! A wake issued between the predicate check and the park leaves a token
//! behind, so the park returns immediately and no notification is lost.

use crossbeam::sync::{Parker, Unparker};
use std::time::Instant;

/// Result of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The predicate held.
    Ready,
    /// The deadline passed with the predicate still false.
    TimedOut,
}

/// Producer side: wakes the waiter. Cheap to clone, never blocks on the
/// waiter.
#[derive(Clone)]
pub struct Signal {
    unparker: Unparker,
}

impl Signal {
    #[inline]
    pub fn notify(&self) {
        self.unparker.unpark();
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").finish_non_exhaustive()
    }
}

/// Worker side: owned by exactly one thread.
pub struct SignalWaiter {
    parker: Parker,
}

impl SignalWaiter {
    pub fn new() -> Self {
        Self {
            parker: Parker::new(),
        }
    }

    /// A producer handle waking this waiter.
    pub fn signal(&self) -> Signal {
        Signal {
            unparker: self.parker.unparker().clone(),
        }
    }

    /// Block until `ready` returns true.
    pub fn wait(&self, mut ready: impl FnMut() -> bool) {
        while !ready() {
            self.parker.park();
        }
    }

    /// Block until `ready` returns true or `deadline` passes.
    pub fn wait_until(&self, deadline: Instant, mut ready: impl FnMut() -> bool) -> WaitOutcome {
        loop {
            if ready() {
                return WaitOutcome::Ready;
            }
            if Instant::now() >= deadline {
                return WaitOutcome::TimedOut;
            }
            self.parker.park_deadline(deadline);
        }
    }
}

impl Default for SignalWaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SignalWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalWaiter").finish_non_exhaustive()
    }
}
