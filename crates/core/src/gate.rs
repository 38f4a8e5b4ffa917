//! Single-flight trigger admission.
//!
//! The gate is one atomic word with three phases:
//!
//! ```text
//!   FREE ──try_acquire──▶ CLAIMED ──publish──▶ PENDING ──release──▶ FREE
//!          (producer, CAS)        (producer)             (worker)
//! ```
//!
//! Exactly one producer wins the CAS out of `FREE`; every other producer
//! sees a busy gate and returns immediately. The winner writes its request
//! while holding `CLAIMED` and publishes it with a release store, so the
//! worker's acquire load of `PENDING` observes the request. The worker hands
//! the gate back with a release store once it has consumed the request.

use std::sync::atomic::{AtomicU8, Ordering};

const FREE: u8 = 0;
const CLAIMED: u8 = 1;
const PENDING: u8 = 2;

/// Atomic admission flag for one channel.
#[derive(Debug, Default)]
pub struct TriggerGate {
    word: AtomicU8,
}

impl TriggerGate {
    pub const fn new() -> Self {
        Self {
            word: AtomicU8::new(FREE),
        }
    }

    /// Try to win the right to signal the worker.
    ///
    /// Returns `false` without side effects when the gate is busy.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.word
            .compare_exchange(FREE, CLAIMED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Hand a claimed request to the worker.
    ///
    /// Must only be called by the producer whose `try_acquire` succeeded.
    #[inline]
    pub fn publish(&self) {
        debug_assert_eq!(self.word.load(Ordering::Relaxed), CLAIMED);
        self.word.store(PENDING, Ordering::Release);
    }

    /// Whether a published request awaits the worker.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.word.load(Ordering::Acquire) == PENDING
    }

    /// Whether the gate would admit a new trigger right now.
    #[inline]
    pub fn is_free(&self) -> bool {
        self.word.load(Ordering::Acquire) == FREE
    }

    /// Reopen the gate after the worker consumed the pending request.
    #[inline]
    pub fn release(&self) {
        self.word.store(FREE, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_phases() {
        let gate = TriggerGate::new();
        assert!(gate.is_free());
        assert!(!gate.is_pending());

        assert!(gate.try_acquire());
        assert!(!gate.is_free());
        assert!(!gate.is_pending());

        gate.publish();
        assert!(gate.is_pending());

        // Busy until released
        assert!(!gate.try_acquire());

        gate.release();
        assert!(gate.is_free());
        assert!(gate.try_acquire());
    }

    #[test]
    fn test_only_one_winner_under_contention() {
        let gate = Arc::new(TriggerGate::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let gate = gate.clone();
                let winners = winners.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..100 {
                        if gate.try_acquire() {
                            winners.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::Relaxed), 1);
    }
}
