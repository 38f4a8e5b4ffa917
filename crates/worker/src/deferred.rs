//! Cancellable one-shot deferred revert.
//!
//! A single armed deadline lives in an atomic word (zero = disarmed). Arming
//! swaps in the new deadline, so a re-arm before expiry replaces the pending
//! task; the timer thread only fires if it can CAS the exact deadline it
//! slept on back to zero. That gives at most one firing per arm and never
//! fires a replaced deadline.
//!
//! A re-arm can still land between the CAS and `on_expire`, so the callback
//! gets the deadline that fired and the receiver decides whether it is stale.

use dynstune_core::{MonotonicClock, Signal, SignalWaiter, WaitOutcome};
use dynstune_types::{ClusterTopology, SchedHint};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace};

use crate::sched::apply_sched_hint;
use crate::WorkerError;

struct Shared {
    clock: MonotonicClock,
    deadline: AtomicU64,
    stop: AtomicBool,
    signal: Signal,
}

/// Handle to a deferred revert timer thread.
///
/// Dropping the handle stops and joins the thread.
pub struct DeferredRevert {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl DeferredRevert {
    /// Start the timer thread. `on_expire` runs on that thread with the
    /// deadline each time an armed deadline passes without being replaced or
    /// cancelled.
    pub fn spawn<F>(
        name: String,
        hint: SchedHint,
        topology: ClusterTopology,
        clock: MonotonicClock,
        on_expire: F,
    ) -> Result<Self, WorkerError>
    where
        F: Fn(Instant) + Send + 'static,
    {
        let waiter = SignalWaiter::new();
        let shared = Arc::new(Shared {
            clock,
            deadline: AtomicU64::new(0),
            stop: AtomicBool::new(false),
            signal: waiter.signal(),
        });

        let thread_shared = shared.clone();
        let thread_name = name.clone();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                apply_sched_hint(hint, &topology, &thread_name);
                run(&thread_shared, &waiter, on_expire);
            })
            .map_err(|source| WorkerError::Spawn { name, source })?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Fire `after` from now, replacing any pending deadline.
    pub fn arm(&self, after: Duration) {
        self.arm_at(Instant::now() + after);
    }

    /// Fire at `deadline`, replacing any pending deadline.
    pub fn arm_at(&self, deadline: Instant) {
        let nanos = self.shared.clock.nanos_at(deadline);
        self.shared.deadline.store(nanos, Ordering::Release);
        self.shared.signal.notify();
    }

    /// Drop the pending deadline, if any.
    pub fn cancel(&self) {
        if self.shared.deadline.swap(0, Ordering::AcqRel) != 0 {
            self.shared.signal.notify();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.shared.deadline.load(Ordering::Acquire) != 0
    }

    /// Stop and join the timer thread. A pending deadline is discarded.
    pub fn shutdown(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.signal.notify();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Deferred revert thread panicked");
            }
        }
    }
}

impl Drop for DeferredRevert {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: &Shared, waiter: &SignalWaiter, on_expire: impl Fn(Instant)) {
    let stopped = || shared.stop.load(Ordering::Acquire);

    loop {
        waiter.wait(|| stopped() || shared.deadline.load(Ordering::Acquire) != 0);
        if stopped() {
            break;
        }

        let armed = shared.deadline.load(Ordering::Acquire);
        if armed == 0 {
            continue;
        }

        let at = shared.clock.instant_at(armed);
        let outcome = waiter.wait_until(at, || {
            stopped() || shared.deadline.load(Ordering::Acquire) != armed
        });

        match outcome {
            // Stopped, re-armed or cancelled: re-evaluate from the top
            WaitOutcome::Ready => trace!("Deferred revert rescheduled"),
            WaitOutcome::TimedOut => {
                if shared
                    .deadline
                    .compare_exchange(armed, 0, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    debug!("Deferred revert fired");
                    on_expire(at);
                }
            }
        }
    }
}
