//! Per-channel shared state.

use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::TriggerGate;

/// State shared between a channel's producers and its worker.
///
/// Producers write only through [`ChannelState::trigger`]; the desired bit is
/// written while the gate is claimed, so it is never contested. The active
/// phase is written only by the worker and is read-only for everyone else.
///
/// Deferred-revert expiries bypass the gate: each carries the deadline it was
/// armed for, so the worker can tell a stale expiry from a current one.
#[derive(Debug, Default)]
pub struct ChannelState {
    gate: CachePadded<TriggerGate>,
    desired: AtomicBool,
    active: AtomicBool,
    last_activity: AtomicU64,
    expired: AtomicU64,
    counters: Counters,
}

#[derive(Debug, Default)]
struct Counters {
    admitted: AtomicU64,
    coalesced: AtomicU64,
    suppressed: AtomicU64,
    applies: AtomicU64,
    reverts: AtomicU64,
}

/// Snapshot of a channel's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Triggers that won the gate.
    pub admitted: u64,
    /// Triggers dropped because the gate was busy.
    pub coalesced: u64,
    /// Triggers dropped by a cross-channel suppression rule.
    pub suppressed: u64,
    /// Apply hook invocations.
    pub applies: u64,
    /// Revert hook invocations.
    pub reverts: u64,
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request `on`/`off` at timestamp `now`.
    ///
    /// Never blocks: returns `false` immediately if another request is
    /// already in flight. Only "on" requests count as activity.
    pub fn trigger(&self, on: bool, now: u64) -> bool {
        if !self.gate.try_acquire() {
            self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.desired.store(on, Ordering::Relaxed);
        if on {
            self.last_activity.fetch_max(now, Ordering::Relaxed);
        }
        self.counters.admitted.fetch_add(1, Ordering::Relaxed);
        self.gate.publish();
        true
    }

    /// The pending request, if one has been published.
    ///
    /// Does not reopen the gate; the worker calls [`ChannelState::release`]
    /// once it has acted on the request.
    pub fn pending(&self) -> Option<bool> {
        if self.gate.is_pending() {
            Some(self.desired.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    /// Whether a published request awaits the worker.
    pub fn has_pending(&self) -> bool {
        self.gate.is_pending()
    }

    /// Reopen the gate.
    pub fn release(&self) {
        self.gate.release();
    }

    /// Whether the gate would admit a trigger right now.
    pub fn is_gate_free(&self) -> bool {
        self.gate.is_free()
    }

    /// Last requested state.
    pub fn desired(&self) -> bool {
        self.desired.load(Ordering::Relaxed)
    }

    /// Publish the worker's phase.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Whether the channel's policy is currently applied.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Timestamp of the latest admitted "on" trigger, zero if none.
    pub fn last_activity(&self) -> u64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    /// Post the expiry of the deferred deadline `deadline` (clock nanos).
    ///
    /// Unposted expiries collapse to the latest deadline.
    pub fn post_expiry(&self, deadline: u64) {
        self.expired.fetch_max(deadline, Ordering::AcqRel);
    }

    /// Take the posted expiry, if any.
    pub fn take_expiry(&self) -> Option<u64> {
        match self.expired.swap(0, Ordering::AcqRel) {
            0 => None,
            deadline => Some(deadline),
        }
    }

    pub fn has_expiry(&self) -> bool {
        self.expired.load(Ordering::Acquire) != 0
    }

    /// Count a trigger dropped by cross-channel suppression.
    pub fn record_suppressed(&self) {
        self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_apply(&self) {
        self.counters.applies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_revert(&self) {
        self.counters.reverts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> ChannelStats {
        let c = &self.counters;
        ChannelStats {
            admitted: c.admitted.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            suppressed: c.suppressed.load(Ordering::Relaxed),
            applies: c.applies.load(Ordering::Relaxed),
            reverts: c.reverts.load(Ordering::Relaxed),
        }
    }
}
