//! Channel state machine.
//!
//! The machine is synchronous and deterministic: it never sleeps, never calls
//! the policy hook and never touches the gate. The worker thread feeds it
//! inputs and performs the returned [`Action`]s in order.
//!
//! In deferred mode the machine remembers the deadline it last armed. An
//! expiry for an earlier deadline raced with a re-arm and is ignored.
//!
//! ```text
//!            request(on)                 request(on): re-arm
//!   ┌──────┐ ───────────▶ ┌───────────────┐ ◀──────┐
//!   │ Idle │   Apply      │ ActiveHolding │ ───────┘
//!   └──────┘ ◀─────────── └───────────────┘
//!       │ hold or deferred expiry │
//!       │   request(off): Revert  │
//!       └──────── stop ───────────┴──────▶ Stopping
//! ```

use dynstune_types::{ChannelConfig, ChannelId, HoldPolicy, RevertMode};
use std::time::{Duration, Instant};
use tracing::trace;

/// Worker phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Policy reverted; waiting for a trigger.
    Idle,
    /// Policy applied. `deadline` is the revert time when the worker itself
    /// holds the timeout, `None` when a deferred task owns it.
    ActiveHolding { deadline: Option<Instant> },
    /// Stop observed; the worker exits after executing the final actions.
    Stopping,
}

/// Side effects requested by the machine, executed in order by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Call the hook with `enable = true`.
    Apply,
    /// Call the hook with `enable = false`.
    Revert,
    /// (Re)schedule the deferred revert for `deadline`.
    ArmDeferred { deadline: Instant },
    /// Drop any scheduled deferred revert.
    CancelDeferred,
    /// Keep the gate closed until `until` (or until stop is requested).
    Clearance { until: Instant },
    /// Reopen the gate.
    ReleaseGate,
}

/// Debounce state machine for one channel.
#[derive(Debug)]
pub struct ChannelMachine {
    id: ChannelId,
    hold: Duration,
    hold_policy: HoldPolicy,
    revert_mode: RevertMode,
    revert_on_stop: bool,
    phase: WorkerPhase,
    armed: Option<Instant>,
}

impl ChannelMachine {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            id: config.id,
            hold: config.hold,
            hold_policy: config.hold_policy,
            revert_mode: config.revert_mode,
            revert_on_stop: config.revert_on_stop,
            phase: WorkerPhase::Idle,
            armed: None,
        }
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, WorkerPhase::ActiveHolding { .. })
    }

    pub fn is_stopping(&self) -> bool {
        self.phase == WorkerPhase::Stopping
    }

    /// Revert deadline held by the worker, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            WorkerPhase::ActiveHolding { deadline } => deadline,
            _ => None,
        }
    }

    /// A published gate request was observed.
    ///
    /// `admitted_at` is the time the request won the gate; the hold window is
    /// measured from it.
    pub fn on_request(&mut self, on: bool, admitted_at: Instant) -> Vec<Action> {
        if self.is_stopping() {
            return vec![];
        }
        if on {
            self.on_activity(admitted_at)
        } else {
            self.on_release()
        }
    }

    fn on_activity(&mut self, admitted_at: Instant) -> Vec<Action> {
        let mut actions = Vec::with_capacity(4);

        if !self.is_active() {
            actions.push(Action::Apply);
        } else {
            trace!(channel = %self.id, "Hold re-armed");
        }

        let deadline = admitted_at + self.hold;
        let held_deadline = match self.revert_mode {
            RevertMode::WorkerHold => Some(deadline),
            RevertMode::Deferred => {
                actions.push(Action::ArmDeferred { deadline });
                self.armed = Some(deadline);
                None
            }
        };
        self.phase = WorkerPhase::ActiveHolding {
            deadline: held_deadline,
        };

        if self.hold_policy == HoldPolicy::Clearance {
            actions.push(Action::Clearance {
                until: admitted_at + self.hold / 2,
            });
        }
        actions.push(Action::ReleaseGate);
        actions
    }

    fn on_release(&mut self) -> Vec<Action> {
        let mut actions = Vec::with_capacity(3);
        if self.is_active() {
            if self.revert_mode == RevertMode::Deferred {
                actions.push(Action::CancelDeferred);
            }
            actions.push(Action::Revert);
            self.phase = WorkerPhase::Idle;
            self.armed = None;
        }
        actions.push(Action::ReleaseGate);
        actions
    }

    /// The worker's bounded wait timed out at `now`.
    pub fn on_hold_expired(&mut self, now: Instant) -> Vec<Action> {
        match self.phase {
            WorkerPhase::ActiveHolding {
                deadline: Some(deadline),
            } if now >= deadline => {
                self.phase = WorkerPhase::Idle;
                vec![Action::Revert]
            }
            _ => vec![],
        }
    }

    /// The deferred revert armed for `deadline` fired.
    ///
    /// Reverts only if `deadline` is not older than the deadline armed last;
    /// anything else lost a race with a re-arm or a revert.
    pub fn on_deferred_expired(&mut self, deadline: Instant) -> Vec<Action> {
        match (self.phase, self.armed) {
            (WorkerPhase::ActiveHolding { deadline: None }, Some(armed)) if deadline >= armed => {
                self.phase = WorkerPhase::Idle;
                self.armed = None;
                vec![Action::Revert]
            }
            _ => {
                trace!(channel = %self.id, "Stale deferred revert ignored");
                vec![]
            }
        }
    }

    /// Stop was requested.
    pub fn on_stop(&mut self) -> Vec<Action> {
        let mut actions = Vec::with_capacity(2);
        if self.revert_mode == RevertMode::Deferred {
            actions.push(Action::CancelDeferred);
        }
        if self.is_active() && self.revert_on_stop {
            actions.push(Action::Revert);
        }
        self.phase = WorkerPhase::Stopping;
        self.armed = None;
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLD: Duration = Duration::from_millis(100);

    fn machine(policy: HoldPolicy, mode: RevertMode) -> ChannelMachine {
        ChannelMachine::new(
            &ChannelConfig::new(ChannelId::Boost)
                .with_hold(HOLD)
                .with_hold_policy(policy)
                .with_revert_mode(mode),
        )
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_first_trigger_applies_once() {
        let t0 = Instant::now();
        let mut m = machine(HoldPolicy::Reset, RevertMode::WorkerHold);

        assert_eq!(
            m.on_request(true, t0),
            vec![Action::Apply, Action::ReleaseGate]
        );
        assert_eq!(m.deadline(), Some(t0 + HOLD));

        // Already active: no second apply
        assert_eq!(m.on_request(true, t0 + ms(10)), vec![Action::ReleaseGate]);
    }

    #[test]
    fn test_retrigger_resets_deadline() {
        let t0 = Instant::now();
        let mut m = machine(HoldPolicy::Reset, RevertMode::WorkerHold);

        m.on_request(true, t0);
        m.on_request(true, t0 + ms(60));
        assert_eq!(m.deadline(), Some(t0 + ms(160)));

        // The first deadline no longer reverts
        assert!(m.on_hold_expired(t0 + ms(100)).is_empty());
        assert!(m.is_active());

        assert_eq!(m.on_hold_expired(t0 + ms(160)), vec![Action::Revert]);
        assert_eq!(m.phase(), WorkerPhase::Idle);
    }

    #[test]
    fn test_alternation_over_cycles() {
        let t0 = Instant::now();
        let mut m = machine(HoldPolicy::Reset, RevertMode::WorkerHold);
        let mut edges = Vec::new();

        for cycle in 0..5u64 {
            let start = t0 + ms(cycle * 1000);
            for burst in 0..10 {
                edges.extend(m.on_request(true, start + ms(burst)));
            }
            edges.extend(m.on_hold_expired(start + ms(500)));
        }

        let hooks: Vec<_> = edges
            .into_iter()
            .filter(|a| matches!(a, Action::Apply | Action::Revert))
            .collect();
        assert_eq!(hooks.len(), 10);
        for pair in hooks.chunks(2) {
            assert_eq!(pair, [Action::Apply, Action::Revert]);
        }
    }

    #[test]
    fn test_off_request_reverts_only_when_active() {
        let t0 = Instant::now();
        let mut m = machine(HoldPolicy::Reset, RevertMode::WorkerHold);

        assert_eq!(m.on_request(false, t0), vec![Action::ReleaseGate]);

        m.on_request(true, t0);
        assert_eq!(
            m.on_request(false, t0 + ms(5)),
            vec![Action::Revert, Action::ReleaseGate]
        );
        assert_eq!(m.phase(), WorkerPhase::Idle);
    }

    #[test]
    fn test_clearance_keeps_gate_closed_for_half_hold() {
        let t0 = Instant::now();
        let mut m = machine(HoldPolicy::Clearance, RevertMode::WorkerHold);

        assert_eq!(
            m.on_request(true, t0),
            vec![
                Action::Apply,
                Action::Clearance { until: t0 + ms(50) },
                Action::ReleaseGate,
            ]
        );
        assert_eq!(m.deadline(), Some(t0 + HOLD));
    }

    #[test]
    fn test_deferred_mode_arms_instead_of_holding() {
        let t0 = Instant::now();
        let mut m = machine(HoldPolicy::Reset, RevertMode::Deferred);

        assert_eq!(
            m.on_request(true, t0),
            vec![
                Action::Apply,
                Action::ArmDeferred {
                    deadline: t0 + HOLD
                },
                Action::ReleaseGate,
            ]
        );
        assert!(m.is_active());
        assert_eq!(m.deadline(), None);

        // The worker never times out on its own in deferred mode
        assert!(m.on_hold_expired(t0 + ms(1000)).is_empty());

        assert_eq!(m.on_deferred_expired(t0 + HOLD), vec![Action::Revert]);
        assert_eq!(m.phase(), WorkerPhase::Idle);

        // A second expiry for the same deadline is a no-op
        assert!(m.on_deferred_expired(t0 + HOLD).is_empty());
    }

    #[test]
    fn test_expiry_older_than_rearm_is_ignored() {
        let t0 = Instant::now();
        let mut m = machine(HoldPolicy::Reset, RevertMode::Deferred);
        m.on_request(true, t0);

        // Re-armed just as the first deadline fired
        assert_eq!(
            m.on_request(true, t0 + ms(99)),
            vec![
                Action::ArmDeferred {
                    deadline: t0 + ms(199)
                },
                Action::ReleaseGate,
            ]
        );
        assert!(m.on_deferred_expired(t0 + HOLD).is_empty());
        assert!(m.is_active());

        assert_eq!(m.on_deferred_expired(t0 + ms(199)), vec![Action::Revert]);
    }

    #[test]
    fn test_expiry_after_explicit_off_is_ignored() {
        let t0 = Instant::now();
        let mut m = machine(HoldPolicy::Reset, RevertMode::Deferred);
        m.on_request(true, t0);

        assert_eq!(
            m.on_request(false, t0 + ms(10)),
            vec![Action::CancelDeferred, Action::Revert, Action::ReleaseGate]
        );
        assert!(m.on_deferred_expired(t0 + HOLD).is_empty());

        // Off while idle, then a fresh activation
        m.on_request(true, t0 + ms(200));
        assert!(m.on_deferred_expired(t0 + HOLD).is_empty());
        assert!(m.is_active());
    }

    #[test]
    fn test_stop_reverts_when_configured() {
        let t0 = Instant::now();
        let mut m = machine(HoldPolicy::Reset, RevertMode::WorkerHold);
        m.on_request(true, t0);

        assert_eq!(m.on_stop(), vec![Action::Revert]);
        assert!(m.is_stopping());

        // Nothing happens after stopping
        assert!(m.on_request(true, t0 + ms(1)).is_empty());
        assert!(m.on_hold_expired(t0 + ms(1000)).is_empty());
    }

    #[test]
    fn test_stop_without_revert() {
        let t0 = Instant::now();
        let mut m = ChannelMachine::new(
            &ChannelConfig::new(ChannelId::Crucial)
                .with_hold(HOLD)
                .with_revert_on_stop(false),
        );
        m.on_request(true, t0);

        assert!(m.on_stop().is_empty());
        assert!(m.is_stopping());
    }

    #[test]
    fn test_stop_while_idle() {
        let mut m = machine(HoldPolicy::Reset, RevertMode::Deferred);
        assert_eq!(m.on_stop(), vec![Action::CancelDeferred]);
    }
}
