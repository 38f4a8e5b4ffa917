//! Producer-facing notify handles.

use dynstune_core::ChannelStats;
use dynstune_types::{ChannelId, Suppression};
use dynstune_worker::TriggerHandle;

/// What happened to a single notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Won the gate; the worker was woken.
    Admitted,
    /// A request was already in flight and absorbed this one.
    Coalesced,
    /// Dropped by the channel's suppression rule before touching the gate.
    Suppressed,
}

/// Read-only view of another channel used to decide suppression.
#[derive(Debug, Clone)]
struct SuppressionGuard {
    rule: Suppression,
    target: TriggerHandle,
}

impl SuppressionGuard {
    fn blocks(&self) -> bool {
        let target = self.target.state();
        match self.rule {
            Suppression::RecentActivity { window, .. } => self
                .target
                .clock()
                .since(target.last_activity())
                .is_some_and(|age| age < window),
            Suppression::WhileActive { .. } => target.is_active(),
        }
    }
}

/// Cheap, cloneable handle for notifying one channel from any thread.
///
/// `notify` never blocks, never allocates and never calls the policy hook.
#[derive(Debug, Clone)]
pub struct NotifyHandle {
    trigger: TriggerHandle,
    guard: Option<SuppressionGuard>,
}

impl NotifyHandle {
    pub(crate) fn new(
        trigger: TriggerHandle,
        suppression: Option<(Suppression, TriggerHandle)>,
    ) -> Self {
        Self {
            trigger,
            guard: suppression.map(|(rule, target)| SuppressionGuard { rule, target }),
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.trigger.id()
    }

    /// Request that the channel become (or stay) active.
    #[inline]
    pub fn notify(&self) {
        self.request(true);
    }

    /// Like [`notify`](Self::notify), reporting what happened.
    pub fn try_notify(&self) -> NotifyOutcome {
        self.request(true)
    }

    /// Request an early revert. Not subject to suppression.
    pub fn notify_off(&self) -> NotifyOutcome {
        self.request(false)
    }

    pub fn is_active(&self) -> bool {
        self.trigger.state().is_active()
    }

    pub fn stats(&self) -> ChannelStats {
        self.trigger.state().stats()
    }

    fn request(&self, on: bool) -> NotifyOutcome {
        if on {
            if let Some(guard) = &self.guard {
                if guard.blocks() {
                    self.trigger.state().record_suppressed();
                    return NotifyOutcome::Suppressed;
                }
            }
        }

        if self.trigger.fire(on) {
            NotifyOutcome::Admitted
        } else {
            NotifyOutcome::Coalesced
        }
    }
}
