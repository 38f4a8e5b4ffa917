//! Per-channel configuration.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::{ChannelId, ConfigError, SchedHint};

/// How an admitted trigger while already active affects the hold window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HoldPolicy {
    /// Every admitted trigger restarts the full hold from its admission time.
    /// The gate reopens as soon as the worker has consumed the trigger.
    #[default]
    Reset,
    /// After an admitted "on" trigger the gate stays closed for half the
    /// hold, coalescing every trigger inside that clearance window. The
    /// revert deadline is still restarted to admission + hold.
    Clearance,
}

/// Where the revert timeout lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevertMode {
    /// The worker sleeps through the hold window and reverts on timeout.
    #[default]
    WorkerHold,
    /// The worker arms a cancellable deferred task that triggers "off".
    Deferred,
}

/// Cross-channel admission precondition.
///
/// Consulted read-only by the trigger path; a suppressed notify is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// Drop triggers while `channel` saw admitted activity within `window`.
    RecentActivity { channel: ChannelId, window: Duration },
    /// Drop triggers while `channel` is in its active phase.
    WhileActive { channel: ChannelId },
}

impl Suppression {
    /// The channel this rule reads.
    pub fn target(&self) -> ChannelId {
        match self {
            Suppression::RecentActivity { channel, .. } => *channel,
            Suppression::WhileActive { channel } => *channel,
        }
    }
}

/// Default hold for each channel, in milliseconds.
pub fn default_hold(id: ChannelId) -> Duration {
    let ms = match id {
        ChannelId::Boost => 1000,
        ChannelId::Crucial => 2500,
        ChannelId::Framebuffer => 250,
        ChannelId::TopAppCgroup => 500,
        ChannelId::Input => 100,
    };
    Duration::from_millis(ms)
}

/// Configuration for a single debounced channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub id: ChannelId,

    /// Task group handed to the policy hook.
    pub group: String,

    /// Time the channel stays active after the last admitted trigger.
    pub hold: Duration,

    pub hold_policy: HoldPolicy,

    pub revert_mode: RevertMode,

    /// Scheduling hint for the channel worker.
    pub worker_hint: SchedHint,

    /// Scheduling hint for the deferred revert task (`RevertMode::Deferred`).
    pub revert_hint: SchedHint,

    pub suppression: Option<Suppression>,

    /// Issue the pending revert when the worker is stopped while active.
    pub revert_on_stop: bool,

    /// Worker thread stack size; `None` uses the platform default.
    pub stack_size: Option<usize>,
}

impl ChannelConfig {
    /// Create a config with the channel's default hold on the "top-app" group.
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            group: "top-app".to_string(),
            hold: default_hold(id),
            hold_policy: HoldPolicy::default(),
            revert_mode: RevertMode::default(),
            worker_hint: SchedHint::worker(),
            revert_hint: SchedHint::deferred(),
            suppression: None,
            revert_on_stop: true,
            stack_size: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn with_hold_policy(mut self, policy: HoldPolicy) -> Self {
        self.hold_policy = policy;
        self
    }

    pub fn with_revert_mode(mut self, mode: RevertMode) -> Self {
        self.revert_mode = mode;
        self
    }

    pub fn with_worker_hint(mut self, hint: SchedHint) -> Self {
        self.worker_hint = hint;
        self
    }

    pub fn with_revert_hint(mut self, hint: SchedHint) -> Self {
        self.revert_hint = hint;
        self
    }

    pub fn with_suppression(mut self, suppression: Suppression) -> Self {
        self.suppression = Some(suppression);
        self
    }

    pub fn with_revert_on_stop(mut self, revert_on_stop: bool) -> Self {
        self.revert_on_stop = revert_on_stop;
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Drop all scheduling hints (tests, unprivileged processes).
    pub fn unpinned(self) -> Self {
        self.with_worker_hint(SchedHint::unpinned())
            .with_revert_hint(SchedHint::unpinned())
    }

    /// Half the hold: the clearance window under `HoldPolicy::Clearance`.
    pub fn clearance(&self) -> Duration {
        self.hold / 2
    }

    /// Check the fields of this config in isolation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hold.is_zero() {
            return Err(ConfigError::ZeroHold(self.id));
        }
        if self.group.trim().is_empty() {
            return Err(ConfigError::EmptyGroup(self.id));
        }
        Ok(())
    }
}

/// Validate a full channel set: each config on its own, no duplicates, and
/// suppression rules that only reference configured channels without cycles.
pub fn validate_channels(configs: &[ChannelConfig]) -> Result<(), ConfigError> {
    let mut targets: HashMap<ChannelId, Option<ChannelId>> = HashMap::new();
    for config in configs {
        config.validate()?;
        let target = config.suppression.as_ref().map(Suppression::target);
        if targets.insert(config.id, target).is_some() {
            return Err(ConfigError::DuplicateChannel(config.id));
        }
    }

    for config in configs {
        if let Some(target) = targets[&config.id] {
            if !targets.contains_key(&target) {
                return Err(ConfigError::UnknownSuppressionTarget {
                    channel: config.id,
                    target,
                });
            }
        }
    }

    // Each channel has at most one outgoing edge, so a walk either ends or
    // revisits a node.
    for config in configs {
        let mut seen = HashSet::new();
        let mut current = config.id;
        seen.insert(current);
        while let Some(next) = targets.get(&current).copied().flatten() {
            if !seen.insert(next) {
                return Err(ConfigError::SuppressionCycle(next));
            }
            current = next;
        }
    }

    Ok(())
}
