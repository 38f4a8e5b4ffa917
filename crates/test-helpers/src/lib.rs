//! Test helpers for dynstune.
//!
//! Provides a [`RecordingHook`] that records every policy call with a
//! timestamp and lets tests block until a number of calls has arrived, plus
//! fixtures for unpinned channel configs.

use dynstune_core::PolicyHook;
use dynstune_types::{ChannelConfig, ChannelId};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One recorded hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCall {
    pub group: String,
    pub enable: bool,
    pub at: Instant,
}

#[derive(Default)]
struct Inner {
    calls: Mutex<Vec<HookCall>>,
    changed: Condvar,
}

/// Policy hook that records calls. Clones share the same record.
#[derive(Clone, Default)]
pub struct RecordingHook {
    inner: Arc<Inner>,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<HookCall> {
        self.inner.calls.lock().clone()
    }

    /// The `enable` flag of every call, in order.
    pub fn edges(&self) -> Vec<bool> {
        self.inner.calls.lock().iter().map(|c| c.enable).collect()
    }

    pub fn applies(&self) -> usize {
        self.inner.calls.lock().iter().filter(|c| c.enable).count()
    }

    pub fn reverts(&self) -> usize {
        self.inner.calls.lock().iter().filter(|c| !c.enable).count()
    }

    pub fn len(&self) -> usize {
        self.inner.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until at least `count` calls were recorded. Returns `false` on
    /// timeout.
    pub fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut calls = self.inner.calls.lock();
        while calls.len() < count {
            if self
                .inner
                .changed
                .wait_until(&mut calls, deadline)
                .timed_out()
            {
                return calls.len() >= count;
            }
        }
        true
    }
}

impl PolicyHook for RecordingHook {
    fn apply_policy(&self, group: &str, enable: bool) {
        let mut calls = self.inner.calls.lock();
        calls.push(HookCall {
            group: group.to_string(),
            enable,
            at: Instant::now(),
        });
        self.inner.changed.notify_all();
    }
}

/// Assert that `calls` alternate apply, revert, apply, ... starting with an
/// apply.
pub fn assert_alternating(calls: &[HookCall]) {
    for (i, call) in calls.iter().enumerate() {
        let expected = i % 2 == 0;
        assert_eq!(
            call.enable, expected,
            "call {} was {} but expected {}: {:?}",
            i,
            if call.enable { "apply" } else { "revert" },
            if expected { "apply" } else { "revert" },
            calls.iter().map(|c| c.enable).collect::<Vec<_>>()
        );
    }
}

/// Unpinned config for `id` with the given hold, suitable for tests running
/// without real-time privileges.
pub fn test_channel(id: ChannelId, hold_ms: u64) -> ChannelConfig {
    ChannelConfig::new(id)
        .with_hold(Duration::from_millis(hold_ms))
        .unpinned()
}
