//! Composite schedtune policies.

use dynstune_core::PolicyHook;
use std::sync::Arc;

use crate::TuneBackend;

/// Boost policy for app launches and input.
///
/// Enables boost and prefer-idle on the channel's group, and prefer-idle on
/// every extra group, biasing the foreground toward idle big cores.
pub struct BoostPolicy<B: ?Sized> {
    backend: Arc<B>,
    prefer_idle_groups: Vec<String>,
}

impl<B: TuneBackend + ?Sized> BoostPolicy<B> {
    /// Boost policy that also sets prefer-idle on "foreground".
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_prefer_idle_groups(backend, vec!["foreground".to_string()])
    }

    pub fn with_prefer_idle_groups(backend: Arc<B>, prefer_idle_groups: Vec<String>) -> Self {
        Self {
            backend,
            prefer_idle_groups,
        }
    }
}

impl<B: TuneBackend + ?Sized> PolicyHook for BoostPolicy<B> {
    fn apply_policy(&self, group: &str, enable: bool) {
        self.backend.set_boost(group, enable);
        self.backend.set_prefer_idle(group, enable);
        for extra in &self.prefer_idle_groups {
            if extra != group {
                self.backend.set_prefer_idle(extra, enable);
            }
        }
    }
}

/// Crucial policy for launches and transitions: idle cores with the highest
/// original capacity for the channel's group.
pub struct CrucialPolicy<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: TuneBackend + ?Sized> CrucialPolicy<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }
}

impl<B: TuneBackend + ?Sized> PolicyHook for CrucialPolicy<B> {
    fn apply_policy(&self, group: &str, enable: bool) {
        self.backend.set_crucial(group, enable);
    }
}

/// Plain boost on the channel's group only.
pub struct GroupBoostPolicy<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: TuneBackend + ?Sized> GroupBoostPolicy<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }
}

impl<B: TuneBackend + ?Sized> PolicyHook for GroupBoostPolicy<B> {
    fn apply_policy(&self, group: &str, enable: bool) {
        self.backend.set_boost(group, enable);
    }
}
