//! Channel identifiers.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// One independently debounced activity signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelId {
    /// App launches and transitions.
    Boost,
    /// Latency-critical top-app placement.
    Crucial,
    /// Display refresh activity.
    Framebuffer,
    /// Foreground task group changes.
    TopAppCgroup,
    /// Input events.
    Input,
}

impl ChannelId {
    /// Every channel, in declaration order.
    pub const ALL: [ChannelId; 5] = [
        ChannelId::Boost,
        ChannelId::Crucial,
        ChannelId::Framebuffer,
        ChannelId::TopAppCgroup,
        ChannelId::Input,
    ];

    /// Stable lowercase name, as used in config files and thread names.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelId::Boost => "boost",
            ChannelId::Crucial => "crucial",
            ChannelId::Framebuffer => "framebuffer",
            ChannelId::TopAppCgroup => "top-app-cgroup",
            ChannelId::Input => "input",
        }
    }

    /// Dense index in `0..ALL.len()`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name of the worker thread driving this channel.
    pub fn worker_thread_name(self) -> String {
        format!("dstune_{}d", self.short_name())
    }

    /// Name of the deferred revert thread for this channel.
    pub fn revert_thread_name(self) -> String {
        format!("dstune_{}r", self.short_name())
    }

    fn short_name(self) -> &'static str {
        match self {
            ChannelId::Framebuffer => "fb",
            ChannelId::TopAppCgroup => "topapp",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        ChannelId::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownChannel(s.to_string()))
    }
}
