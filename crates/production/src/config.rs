//! TOML configuration for `dynstuned`.
//!
//! ```toml
//! [topology]
//! performance = [4, 5, 6, 7]
//! low_power = [0, 1, 2, 3]
//!
//! [stune]
//! root = "/dev/stune"
//! boost_value = 10
//!
//! [channels.boost]
//! hold_ms = 1000
//! prefer_idle_groups = ["foreground"]
//!
//! [channels.framebuffer]
//! hold_ms = 250
//! suppress_after = { channel = "input", window_ms = 100 }
//! ```
//!
//! Unset fields fall back to the channel defaults. Without a `[channels]`
//! table the daemon runs boost and crucial.

use dynstune_policy::StuneFsBackend;
use dynstune_types::{
    validate_channels, ChannelConfig, ChannelId, ClusterTopology, HoldPolicy, RevertMode,
    Suppression,
};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::DaemonError;

/// Channels started when the file names none.
pub const DEFAULT_CHANNELS: [ChannelId; 2] = [ChannelId::Boost, ChannelId::Crucial];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    #[serde(default)]
    pub topology: TopologySection,

    #[serde(default)]
    pub stune: StuneSection,

    /// Keyed by channel name; file order is start order.
    #[serde(default)]
    pub channels: IndexMap<String, ChannelSection>,
}

/// CPU core indices per cluster. Both empty means homogeneous.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopologySection {
    pub performance: Vec<usize>,
    pub low_power: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StuneSection {
    /// Schedtune cgroup mount point.
    pub root: PathBuf,

    /// Value written to `schedtune.boost` when boosting.
    pub boost_value: u8,
}

impl Default for StuneSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from(StuneFsBackend::DEFAULT_ROOT),
            boost_value: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelSection {
    pub hold_ms: Option<u64>,
    pub group: Option<String>,
    pub hold_policy: HoldPolicy,
    pub revert_mode: RevertMode,
    pub revert_on_stop: Option<bool>,

    /// Apply the realtime priority and cluster pinning hints (default on).
    pub pinned: Option<bool>,

    pub suppress_after: Option<SuppressAfter>,
    pub suppress_while_active: Option<ChannelId>,

    /// Extra groups that get prefer-idle along with a boost (boost only).
    pub prefer_idle_groups: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuppressAfter {
    pub channel: ChannelId,
    pub window_ms: u64,
}

impl ChannelSection {
    fn to_channel_config(&self, id: ChannelId) -> Result<ChannelConfig, DaemonError> {
        let mut config = ChannelConfig::new(id)
            .with_hold_policy(self.hold_policy)
            .with_revert_mode(self.revert_mode);
        if let Some(hold_ms) = self.hold_ms {
            config = config.with_hold(Duration::from_millis(hold_ms));
        }
        if let Some(group) = &self.group {
            config = config.with_group(group.clone());
        }
        if let Some(revert_on_stop) = self.revert_on_stop {
            config = config.with_revert_on_stop(revert_on_stop);
        }
        if self.pinned == Some(false) {
            config = config.unpinned();
        }

        let suppression = match (self.suppress_after, self.suppress_while_active) {
            (Some(_), Some(_)) => return Err(DaemonError::ConflictingSuppression(id)),
            (Some(after), None) => Some(Suppression::RecentActivity {
                channel: after.channel,
                window: Duration::from_millis(after.window_ms),
            }),
            (None, Some(channel)) => Some(Suppression::WhileActive { channel }),
            (None, None) => None,
        };
        if let Some(suppression) = suppression {
            config = config.with_suppression(suppression);
        }

        Ok(config)
    }
}

impl DaemonConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, DaemonError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, DaemonError> {
        let contents = std::fs::read_to_string(path).map_err(|source| DaemonError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn topology(&self) -> ClusterTopology {
        ClusterTopology::new(
            self.topology.performance.clone(),
            self.topology.low_power.clone(),
        )
    }

    /// Section of a channel, if the file has one.
    pub fn section(&self, id: ChannelId) -> Option<&ChannelSection> {
        self.channels
            .iter()
            .find(|(name, _)| name.parse::<ChannelId>().ok() == Some(id))
            .map(|(_, section)| section)
    }

    /// Resolve the validated channel set in start order.
    pub fn channel_configs(&self) -> Result<Vec<ChannelConfig>, DaemonError> {
        let configs: Vec<ChannelConfig> = if self.channels.is_empty() {
            DEFAULT_CHANNELS.iter().map(|id| ChannelConfig::new(*id)).collect()
        } else {
            self.channels
                .iter()
                .map(|(name, section)| {
                    let id = name.parse::<ChannelId>()?;
                    section.to_channel_config(id)
                })
                .collect::<Result<Vec<_>, DaemonError>>()?
        };

        validate_channels(&configs)?;
        Ok(configs)
    }
}
