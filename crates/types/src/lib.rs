//! Shared types for dynamic schedtune channels.
//!
//! Identifiers, per-channel configuration, scheduling hints and the
//! configuration errors every other crate reports.

mod config;
mod error;
mod identifiers;
mod topology;

pub use config::{
    default_hold, validate_channels, ChannelConfig, HoldPolicy, RevertMode, Suppression,
};
pub use error::ConfigError;
pub use identifiers::ChannelId;
pub use topology::{ClusterTopology, CpuCluster, PriorityClass, SchedHint};
