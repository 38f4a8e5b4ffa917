//! The `dynstuned` daemon.
//!
//! Loads a TOML channel set, binds each channel to the matching schedtune
//! policy and feeds channel names read line by line into the engine.

mod config;
mod daemon;
mod error;

pub use config::{
    ChannelSection, DaemonConfig, StuneSection, SuppressAfter, TopologySection, DEFAULT_CHANNELS,
};
pub use daemon::{build_engine, parse_command, policy_for, run_feed, FeedCommand, FeedSummary};
pub use error::{DaemonError, FeedError};
