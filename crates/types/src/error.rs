//! Configuration errors.

use thiserror::Error;

use crate::ChannelId;

/// Errors detected while validating channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Hold duration must be positive.
    #[error("Channel {0} has a zero hold duration")]
    ZeroHold(ChannelId),

    /// Policy hooks need a target group.
    #[error("Channel {0} has an empty target group")]
    EmptyGroup(ChannelId),

    /// A channel was configured twice.
    #[error("Channel {0} configured more than once")]
    DuplicateChannel(ChannelId),

    /// A suppression rule names a channel that is not configured.
    #[error("Channel {channel} is suppressed by unconfigured channel {target}")]
    UnknownSuppressionTarget {
        channel: ChannelId,
        target: ChannelId,
    },

    /// Suppression rules form a cycle (including a channel suppressing itself).
    #[error("Suppression rules form a cycle through channel {0}")]
    SuppressionCycle(ChannelId),

    /// Unrecognized channel name.
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
}
