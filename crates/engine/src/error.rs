//! Error types for engine startup.

use dynstune_types::{ChannelId, ConfigError};
use dynstune_worker::WorkerError;
use thiserror::Error;

/// Errors while starting an [`Engine`](crate::Engine).
///
/// Both are fatal to startup: no channel keeps running after either.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The channel set failed validation.
    #[error("Invalid channel configuration: {0}")]
    Config(#[from] ConfigError),

    /// A channel's worker (or its deferred revert thread) could not start.
    #[error("Failed to start channel {channel}: {source}")]
    Spawn {
        channel: ChannelId,
        #[source]
        source: WorkerError,
    },
}
