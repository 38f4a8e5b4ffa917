use dynstune_engine::EngineError;
use dynstune_types::{ChannelId, ConfigError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading the daemon configuration or starting its engine.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigError),

    /// Both `suppress_after` and `suppress_while_active` were given.
    #[error("Channel {0} has more than one suppression rule")]
    ConflictingSuppression(ChannelId),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A trigger feed line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error(transparent)]
    Channel(#[from] ConfigError),

    /// Known channel, but not followed by a lone `on` or `off`.
    #[error("Expected `<channel> [on|off]`, got {0:?}")]
    Malformed(String),
}
