//! Worker errors.

use thiserror::Error;

/// Errors starting channel threads.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The OS refused to create the thread.
    #[error("Failed to start thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
