//! Replay error types.

use callsync_client::SessionError;
use thiserror::Error;

/// Errors that stop a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The trace could not be read.
    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),

    /// A line is neither an event nor a command.
    #[error("line {line}: not an event or command: {source}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The session hit a fatal error.
    #[error("line {line}: {source}")]
    Session {
        /// 1-based line number.
        line: usize,
        /// Session error.
        #[source]
        source: SessionError,
    },
}
