//! Error types for the telemetry link.

use std::io;

use thiserror::Error;

/// Errors that can occur while managing the link to the sensor module.
///
/// None of these are fatal to the process: connect and read failures feed the
/// reconnect policy, and write failures are left for the caller to handle.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The TCP connection could not be established.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        /// `host:port` that was dialled.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// A command could not be written in full.
    #[error("failed to send {event} command: {source}")]
    WriteFailed {
        /// Event name of the command.
        event: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The read loop hit an I/O error.
    #[error("read failed: {0}")]
    ReadFailed(#[source] io::Error),

    /// There is no open connection to write to.
    #[error("not connected to the sensor module")]
    NotConnected,

    /// Another connect attempt has not finished yet.
    #[error("a connection attempt is already in progress")]
    ConnectInProgress,

    /// The session was shut down.
    #[error("link session is closed")]
    Closed,

    /// A background thread could not be started.
    #[error("failed to spawn {what} thread: {source}")]
    Spawn {
        /// Which thread failed to start.
        what: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Configuration values are out of range.
    #[error("invalid link configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;
