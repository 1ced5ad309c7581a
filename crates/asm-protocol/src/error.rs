//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when decoding protocol text.
///
/// Decoding errors are scoped to a single record; sibling records in the same
/// frame are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A record had no `:` separator or an empty event name.
    #[error("malformed record: {0:?}")]
    MalformedRecord(String),
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
