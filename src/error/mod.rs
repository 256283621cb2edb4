//! Error types for the relay.
//!
//! Every failure path here terminates the current session; nothing is
//! retried at this layer. Upstream detail is logged for operators and is
//! never echoed to clients (see [`crate::relay`]).

use thiserror::Error;

/// Errors that can occur while relaying a generation stream.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The upstream provider could not be reached, rejected the call, or the
    /// connection was lost mid-stream.
    #[error("failed to reach upstream provider: {0}")]
    UpstreamConnect(String),

    /// A line of upstream output was not valid JSON, or the stream ended
    /// with an incomplete trailing record.
    #[error("malformed upstream stream: {0}")]
    UpstreamParse(String),

    /// The client transport rejected a write. Treated as a client
    /// disconnect, not a failure.
    #[error("client transport closed")]
    TransportClosed,

    /// Required process configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
