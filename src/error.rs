//! Error types for the Parlor client.

use thiserror::Error;

/// Errors that can occur when using the Parlor client.
///
/// Protocol-level business failures (a rejected login, a full room) are
/// **not** errors: they are typed values such as
/// [`LoginResult::Error`](crate::protocol::LoginResult) returned inside `Ok`.
/// This enum covers the client runtime itself.
#[derive(Debug, Error)]
pub enum ParlorError {
    /// Failed to establish the transport connection.
    #[error("transport connect error: {0}")]
    TransportConnect(String),

    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client worker has shut down; no further commands can be issued.
    #[error("client closed")]
    ClientClosed,

    /// The builder was finalized without a transport and no default
    /// transport feature is enabled.
    #[error("no transport configured")]
    NoTransport,

    /// No response arrived for a request within the configured timeout.
    #[error("request '{key}' timed out")]
    RequestTimeout {
        /// Correlation key of the request that timed out.
        key: String,
    },

    /// The request was cancelled before a response arrived, typically
    /// because the connection dropped. No answer will ever arrive.
    #[error("request cancelled")]
    RequestCancelled,

    /// A response arrived under the expected correlation key but carried a
    /// payload of the wrong shape for the issuing call.
    #[error("unexpected response for request '{key}'")]
    UnexpectedResponse {
        /// Correlation key of the mismatched response.
        key: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Parlor client operations.
pub type Result<T> = std::result::Result<T, ParlorError>;
