//! Error types for the SOMO client.

use thiserror::Error;

/// Errors that can occur when using the SOMO client.
#[derive(Debug, Error)]
pub enum SomoError {
    /// The transport reported an error before the connection opened.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// `disconnect()` was called while a connection attempt was still in flight.
    #[error("connection attempt aborted by disconnect")]
    ConnectAborted,

    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was already closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires an open connection.
    #[error("not connected to server")]
    NotConnected,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for SOMO client operations.
pub type Result<T> = std::result::Result<T, SomoError>;
