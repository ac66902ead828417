//! Transport abstraction for the SOMO client.
//!
//! The [`Transport`] trait defines a bidirectional text message channel between
//! the client and the game server. The protocol uses JSON text messages, so
//! every transport implementation must handle message framing internally.
//!
//! Unlike a one-shot client, the [`ConnectionManager`](crate::ConnectionManager)
//! opens a fresh transport on every (re)connect, so connection setup goes
//! through the [`Connector`] trait instead of being done once by the caller.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use somo_client::error::SomoError;
//! use somo_client::transport::{CloseFrame, Connector, Transport, TransportEvent};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), SomoError> {
//!         // Send the JSON text message over your transport
//!         unimplemented!()
//!     }
//!
//!     async fn recv(&mut self) -> Result<TransportEvent, SomoError> {
//!         // Receive the next JSON text message, or report the close frame
//!         unimplemented!()
//!     }
//!
//!     async fn close(&mut self, frame: CloseFrame) -> Result<(), SomoError> {
//!         // Gracefully shut down the connection with the given close code
//!         unimplemented!()
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     type Transport = MyTransport;
//!
//!     async fn connect(&self, url: &str) -> Result<MyTransport, SomoError> {
//!         unimplemented!()
//!     }
//! }
//! ```

use std::fmt;

use async_trait::async_trait;

use crate::error::SomoError;

/// A connection close code.
///
/// Only [`CloseCode::NORMAL`] means the peer intended to leave. Every other
/// code counts as an abnormal close and makes the connection manager retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// Intentional, graceful closure.
    pub const NORMAL: Self = Self(1000);
    /// The endpoint is going away (server shutdown, page navigation).
    pub const GOING_AWAY: Self = Self(1001);
    /// The connection dropped without a close frame.
    pub const ABNORMAL: Self = Self(1006);

    /// Returns `true` for the normal-closure code.
    pub fn is_normal(self) -> bool {
        self == Self::NORMAL
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Close code plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: CloseCode,
    pub reason: String,
}

impl CloseFrame {
    /// Frame sent by [`ConnectionManager::disconnect`](crate::ConnectionManager::disconnect).
    pub fn normal(reason: impl Into<String>) -> Self {
        Self {
            code: CloseCode::NORMAL,
            reason: reason.into(),
        }
    }

    /// Frame synthesized when the connection is lost without a close handshake.
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: CloseCode::ABNORMAL,
            reason: reason.into(),
        }
    }
}

/// Something the transport delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete JSON text message.
    Message(String),
    /// The connection closed. No further events follow.
    Closed(CloseFrame),
}

/// A bidirectional text message transport.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON message.
/// Each call to [`recv`](Transport::recv) returns one complete JSON message or
/// the close frame that ended the connection.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is used
/// inside `tokio::select!`. If `recv` is cancelled before completion, calling it
/// again must not lose data.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`SomoError::TransportSend`] if the message could not be sent.
    async fn send(&mut self, message: String) -> Result<(), SomoError>;

    /// Receive the next message from the server.
    ///
    /// Returns:
    /// - `Ok(TransportEvent::Message(text))`: a complete message was received
    /// - `Ok(TransportEvent::Closed(frame))`: the connection closed
    /// - `Err(e)`: a transport error occurred; the connection is unusable
    async fn recv(&mut self) -> Result<TransportEvent, SomoError>;

    /// Close the transport connection with the given close frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self, frame: CloseFrame) -> Result<(), SomoError>;
}

/// Opens new transports for the connection manager.
///
/// Resolving `connect` means the transport is open and ready to carry
/// messages.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport this connector produces.
    type Transport: Transport;

    /// Open a connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn connect(&self, url: &str) -> Result<Self::Transport, SomoError>;
}
