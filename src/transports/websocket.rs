//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! This module provides [`WebSocketTransport`], a [`Transport`] implementation
//! that communicates over a WebSocket connection, and [`WebSocketConnector`],
//! which the [`ConnectionManager`](crate::ConnectionManager) uses to open a
//! new one on every (re)connect. Both `ws://` and `wss://` URLs are supported.
//!
//! # Feature gate
//!
//! This module is only available when the `transport-websocket` feature is enabled
//! (it is enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), somo_client::SomoError> {
//! use somo_client::transport::{CloseFrame, Transport, TransportEvent};
//! use somo_client::WebSocketTransport;
//!
//! let mut transport = WebSocketTransport::connect("ws://localhost:8000/ws").await?;
//! transport.send(r#"{"action":"create_room","nickname":"Ana","max_players":8}"#.to_string()).await?;
//!
//! if let Ok(TransportEvent::Message(msg)) = transport.recv().await {
//!     println!("received: {msg}");
//! }
//!
//! transport.close(CloseFrame::normal("bye")).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame as WsCloseFrame, Message};

use crate::error::SomoError;
use crate::transport::{CloseCode, CloseFrame, Connector, Transport, TransportEvent};

/// Close code reported when the server closes without a status code.
const NO_STATUS_RECEIVED: CloseCode = CloseCode(1005);

/// Type alias for the underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] implementation backed by a WebSocket connection.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method is cancel-safe. Dropping the future
/// returned by `recv` before it completes will not consume or lose any messages.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Establish a new WebSocket connection to the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`SomoError::Io`] if the URL is invalid or the connection
    /// cannot be established. When the underlying error is an I/O error its
    /// [`ErrorKind`](std::io::ErrorKind) is preserved.
    pub async fn connect(url: &str) -> Result<Self, SomoError> {
        tracing::debug!(url = %url, "connecting to WebSocket server");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            SomoError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "WebSocket connection established");

        Ok(Self {
            stream,
            closed: false,
        })
    }

    /// Create a [`WebSocketTransport`] from an already-established WebSocket stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Establish a new WebSocket connection with a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SomoError::Timeout`] if the deadline elapses, or any
    /// error that [`connect`](Self::connect) may return.
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self, SomoError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| SomoError::Timeout)?
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), SomoError> {
        if self.closed {
            return Err(SomoError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| SomoError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Result<TransportEvent, SomoError> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Err(SomoError::TransportReceive(e.to_string())),
                None => {
                    return Ok(TransportEvent::Closed(CloseFrame::abnormal(
                        "stream ended without close frame",
                    )));
                }
            };

            match msg {
                Message::Text(text) => return Ok(TransportEvent::Message(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    let frame = match frame {
                        Some(f) => CloseFrame {
                            code: CloseCode(u16::from(f.code)),
                            reason: f.reason.to_string(),
                        },
                        None => CloseFrame {
                            code: NO_STATUS_RECEIVED,
                            reason: String::new(),
                        },
                    };
                    return Ok(TransportEvent::Closed(frame));
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // tungstenite queues the pong reply itself.
                }
                Message::Binary(_) => {
                    tracing::warn!("received unexpected binary WebSocket frame, skipping");
                }
                Message::Frame(_) => {
                    tracing::debug!("received raw WebSocket frame, skipping");
                }
            }
        }
    }

    async fn close(&mut self, frame: CloseFrame) -> Result<(), SomoError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let ws_frame = WsCloseFrame {
            code: WsCloseCode::from(frame.code.0),
            reason: frame.reason.into(),
        };
        self.stream
            .close(Some(ws_frame))
            .await
            .map_err(|e| SomoError::TransportSend(e.to_string()))
    }
}

/// [`Connector`] that opens a [`WebSocketTransport`] per connection attempt.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    timeout: Duration,
}

impl WebSocketConnector {
    /// Create a connector whose handshakes fail after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self, url: &str) -> Result<WebSocketTransport, SomoError> {
        WebSocketTransport::connect_with_timeout(url, self.timeout).await
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let result = WebSocketTransport::connect("not-a-valid-url").await;
        assert!(matches!(result.unwrap_err(), SomoError::Io(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let result = WebSocketTransport::connect("ws://127.0.0.1:1").await;
        assert!(matches!(result.unwrap_err(), SomoError::Io(_)));
    }

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection and returns the address to connect to.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn recv_receives_text_then_close_code() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"event":"round_started","limit":21}"#.into()))
                .await
                .unwrap();
            ws.close(Some(WsCloseFrame {
                code: WsCloseCode::Away,
                reason: "restarting".into(),
            }))
            .await
            .unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();

        let first = transport.recv().await.unwrap();
        assert_eq!(
            first,
            TransportEvent::Message(r#"{"event":"round_started","limit":21}"#.into())
        );

        match transport.recv().await.unwrap() {
            TransportEvent::Closed(frame) => {
                assert_eq!(frame.code, CloseCode::GOING_AWAY);
                assert_eq!(frame.reason, "restarting");
            }
            other => panic!("expected close, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text("after_binary".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let msg = transport.recv().await.unwrap();
        assert_eq!(msg, TransportEvent::Message("after_binary".into()));
    }

    #[tokio::test]
    async fn client_close_sends_normal_code() {
        let (code_tx, code_rx) = tokio::sync::oneshot::channel();
        let url = start_mock_server(|mut ws| async move {
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Close(Some(frame)) = msg {
                    let _ = code_tx.send(u16::from(frame.code));
                    break;
                }
            }
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport
            .close(CloseFrame::normal("Client disconnect"))
            .await
            .unwrap();

        assert_eq!(code_rx.await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url = start_mock_server(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close(CloseFrame::normal("bye")).await.unwrap();
        // Second close is a no-op.
        transport.close(CloseFrame::normal("bye")).await.unwrap();

        let err = transport.send("oops".to_string()).await.unwrap_err();
        assert!(matches!(err, SomoError::TransportClosed));
    }

    #[tokio::test]
    async fn connector_times_out() {
        let connector = WebSocketConnector::new(Duration::from_millis(50));
        let err = connector.connect("ws://192.0.2.1:1").await.unwrap_err();
        assert!(matches!(err, SomoError::Timeout | SomoError::Io(_)));
    }
}
