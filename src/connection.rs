//! Persistent connection to the SOMO game server.
//!
//! [`ConnectionManager`] owns at most one live transport at a time. Each
//! successful [`connect`](ConnectionManager::connect) spawns a background
//! connection loop that multiplexes outbound actions and inbound frames via
//! `tokio::select!`, decodes every frame into a [`ServerEvent`] and hands it
//! to the registered handlers.
//!
//! Closes with any code other than [`CloseCode::NORMAL`] schedule an automatic
//! reconnect after `base * 2^(attempt-1)`, up to
//! [`ClientConfig::max_reconnect_attempts`] attempts. The counter resets on
//! every successful open.
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = ConnectionManager::new(WebSocketConnector::new(timeout), ClientConfig::from_env());
//! manager.on_signal(|signal| tracing::info!(?signal, "connection"));
//! manager.on(ServerEventKind::RoomState, |event| { /* … */ });
//! manager.connect().await?;
//! manager.send(ClientAction::CreateRoom { nickname: "Ana".into(), max_players: 8 });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::{Result, SomoError};
use crate::protocol::{decode_event, encode_action, ClientAction, ServerEvent, ServerEventKind};
use crate::transport::{CloseCode, CloseFrame, Connector, Transport, TransportEvent};

/// Reason sent with the close frame of an intentional disconnect.
const CLIENT_DISCONNECT_REASON: &str = "Client disconnect";

/// Lifecycle of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection was ever attempted.
    Idle,
    /// A transport is being opened.
    Connecting,
    /// The transport is open; actions can be sent.
    Open,
    /// A graceful close was requested and is in progress.
    Closing,
    /// The last transport closed.
    Closed,
}

/// Lifecycle notifications emitted by the [`ConnectionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// A transport opened.
    Connected,
    /// The transport closed (or never opened).
    Disconnected { code: CloseCode, reason: String },
    /// The transport reported an error. The matching `Disconnected` follows.
    Error { message: String },
    /// An automatic reconnect will run after `delay`.
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// The attempt ceiling was reached; only a manual `connect()` retries.
    ReconnectExhausted { attempts: u32 },
}

type EventHandler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;
type SignalHandler = Arc<dyn Fn(&ConnectionSignal) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    by_kind: HashMap<ServerEventKind, EventHandler>,
    any: Option<EventHandler>,
    signal: Option<SignalHandler>,
}

/// Commands from the manager handle to the connection loop.
enum Outbound {
    Text(String),
    Close(CloseFrame),
}

struct Shared {
    state: ConnectionState,
    attempts: u32,
    /// Bumped on every connection attempt; closes from older attempts are ignored.
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    reconnect: Option<JoinHandle<()>>,
}

struct Inner<C> {
    connector: C,
    config: ClientConfig,
    shared: Mutex<Shared>,
    handlers: Mutex<Handlers>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the single connection to the game server.
///
/// Cloning the manager yields another handle to the same connection.
pub struct ConnectionManager<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Create an idle manager. Nothing is opened until [`connect`](Self::connect).
    pub fn new(connector: C, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                config,
                shared: Mutex::new(Shared {
                    state: ConnectionState::Idle,
                    attempts: 0,
                    generation: 0,
                    outbound: None,
                    reconnect: None,
                }),
                handlers: Mutex::new(Handlers::default()),
            }),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Open a connection if none is active.
    ///
    /// Resolves once the transport is open. Calling it while a connection is
    /// already `Connecting` or `Open` returns `Ok(())` without opening a
    /// second transport.
    ///
    /// # Errors
    ///
    /// Returns [`SomoError::ConnectionFailed`] if the transport could not be
    /// opened (an automatic retry may already be scheduled), or
    /// [`SomoError::ConnectAborted`] if [`disconnect`](Self::disconnect) was
    /// called while the attempt was in flight.
    pub async fn connect(&self) -> Result<()> {
        let generation = {
            let mut shared = lock(&self.inner.shared);
            if matches!(
                shared.state,
                ConnectionState::Connecting | ConnectionState::Open
            ) {
                debug!(state = ?shared.state, "connect ignored, connection already active");
                return Ok(());
            }
            shared.state = ConnectionState::Connecting;
            shared.generation += 1;
            shared.generation
        };

        let url = &self.inner.config.url;
        info!(url = %url, generation, "connecting to game server");

        let opened = tokio::time::timeout(
            self.inner.config.connect_timeout,
            self.inner.connector.connect(url),
        )
        .await
        .unwrap_or_else(|_| Err(SomoError::Timeout));

        match opened {
            Ok(transport) => self.handle_open(generation, transport).await,
            Err(e) => {
                error!(error = %e, "connection attempt failed");
                self.emit_signal(&ConnectionSignal::Error {
                    message: e.to_string(),
                });
                self.handle_close(generation, CloseFrame::abnormal(e.to_string()));
                Err(SomoError::ConnectionFailed(e.to_string()))
            }
        }
    }

    /// Close the connection with the normal-closure code.
    ///
    /// No automatic reconnect follows. A reconnect that is waiting for its
    /// backoff timer is cancelled, and an attempt that is still opening is
    /// closed as soon as it opens.
    pub fn disconnect(&self) {
        let mut shared = lock(&self.inner.shared);
        if let Some(task) = shared.reconnect.take() {
            task.abort();
            debug!("cancelled pending reconnect");
        }
        match shared.state {
            ConnectionState::Open => {
                shared.state = ConnectionState::Closing;
                if let Some(tx) = shared.outbound.take() {
                    let _ = tx.send(Outbound::Close(CloseFrame::normal(
                        CLIENT_DISCONNECT_REASON,
                    )));
                }
                info!("disconnect requested");
            }
            ConnectionState::Connecting => {
                shared.state = ConnectionState::Closing;
                info!("disconnect requested while connecting");
            }
            ConnectionState::Idle | ConnectionState::Closing | ConnectionState::Closed => {}
        }
    }

    /// Serialize and send `action` if the connection is open.
    ///
    /// Returns `false` (and logs a warning) when the action was dropped.
    /// Dropped actions are never queued for a later connection.
    pub fn send(&self, action: ClientAction) -> bool {
        let shared = lock(&self.inner.shared);
        let tx = match (&shared.state, &shared.outbound) {
            (ConnectionState::Open, Some(tx)) => tx,
            (state, _) => {
                warn!(action = action.name(), ?state, "not connected, dropping action");
                return false;
            }
        };
        match encode_action(&action) {
            Ok(json) => {
                debug!(action = action.name(), "sending action");
                tx.send(Outbound::Text(json)).is_ok()
            }
            Err(e) => {
                error!(action = action.name(), error = %e, "failed to serialize action");
                false
            }
        }
    }

    // ── Subscriptions ───────────────────────────────────────────────

    /// Register the handler for one event kind, replacing any earlier one.
    pub fn on<F>(&self, kind: ServerEventKind, handler: F)
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        lock(&self.inner.handlers)
            .by_kind
            .insert(kind, Arc::new(handler));
    }

    /// Remove the handler for one event kind.
    pub fn off(&self, kind: ServerEventKind) {
        lock(&self.inner.handlers).by_kind.remove(&kind);
    }

    /// Register the wildcard handler, invoked for every event after the
    /// kind-specific one.
    pub fn on_any<F>(&self, handler: F)
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        lock(&self.inner.handlers).any = Some(Arc::new(handler));
    }

    /// Register the lifecycle handler.
    pub fn on_signal<F>(&self, handler: F)
    where
        F: Fn(&ConnectionSignal) + Send + Sync + 'static,
    {
        lock(&self.inner.handlers).signal = Some(Arc::new(handler));
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        lock(&self.inner.shared).state
    }

    /// Returns `true` if actions can be sent right now.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Automatic reconnect attempts made since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        lock(&self.inner.shared).attempts
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ── Internal helpers ────────────────────────────────────────────

    async fn handle_open(&self, generation: u64, mut transport: C::Transport) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        let aborted = {
            let mut shared = lock(&self.inner.shared);
            let current = shared.generation == generation;
            if current && shared.state == ConnectionState::Connecting {
                shared.state = ConnectionState::Open;
                shared.attempts = 0;
                shared.outbound = Some(tx);
                // A timer still pending here belongs to an older generation
                // and stands down when it fires.
                shared.reconnect = None;
                None
            } else {
                if current {
                    shared.state = ConnectionState::Closed;
                }
                Some(current)
            }
        };

        if let Some(current) = aborted {
            debug!(generation, "connection opened after disconnect, closing it");
            let frame = CloseFrame::normal(CLIENT_DISCONNECT_REASON);
            if let Err(e) = transport.close(frame.clone()).await {
                debug!(error = %e, "close after aborted connect failed");
            }
            if current {
                self.emit_signal(&ConnectionSignal::Disconnected {
                    code: frame.code,
                    reason: frame.reason,
                });
            }
            return Err(SomoError::ConnectAborted);
        }

        info!(generation, "connection open");
        self.emit_signal(&ConnectionSignal::Connected);
        tokio::spawn(connection_loop(self.clone(), generation, transport, rx));
        Ok(())
    }

    /// Settle a closed connection and decide whether to retry.
    fn handle_close(&self, generation: u64, frame: CloseFrame) {
        let mut signals = Vec::with_capacity(2);
        {
            let mut shared = lock(&self.inner.shared);
            if shared.generation != generation {
                debug!(generation, "ignoring close of a superseded connection");
                return;
            }
            let intentional = frame.code.is_normal() || shared.state == ConnectionState::Closing;
            shared.state = ConnectionState::Closed;
            shared.outbound = None;

            info!(code = %frame.code, reason = %frame.reason, "connection closed");
            signals.push(ConnectionSignal::Disconnected {
                code: frame.code,
                reason: frame.reason,
            });

            let max = self.inner.config.max_reconnect_attempts;
            if intentional {
                debug!("intentional close, not reconnecting");
            } else if shared.attempts < max {
                shared.attempts += 1;
                let attempt = shared.attempts;
                let delay = self.inner.config.backoff_delay(attempt);
                info!(attempt, max, delay_ms = delay.as_millis() as u64, "scheduling reconnect");

                let manager = self.clone();
                let scheduled = shared.generation;
                shared.reconnect = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if !manager.reconnect_due(scheduled) {
                        debug!(attempt, "reconnect timer superseded");
                        return;
                    }
                    debug!(attempt, "reconnect timer fired");
                    if let Err(e) = manager.connect().await {
                        debug!(attempt, error = %e, "reconnect attempt failed");
                    }
                }));
                signals.push(ConnectionSignal::ReconnectScheduled { attempt, delay });
            } else {
                warn!(attempts = shared.attempts, "reconnect attempts exhausted");
                signals.push(ConnectionSignal::ReconnectExhausted {
                    attempts: shared.attempts,
                });
            }
        }

        for signal in &signals {
            self.emit_signal(signal);
        }
    }

    /// A timer may only reconnect the connection it was scheduled for, and
    /// only while that connection is still closed.
    fn reconnect_due(&self, scheduled: u64) -> bool {
        let shared = lock(&self.inner.shared);
        shared.generation == scheduled && shared.state == ConnectionState::Closed
    }

    fn dispatch_frame(&self, text: &str) {
        let event = match decode_event(text) {
            Ok(event) => event,
            Err(e) => {
                warn!("failed to decode server event: {e}, raw: {text}");
                return;
            }
        };
        if event == ServerEvent::Unknown {
            debug!(raw = %text, "unrecognized server event");
        }

        let (specific, any) = {
            let handlers = lock(&self.inner.handlers);
            (
                handlers.by_kind.get(&event.kind()).cloned(),
                handlers.any.clone(),
            )
        };
        if let Some(handler) = specific {
            handler(&event);
        }
        if let Some(handler) = any {
            handler(&event);
        }
    }

    fn emit_signal(&self, signal: &ConnectionSignal) {
        let handler = lock(&self.inner.handlers).signal.clone();
        if let Some(handler) = handler {
            handler(signal);
        }
    }
}

impl<C: Connector> fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = lock(&self.inner.shared);
        f.debug_struct("ConnectionManager")
            .field("url", &self.inner.config.url)
            .field("state", &shared.state)
            .field("attempts", &shared.attempts)
            .finish()
    }
}

// ── Connection loop ─────────────────────────────────────────────────

/// Drives one open transport until it closes.
///
/// Exits when:
/// - the manager requests a close (`disconnect`)
/// - the server closes the connection
/// - a transport error occurs (handled as an abnormal close)
async fn connection_loop<C: Connector>(
    manager: ConnectionManager<C>,
    generation: u64,
    mut transport: C::Transport,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    debug!(generation, "connection loop started");

    let frame = loop {
        tokio::select! {
            cmd = outbound.recv() => {
                match cmd {
                    Some(Outbound::Text(json)) => {
                        if let Err(e) = transport.send(json).await {
                            error!("transport send error: {e}");
                            manager.emit_signal(&ConnectionSignal::Error { message: e.to_string() });
                            let _ = transport.close(CloseFrame::abnormal("send failed")).await;
                            break CloseFrame::abnormal(format!("transport send error: {e}"));
                        }
                    }
                    Some(Outbound::Close(frame)) => {
                        if let Err(e) = transport.close(frame.clone()).await {
                            debug!("transport close error: {e}");
                        }
                        break frame;
                    }
                    // Sender released without an explicit close.
                    None => {
                        let frame = CloseFrame::normal(CLIENT_DISCONNECT_REASON);
                        let _ = transport.close(frame.clone()).await;
                        break frame;
                    }
                }
            }

            incoming = transport.recv() => {
                match incoming {
                    Ok(TransportEvent::Message(text)) => manager.dispatch_frame(&text),
                    Ok(TransportEvent::Closed(frame)) => {
                        debug!(code = %frame.code, "transport closed by server");
                        break frame;
                    }
                    Err(e) => {
                        error!("transport receive error: {e}");
                        manager.emit_signal(&ConnectionSignal::Error { message: e.to_string() });
                        break CloseFrame::abnormal(e.to_string());
                    }
                }
            }
        }
    };

    manager.handle_close(generation, frame);
    debug!(generation, "connection loop exited");
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Connector whose transports never open.
    struct RefusingConnector;

    struct NeverTransport;

    #[async_trait]
    impl Transport for NeverTransport {
        async fn send(&mut self, _message: String) -> Result<()> {
            Ok(())
        }

        async fn recv(&mut self) -> Result<TransportEvent> {
            std::future::pending().await
        }

        async fn close(&mut self, _frame: CloseFrame) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for RefusingConnector {
        type Transport = NeverTransport;

        async fn connect(&self, _url: &str) -> Result<NeverTransport> {
            Err(SomoError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )))
        }
    }

    #[test]
    fn new_manager_is_idle() {
        let manager = ConnectionManager::new(RefusingConnector, ClientConfig::default());
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert!(!manager.is_open());
        assert_eq!(manager.reconnect_attempts(), 0);
    }

    #[test]
    fn send_while_idle_is_dropped() {
        let manager = ConnectionManager::new(RefusingConnector, ClientConfig::default());
        let sent = manager.send(ClientAction::PassTurn {
            room_id: "ABC123".into(),
        });
        assert!(!sent);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_open_reports_error_then_schedules_retry() {
        let manager = ConnectionManager::new(RefusingConnector, ClientConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        manager.on_signal(move |s| sink.lock().unwrap().push(s.clone()));

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, SomoError::ConnectionFailed(_)));
        assert_eq!(manager.state(), ConnectionState::Closed);

        let seen = seen.lock().unwrap();
        assert!(matches!(seen[0], ConnectionSignal::Error { .. }));
        assert!(matches!(
            seen[1],
            ConnectionSignal::Disconnected { code: CloseCode::ABNORMAL, .. }
        ));
        assert_eq!(
            seen[2],
            ConnectionSignal::ReconnectScheduled {
                attempt: 1,
                delay: Duration::from_millis(1000)
            }
        );
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_reconnect() {
        let manager = ConnectionManager::new(RefusingConnector, ClientConfig::default());
        let _ = manager.connect().await;
        assert_eq!(manager.reconnect_attempts(), 1);

        manager.disconnect();
        tokio::time::sleep(Duration::from_secs(60)).await;

        // The cancelled timer never ran, so no second attempt was counted.
        assert_eq!(manager.reconnect_attempts(), 1);
        assert_eq!(manager.state(), ConnectionState::Closed);
    }
}
