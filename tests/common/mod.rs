#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for SOMO client integration tests.
//!
//! Provides a scripted [`MockConnector`] whose transports are driven through
//! per-connection [`MockServer`] handles, plus helpers for building server
//! event JSON.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use somo_client::protocol::{
    Card, CardKind, ClientAction, Direction, PlayerState, RoomSnapshot, RoomStatePayload,
    ServerEvent,
};
use somo_client::transport::{CloseCode, CloseFrame, Connector, Transport, TransportEvent};
use somo_client::{ConnectionManager, ConnectionSignal, SomoError};
use tokio::sync::mpsc;
use tokio::time::Instant;

// ── MockTransport ───────────────────────────────────────────────────

type Inbound = Result<TransportEvent, SomoError>;

/// Test-side handle to one accepted connection.
#[derive(Clone)]
pub struct MockServer {
    inbound: mpsc::UnboundedSender<Inbound>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed_with: Arc<StdMutex<Option<CloseFrame>>>,
}

impl MockServer {
    /// Deliver one text frame to the client.
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.inbound.send(Ok(TransportEvent::Message(text.into())));
    }

    /// Deliver one server event to the client.
    pub fn push_event(&self, event: &ServerEvent) {
        self.push(serde_json::to_string(event).expect("event serialization"));
    }

    /// Close the connection from the server side.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.inbound.send(Ok(TransportEvent::Closed(CloseFrame {
            code: CloseCode(code),
            reason: reason.into(),
        })));
    }

    /// Make the next `recv` fail with a transport error.
    pub fn fail(&self, message: &str) {
        let _ = self
            .inbound
            .send(Err(SomoError::TransportReceive(message.into())));
    }

    /// Raw frames the client sent on this connection.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Actions the client sent on this connection.
    pub fn sent_actions(&self) -> Vec<ClientAction> {
        self.sent()
            .iter()
            .map(|raw| serde_json::from_str(raw).expect("client sent invalid JSON"))
            .collect()
    }

    /// The frame the client closed this connection with, if it did.
    pub fn closed_with(&self) -> Option<CloseFrame> {
        self.closed_with.lock().unwrap().clone()
    }
}

/// Transport half of a [`MockServer`].
pub struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed_with: Arc<StdMutex<Option<CloseFrame>>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), SomoError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Result<TransportEvent, SomoError> {
        match self.inbound.recv().await {
            Some(item) => item,
            // Server handle dropped; stay open until the client closes.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self, frame: CloseFrame) -> Result<(), SomoError> {
        *self.closed_with.lock().unwrap() = Some(frame);
        Ok(())
    }
}

fn mock_pair() -> (MockServer, MockTransport) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(StdMutex::new(Vec::new()));
    let closed_with = Arc::new(StdMutex::new(None));
    let server = MockServer {
        inbound: tx,
        sent: Arc::clone(&sent),
        closed_with: Arc::clone(&closed_with),
    };
    let transport = MockTransport {
        inbound: rx,
        sent,
        closed_with,
    };
    (server, transport)
}

// ── MockConnector ───────────────────────────────────────────────────

/// What the connector does on one connection attempt.
#[derive(Debug, Clone, Copy)]
pub enum Plan {
    Accept,
    Refuse(&'static str),
}

#[derive(Default)]
struct ConnectorState {
    plan: VecDeque<Plan>,
    servers: Vec<MockServer>,
    attempts: Vec<Instant>,
    open_delay: Duration,
}

/// Scripted connector. Attempts follow the queued [`Plan`]s and accept once
/// the queue is empty.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<StdMutex<ConnectorState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue plans for the next attempts.
    pub fn script(&self, plans: impl IntoIterator<Item = Plan>) {
        self.state.lock().unwrap().plan.extend(plans);
    }

    /// Delay every attempt by `delay` before it resolves.
    pub fn set_open_delay(&self, delay: Duration) {
        self.state.lock().unwrap().open_delay = delay;
    }

    /// Number of connection attempts so far.
    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts.len()
    }

    /// When each attempt started.
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().attempts.clone()
    }

    /// Handle to the `index`-th accepted connection.
    pub fn server(&self, index: usize) -> MockServer {
        self.state.lock().unwrap().servers[index].clone()
    }

    /// Handle to the most recently accepted connection.
    pub fn last_server(&self) -> MockServer {
        self.state
            .lock()
            .unwrap()
            .servers
            .last()
            .cloned()
            .expect("no connection was accepted")
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, _url: &str) -> Result<MockTransport, SomoError> {
        let (plan, delay) = {
            let mut state = self.state.lock().unwrap();
            state.attempts.push(Instant::now());
            (
                state.plan.pop_front().unwrap_or(Plan::Accept),
                state.open_delay,
            )
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match plan {
            Plan::Accept => {
                let (server, transport) = mock_pair();
                self.state.lock().unwrap().servers.push(server);
                Ok(transport)
            }
            Plan::Refuse(reason) => Err(SomoError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                reason,
            ))),
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Forward every lifecycle signal of `manager` into a channel.
pub fn record_signals(
    manager: &ConnectionManager<MockConnector>,
) -> mpsc::UnboundedReceiver<ConnectionSignal> {
    let (tx, rx) = mpsc::unbounded_channel();
    manager.on_signal(move |signal| {
        let _ = tx.send(signal.clone());
    });
    rx
}

/// Forward every server event of `manager` into a channel.
pub fn record_events(
    manager: &ConnectionManager<MockConnector>,
) -> mpsc::UnboundedReceiver<ServerEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    manager.on_any(move |event| {
        let _ = tx.send(event.clone());
    });
    rx
}

/// Receive the next signal, failing the test if none arrives within a minute.
pub async fn next_signal(rx: &mut mpsc::UnboundedReceiver<ConnectionSignal>) -> ConnectionSignal {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for a signal")
        .expect("signal channel closed")
}

/// Let spawned tasks run until they are all idle.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn player(id: &str, nickname: &str) -> PlayerState {
    PlayerState {
        id: id.into(),
        nickname: nickname.into(),
        tokens: 3,
        hand_count: 5,
        is_bot: false,
        is_eliminated: false,
    }
}

pub fn number(id: &str, value: u8) -> Card {
    Card {
        id: id.into(),
        kind: CardKind::Number,
        value: Some(value),
    }
}

/// A two-player room `ABC123` hosted by `p1`, not started yet.
pub fn lobby_room() -> RoomSnapshot {
    RoomSnapshot {
        id: "ABC123".into(),
        players: vec![player("p1", "Ana"), player("p2", "Bruno")],
        max_players: 8,
        host_id: Some("p1".into()),
        game_started: false,
        current_turn: None,
        direction: Direction::Clockwise,
        accumulated_sum: 0,
        round_limit: 0,
        pending_effect: None,
        deck_count: 52,
        discard_top: None,
        turn_order: vec!["p1".into(), "p2".into()],
    }
}

pub fn room_state(room: RoomSnapshot, hand: Vec<Card>, self_id: &str) -> ServerEvent {
    ServerEvent::RoomState(Box::new(RoomStatePayload {
        room,
        self_hand: Some(hand),
        self_id: Some(self_id.into()),
    }))
}
