//! Client-side mirror of the room, the player's hand and the UI state.
//!
//! [`ClientStore`] is a reducer: it changes only through
//! [`apply_event`](ClientStore::apply_event),
//! [`apply_signal`](ClientStore::apply_signal) and the named UI actions below.
//! The room snapshot and the hand are only ever replaced wholesale by a
//! `room_state` event, so they always match what the server last reported.
//!
//! Notifications expire on their own. Each one with a TTL spawns a timer task
//! that posts its id back to the store; the owner applies those expiries with
//! [`next_expired`](ClientStore::next_expired) or
//! [`drain_expired`](ClientStore::drain_expired).

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::connection::ConnectionSignal;
use crate::legality;
use crate::protocol::{
    Card, EffectKind, PlayerId, PlayerState, RoomSnapshot, RoomStatePayload, RoundResetReason,
    ServerEvent,
};

/// Lifetime of the game-over announcement.
pub const GAME_OVER_TTL: Duration = Duration::from_millis(10_000);

/// Identifier of a [`Notification`].
pub type NotificationId = Uuid;

/// Which screen the UI shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Lobby,
    Room,
}

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient message for the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub severity: Severity,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// `None` means the notification stays until dismissed.
    pub ttl: Option<Duration>,
}

/// One line of room chat. The chat log is append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub id: Uuid,
    pub player_id: PlayerId,
    pub nickname: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything the UI renders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameState {
    pub connected: bool,
    pub connecting: bool,
    pub room: Option<RoomSnapshot>,
    pub self_hand: Vec<Card>,
    pub view: View,
    pub show_chat: bool,
    pub chat: Vec<ChatEntry>,
    pub notifications: Vec<Notification>,
    /// Nickname form field.
    pub nickname: String,
    /// Room code form field.
    pub room_code: String,
    pub self_id: Option<PlayerId>,
}

/// Reducer over [`GameState`].
#[derive(Debug)]
pub struct ClientStore {
    state: GameState,
    default_ttl: Duration,
    expiry_tx: mpsc::UnboundedSender<NotificationId>,
    expiry_rx: mpsc::UnboundedReceiver<NotificationId>,
}

impl ClientStore {
    /// Create a store in the initial state. Notifications added without an
    /// explicit TTL live for `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        Self {
            state: GameState::default(),
            default_ttl,
            expiry_tx,
            expiry_rx,
        }
    }

    /// The current state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    // ── Reducers ────────────────────────────────────────────────────

    /// Apply a connection lifecycle signal.
    pub fn apply_signal(&mut self, signal: &ConnectionSignal) {
        match signal {
            ConnectionSignal::Connected => {
                self.state.connected = true;
                self.state.connecting = false;
                self.add_notification(Severity::Success, "Connected to server");
            }
            ConnectionSignal::Disconnected { code, .. } => {
                debug!(%code, "store: disconnected");
                self.state.connected = false;
                self.state.connecting = false;
                self.add_notification(Severity::Error, "Disconnected from server");
            }
            ConnectionSignal::Error { message } => {
                debug!(%message, "store: connection error");
                self.state.connected = false;
                self.state.connecting = false;
                self.add_notification(Severity::Error, "Connection error");
            }
            ConnectionSignal::ReconnectScheduled { attempt, delay } => {
                self.state.connecting = true;
                self.add_notification(
                    Severity::Info,
                    format!(
                        "Reconnecting in {:.1}s (attempt {attempt})",
                        delay.as_secs_f64()
                    ),
                );
            }
            ConnectionSignal::ReconnectExhausted { attempts } => {
                self.state.connecting = false;
                self.add_notification(
                    Severity::Error,
                    format!("Could not reconnect after {attempts} attempts"),
                );
            }
        }
    }

    /// Apply one server event.
    pub fn apply_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::RoomState(payload) => {
                let RoomStatePayload {
                    room,
                    self_hand,
                    self_id,
                } = *payload;
                debug!(room = %room.id, players = room.players.len(), "room state replaced");
                self.state.room = Some(room);
                self.state.self_hand = self_hand.unwrap_or_default();
                self.state.view = View::Room;
                if self_id.is_some() {
                    self.state.self_id = self_id;
                }
            }
            ServerEvent::RoundStarted { limit } => {
                self.add_notification(Severity::Info, format!("New round! Limit: {limit}"));
            }
            ServerEvent::CardPlayed { player_id, .. } => {
                if let Some(name) = self.nickname_of(&player_id) {
                    self.add_notification(Severity::Info, format!("{name} played a card"));
                }
            }
            ServerEvent::EffectSet {
                kind,
                source_player_id,
            } => {
                if let Some(name) = self.nickname_of(&source_player_id) {
                    let effect = match kind {
                        EffectKind::Plus2 => "+2",
                        EffectKind::Times2 => "x2",
                    };
                    self.add_notification(Severity::Warning, format!("{name} activated {effect}"));
                }
            }
            ServerEvent::SumReset { by_player_id } => {
                if let Some(name) = self.nickname_of(&by_player_id) {
                    self.add_notification(Severity::Info, format!("{name} reset the sum"));
                }
            }
            ServerEvent::DirectionChanged { clockwise } => {
                let direction = if clockwise {
                    "clockwise"
                } else {
                    "counter-clockwise"
                };
                self.add_notification(
                    Severity::Info,
                    format!("Direction changed to {direction}"),
                );
            }
            ServerEvent::Penalty {
                player_id,
                tokens_left,
            } => {
                if let Some(name) = self.nickname_of(&player_id) {
                    self.add_notification(
                        Severity::Error,
                        format!("{name} lost a token ({tokens_left} left)"),
                    );
                }
            }
            ServerEvent::DrawCards { players } => {
                for draw in players {
                    if let Some(name) = self.nickname_of(&draw.id) {
                        self.add_notification(
                            Severity::Info,
                            format!("{name} drew {} cards", draw.amount),
                        );
                    }
                }
            }
            ServerEvent::RoundReset { reason } => {
                let reason = match reason {
                    RoundResetReason::ExactHit => "exact hit",
                    RoundResetReason::Penalty => "penalty",
                };
                self.add_notification(Severity::Info, format!("Round restarted ({reason})"));
            }
            ServerEvent::TurnChanged { player_id } => {
                if self.state.self_id.as_deref() == Some(player_id.as_str()) {
                    self.add_notification(Severity::Info, "Your turn");
                } else if let Some(name) = self.nickname_of(&player_id) {
                    self.add_notification(Severity::Info, format!("{name}'s turn"));
                }
            }
            ServerEvent::GameOver { winner_id } => {
                if let Some(name) = self.nickname_of(&winner_id) {
                    self.add_notification_with_ttl(
                        Severity::Success,
                        format!("{name} won the game!"),
                        GAME_OVER_TTL,
                    );
                }
            }
            ServerEvent::Chat {
                player_id,
                nickname,
                message,
            } => {
                self.state.chat.push(ChatEntry {
                    id: Uuid::new_v4(),
                    player_id,
                    nickname,
                    message,
                    timestamp: Utc::now(),
                });
            }
            ServerEvent::Error { code, message } => {
                debug!(%code, %message, "server reported an error");
                self.add_notification(Severity::Error, format!("Error: {message}"));
            }
            ServerEvent::Unknown => {
                debug!("ignoring unrecognized server event");
            }
        }
    }

    // ── Connection flags ────────────────────────────────────────────

    /// A connection attempt started.
    pub fn mark_connecting(&mut self) {
        self.state.connecting = true;
    }

    /// The initial connection attempt failed.
    pub fn connect_failed(&mut self) {
        self.state.connecting = false;
        self.add_notification(Severity::Error, "Failed to connect");
    }

    /// The player asked to disconnect.
    pub fn mark_disconnected(&mut self) {
        self.state.connected = false;
        self.state.connecting = false;
    }

    /// Overwrite the connection flag, e.g. after [`reset`](Self::reset)
    /// while the connection stays open.
    pub fn sync_connection(&mut self, connected: bool) {
        self.state.connected = connected;
    }

    // ── UI actions ──────────────────────────────────────────────────

    /// Restore the initial state.
    pub fn reset(&mut self) {
        self.state = GameState::default();
    }

    pub fn set_view(&mut self, view: View) {
        self.state.view = view;
    }

    pub fn toggle_chat(&mut self) {
        self.state.show_chat = !self.state.show_chat;
    }

    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.state.nickname = nickname.into();
    }

    pub fn set_room_code(&mut self, room_code: impl Into<String>) {
        self.state.room_code = room_code.into();
    }

    // ── Notifications ───────────────────────────────────────────────

    /// Add a notification that expires after the default TTL.
    pub fn add_notification(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
    ) -> NotificationId {
        self.add_notification_with_ttl(severity, message, self.default_ttl)
    }

    /// Add a notification that expires after `ttl`. A zero TTL keeps it until
    /// it is dismissed.
    pub fn add_notification_with_ttl(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        ttl: Duration,
    ) -> NotificationId {
        let id = Uuid::new_v4();
        let ttl = (!ttl.is_zero()).then_some(ttl);
        self.state.notifications.push(Notification {
            id,
            severity,
            message: message.into(),
            created_at: Utc::now(),
            ttl,
        });

        if let Some(ttl) = ttl {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let tx = self.expiry_tx.clone();
                    handle.spawn(async move {
                        tokio::time::sleep(ttl).await;
                        let _ = tx.send(id);
                    });
                }
                Err(_) => {
                    warn!(%id, "no tokio runtime, notification will not expire on its own");
                }
            }
        }
        id
    }

    /// Dismiss a notification. Returns `false` if it was already gone.
    pub fn remove_notification(&mut self, id: NotificationId) -> bool {
        let before = self.state.notifications.len();
        self.state.notifications.retain(|n| n.id != id);
        before != self.state.notifications.len()
    }

    /// Wait for the next notification timer to fire and remove that
    /// notification. Returns its id.
    pub async fn next_expired(&mut self) -> Option<NotificationId> {
        let id = self.expiry_rx.recv().await?;
        self.remove_notification(id);
        Some(id)
    }

    /// Remove every notification whose timer already fired.
    pub fn drain_expired(&mut self) -> usize {
        let mut removed = 0;
        while let Ok(id) = self.expiry_rx.try_recv() {
            if self.remove_notification(id) {
                removed += 1;
            }
        }
        removed
    }

    // ── Derived queries ─────────────────────────────────────────────

    /// The current room, if any.
    pub fn room(&self) -> Option<&RoomSnapshot> {
        self.state.room.as_ref()
    }

    /// The local player's hand.
    pub fn self_hand(&self) -> &[Card] {
        &self.state.self_hand
    }

    /// Returns `true` if the game is running and it is the local player's turn.
    pub fn is_my_turn(&self) -> bool {
        match (self.room(), self.state.self_id.as_deref()) {
            (Some(room), Some(self_id)) => legality::is_players_turn(room, self_id),
            _ => false,
        }
    }

    /// Returns `true` if the local player hosts the current room.
    pub fn is_host(&self) -> bool {
        match (self.room(), self.state.self_id.as_deref()) {
            (Some(room), Some(self_id)) => room.host_id.as_deref() == Some(self_id),
            _ => false,
        }
    }

    /// The local player's seat in the current room.
    pub fn self_player(&self) -> Option<&PlayerState> {
        let self_id = self.state.self_id.as_deref()?;
        self.room()?.player(self_id)
    }

    /// Whether the local player may add a bot right now.
    pub fn can_add_bot(&self) -> bool {
        self.is_host()
            && self
                .room()
                .is_some_and(|room| room.players.len() < usize::from(room.max_players))
    }

    /// Whether the local player may start the game right now.
    pub fn can_start_game(&self) -> bool {
        self.is_host()
            && self
                .room()
                .is_some_and(|room| !room.game_started && room.players.len() >= 2)
    }

    /// Whether `card` may be played right now. Advisory only.
    pub fn can_play(&self, card: &Card) -> bool {
        match (self.room(), self.state.self_id.as_deref()) {
            (Some(room), Some(self_id)) => legality::can_play(room, self_id, card),
            _ => false,
        }
    }

    fn nickname_of(&self, player_id: &str) -> Option<String> {
        let nickname = self
            .room()
            .and_then(|room| room.player(player_id))
            .map(|player| player.nickname.clone());
        if nickname.is_none() {
            debug!(player_id, "event references a player not in the room");
        }
        nickname
    }
}

impl Default for ClientStore {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000))
    }
}
