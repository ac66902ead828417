//! [`GameSession`]: one connection manager wired to one client store.
//!
//! The manager's handlers only forward what they receive into a channel. The
//! session owns the store and applies those inputs one at a time, in arrival
//! order, when the caller drives it with [`process_next`](GameSession::process_next)
//! or [`drain`](GameSession::drain).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), somo_client::SomoError> {
//! use somo_client::{ClientConfig, GameSession, WebSocketConnector};
//!
//! let config = ClientConfig::from_env();
//! let connector = WebSocketConnector::new(config.connect_timeout);
//! let mut session = GameSession::new(connector, config);
//!
//! session.start().await?;
//! session.join_room("ABC123", "Ana");
//!
//! while session.process_next().await {
//!     if session.store().is_my_turn() {
//!         session.pass_turn();
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionSignal};
use crate::encoder::{encode, intent_for_card, Intent};
use crate::error::Result;
use crate::protocol::{BotDifficulty, RoomId, ServerEvent, SpecialKind};
use crate::store::ClientStore;
use crate::transport::Connector;

/// Something the connection manager reported.
#[derive(Debug)]
enum SessionInput {
    Signal(ConnectionSignal),
    Event(ServerEvent),
}

/// The client's composition root.
pub struct GameSession<C: Connector> {
    manager: ConnectionManager<C>,
    store: ClientStore,
    inputs: mpsc::UnboundedReceiver<SessionInput>,
    initialized: bool,
    closed: bool,
}

impl<C: Connector> GameSession<C> {
    /// Build a session. Nothing connects until [`start`](Self::start) or
    /// [`connect`](Self::connect).
    pub fn new(connector: C, config: ClientConfig) -> Self {
        let (tx, inputs) = mpsc::unbounded_channel();
        let store = ClientStore::new(config.notification_ttl);
        let manager = ConnectionManager::new(connector, config);

        let events = tx.clone();
        manager.on_any(move |event| {
            let _ = events.send(SessionInput::Event(event.clone()));
        });
        manager.on_signal(move |signal| {
            let _ = tx.send(SessionInput::Signal(signal.clone()));
        });

        Self {
            manager,
            store,
            inputs,
            initialized: false,
            closed: false,
        }
    }

    /// Connect once. Later calls do nothing, even after the connection dropped.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect).
    pub async fn start(&mut self) -> Result<()> {
        if self.initialized {
            debug!("session already initialized");
            return Ok(());
        }
        self.initialized = true;
        info!(url = %self.manager.config().url, "starting session");
        self.connect().await
    }

    /// Returns `true` once [`start`](Self::start) has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Open the connection and apply whatever it reported.
    ///
    /// # Errors
    ///
    /// Returns the error of [`ConnectionManager::connect`]. The store has
    /// already recorded the failure.
    pub async fn connect(&mut self) -> Result<()> {
        self.closed = false;
        if !self.manager.is_open() {
            self.store.mark_connecting();
        }
        let result = self.manager.connect().await;
        if result.is_err() {
            self.store.connect_failed();
        }
        self.drain();
        result
    }

    /// Close the connection without reconnecting.
    pub fn disconnect(&mut self) {
        self.closed = true;
        self.manager.disconnect();
        self.store.mark_disconnected();
    }

    /// Wait for the next server event, connection signal or notification
    /// expiry and apply it.
    ///
    /// Returns `false` without waiting once the session is closed: after
    /// [`disconnect`](Self::disconnect), or after automatic reconnection gave
    /// up. A later [`connect`](Self::connect) resumes processing.
    pub async fn process_next(&mut self) -> bool {
        if self.closed {
            return false;
        }
        tokio::select! {
            input = self.inputs.recv() => match input {
                Some(input) => {
                    self.apply(input);
                    true
                }
                None => false,
            },
            Some(id) = self.store.next_expired() => {
                debug!(%id, "notification expired");
                true
            }
        }
    }

    /// Apply everything that is already queued without waiting.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(input) = self.inputs.try_recv() {
            self.apply(input);
            applied += 1;
        }
        applied + self.store.drain_expired()
    }

    fn apply(&mut self, input: SessionInput) {
        match input {
            SessionInput::Signal(signal) => {
                if let ConnectionSignal::ReconnectExhausted { attempts } = signal {
                    info!(attempts, "reconnection gave up, session closed");
                    self.closed = true;
                }
                self.store.apply_signal(&signal);
            }
            SessionInput::Event(event) => self.store.apply_event(event),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn store(&self) -> &ClientStore {
        &self.store
    }

    /// Mutable access for the store's UI actions.
    pub fn store_mut(&mut self) -> &mut ClientStore {
        &mut self.store
    }

    pub fn manager(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Ask the server for a new room. Also fills the nickname field.
    pub fn create_room(&mut self, nickname: &str, max_players: Option<u8>) -> bool {
        self.store.set_nickname(nickname);
        self.send(Intent::CreateRoom {
            nickname: nickname.to_string(),
            max_players,
        })
    }

    /// Join an existing room. Also fills the nickname and room code fields.
    pub fn join_room(&mut self, room_id: &str, nickname: &str) -> bool {
        self.store.set_nickname(nickname);
        self.store.set_room_code(room_id);
        self.send(Intent::JoinRoom {
            room_id: room_id.to_string(),
            nickname: nickname.to_string(),
        })
    }

    pub fn start_game(&self) -> bool {
        self.with_room(|room_id| Intent::StartGame { room_id })
    }

    pub fn play_card(&self, card_id: &str, as_value: Option<u8>) -> bool {
        self.with_room(|room_id| Intent::PlayCard {
            room_id,
            card_id: card_id.to_string(),
            as_value,
        })
    }

    pub fn play_special(&self, card_id: &str, kind: SpecialKind) -> bool {
        self.with_room(|room_id| Intent::PlaySpecial {
            room_id,
            card_id: card_id.to_string(),
            kind,
        })
    }

    pub fn pass_turn(&self) -> bool {
        self.with_room(|room_id| Intent::PassTurn { room_id })
    }

    pub fn add_bot(&self, difficulty: Option<BotDifficulty>) -> bool {
        self.with_room(|room_id| Intent::AddBot {
            room_id,
            difficulty,
        })
    }

    /// Send a chat line. Blank messages are not sent.
    pub fn send_chat(&self, message: &str) -> bool {
        let message = message.trim();
        if message.is_empty() {
            return false;
        }
        self.with_room(|room_id| Intent::Chat {
            room_id,
            message: message.to_string(),
        })
    }

    /// Play a card from the hand by id, picking the right action for its kind.
    pub fn play_from_hand(&self, card_id: &str, joker_value: u8) -> bool {
        let Some(card) = self.store.self_hand().iter().find(|c| c.id == card_id) else {
            debug!(card_id, "card not in hand");
            return false;
        };
        self.with_room(|room_id| intent_for_card(&room_id, card, joker_value))
    }

    /// Leave the room view and clear all local state. The connection stays up.
    pub fn leave_room(&mut self) {
        self.store.reset();
        self.store.sync_connection(self.manager.is_open());
    }

    fn with_room(&self, build: impl FnOnce(RoomId) -> Intent) -> bool {
        match self.store.room() {
            Some(room) => self.send(build(room.id.clone())),
            None => {
                debug!("no current room, intent ignored");
                false
            }
        }
    }

    fn send(&self, intent: Intent) -> bool {
        self.manager.send(encode(intent))
    }
}

impl<C: Connector> Drop for GameSession<C> {
    fn drop(&mut self) {
        self.manager.disconnect();
    }
}

impl<C: Connector> std::fmt::Debug for GameSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("manager", &self.manager)
            .field("initialized", &self.initialized)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
