//! Wire-compatible protocol types for the SOMO game server.
//!
//! Every message is a single JSON text frame. Client actions carry an
//! `action` discriminator, server events carry an `event` discriminator.
//!
//! - Cards use the server's short kind names (`plus2`, `times2`, `reset0`).
//! - `direction` travels as a boolean (`true` = clockwise).
//! - Optional fields are omitted on the wire when absent.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::error_codes::ErrorCode;

// ── Type aliases ────────────────────────────────────────────────────

/// Server-issued player identifier.
pub type PlayerId = String;

/// Server-issued room code (e.g. `"ABC123"`).
pub type RoomId = String;

/// Server-issued card identifier.
pub type CardId = String;

// ── Enums ───────────────────────────────────────────────────────────

/// The kind of a card.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    Number,
    Joker,
    Plus2,
    Times2,
    Reset0,
    Reverse,
}

impl CardKind {
    /// The special-card kind for this card, or `None` for number and joker cards.
    pub fn special(self) -> Option<SpecialKind> {
        match self {
            Self::Number | Self::Joker => None,
            Self::Plus2 => Some(SpecialKind::Plus2),
            Self::Times2 => Some(SpecialKind::Times2),
            Self::Reset0 => Some(SpecialKind::Reset0),
            Self::Reverse => Some(SpecialKind::Reverse),
        }
    }
}

/// Special cards that are played through `play_special`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SpecialKind {
    Plus2,
    Times2,
    Reset0,
    Reverse,
}

/// Effects that stay pending until the next card is played.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Plus2,
    Times2,
}

/// Bot strength requested through `add_bot`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum BotDifficulty {
    #[default]
    Low,
    Mid,
    High,
}

/// Why the server restarted a round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundResetReason {
    Penalty,
    ExactHit,
}

/// Turn direction around the table.
///
/// Encoded as a boolean on the wire: `true` is clockwise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(from = "bool", into = "bool")]
pub enum Direction {
    #[default]
    Clockwise,
    CounterClockwise,
}

impl From<bool> for Direction {
    fn from(clockwise: bool) -> Self {
        if clockwise {
            Self::Clockwise
        } else {
            Self::CounterClockwise
        }
    }
}

impl From<Direction> for bool {
    fn from(direction: Direction) -> Self {
        matches!(direction, Direction::Clockwise)
    }
}

// ── Structs ─────────────────────────────────────────────────────────

/// A single card. Only the server creates or removes cards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub kind: CardKind,
    /// Face value, present for number cards and for jokers once played.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u8>,
}

/// An effect waiting to apply to the next played card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingEffect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<i32>,
    pub source_player_id: PlayerId,
}

/// Public view of one seat at the table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerState {
    pub id: PlayerId,
    pub nickname: String,
    pub tokens: u32,
    pub hand_count: u32,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub is_eliminated: bool,
}

/// The server-authoritative state of a room at one point in time.
///
/// Always replaced wholesale by the next `room_state` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub id: RoomId,
    #[serde(default)]
    pub players: Vec<PlayerState>,
    pub max_players: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<PlayerId>,
    #[serde(default)]
    pub game_started: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_turn: Option<PlayerId>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub accumulated_sum: i32,
    #[serde(default)]
    pub round_limit: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_effect: Option<PendingEffect>,
    #[serde(default)]
    pub deck_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discard_top: Option<Card>,
    #[serde(default)]
    pub turn_order: Vec<PlayerId>,
}

impl RoomSnapshot {
    /// Look up a player by id.
    pub fn player(&self, id: &str) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id == id)
    }
}

/// One entry of a `draw_cards` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDraw {
    pub id: PlayerId,
    pub amount: u32,
}

// ── Messages ────────────────────────────────────────────────────────

/// Actions sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    CreateRoom {
        nickname: String,
        max_players: u8,
    },
    JoinRoom {
        room_id: RoomId,
        nickname: String,
    },
    StartGame {
        room_id: RoomId,
    },
    PlayCard {
        room_id: RoomId,
        card_id: CardId,
        /// Value chosen for a joker (0–9).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        as_value: Option<u8>,
    },
    PlaySpecial {
        room_id: RoomId,
        card_id: CardId,
        #[serde(rename = "type")]
        kind: SpecialKind,
    },
    PassTurn {
        room_id: RoomId,
    },
    Chat {
        room_id: RoomId,
        message: String,
    },
    AddBot {
        room_id: RoomId,
        #[serde(default)]
        difficulty: BotDifficulty,
    },
}

impl ClientAction {
    /// The wire tag of this action, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::StartGame { .. } => "start_game",
            Self::PlayCard { .. } => "play_card",
            Self::PlaySpecial { .. } => "play_special",
            Self::PassTurn { .. } => "pass_turn",
            Self::Chat { .. } => "chat",
            Self::AddBot { .. } => "add_bot",
        }
    }
}

/// Events sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full room state plus the receiving player's own hand (boxed to reduce enum size).
    RoomState(Box<RoomStatePayload>),
    RoundStarted {
        limit: i32,
    },
    CardPlayed {
        player_id: PlayerId,
        card: Card,
        sum: i32,
    },
    EffectSet {
        #[serde(rename = "type")]
        kind: EffectKind,
        source_player_id: PlayerId,
    },
    SumReset {
        by_player_id: PlayerId,
    },
    DirectionChanged {
        clockwise: bool,
    },
    Penalty {
        player_id: PlayerId,
        tokens_left: u32,
    },
    DrawCards {
        players: Vec<CardDraw>,
    },
    RoundReset {
        reason: RoundResetReason,
    },
    TurnChanged {
        player_id: PlayerId,
    },
    GameOver {
        winner_id: PlayerId,
    },
    Chat {
        player_id: PlayerId,
        nickname: String,
        message: String,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
    /// Any event name this client version does not know.
    #[serde(other)]
    Unknown,
}

/// Payload of the `room_state` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomStatePayload {
    pub room: RoomSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_hand: Option<Vec<Card>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_id: Option<PlayerId>,
}

/// Handler key for [`ServerEvent`] subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerEventKind {
    RoomState,
    RoundStarted,
    CardPlayed,
    EffectSet,
    SumReset,
    DirectionChanged,
    Penalty,
    DrawCards,
    RoundReset,
    TurnChanged,
    GameOver,
    Chat,
    Error,
    Unknown,
}

impl ServerEvent {
    /// The subscription key for this event.
    pub fn kind(&self) -> ServerEventKind {
        match self {
            Self::RoomState(_) => ServerEventKind::RoomState,
            Self::RoundStarted { .. } => ServerEventKind::RoundStarted,
            Self::CardPlayed { .. } => ServerEventKind::CardPlayed,
            Self::EffectSet { .. } => ServerEventKind::EffectSet,
            Self::SumReset { .. } => ServerEventKind::SumReset,
            Self::DirectionChanged { .. } => ServerEventKind::DirectionChanged,
            Self::Penalty { .. } => ServerEventKind::Penalty,
            Self::DrawCards { .. } => ServerEventKind::DrawCards,
            Self::RoundReset { .. } => ServerEventKind::RoundReset,
            Self::TurnChanged { .. } => ServerEventKind::TurnChanged,
            Self::GameOver { .. } => ServerEventKind::GameOver,
            Self::Chat { .. } => ServerEventKind::Chat,
            Self::Error { .. } => ServerEventKind::Error,
            Self::Unknown => ServerEventKind::Unknown,
        }
    }
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns [`SomoError::Serialization`](crate::SomoError::Serialization) when
/// the frame is not JSON or a known event is missing required fields.
pub fn decode_event(text: &str) -> Result<ServerEvent> {
    Ok(serde_json::from_str(text)?)
}

/// Encode one outbound action as a JSON text frame.
///
/// # Errors
///
/// Returns [`SomoError::Serialization`](crate::SomoError::Serialization) if
/// serialization fails.
pub fn encode_action(action: &ClientAction) -> Result<String> {
    Ok(serde_json::to_string(action)?)
}
