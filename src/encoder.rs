//! Typed player intents and their mapping to wire actions.
//!
//! An [`Intent`] says what the player wants to do. Its optional fields are
//! filled in with server defaults when it is turned into a [`ClientAction`].

use crate::protocol::{BotDifficulty, Card, CardId, CardKind, ClientAction, RoomId, SpecialKind};

/// Room capacity requested when the player does not pick one.
pub const DEFAULT_MAX_PLAYERS: u8 = 8;

/// Something the local player wants to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    CreateRoom {
        nickname: String,
        max_players: Option<u8>,
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
        as_value: Option<u8>,
    },
    PlaySpecial {
        room_id: RoomId,
        card_id: CardId,
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
        difficulty: Option<BotDifficulty>,
    },
}

/// Map an intent to the action sent on the wire.
pub fn encode(intent: Intent) -> ClientAction {
    match intent {
        Intent::CreateRoom {
            nickname,
            max_players,
        } => ClientAction::CreateRoom {
            nickname,
            max_players: max_players.unwrap_or(DEFAULT_MAX_PLAYERS),
        },
        Intent::JoinRoom { room_id, nickname } => ClientAction::JoinRoom { room_id, nickname },
        Intent::StartGame { room_id } => ClientAction::StartGame { room_id },
        Intent::PlayCard {
            room_id,
            card_id,
            as_value,
        } => ClientAction::PlayCard {
            room_id,
            card_id,
            as_value,
        },
        Intent::PlaySpecial {
            room_id,
            card_id,
            kind,
        } => ClientAction::PlaySpecial {
            room_id,
            card_id,
            kind,
        },
        Intent::PassTurn { room_id } => ClientAction::PassTurn { room_id },
        Intent::Chat { room_id, message } => ClientAction::Chat { room_id, message },
        Intent::AddBot {
            room_id,
            difficulty,
        } => ClientAction::AddBot {
            room_id,
            difficulty: difficulty.unwrap_or_default(),
        },
    }
}

impl From<Intent> for ClientAction {
    fn from(intent: Intent) -> Self {
        encode(intent)
    }
}

/// Pick the intent for playing `card` from the hand.
///
/// `joker_value` is only used for jokers.
pub fn intent_for_card(room_id: &str, card: &Card, joker_value: u8) -> Intent {
    let room_id = room_id.to_string();
    let card_id = card.id.clone();
    if let Some(kind) = card.kind.special() {
        return Intent::PlaySpecial {
            room_id,
            card_id,
            kind,
        };
    }
    Intent::PlayCard {
        room_id,
        card_id,
        as_value: (card.kind == CardKind::Joker).then_some(joker_value),
    }
}
