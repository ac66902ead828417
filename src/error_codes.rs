//! Error codes carried by the server's `error` event.
//!
//! The server sends these as `SCREAMING_SNAKE_CASE` strings in the `code`
//! field. Codes this client does not know yet deserialize into
//! [`ErrorCode::Other`] so a newer server never breaks the event stream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error codes returned by the SOMO server.
///
/// Use [`description()`](ErrorCode::description) for a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Connection / framing errors
    NotConnected,
    InvalidJson,
    UnknownAction,
    ProcessingError,
    InternalError,

    // Room errors
    RoomNotFound,
    CreateRoomError,
    JoinRoomError,
    NotHost,
    NotEnoughPlayers,
    StartGameError,
    AddBotError,

    // Turn errors
    InvalidPlay,
    PlayCardError,
    PlaySpecialError,
    PassTurnError,

    // Chat errors
    ChatError,

    /// A code this client version does not recognize.
    #[serde(untagged)]
    Other(String),
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotConnected => "The server has no session for this connection. Reconnect and try again.",
            Self::InvalidJson => "The server could not parse the message that was sent.",
            Self::UnknownAction => "The server does not recognize the requested action.",
            Self::ProcessingError => "The server failed while processing the message.",
            Self::InternalError => "An internal server error occurred. Please try again.",

            Self::RoomNotFound => {
                "The requested room could not be found. It may have been closed or the code is incorrect."
            }
            Self::CreateRoomError => "The room could not be created.",
            Self::JoinRoomError => "The room could not be joined. It may be full or already playing.",
            Self::NotHost => "Only the room host can do that.",
            Self::NotEnoughPlayers => "At least two players are needed to start the game.",
            Self::StartGameError => "The game could not be started.",
            Self::AddBotError => "The bot could not be added to the room.",

            Self::InvalidPlay => "That card cannot be played right now.",
            Self::PlayCardError => "The card could not be played.",
            Self::PlaySpecialError => "The special card could not be played.",
            Self::PassTurnError => "The turn could not be passed.",

            Self::ChatError => "The chat message could not be delivered.",

            Self::Other(_) => "The server reported an unrecognized error.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "{code}"),
            known => write!(f, "{}", known.description()),
        }
    }
}
