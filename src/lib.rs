//! # SOMO Client
//!
//! Realtime connection manager and client-side state mirror for the SOMO
//! multiplayer card game.
//!
//! The server owns the rules. This crate keeps one connection to it, turns
//! player intents into actions, and rebuilds the room, the player's hand and
//! a notification/chat log purely from the events the server pushes.
//!
//! ## Features
//!
//! - **Reconnecting connection**: [`ConnectionManager`] retries abnormal
//!   closes with exponential backoff
//! - **Wire-compatible**: [`ClientAction`] and [`ServerEvent`] match the
//!   server's JSON format
//! - **Reducer store**: [`ClientStore`] with derived queries such as
//!   `is_my_turn` and `can_play`
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`]; the
//!   default `transport-websocket` feature provides [`WebSocketConnector`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), somo_client::SomoError> {
//! use somo_client::{ClientConfig, GameSession, WebSocketConnector};
//!
//! let config = ClientConfig::from_env();
//! let mut session = GameSession::new(WebSocketConnector::new(config.connect_timeout), config);
//! session.start().await?;
//! session.create_room("Ana", None);
//!
//! while session.process_next().await {
//!     if let Some(room) = session.store().room() {
//!         println!("room {} has {} players", room.id, room.players.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod encoder;
pub mod error;
pub mod error_codes;
pub mod legality;
pub mod protocol;
pub mod session;
pub mod store;
pub mod transport;
pub mod transports;

pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionSignal, ConnectionState};
pub use encoder::{intent_for_card, Intent};
pub use error::SomoError;
pub use error_codes::ErrorCode;
pub use protocol::{ClientAction, ServerEvent, ServerEventKind};
pub use session::GameSession;
pub use store::{ClientStore, GameState, Notification, Severity, View};
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
