//! # Console Lobby Example
//!
//! Plays SOMO from the terminal:
//!
//! 1. Connect to the game server via WebSocket
//! 2. Create a room, or join one when `SOMO_ROOM` is set
//! 3. Log notifications, chat and room changes as they arrive
//! 4. On our turn, play the first legal card or pass
//! 5. Disconnect gracefully on Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! # Start the SOMO server on localhost:8000, then:
//! cargo run --example console_lobby
//!
//! # Join an existing room under another name:
//! SOMO_ROOM=ABC123 SOMO_NICKNAME=Bruno cargo run --example console_lobby
//!
//! # Override the server URL:
//! SOMO_SERVER_URL=ws://my-server:8000/ws cargo run --example console_lobby
//! ```

use std::collections::HashSet;

use somo_client::store::NotificationId;
use somo_client::{ClientConfig, GameSession, Severity, WebSocketConnector};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for frame-level output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let config = ClientConfig::from_env();
    let nickname = std::env::var("SOMO_NICKNAME").unwrap_or_else(|_| "RustPlayer".to_string());
    let room = std::env::var("SOMO_ROOM").ok();
    tracing::info!("Connecting to {}", config.url);

    // ── Connect ─────────────────────────────────────────────────────
    let connector = WebSocketConnector::new(config.connect_timeout);
    let mut session = GameSession::new(connector, config);
    session.start().await?;

    match &room {
        Some(code) => {
            session.join_room(code, &nickname);
            tracing::info!("Join request sent for room {code}");
        }
        None => {
            session.create_room(&nickname, Some(4));
            tracing::info!("Create-room request sent");
        }
    }

    // ── Event loop ──────────────────────────────────────────────────
    let mut shown: HashSet<NotificationId> = HashSet::new();
    let mut chat_seen = 0;
    let mut last_turn = None;

    loop {
        tokio::select! {
            more = session.process_next() => {
                if !more {
                    tracing::info!("Session closed, exiting");
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }

        let store = session.store();
        let state = store.state();

        for n in &state.notifications {
            if shown.insert(n.id) {
                match n.severity {
                    Severity::Error => tracing::error!("{}", n.message),
                    Severity::Warning => tracing::warn!("{}", n.message),
                    Severity::Info | Severity::Success => tracing::info!("{}", n.message),
                }
            }
        }

        for entry in state.chat.iter().skip(chat_seen) {
            tracing::info!("[chat] {}: {}", entry.nickname, entry.message);
        }
        chat_seen = state.chat.len();

        let Some(room) = store.room() else {
            continue;
        };

        // Host starts as soon as someone else joined.
        if store.can_start_game() {
            tracing::info!("{} players in room {}, starting", room.players.len(), room.id);
            session.start_game();
            continue;
        }

        // Act once per turn, and only after the room state confirms it.
        let turn = (room.current_turn.clone(), room.accumulated_sum);
        if !store.is_my_turn() || last_turn.as_ref() == Some(&turn) {
            continue;
        }
        last_turn = Some(turn);

        tracing::info!(
            "Our turn: sum {}/{}, {} cards in hand",
            room.accumulated_sum,
            room.round_limit,
            store.self_hand().len()
        );
        let playable = store
            .self_hand()
            .iter()
            .find(|card| store.can_play(card))
            .map(|card| card.id.clone());
        let joker_value = somo_client::legality::joker_values(room).max().unwrap_or(0);

        match playable {
            Some(card_id) => {
                session.play_from_hand(&card_id, joker_value);
            }
            None => {
                session.pass_turn();
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    session.disconnect();
    tracing::info!("Disconnected. Goodbye!");
    Ok(())
}
