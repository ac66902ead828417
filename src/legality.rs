//! Local check of which hand cards may be played right now.
//!
//! The server enforces the rules; this only decides which cards the UI
//! offers. Pending effects are not taken into account.

use crate::protocol::{Card, CardKind, RoomSnapshot};

/// Smallest value a joker can stand for.
pub const JOKER_MIN: u8 = 0;

/// Largest value a joker can stand for.
pub const JOKER_MAX: u8 = 9;

/// Returns `true` if the game is running and it is `player_id`'s turn.
pub fn is_players_turn(room: &RoomSnapshot, player_id: &str) -> bool {
    room.game_started && room.current_turn.as_deref() == Some(player_id)
}

/// Whether `player_id` may play `card` in `room`.
///
/// - Never on someone else's turn or before the game starts.
/// - A number card must keep the sum at or below the round limit.
/// - A joker needs the sum to still be within the limit.
/// - Special cards are always playable.
pub fn can_play(room: &RoomSnapshot, player_id: &str, card: &Card) -> bool {
    if !is_players_turn(room, player_id) {
        return false;
    }
    match card.kind {
        CardKind::Number => card.value.is_some_and(|value| fits(room, value)),
        CardKind::Joker => room.accumulated_sum <= room.round_limit,
        CardKind::Plus2 | CardKind::Times2 | CardKind::Reset0 | CardKind::Reverse => true,
    }
}

/// Joker values that keep the sum within the round limit, for a value picker.
pub fn joker_values(room: &RoomSnapshot) -> impl Iterator<Item = u8> + '_ {
    (JOKER_MIN..=JOKER_MAX).filter(move |value| fits(room, *value))
}

fn fits(room: &RoomSnapshot, value: u8) -> bool {
    room.accumulated_sum.saturating_add(i32::from(value)) <= room.round_limit
}
