//! Cursor service: advisory presence broadcast.
//!
//! DESIGN
//! ======
//! Cursor positions are presence data only: the last position overwrites the
//! participant's stored cursor and is relayed to room peers. Nothing is
//! logged, and cursors are never replayed through the operation log.

use protocol::{ParticipantId, Point, ServerMessage};

use crate::services::room::RoomRegistry;

/// Record a cursor position and relay it to every peer except the mover.
/// Returns `false` (and sends nothing) if the room or participant is gone.
pub fn move_cursor(registry: &mut RoomRegistry, room_key: &str, participant_id: ParticipantId, point: Point) -> bool {
    if !registry.update_cursor(room_key, participant_id, point) {
        return false;
    }
    let message = ServerMessage::CursorUpdate { participant_id, x: point.x, y: point.y };
    registry.broadcast(room_key, &message, Some(participant_id));
    true
}
