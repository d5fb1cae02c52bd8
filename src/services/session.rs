//! Session protocol handler: the per-connection state machine.
//!
//! DESIGN
//! ======
//! Each websocket connection owns one `Session`:
//!
//! ```text
//! Unjoined --join--> Joined --close--> Closed
//!                    Joined --join---> Joined (other room)
//! ```
//!
//! Handlers are synchronous and run against `&mut RoomRegistry`. The async
//! wrappers take the registry write lock once per inbound message, so every
//! mutation and the broadcast it causes happen in one critical section and
//! all recipients observe room events in commit order. Nothing awaits while
//! the lock is held; broadcast only enqueues into connection outboxes.
//!
//! Return values are messages for this connection alone (the welcome and
//! `error` replies). Everything else goes out through the outbox.
//!
//! OUTBOX
//! ======
//! The session hands its outbox sender to the room on join, so the room holds
//! the only sender and eviction closes the channel. Every membership gets its
//! own channel: a re-join opens a fresh one and parks the receiver until the
//! connection picks it up with [`Session::take_rebound_outbox`]. Anything
//! still queued from the old room is discarded with the old receiver.
//! The commit ack for a stroke travels on the outbox too, so it is ordered
//! with the room's other history messages.
//!
//! ERROR HANDLING
//! ==============
//! - Malformed input gets an `error` reply; the session stays usable.
//! - Anything other than `join` before joining is dropped silently.
//! - Undo/redo with nothing to do sends nothing.
//! - Disconnecting mid-stroke drops the candidate stroke; it was never logged.

use protocol::{ClientMessage, DrawPhase, DrawPoint, LiveDraw, OperationId, ParseError, ParticipantId, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::services::cursor;
use crate::services::oplog::CandidateStroke;
use crate::services::room::{Outbox, Room, RoomRegistry};
use crate::state::AppState;

// =============================================================================
// STATE
// =============================================================================

/// Which room a joined session belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room_key: String,
    pub participant_id: ParticipantId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Joined(Membership),
    Closed,
}

pub struct Session {
    state: SessionState,
    /// Sender for the next membership. `None` while a room holds it.
    outbox: Option<Outbox>,
    /// Receiver opened by a re-join, not yet picked up by the connection.
    rebound: Option<mpsc::Receiver<ServerMessage>>,
    outbox_capacity: usize,
    default_room: String,
    /// Stroke between draw-begin and draw-finish on this connection.
    candidate: Option<CandidateStroke>,
}

impl Session {
    #[must_use]
    pub fn new(outbox: Outbox, default_room: impl Into<String>) -> Self {
        Self {
            state: SessionState::Unjoined,
            outbox_capacity: outbox.max_capacity(),
            outbox: Some(outbox),
            rebound: None,
            default_room: default_room.into(),
            candidate: None,
        }
    }

    /// The receiver for the current membership, if a re-join replaced it.
    /// Callers must switch to it before reading the outbox again.
    pub fn take_rebound_outbox(&mut self) -> Option<mpsc::Receiver<ServerMessage>> {
        self.rebound.take()
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn membership(&self) -> Option<&Membership> {
        match &self.state {
            SessionState::Joined(membership) => Some(membership),
            _ => None,
        }
    }

    #[must_use]
    pub fn has_open_stroke(&self) -> bool {
        self.candidate.is_some()
    }

    // =========================================================================
    // ASYNC ENTRY POINTS
    // =========================================================================

    /// Parse and apply one inbound text message.
    pub async fn handle_text(&mut self, state: &AppState, text: &str) -> Vec<ServerMessage> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }
        match protocol::parse_client_message(text) {
            Ok(message) => self.handle(state, message).await,
            Err(e) => vec![self.reject(&e)],
        }
    }

    /// Parse and apply one inbound binary message (must hold UTF-8 JSON).
    pub async fn handle_bytes(&mut self, state: &AppState, bytes: &[u8]) -> Vec<ServerMessage> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }
        match protocol::parse_client_bytes(bytes) {
            Ok(message) => self.handle(state, message).await,
            Err(e) => vec![self.reject(&e)],
        }
    }

    pub async fn handle(&mut self, state: &AppState, message: ClientMessage) -> Vec<ServerMessage> {
        let mut registry = state.registry.write().await;
        self.apply(&mut registry, message)
    }

    /// Connection closed: leave the room (if any). Terminal.
    pub async fn close(&mut self, state: &AppState) {
        let mut registry = state.registry.write().await;
        self.close_with(&mut registry);
    }

    // =========================================================================
    // STATE MACHINE
    // =========================================================================

    /// Apply one typed message. Returns the replies for this connection only.
    pub fn apply(&mut self, registry: &mut RoomRegistry, message: ClientMessage) -> Vec<ServerMessage> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }

        if let ClientMessage::Join { room_key, display_name } = message {
            return vec![self.join(registry, room_key, display_name)];
        }

        let Some(membership) = self.membership().cloned() else {
            debug!(kind = message.kind(), "session: dropping message before join");
            return Vec::new();
        };
        let present = registry
            .room(&membership.room_key)
            .is_some_and(|room| room.participant(membership.participant_id).is_some());
        if !present {
            debug!(room_key = %membership.room_key, kind = message.kind(), "session: no longer in room, dropping message");
            return Vec::new();
        }

        match message {
            ClientMessage::DrawBegin(point) => self.draw_begin(registry, &membership, &point),
            ClientMessage::DrawContinue(point) => self.draw_continue(registry, &membership, &point),
            ClientMessage::DrawFinish(point) => self.draw_finish(registry, &membership, &point),
            ClientMessage::CursorMove(point) => {
                cursor::move_cursor(registry, &membership.room_key, membership.participant_id, point);
            }
            ClientMessage::Undo => undo(registry, &membership),
            ClientMessage::Redo => redo(registry, &membership),
            ClientMessage::Clear => clear(registry, &membership),
            // Joins are handled above, before membership is required.
            ClientMessage::Join { .. } => {}
        }
        Vec::new()
    }

    /// Leave the current room and mark the session closed.
    pub fn close_with(&mut self, registry: &mut RoomRegistry) {
        self.leave(registry);
        self.state = SessionState::Closed;
    }

    fn reject(&self, err: &ParseError) -> ServerMessage {
        let participant_id = self.membership().map(|m| m.participant_id);
        warn!(?participant_id, error = %err, "session: malformed inbound message");
        ServerMessage::error_from(err)
    }

    // =========================================================================
    // MEMBERSHIP
    // =========================================================================

    fn join(&mut self, registry: &mut RoomRegistry, room_key: Option<String>, display_name: Option<String>) -> ServerMessage {
        if self.membership().is_some() {
            self.leave(registry);
        }

        let room_key = room_key
            .map(|key| key.trim().to_owned())
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| self.default_room.clone());

        let (me, room) = registry.join(&room_key, self.next_outbox(), display_name.as_deref());
        let participants = room.directory();
        let welcome = ServerMessage::Joined {
            participant_id: me.participant_id,
            color: me.color.clone(),
            display_name: me.display_name.clone(),
            room_key: room_key.clone(),
            current_index: room.log().current_index(),
            visible_strokes: room.log().visible().to_vec(),
            participants: participants.clone(),
        };

        let participant_id = me.participant_id;
        let announcement = ServerMessage::ParticipantJoined { participant: me, participants };
        registry.broadcast(&room_key, &announcement, Some(participant_id));

        self.candidate = None;
        self.state = SessionState::Joined(Membership { room_key, participant_id });
        welcome
    }

    fn next_outbox(&mut self) -> Outbox {
        if let Some(outbox) = self.outbox.take() {
            return outbox;
        }
        let (outbox, rx) = mpsc::channel(self.outbox_capacity);
        self.rebound = Some(rx);
        outbox
    }

    fn leave(&mut self, registry: &mut RoomRegistry) {
        let SessionState::Joined(membership) = std::mem::replace(&mut self.state, SessionState::Unjoined) else {
            return;
        };
        if let Some(abandoned) = self.candidate.take() {
            debug!(
                room_key = %membership.room_key,
                participant_id = membership.participant_id,
                points = abandoned.len(),
                "session: abandoning unfinished stroke"
            );
        }

        let remaining = registry
            .leave(&membership.room_key, membership.participant_id)
            .map(Room::directory);
        if let Some(participants) = remaining {
            let farewell = ServerMessage::ParticipantLeft { participant_id: membership.participant_id, participants };
            registry.broadcast(&membership.room_key, &farewell, None);
        }
    }

    // =========================================================================
    // DRAWING
    // =========================================================================

    fn draw_begin(&mut self, registry: &mut RoomRegistry, membership: &Membership, point: &DrawPoint) {
        if self.candidate.is_some() {
            debug!(participant_id = membership.participant_id, "session: begin replaces unfinished stroke");
        }
        self.candidate = Some(CandidateStroke::begin(membership.participant_id, point));
        relay_live(registry, membership, DrawPhase::Begin, point, None);
    }

    fn draw_continue(&mut self, registry: &mut RoomRegistry, membership: &Membership, point: &DrawPoint) {
        if let Some(candidate) = self.candidate.as_mut() {
            candidate.push(point.point());
        } else {
            self.candidate = Some(CandidateStroke::begin(membership.participant_id, point));
        }
        relay_live(registry, membership, DrawPhase::Continue, point, None);
    }

    fn draw_finish(&mut self, registry: &mut RoomRegistry, membership: &Membership, point: &DrawPoint) {
        let candidate = match self.candidate.take() {
            Some(mut candidate) => {
                candidate.push(point.point());
                candidate
            }
            None => CandidateStroke::begin(membership.participant_id, point),
        };
        let Some(room) = registry.room_mut(&membership.room_key) else {
            return;
        };

        let points = candidate.len();
        let operation_id = room.log_mut().commit(candidate);
        info!(
            room_key = %membership.room_key,
            participant_id = membership.participant_id,
            operation_id,
            points,
            "stroke committed"
        );
        relay_live(registry, membership, DrawPhase::Finish, point, Some(operation_id));
        registry.send_to(
            &membership.room_key,
            membership.participant_id,
            &ServerMessage::StrokeCommitted { operation_id },
        );
    }
}

// =============================================================================
// HISTORY
// =============================================================================

fn undo(registry: &mut RoomRegistry, membership: &Membership) {
    let Some(state) = registry
        .room_mut(&membership.room_key)
        .and_then(|room| room.log_mut().undo())
    else {
        debug!(room_key = %membership.room_key, "session: nothing to undo");
        return;
    };
    // Undo results reach the sender too: its canvas must match the log.
    registry.broadcast(&membership.room_key, &ServerMessage::Undo(state), None);
}

fn redo(registry: &mut RoomRegistry, membership: &Membership) {
    let Some(state) = registry
        .room_mut(&membership.room_key)
        .and_then(|room| room.log_mut().redo())
    else {
        debug!(room_key = %membership.room_key, "session: nothing to redo");
        return;
    };
    registry.broadcast(&membership.room_key, &ServerMessage::Redo(state), None);
}

fn clear(registry: &mut RoomRegistry, membership: &Membership) {
    let Some(room) = registry.room_mut(&membership.room_key) else {
        return;
    };
    room.log_mut().clear();
    info!(room_key = %membership.room_key, participant_id = membership.participant_id, "history cleared");
    registry.broadcast(&membership.room_key, &ServerMessage::Clear, None);
}

fn relay_live(
    registry: &mut RoomRegistry,
    membership: &Membership,
    phase: DrawPhase,
    point: &DrawPoint,
    operation_id: Option<OperationId>,
) {
    let live = LiveDraw::new(membership.participant_id, phase, point);
    let live = match operation_id {
        Some(id) => live.with_operation_id(id),
        None => live,
    };
    registry.broadcast(&membership.room_key, &ServerMessage::Draw(live), Some(membership.participant_id));
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
