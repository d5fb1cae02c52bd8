//! Room service: participant directory, lazy room lifecycle, broadcast.
//!
//! DESIGN
//! ======
//! A `Room` owns one `OperationLog` plus the participants currently in it.
//! Rooms are created on first join and destroyed, history included, when the
//! last participant leaves. Participant ids restart at 1 for a new room.
//!
//! The `RoomRegistry` owns every live room and the palette cursor. The cursor
//! is never reset, so colors keep rotating across rooms for as long as the
//! registry lives.
//!
//! BROADCAST
//! =========
//! Each participant holds the only `mpsc::Sender` of its connection's
//! outbox. Broadcast snapshots the recipients first, then `try_send`s to
//! each one. A closed outbox is skipped, and a full one drops live traffic
//! (draws, cursors). It never stops delivery to the rest of the room and
//! never surfaces to the caller.
//!
//! A full outbox on a message that carries history is different: the
//! recipient's mirror would stay wrong. That participant is evicted from the
//! room, which drops its sender and closes the connection once the queued
//! messages drain. The client rejoins and gets a fresh welcome.

use std::collections::{BTreeMap, HashMap};

use protocol::{ParticipantId, ParticipantRecord, Point, ServerMessage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::services::oplog::OperationLog;

/// Outbound queue of one connection.
pub type Outbox = mpsc::Sender<ServerMessage>;

// =============================================================================
// PARTICIPANT
// =============================================================================

pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub color: String,
    /// Last advisory cursor position. Overwritten, never accumulated.
    pub cursor: Option<Point>,
    outbox: Outbox,
}

impl Participant {
    #[must_use]
    pub fn record(&self) -> ParticipantRecord {
        ParticipantRecord {
            participant_id: self.id,
            display_name: self.display_name.clone(),
            color: self.color.clone(),
            cursor: self.cursor,
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.outbox.is_closed()
    }
}

// =============================================================================
// ROOM
// =============================================================================

pub struct Room {
    key: String,
    log: OperationLog,
    participants: BTreeMap<ParticipantId, Participant>,
    next_participant_id: ParticipantId,
}

impl Room {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), log: OperationLog::new(), participants: BTreeMap::new(), next_participant_id: 1 }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut OperationLog {
        &mut self.log
    }

    #[must_use]
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    /// Directory snapshot, ordered by participant id.
    #[must_use]
    pub fn directory(&self) -> Vec<ParticipantRecord> {
        self.participants.values().map(Participant::record).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    fn admit(&mut self, display_name: Option<&str>, color: String, outbox: Outbox) -> ParticipantRecord {
        let id = self.next_participant_id;
        self.next_participant_id += 1;

        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| format!("Guest {id}"), str::to_owned);

        let participant = Participant { id, display_name, color, cursor: None, outbox };
        let record = participant.record();
        self.participants.insert(id, participant);
        record
    }

    fn recipients(&self, exclude: Option<ParticipantId>) -> Vec<&Participant> {
        self.participants.values().filter(|p| exclude != Some(p.id)).collect()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    palette: Vec<String>,
    /// Next palette slot. Shared by all rooms, never reset.
    next_color: usize,
}

impl RoomRegistry {
    /// Create a registry drawing colors from `palette`. An empty palette
    /// falls back to the built-in one.
    #[must_use]
    pub fn new(palette: Vec<String>) -> Self {
        let palette = if palette.is_empty() {
            crate::config::DEFAULT_PALETTE.iter().map(|c| (*c).to_owned()).collect()
        } else {
            palette
        };
        Self { rooms: HashMap::new(), palette, next_color: 0 }
    }

    /// Return the room for `key`, creating it if absent.
    pub fn get_or_create(&mut self, key: &str) -> &mut Room {
        self.rooms.entry(key.to_owned()).or_insert_with(|| {
            info!(room_key = %key, "room created");
            Room::new(key)
        })
    }

    #[must_use]
    pub fn room(&self, key: &str) -> Option<&Room> {
        self.rooms.get(key)
    }

    pub fn room_mut(&mut self, key: &str) -> Option<&mut Room> {
        self.rooms.get_mut(key)
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Directory snapshot for `key`, empty if the room does not exist.
    #[must_use]
    pub fn directory(&self, key: &str) -> Vec<ParticipantRecord> {
        self.rooms.get(key).map(Room::directory).unwrap_or_default()
    }

    /// Add a participant to `key`, creating the room if needed. Assigns the
    /// room's next id and the registry's next palette color.
    pub fn join(&mut self, key: &str, outbox: Outbox, display_name: Option<&str>) -> (ParticipantRecord, &Room) {
        let color = self.next_color();
        let room = self.get_or_create(key);
        let record = room.admit(display_name, color, outbox);
        info!(room_key = %key, participant_id = record.participant_id, participants = room.len(), "participant joined");
        (record, &*room)
    }

    /// Remove a participant. Returns the room if it is still live, or `None`
    /// if it was absent or has just been destroyed because it became empty.
    pub fn leave(&mut self, key: &str, participant_id: ParticipantId) -> Option<&Room> {
        let room = self.rooms.get_mut(key)?;
        if room.participants.remove(&participant_id).is_some() {
            info!(room_key = %key, participant_id, remaining = room.len(), "participant left");
        }

        if room.is_empty() {
            self.rooms.remove(key);
            info!(room_key = %key, "room destroyed");
            return None;
        }
        self.rooms.get(key)
    }

    /// Overwrite a participant's cursor. `false` if room or participant is absent.
    pub fn update_cursor(&mut self, key: &str, participant_id: ParticipantId, point: Point) -> bool {
        let Some(participant) = self
            .rooms
            .get_mut(key)
            .and_then(|room| room.participants.get_mut(&participant_id))
        else {
            return false;
        };
        participant.cursor = Some(point);
        true
    }

    /// Deliver `message` to every participant of `key` except `exclude`.
    /// Returns how many outboxes accepted it.
    pub fn broadcast(&mut self, key: &str, message: &ServerMessage, exclude: Option<ParticipantId>) -> usize {
        let Some(room) = self.rooms.get(key) else {
            return 0;
        };

        let mut delivered = 0;
        let mut lagging = Vec::new();
        for participant in room.recipients(exclude) {
            match deliver(key, participant, message) {
                Delivery::Sent => delivered += 1,
                Delivery::Skipped => {}
                Delivery::Lagging => lagging.push(participant.id),
            }
        }
        self.evict(key, &lagging);
        delivered
    }

    /// Deliver `message` to one participant. `false` if it is absent or did
    /// not accept the message.
    pub fn send_to(&mut self, key: &str, participant_id: ParticipantId, message: &ServerMessage) -> bool {
        let Some(participant) = self.rooms.get(key).and_then(|room| room.participants.get(&participant_id)) else {
            return false;
        };
        match deliver(key, participant, message) {
            Delivery::Sent => true,
            Delivery::Skipped => false,
            Delivery::Lagging => {
                self.evict(key, &[participant_id]);
                false
            }
        }
    }

    /// Remove participants whose outbox fell behind on history. Dropping the
    /// sender ends their connection; their session announces the departure.
    fn evict(&mut self, key: &str, participant_ids: &[ParticipantId]) {
        if participant_ids.is_empty() {
            return;
        }
        let Some(room) = self.rooms.get_mut(key) else {
            return;
        };
        for participant_id in participant_ids {
            if room.participants.remove(participant_id).is_some() {
                error!(room_key = %key, participant_id, "evicting participant with a full outbox");
            }
        }
        if room.is_empty() {
            self.rooms.remove(key);
            info!(room_key = %key, "room destroyed");
        }
    }

    fn next_color(&mut self) -> String {
        let color = self.palette[self.next_color % self.palette.len()].clone();
        self.next_color = self.next_color.wrapping_add(1);
        color
    }
}

enum Delivery {
    Sent,
    Skipped,
    Lagging,
}

fn deliver(key: &str, participant: &Participant, message: &ServerMessage) -> Delivery {
    let participant_id = participant.id;
    if !participant.is_connected() {
        debug!(room_key = %key, participant_id, "broadcast: skipping closed connection");
        return Delivery::Skipped;
    }
    match participant.outbox.try_send(message.clone()) {
        Ok(()) => Delivery::Sent,
        Err(TrySendError::Full(_)) if message.carries_history() => Delivery::Lagging,
        Err(e) => {
            warn!(room_key = %key, participant_id, kind = message.kind(), error = %e, "broadcast: delivery failed");
            Delivery::Skipped
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
