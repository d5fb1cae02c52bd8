//! Shared message model for the sketchroom websocket transport.
//!
//! This crate owns the wire representation used by the server, the canvas
//! client and the CLI. Every message is a UTF-8 JSON object with a `type`
//! discriminator; field names are camelCase on the wire.
//!
//! DESIGN
//! ======
//! - [`ClientMessage`] is what a connection may send, [`ServerMessage`] is
//!   what it may receive. Both are internally tagged serde enums.
//! - [`Stroke`] is the committed, undoable unit. It carries the whole point
//!   path so that replaying the visible prefix reproduces the same lines.
//! - Parsing goes through [`parse_client_message`] / [`parse_server_message`]
//!   so malformed input is classified ([`ParseError`]) instead of surfacing a
//!   raw serde error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Room key used when a `join` omits `roomKey` or sends an empty one.
pub const DEFAULT_ROOM_KEY: &str = "default";

/// Every `type` value a client is allowed to send.
pub const CLIENT_MESSAGE_TYPES: &[&str] = &[
    "join",
    "draw-begin",
    "draw-continue",
    "draw-finish",
    "cursor-move",
    "undo",
    "redo",
    "clear",
];

/// Every `type` value the server may send.
pub const SERVER_MESSAGE_TYPES: &[&str] = &[
    "joined",
    "draw",
    "stroke-committed",
    "cursor-update",
    "participant-joined",
    "participant-left",
    "undo",
    "redo",
    "clear",
    "error",
];

// =============================================================================
// PRIMITIVES
// =============================================================================

/// Participant identifier, unique within one room's lifetime. Starts at 1.
pub type ParticipantId = u32;

/// Stable log index of a committed stroke within its room's history.
pub type OperationId = usize;

/// A position on the shared canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Drawing tool selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
}

impl Tool {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brush => "brush",
            Self::Eraser => "eraser",
        }
    }
}

/// Tool, color and width shared by every point of a stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub tool: Tool,
    pub color: String,
    pub width: f64,
}

/// One point of an in-progress gesture, with the style it is drawn in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawPoint {
    pub x: f64,
    pub y: f64,
    pub tool: Tool,
    pub color: String,
    pub width: f64,
}

impl DrawPoint {
    #[must_use]
    pub fn new(point: Point, style: &StrokeStyle) -> Self {
        Self { x: point.x, y: point.y, tool: style.tool, color: style.color.clone(), width: style.width }
    }

    #[must_use]
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    #[must_use]
    pub fn style(&self) -> StrokeStyle {
        StrokeStyle { tool: self.tool, color: self.color.clone(), width: self.width }
    }
}

/// A committed stroke as stored in the operation log and delivered in
/// `visibleStrokes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    /// Operation id: the stroke's index in the room history.
    pub id: OperationId,
    pub participant_id: ParticipantId,
    pub tool: Tool,
    pub color: String,
    pub width: f64,
    /// Logical commit clock of the room at the time of commit.
    pub timestamp: u64,
    pub points: Vec<Point>,
}

impl Stroke {
    #[must_use]
    pub fn style(&self) -> StrokeStyle {
        StrokeStyle { tool: self.tool, color: self.color.clone(), width: self.width }
    }
}

/// Public view of a participant, as listed in directory snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Point>,
}

// =============================================================================
// CLIENT → SERVER
// =============================================================================

/// Messages accepted from a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Join {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },
    DrawBegin(DrawPoint),
    DrawContinue(DrawPoint),
    DrawFinish(DrawPoint),
    CursorMove(Point),
    Undo,
    Redo,
    Clear,
}

impl ClientMessage {
    /// Wire `type` of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::DrawBegin(_) => "draw-begin",
            Self::DrawContinue(_) => "draw-continue",
            Self::DrawFinish(_) => "draw-finish",
            Self::CursorMove(_) => "cursor-move",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Clear => "clear",
        }
    }
}

// =============================================================================
// SERVER → CLIENT
// =============================================================================

/// Which part of a live gesture a `draw` notification carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawPhase {
    Begin,
    Continue,
    Finish,
}

/// Live, unlogged point of another participant's gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDraw {
    pub participant_id: ParticipantId,
    pub phase: DrawPhase,
    pub x: f64,
    pub y: f64,
    pub tool: Tool,
    pub color: String,
    pub width: f64,
    /// Set on `finish`: the operation id the completed stroke was committed as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<OperationId>,
}

impl LiveDraw {
    #[must_use]
    pub fn new(participant_id: ParticipantId, phase: DrawPhase, point: &DrawPoint) -> Self {
        Self {
            participant_id,
            phase,
            x: point.x,
            y: point.y,
            tool: point.tool,
            color: point.color.clone(),
            width: point.width,
            operation_id: None,
        }
    }

    #[must_use]
    pub fn with_operation_id(mut self, id: OperationId) -> Self {
        self.operation_id = Some(id);
        self
    }

    #[must_use]
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    #[must_use]
    pub fn style(&self) -> StrokeStyle {
        StrokeStyle { tool: self.tool, color: self.color.clone(), width: self.width }
    }
}

/// Authoritative history position after an undo or redo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryState {
    /// Index of the last visible stroke, `-1` when nothing is visible.
    pub current_index: i64,
    pub visible_strokes: Vec<Stroke>,
}

/// Messages delivered to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Private welcome sent to a participant that just joined.
    #[serde(rename_all = "camelCase")]
    Joined {
        participant_id: ParticipantId,
        color: String,
        display_name: String,
        room_key: String,
        current_index: i64,
        visible_strokes: Vec<Stroke>,
        participants: Vec<ParticipantRecord>,
    },
    Draw(LiveDraw),
    /// Private ack to the author of a stroke: the operation id it was
    /// committed as. Peers learn the same id from the `finish` draw.
    #[serde(rename_all = "camelCase")]
    StrokeCommitted { operation_id: OperationId },
    #[serde(rename_all = "camelCase")]
    CursorUpdate { participant_id: ParticipantId, x: f64, y: f64 },
    ParticipantJoined { participant: ParticipantRecord, participants: Vec<ParticipantRecord> },
    #[serde(rename_all = "camelCase")]
    ParticipantLeft { participant_id: ParticipantId, participants: Vec<ParticipantRecord> },
    Undo(HistoryState),
    Redo(HistoryState),
    Clear,
    Error { message: String, code: String },
}

impl ServerMessage {
    /// Wire `type` of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Joined { .. } => "joined",
            Self::Draw(_) => "draw",
            Self::StrokeCommitted { .. } => "stroke-committed",
            Self::CursorUpdate { .. } => "cursor-update",
            Self::ParticipantJoined { .. } => "participant-joined",
            Self::ParticipantLeft { .. } => "participant-left",
            Self::Undo(_) => "undo",
            Self::Redo(_) => "redo",
            Self::Clear => "clear",
            Self::Error { .. } => "error",
        }
    }

    /// Build an `error` message from a typed error.
    #[must_use]
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Error { message: err.to_string(), code: err.error_code().to_owned() }
    }

    /// Whether losing this message leaves the recipient's history mirror
    /// wrong until it rejoins. Live draws and cursors are not.
    #[must_use]
    pub fn carries_history(&self) -> bool {
        matches!(
            self,
            Self::Joined { .. } | Self::StrokeCommitted { .. } | Self::Undo(_) | Self::Redo(_) | Self::Clear
        )
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Grepable error code for structured `error` messages.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

/// Why an inbound message could not be turned into a typed message.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("message is not valid UTF-8")]
    NotUtf8,
    #[error("invalid json: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("message must be a JSON object with a string `type` field")]
    MissingType,
    #[error("unknown message type: {0}")]
    UnknownType(String),
    #[error("malformed {kind} message: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ErrorCode for ParseError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotUtf8 => "E_INVALID_UTF8",
            Self::InvalidJson(_) => "E_INVALID_JSON",
            Self::MissingType => "E_MISSING_TYPE",
            Self::UnknownType(_) => "E_UNKNOWN_TYPE",
            Self::Malformed { .. } => "E_MALFORMED",
        }
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Parse one inbound client message.
///
/// # Errors
///
/// Returns a [`ParseError`] classifying why the text is not a valid message.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ParseError> {
    parse_tagged(text, CLIENT_MESSAGE_TYPES)
}

/// Parse one message received from the server.
///
/// # Errors
///
/// Returns a [`ParseError`] classifying why the text is not a valid message.
pub fn parse_server_message(text: &str) -> Result<ServerMessage, ParseError> {
    parse_tagged(text, SERVER_MESSAGE_TYPES)
}

/// Parse raw bytes as a client message. Bytes must be UTF-8 JSON.
///
/// # Errors
///
/// Returns [`ParseError::NotUtf8`] for non-UTF-8 input, otherwise as
/// [`parse_client_message`].
pub fn parse_client_bytes(bytes: &[u8]) -> Result<ClientMessage, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::NotUtf8)?;
    parse_client_message(text)
}

/// Serialize a message to its JSON wire form.
///
/// # Errors
///
/// Returns the serde error if serialization fails.
pub fn encode<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

fn parse_tagged<T>(text: &str, known: &[&str]) -> Result<T, ParseError>
where
    T: serde::de::DeserializeOwned,
{
    let value: Value = serde_json::from_str(text).map_err(ParseError::InvalidJson)?;
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Err(ParseError::MissingType);
    };
    if !known.contains(&kind) {
        return Err(ParseError::UnknownType(kind.to_owned()));
    }
    let kind = kind.to_owned();
    serde_json::from_value(value).map_err(|source| ParseError::Malformed { kind, source })
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
