//! Client reconciliation: keeps a surface in step with the room's history.
//!
//! DESIGN
//! ======
//! The reconciler holds a mirror of the room's visible strokes. Any message
//! that carries a full visible list (`joined`, `undo`, `redo`) replaces the
//! mirror and repaints from scratch: clear, then one continuous path per
//! stroke in log order. Repainting is a pure function of the list, so the
//! same list always yields the same surface operations.
//!
//! Live `draw` messages are painted incrementally. Each remote participant
//! has at most one in-flight path; `begin` starts it, `continue` and
//! `finish` each paint one segment from the previous point. On `finish` the
//! completed path joins the mirror at the operation id the server assigned.
//!
//! Local pointer input is echoed straight to the surface and converted into
//! the outbound messages the host should send. A finished local stroke waits
//! in a queue until the server's `stroke-committed` ack names its operation
//! id; acks arrive in the order this connection finished its strokes. Queued
//! strokes are painted on top of the mirror on every repaint.

use std::collections::{HashMap, VecDeque};

use protocol::{
    ClientMessage, DrawPhase, DrawPoint, HistoryState, LiveDraw, OperationId, ParseError, ParticipantId,
    ParticipantRecord, Point, ServerMessage, Stroke, StrokeStyle, Tool,
};

use crate::consts::{DEFAULT_COLOR, DEFAULT_WIDTH};
use crate::surface::Surface;

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod reconcile_test;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError<E> {
    #[error("surface operation failed: {0:?}")]
    Surface(E),
    #[error("invalid server message: {0}")]
    Decode(#[from] ParseError),
}

/// A path being drawn, either by a remote participant or locally.
#[derive(Debug, Clone, PartialEq)]
struct OpenPath {
    style: StrokeStyle,
    points: Vec<Point>,
}

impl OpenPath {
    fn start(point: Point, style: StrokeStyle) -> Self {
        Self { style, points: vec![point] }
    }

    fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }
}

pub struct Reconciler<S> {
    surface: S,
    visible: Vec<Stroke>,
    remote: HashMap<ParticipantId, OpenPath>,
    local: Option<OpenPath>,
    /// Finished local strokes the server has not acknowledged yet.
    unacked: VecDeque<Stroke>,
    pen: StrokeStyle,
    participant_id: Option<ParticipantId>,
    participants: Vec<ParticipantRecord>,
}

impl<S: Surface> Reconciler<S> {
    #[must_use]
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            visible: Vec::new(),
            remote: HashMap::new(),
            local: None,
            unacked: VecDeque::new(),
            pen: StrokeStyle { tool: Tool::Brush, color: DEFAULT_COLOR.into(), width: DEFAULT_WIDTH },
            participant_id: None,
            participants: Vec::new(),
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// The mirror of the room's visible strokes, in log order.
    #[must_use]
    pub fn visible(&self) -> &[Stroke] {
        &self.visible
    }

    /// Local strokes sent but not yet acknowledged, oldest first.
    #[must_use]
    pub fn unacked(&self) -> usize {
        self.unacked.len()
    }

    /// Our participant id, once joined.
    #[must_use]
    pub fn participant_id(&self) -> Option<ParticipantId> {
        self.participant_id
    }

    #[must_use]
    pub fn participants(&self) -> &[ParticipantRecord] {
        &self.participants
    }

    /// Whether a remote participant currently has a path open.
    #[must_use]
    pub fn is_tracking(&self, participant_id: ParticipantId) -> bool {
        self.remote.contains_key(&participant_id)
    }

    #[must_use]
    pub fn pen(&self) -> &StrokeStyle {
        &self.pen
    }

    pub fn set_pen(&mut self, pen: StrokeStyle) {
        self.pen = pen;
    }

    // --- Server input ---

    /// Decode one inbound text frame and apply it.
    ///
    /// # Errors
    ///
    /// Returns `Decode` for frames that are not server messages and
    /// `Surface` if painting fails.
    pub fn apply_text(&mut self, text: &str) -> Result<(), ReconcileError<S::Error>> {
        let message = protocol::parse_server_message(text)?;
        self.apply(&message)
    }

    /// Apply one server message to the mirror and the surface.
    ///
    /// # Errors
    ///
    /// Returns `Surface` if painting fails.
    pub fn apply(&mut self, message: &ServerMessage) -> Result<(), ReconcileError<S::Error>> {
        match message {
            ServerMessage::Joined { participant_id, visible_strokes, participants, .. } => {
                self.participant_id = Some(*participant_id);
                self.participants.clone_from(participants);
                self.remote.clear();
                // Acks for strokes sent to a previous room never arrive.
                self.unacked.clear();
                self.replace(visible_strokes)
            }
            ServerMessage::Undo(HistoryState { visible_strokes, .. })
            | ServerMessage::Redo(HistoryState { visible_strokes, .. }) => self.replace(visible_strokes),
            ServerMessage::Clear => {
                self.visible.clear();
                self.redraw()
            }
            ServerMessage::Draw(live) => self.apply_live(live),
            ServerMessage::StrokeCommitted { operation_id } => {
                if let Some(mut stroke) = self.unacked.pop_front() {
                    stroke.id = *operation_id;
                    self.commit(stroke);
                }
                Ok(())
            }
            ServerMessage::ParticipantJoined { participants, .. } => {
                self.participants.clone_from(participants);
                Ok(())
            }
            ServerMessage::ParticipantLeft { participant_id, participants } => {
                self.remote.remove(participant_id);
                self.participants.clone_from(participants);
                Ok(())
            }
            ServerMessage::CursorUpdate { participant_id, x, y } => {
                if let Some(record) = self.participants.iter_mut().find(|p| p.participant_id == *participant_id) {
                    record.cursor = Some(Point::new(*x, *y));
                }
                Ok(())
            }
            ServerMessage::Error { .. } => Ok(()),
        }
    }

    /// Repaint the mirror and any unacknowledged local strokes, e.g. after the
    /// canvas was resized.
    ///
    /// # Errors
    ///
    /// Returns `Surface` if painting fails.
    pub fn redraw(&mut self) -> Result<(), ReconcileError<S::Error>> {
        self.surface.clear().map_err(ReconcileError::Surface)?;
        for stroke in self.visible.iter().chain(&self.unacked) {
            self.surface
                .stroke_path(&stroke.points, &stroke.style())
                .map_err(ReconcileError::Surface)?;
        }
        Ok(())
    }

    fn replace(&mut self, strokes: &[Stroke]) -> Result<(), ReconcileError<S::Error>> {
        self.visible = strokes.to_vec();
        self.redraw()
    }

    fn apply_live(&mut self, live: &LiveDraw) -> Result<(), ReconcileError<S::Error>> {
        if Some(live.participant_id) == self.participant_id {
            return Ok(());
        }
        let point = live.point();
        match live.phase {
            DrawPhase::Begin => {
                self.remote.insert(live.participant_id, OpenPath::start(point, live.style()));
                Ok(())
            }
            DrawPhase::Continue => self.extend_remote(live),
            DrawPhase::Finish => {
                self.extend_remote(live)?;
                let Some(path) = self.remote.remove(&live.participant_id) else {
                    return Ok(());
                };
                let stroke = finished_stroke(live.participant_id, path, live.operation_id.unwrap_or(self.visible.len()));
                self.commit(stroke);
                Ok(())
            }
        }
    }

    /// Paint one segment for a remote participant. A continue or finish with
    /// no open path starts one at this point.
    fn extend_remote(&mut self, live: &LiveDraw) -> Result<(), ReconcileError<S::Error>> {
        let point = live.point();
        let Some(path) = self.remote.get_mut(&live.participant_id) else {
            self.remote.insert(live.participant_id, OpenPath::start(point, live.style()));
            return Ok(());
        };
        if let Some(previous) = path.last() {
            self.surface
                .stroke_path(&[previous, point], &live.style())
                .map_err(ReconcileError::Surface)?;
        }
        path.points.push(point);
        Ok(())
    }

    /// Commit into the mirror the way the server's log does: drop any redo
    /// tail at `stroke.id`, then append.
    fn commit(&mut self, stroke: Stroke) {
        self.visible.truncate(stroke.id);
        self.visible.push(stroke);
    }

    // --- Local input ---

    /// Start a local stroke with the current pen.
    #[must_use]
    pub fn pointer_down(&mut self, point: Point) -> ClientMessage {
        self.local = Some(OpenPath::start(point, self.pen.clone()));
        ClientMessage::DrawBegin(DrawPoint::new(point, &self.pen))
    }

    /// Extend the local stroke. Returns `None` when no stroke is open.
    ///
    /// # Errors
    ///
    /// Returns `Surface` if painting fails.
    pub fn pointer_move(&mut self, point: Point) -> Result<Option<ClientMessage>, ReconcileError<S::Error>> {
        let Some(path) = self.local.as_mut() else {
            return Ok(None);
        };
        if let Some(previous) = path.last() {
            self.surface
                .stroke_path(&[previous, point], &path.style)
                .map_err(ReconcileError::Surface)?;
        }
        path.points.push(point);
        Ok(Some(ClientMessage::DrawContinue(DrawPoint::new(point, &path.style))))
    }

    /// Finish the local stroke and queue it for the server's ack. Returns
    /// `None` when no stroke is open.
    ///
    /// # Errors
    ///
    /// Returns `Surface` if painting fails.
    pub fn pointer_up(&mut self, point: Point) -> Result<Option<ClientMessage>, ReconcileError<S::Error>> {
        if self.pointer_move(point)?.is_none() {
            return Ok(None);
        }
        let Some(path) = self.local.take() else {
            return Ok(None);
        };
        let message = ClientMessage::DrawFinish(DrawPoint::new(point, &path.style));
        let owner = self.participant_id.unwrap_or_default();
        self.unacked.push_back(finished_stroke(owner, path, 0));
        Ok(Some(message))
    }
}

fn finished_stroke(participant_id: ParticipantId, path: OpenPath, id: OperationId) -> Stroke {
    Stroke {
        id,
        participant_id,
        tool: path.style.tool,
        color: path.style.color,
        width: path.style.width,
        // The logical clock lives on the server; live strokes carry none.
        timestamp: 0,
        points: path.points,
    }
}
