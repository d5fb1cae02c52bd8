//! Operation log: one room's ordered stroke history with an undo cursor.
//!
//! DESIGN
//! ======
//! Strokes are kept in commit order. `visible` counts how many of them form
//! the visible prefix, so the wire-level `currentIndex` is `visible - 1` and
//! `-1` means nothing is visible. Strokes past the prefix are the redo tail;
//! they survive undo/redo but are dropped by the next commit.
//!
//! The log knows nothing about connections or participants beyond the author
//! id recorded on each stroke.
//!
//! TRADE-OFFS
//! ==========
//! History is unbounded. The only reclamation is `clear` or the room being
//! destroyed when its last participant leaves.

use protocol::{DrawPoint, HistoryState, OperationId, ParticipantId, Point, Stroke, StrokeStyle};

// =============================================================================
// CANDIDATE STROKE
// =============================================================================

/// A stroke being drawn: accumulated between draw-begin and draw-finish and
/// committed to the log as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateStroke {
    pub participant_id: ParticipantId,
    pub style: StrokeStyle,
    pub points: Vec<Point>,
}

impl CandidateStroke {
    /// Start a stroke at `first`, taking its style from the begin point.
    #[must_use]
    pub fn begin(participant_id: ParticipantId, first: &DrawPoint) -> Self {
        Self { participant_id, style: first.style(), points: vec![first.point()] }
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// =============================================================================
// OPERATION LOG
// =============================================================================

#[derive(Debug, Default)]
pub struct OperationLog {
    strokes: Vec<Stroke>,
    /// Length of the visible prefix.
    visible: usize,
    /// Logical commit clock. Never reset while the room lives.
    clock: u64,
}

impl OperationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a finished stroke, truncating any redo tail first.
    ///
    /// Returns the stroke's operation id, which is also the new `currentIndex`.
    pub fn commit(&mut self, candidate: CandidateStroke) -> OperationId {
        self.strokes.truncate(self.visible);
        self.clock += 1;

        let id = self.strokes.len();
        let CandidateStroke { participant_id, style, points } = candidate;
        self.strokes.push(Stroke {
            id,
            participant_id,
            tool: style.tool,
            color: style.color,
            width: style.width,
            timestamp: self.clock,
            points,
        });
        self.visible = self.strokes.len();
        id
    }

    /// Step the cursor back by one stroke. `None` when nothing is visible;
    /// the log is left unchanged in that case.
    pub fn undo(&mut self) -> Option<HistoryState> {
        if self.visible == 0 {
            return None;
        }
        self.visible -= 1;
        Some(self.snapshot())
    }

    /// Step the cursor forward by one stroke. `None` when there is no redo
    /// tail; the log is left unchanged in that case.
    pub fn redo(&mut self) -> Option<HistoryState> {
        if self.visible >= self.strokes.len() {
            return None;
        }
        self.visible += 1;
        Some(self.snapshot())
    }

    /// Drop every stroke, including the redo tail. Cannot be undone.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.visible = 0;
    }

    /// Strokes `0..=currentIndex`, in commit order.
    #[must_use]
    pub fn visible(&self) -> &[Stroke] {
        &self.strokes[..self.visible]
    }

    /// Cursor position plus a copy of the visible prefix.
    #[must_use]
    pub fn snapshot(&self) -> HistoryState {
        HistoryState { current_index: self.current_index(), visible_strokes: self.visible().to_vec() }
    }

    /// Index of the last visible stroke, `-1` when nothing is visible.
    #[must_use]
    pub fn current_index(&self) -> i64 {
        i64::try_from(self.visible).unwrap_or(i64::MAX) - 1
    }

    /// Total strokes retained, redo tail included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

#[cfg(test)]
#[path = "oplog_test.rs"]
mod tests;
