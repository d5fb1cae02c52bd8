use super::*;
use protocol::Tool;

fn candidate(participant_id: ParticipantId, xs: &[f64]) -> CandidateStroke {
    CandidateStroke {
        participant_id,
        style: StrokeStyle { tool: Tool::Brush, color: "black".into(), width: 3.0 },
        points: xs.iter().map(|x| Point::new(*x, *x)).collect(),
    }
}

fn log_with(n: u32) -> OperationLog {
    let mut log = OperationLog::new();
    for i in 0..n {
        log.commit(candidate(1, &[f64::from(i)]));
    }
    log
}

fn first_xs(strokes: &[Stroke]) -> Vec<f64> {
    strokes.iter().map(|s| s.points[0].x).collect()
}

// =============================================================================
// COMMIT
// =============================================================================

#[test]
fn new_log_is_empty() {
    let mut log = OperationLog::new();
    assert!(log.is_empty());
    assert_eq!(log.current_index(), -1);
    assert!(log.visible().is_empty());
    assert!(log.undo().is_none());
    assert!(log.redo().is_none());
}

#[test]
fn commit_returns_index_and_advances_cursor() {
    let mut log = OperationLog::new();
    assert_eq!(log.commit(candidate(1, &[0.0])), 0);
    assert_eq!(log.commit(candidate(2, &[1.0])), 1);
    assert_eq!(log.current_index(), 1);
    assert_eq!(log.visible().len(), 2);
    assert_eq!(log.visible()[1].id, 1);
    assert_eq!(log.visible()[1].participant_id, 2);
}

#[test]
fn commit_keeps_whole_point_path() {
    let mut log = OperationLog::new();
    log.commit(candidate(1, &[0.0, 5.0, 10.0]));
    let stroke = &log.visible()[0];
    assert_eq!(stroke.points, vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0), Point::new(10.0, 10.0)]);
    assert_eq!(stroke.color, "black");
    assert_eq!(stroke.tool, Tool::Brush);
}

#[test]
fn commit_truncates_redo_tail() {
    // length n = 5, currentIndex k = 1 after three undos.
    let mut log = log_with(5);
    for _ in 0..3 {
        assert!(log.undo().is_some());
    }
    assert_eq!(log.current_index(), 1);

    let id = log.commit(candidate(9, &[99.0]));
    assert_eq!(id, 2);
    assert_eq!(log.len(), 3);
    assert_eq!(first_xs(log.visible()), vec![0.0, 1.0, 99.0]);
    assert!(log.redo().is_none(), "truncated strokes must be unreachable");
}

#[test]
fn timestamps_are_monotonic_across_truncation() {
    let mut log = log_with(2);
    log.undo();
    log.commit(candidate(1, &[7.0]));
    let stamps: Vec<u64> = log.visible().iter().map(|s| s.timestamp).collect();
    assert_eq!(stamps, vec![1, 3]);
}

// =============================================================================
// UNDO / REDO
// =============================================================================

#[test]
fn undo_then_redo_restores_visible_sequence() {
    for m in 0..=4 {
        let mut log = log_with(4);
        let before = log.visible().to_vec();
        for _ in 0..m {
            assert!(log.undo().is_some());
        }
        for _ in 0..m {
            assert!(log.redo().is_some());
        }
        assert_eq!(log.visible(), before.as_slice(), "m = {m}");
    }
}

#[test]
fn undo_reports_new_state() {
    let mut log = log_with(2);
    let state = log.undo().expect("undo should succeed");
    assert_eq!(state.current_index, 0);
    assert_eq!(state.visible_strokes.len(), 1);
}

#[test]
fn undo_on_empty_log_fails_without_change() {
    let mut log = OperationLog::new();
    assert!(log.undo().is_none());
    assert_eq!(log.current_index(), -1);
}

#[test]
fn undo_at_floor_fails_without_change() {
    let mut log = log_with(1);
    let state = log.undo().expect("first undo");
    assert_eq!(state.current_index, -1);
    assert!(state.visible_strokes.is_empty());
    assert!(log.undo().is_none());
    assert_eq!(log.current_index(), -1);
    assert_eq!(log.len(), 1, "undone strokes are retained for redo");
}

#[test]
fn redo_at_ceiling_fails_without_change() {
    let mut log = log_with(2);
    assert!(log.redo().is_none());
    assert_eq!(log.current_index(), 1);
}

// =============================================================================
// CLEAR
// =============================================================================

#[test]
fn clear_discards_everything() {
    let mut log = log_with(3);
    log.undo();
    log.clear();
    assert!(log.is_empty());
    assert_eq!(log.current_index(), -1);
    assert!(log.undo().is_none());
    assert!(log.redo().is_none());
}

#[test]
fn commit_after_clear_starts_at_zero() {
    let mut log = log_with(3);
    log.clear();
    assert_eq!(log.commit(candidate(1, &[0.0])), 0);
    assert_eq!(log.visible()[0].timestamp, 4);
}

// =============================================================================
// CANDIDATE STROKE
// =============================================================================

#[test]
fn candidate_takes_style_from_begin_point() {
    let begin = DrawPoint {
        x: 1.0,
        y: 2.0,
        tool: Tool::Eraser,
        color: "white".into(),
        width: 8.0,
    };
    let mut c = CandidateStroke::begin(3, &begin);
    c.push(Point::new(4.0, 5.0));
    assert_eq!(c.len(), 2);
    assert!(!c.is_empty());
    assert_eq!(c.style.tool, Tool::Eraser);
    assert_eq!(c.points[0], Point::new(1.0, 2.0));
}
