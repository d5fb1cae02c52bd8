use super::*;
use serde_json::json;

fn sample_stroke() -> Stroke {
    Stroke {
        id: 0,
        participant_id: 1,
        tool: Tool::Brush,
        color: "black".into(),
        width: 3.0,
        timestamp: 1,
        points: vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0), Point::new(10.0, 10.0)],
    }
}

// =============================================================================
// CLIENT MESSAGES
// =============================================================================

#[test]
fn parse_join_with_all_fields() {
    let msg = parse_client_message(r#"{"type":"join","roomKey":"r1","displayName":"Ada"}"#).expect("parse");
    assert_eq!(msg, ClientMessage::Join { room_key: Some("r1".into()), display_name: Some("Ada".into()) });
}

#[test]
fn parse_join_without_optional_fields() {
    let msg = parse_client_message(r#"{"type":"join"}"#).expect("parse");
    assert_eq!(msg, ClientMessage::Join { room_key: None, display_name: None });
}

#[test]
fn parse_draw_begin_reads_point_and_style() {
    let msg = parse_client_message(r##"{"type":"draw-begin","x":1.5,"y":2,"tool":"eraser","color":"#fff","width":4}"##)
        .expect("parse");
    let ClientMessage::DrawBegin(point) = msg else {
        panic!("expected draw-begin, got {msg:?}");
    };
    assert_eq!(point.point(), Point::new(1.5, 2.0));
    assert_eq!(point.tool, Tool::Eraser);
    assert_eq!(point.color, "#fff");
    assert!((point.width - 4.0).abs() < f64::EPSILON);
}

#[test]
fn parse_unit_messages() {
    assert_eq!(parse_client_message(r#"{"type":"undo"}"#).expect("undo"), ClientMessage::Undo);
    assert_eq!(parse_client_message(r#"{"type":"redo"}"#).expect("redo"), ClientMessage::Redo);
    assert_eq!(parse_client_message(r#"{"type":"clear"}"#).expect("clear"), ClientMessage::Clear);
}

#[test]
fn parse_cursor_move() {
    let msg = parse_client_message(r#"{"type":"cursor-move","x":3,"y":4}"#).expect("parse");
    assert_eq!(msg, ClientMessage::CursorMove(Point::new(3.0, 4.0)));
}

#[test]
fn kind_matches_wire_type() {
    let msg = ClientMessage::DrawFinish(DrawPoint::new(
        Point::new(0.0, 0.0),
        &StrokeStyle { tool: Tool::Brush, color: "red".into(), width: 1.0 },
    ));
    let value = serde_json::to_value(&msg).expect("serialize");
    assert_eq!(value["type"], json!(msg.kind()));
    assert!(CLIENT_MESSAGE_TYPES.contains(&msg.kind()));
}

// =============================================================================
// PARSE ERRORS
// =============================================================================

#[test]
fn invalid_json_is_classified() {
    let err = parse_client_message("{not json").expect_err("should fail");
    assert!(matches!(err, ParseError::InvalidJson(_)));
    assert_eq!(err.error_code(), "E_INVALID_JSON");
}

#[test]
fn missing_type_is_classified() {
    let err = parse_client_message(r#"{"x":1}"#).expect_err("should fail");
    assert!(matches!(err, ParseError::MissingType));

    let err = parse_client_message(r#"{"type":7}"#).expect_err("should fail");
    assert!(matches!(err, ParseError::MissingType));

    let err = parse_client_message("[1,2]").expect_err("should fail");
    assert!(matches!(err, ParseError::MissingType));
}

#[test]
fn unknown_type_is_classified() {
    let err = parse_client_message(r#"{"type":"teleport"}"#).expect_err("should fail");
    assert!(matches!(err, ParseError::UnknownType(ref kind) if kind == "teleport"));
    assert_eq!(err.error_code(), "E_UNKNOWN_TYPE");
}

#[test]
fn missing_field_is_malformed() {
    let err = parse_client_message(r#"{"type":"draw-begin","x":1,"y":2}"#).expect_err("should fail");
    assert!(matches!(err, ParseError::Malformed { ref kind, .. } if kind == "draw-begin"));
    assert_eq!(err.error_code(), "E_MALFORMED");
}

#[test]
fn unknown_tool_is_malformed() {
    let err = parse_client_message(r#"{"type":"draw-begin","x":1,"y":2,"tool":"spray","color":"red","width":1}"#)
        .expect_err("should fail");
    assert!(matches!(err, ParseError::Malformed { .. }));
}

#[test]
fn server_types_are_not_client_types() {
    let err = parse_client_message(r#"{"type":"joined"}"#).expect_err("should fail");
    assert!(matches!(err, ParseError::UnknownType(_)));
}

#[test]
fn non_utf8_bytes_are_rejected() {
    let err = parse_client_bytes(&[0xff, 0xfe]).expect_err("should fail");
    assert!(matches!(err, ParseError::NotUtf8));
    assert_eq!(err.error_code(), "E_INVALID_UTF8");
}

// =============================================================================
// SERVER MESSAGES
// =============================================================================

#[test]
fn joined_uses_camel_case_fields() {
    let msg = ServerMessage::Joined {
        participant_id: 2,
        color: "#e6194b".into(),
        display_name: "Ada".into(),
        room_key: "r1".into(),
        current_index: 0,
        visible_strokes: vec![sample_stroke()],
        participants: vec![ParticipantRecord {
            participant_id: 2,
            display_name: "Ada".into(),
            color: "#e6194b".into(),
            cursor: None,
        }],
    };
    let value = serde_json::to_value(&msg).expect("serialize");
    assert_eq!(value["type"], "joined");
    assert_eq!(value["participantId"], 2);
    assert_eq!(value["roomKey"], "r1");
    assert_eq!(value["currentIndex"], 0);
    assert_eq!(value["visibleStrokes"][0]["participantId"], 1);
    assert_eq!(value["visibleStrokes"][0]["points"][2], json!({"x": 10.0, "y": 10.0}));
    assert!(value["participants"][0].get("cursor").is_none());
}

#[test]
fn undo_message_carries_history_state() {
    let msg = ServerMessage::Undo(HistoryState { current_index: -1, visible_strokes: vec![] });
    let value = serde_json::to_value(&msg).expect("serialize");
    assert_eq!(value, json!({"type": "undo", "currentIndex": -1, "visibleStrokes": []}));
}

#[test]
fn live_draw_omits_operation_id_until_finish() {
    let point = DrawPoint::new(
        Point::new(1.0, 2.0),
        &StrokeStyle { tool: Tool::Brush, color: "black".into(), width: 2.0 },
    );
    let begin = serde_json::to_value(ServerMessage::Draw(LiveDraw::new(4, DrawPhase::Begin, &point))).expect("begin");
    assert_eq!(begin["phase"], "begin");
    assert!(begin.get("operationId").is_none());

    let finish = ServerMessage::Draw(LiveDraw::new(4, DrawPhase::Finish, &point).with_operation_id(7));
    let value = serde_json::to_value(&finish).expect("finish");
    assert_eq!(value["operationId"], 7);
    assert_eq!(value["participantId"], 4);
}

#[test]
fn server_message_parses_back() {
    let text = encode(&ServerMessage::Redo(HistoryState { current_index: 0, visible_strokes: vec![sample_stroke()] }))
        .expect("encode");
    let parsed = parse_server_message(&text).expect("parse");
    let ServerMessage::Redo(state) = &parsed else {
        panic!("expected redo, got {parsed:?}");
    };
    assert_eq!(state.visible_strokes, vec![sample_stroke()]);
    assert_eq!(parsed.kind(), "redo");
}

#[test]
fn stroke_committed_uses_camel_case_operation_id() {
    let text = encode(&ServerMessage::StrokeCommitted { operation_id: 3 }).expect("encode");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value, json!({"type": "stroke-committed", "operationId": 3}));
    assert_eq!(parse_server_message(&text).expect("parse"), ServerMessage::StrokeCommitted { operation_id: 3 });
}

#[test]
fn only_history_messages_carry_history() {
    let point = DrawPoint::new(Point::new(0.0, 0.0), &sample_stroke().style());
    assert!(ServerMessage::Clear.carries_history());
    assert!(ServerMessage::StrokeCommitted { operation_id: 0 }.carries_history());
    assert!(ServerMessage::Undo(HistoryState { current_index: -1, visible_strokes: vec![] }).carries_history());
    assert!(!ServerMessage::Draw(LiveDraw::new(1, DrawPhase::Begin, &point)).carries_history());
    assert!(!ServerMessage::CursorUpdate { participant_id: 1, x: 0.0, y: 0.0 }.carries_history());
}

#[test]
fn error_from_typed_error() {
    let err = ParseError::UnknownType("teleport".into());
    let msg = ServerMessage::error_from(&err);
    let ServerMessage::Error { message, code } = msg else {
        panic!("expected error message");
    };
    assert_eq!(code, "E_UNKNOWN_TYPE");
    assert!(message.contains("teleport"));
}

#[test]
fn clear_has_only_a_type() {
    let value = serde_json::to_value(ServerMessage::Clear).expect("serialize");
    assert_eq!(value, json!({"type": "clear"}));
}
