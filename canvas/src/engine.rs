use protocol::{ClientMessage, Point, StrokeStyle, Tool};
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::wasm_bindgen;
use web_sys::HtmlCanvasElement;

use crate::reconcile::{ReconcileError, Reconciler};
use crate::render::CanvasSurface;

/// The browser-facing engine. Wraps a `Reconciler` over the page's canvas.
///
/// Inbound frames go through [`Engine::apply`]. Pointer handlers return the
/// JSON text the host should send on the websocket, or `undefined` when
/// there is nothing to send.
#[wasm_bindgen]
pub struct Engine {
    core: Reconciler<CanvasSurface>,
}

#[wasm_bindgen]
impl Engine {
    /// Create a new engine bound to the given canvas element.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the canvas has no 2D context.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas: HtmlCanvasElement) -> Result<Engine, JsValue> {
        Ok(Self { core: Reconciler::new(CanvasSurface::new(canvas)?) })
    }

    // --- Server input ---

    /// Apply one inbound websocket text frame.
    ///
    /// # Errors
    ///
    /// Returns `Err` for undecodable frames or canvas failures.
    pub fn apply(&mut self, text: &str) -> Result<(), JsValue> {
        self.core.apply_text(text).map_err(to_js)
    }

    /// Repaint all visible strokes, e.g. after resizing the canvas.
    ///
    /// # Errors
    ///
    /// Returns `Err` on canvas failures.
    pub fn redraw(&mut self) -> Result<(), JsValue> {
        self.core.redraw().map_err(to_js)
    }

    // --- Pen ---

    /// Select the pen used for local strokes. Unknown tools fall back to the brush.
    pub fn set_pen(&mut self, tool: &str, color: &str, width: f64) {
        let tool = if tool == Tool::Eraser.as_str() { Tool::Eraser } else { Tool::Brush };
        self.core.set_pen(StrokeStyle { tool, color: color.to_owned(), width });
    }

    // --- Input events ---

    /// # Errors
    ///
    /// Returns `Err` if the outbound message cannot be encoded.
    pub fn pointer_down(&mut self, x: f64, y: f64) -> Result<String, JsValue> {
        let message = self.core.pointer_down(Point::new(x, y));
        encode(&message)
    }

    /// # Errors
    ///
    /// Returns `Err` on canvas failures.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Result<Option<String>, JsValue> {
        let message = self.core.pointer_move(Point::new(x, y)).map_err(to_js)?;
        message.as_ref().map(encode).transpose()
    }

    /// # Errors
    ///
    /// Returns `Err` on canvas failures.
    pub fn pointer_up(&mut self, x: f64, y: f64) -> Result<Option<String>, JsValue> {
        let message = self.core.pointer_up(Point::new(x, y)).map_err(to_js)?;
        message.as_ref().map(encode).transpose()
    }

    // --- Commands ---

    /// # Errors
    ///
    /// Returns `Err` if the outbound message cannot be encoded.
    pub fn cursor_move(x: f64, y: f64) -> Result<String, JsValue> {
        encode(&ClientMessage::CursorMove(Point::new(x, y)))
    }

    /// # Errors
    ///
    /// Returns `Err` if the outbound message cannot be encoded.
    pub fn join(room_key: &str, display_name: &str) -> Result<String, JsValue> {
        let display_name = Some(display_name.to_owned()).filter(|name| !name.trim().is_empty());
        encode(&ClientMessage::Join { room_key: Some(room_key.to_owned()), display_name })
    }

    /// # Errors
    ///
    /// Returns `Err` if the outbound message cannot be encoded.
    pub fn undo() -> Result<String, JsValue> {
        encode(&ClientMessage::Undo)
    }

    /// # Errors
    ///
    /// Returns `Err` if the outbound message cannot be encoded.
    pub fn redo() -> Result<String, JsValue> {
        encode(&ClientMessage::Redo)
    }

    /// # Errors
    ///
    /// Returns `Err` if the outbound message cannot be encoded.
    pub fn clear() -> Result<String, JsValue> {
        encode(&ClientMessage::Clear)
    }

    // --- Queries ---

    #[must_use]
    pub fn participant_id(&self) -> Option<u32> {
        self.core.participant_id()
    }

    #[must_use]
    pub fn stroke_count(&self) -> usize {
        self.core.visible().len()
    }

    /// Local strokes still waiting for the server to confirm them.
    #[must_use]
    pub fn unacked_strokes(&self) -> usize {
        self.core.unacked()
    }
}

fn encode(message: &ClientMessage) -> Result<String, JsValue> {
    protocol::encode(message).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn to_js(err: ReconcileError<JsValue>) -> JsValue {
    match err {
        ReconcileError::Surface(value) => value,
        ReconcileError::Decode(e) => JsValue::from_str(&e.to_string()),
    }
}
