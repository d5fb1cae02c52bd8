//! Rendering: a [`Surface`] backed by a 2D canvas context.
//!
//! This module is the only place that touches [`web_sys::CanvasRenderingContext2d`].
//! It receives points and a style and produces pixels; it never inspects room
//! state.
//!
//! All fallible `Canvas2D` calls propagate errors via `Result<(), JsValue>`.
//! The top-level caller ([`crate::engine::Engine`]) hands them back to JS.

use protocol::{Point, StrokeStyle, Tool};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::consts::{COMPOSITE_ERASE, COMPOSITE_PAINT, LINE_STYLE};
use crate::surface::Surface;

pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl CanvasSurface {
    /// Bind to a canvas element's 2D context.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the element has no 2D context.
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, JsValue> {
        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("canvas has no 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        Ok(Self { canvas, ctx })
    }
}

impl Surface for CanvasSurface {
    type Error = JsValue;

    fn clear(&mut self) -> Result<(), JsValue> {
        self.ctx.set_global_composite_operation(COMPOSITE_PAINT)?;
        self.ctx
            .clear_rect(0.0, 0.0, f64::from(self.canvas.width()), f64::from(self.canvas.height()));
        Ok(())
    }

    fn stroke_path(&mut self, points: &[Point], style: &StrokeStyle) -> Result<(), JsValue> {
        let Some((first, rest)) = points.split_first() else {
            return Ok(());
        };

        self.ctx.save();
        let composite = match style.tool {
            Tool::Brush => COMPOSITE_PAINT,
            Tool::Eraser => COMPOSITE_ERASE,
        };
        self.ctx.set_global_composite_operation(composite)?;
        self.ctx.set_stroke_style_str(&style.color);
        self.ctx.set_line_width(style.width);
        self.ctx.set_line_cap(LINE_STYLE);
        self.ctx.set_line_join(LINE_STYLE);

        self.ctx.begin_path();
        self.ctx.move_to(first.x, first.y);
        if rest.is_empty() {
            // Zero-length segment; the round cap turns it into a dot.
            self.ctx.line_to(first.x, first.y);
        }
        for point in rest {
            self.ctx.line_to(point.x, point.y);
        }
        self.ctx.stroke();
        self.ctx.restore();
        Ok(())
    }
}
