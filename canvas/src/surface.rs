//! Paint backend abstraction.
//!
//! The reconciler never touches a browser API directly. It issues two kinds
//! of operations against a `Surface`: wipe everything, or stroke one
//! continuous path. A web canvas implements this in [`crate::render`]; tests
//! record the calls instead.

use protocol::{Point, StrokeStyle};

pub trait Surface {
    type Error;

    /// Erase the whole drawing area.
    ///
    /// # Errors
    ///
    /// Backend-specific failure.
    fn clear(&mut self) -> Result<(), Self::Error>;

    /// Stroke one continuous path through `points` in order. A single point
    /// renders as a dot; an empty slice draws nothing.
    ///
    /// # Errors
    ///
    /// Backend-specific failure.
    fn stroke_path(&mut self, points: &[Point], style: &StrokeStyle) -> Result<(), Self::Error>;
}
