//! Shared constants for the canvas crate.

// ── Pen defaults ────────────────────────────────────────────────

/// Color of the local pen before the host picks one.
pub const DEFAULT_COLOR: &str = "#000000";

/// Line width of the local pen in canvas pixels.
pub const DEFAULT_WIDTH: f64 = 3.0;

// ── Compositing ─────────────────────────────────────────────────

/// Normal painting.
pub const COMPOSITE_PAINT: &str = "source-over";

/// Eraser strokes punch through to transparent.
pub const COMPOSITE_ERASE: &str = "destination-out";

/// Cap and join style for every stroke. Round caps make one-point strokes
/// visible as dots.
pub const LINE_STYLE: &str = "round";
