//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the room registry behind one async `RwLock` and the startup
//! config. The registry lock is the single ordering point for every room
//! mutation; session handlers take it once per inbound message.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::services::room::RoomRegistry;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RwLock<RoomRegistry>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let registry = RoomRegistry::new(config.palette.clone());
        Self { registry: Arc::new(RwLock::new(registry)), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use protocol::{DrawPoint, ServerMessage, Tool};
    use tokio::sync::mpsc;

    /// Create a test `AppState` with default config.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(ServerConfig::default())
    }

    /// Brush point in black, width 3.
    #[must_use]
    pub fn brush_point(x: f64, y: f64) -> DrawPoint {
        DrawPoint { x, y, tool: Tool::Brush, color: "black".into(), width: 3.0 }
    }

    /// Everything currently queued on an outbox receiver.
    pub fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(message);
        }
        out
    }
}
