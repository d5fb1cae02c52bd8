//! Domain services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room state and drawing history so the route handler
//! can stay focused on transport: reading frames, writing replies, and
//! draining the per-connection outbox.

pub mod cursor;
pub mod oplog;
pub mod room;
pub mod session;
