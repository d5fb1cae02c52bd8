//! Client-side reconciliation and rendering for collaborative drawing rooms.
//!
//! This crate is compiled to WebAssembly and runs in the browser. It turns
//! server messages into canvas paint operations and local pointer input into
//! outbound drawing messages. The host JavaScript layer owns the websocket;
//! it feeds every inbound text frame to [`engine::Engine::apply`] and sends
//! whatever the pointer handlers return.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | wasm-bindgen entry point wrapping a [`reconcile::Reconciler`] |
//! | [`reconcile`] | Visible-stroke mirror, replay, live remote drawing, local echo |
//! | [`surface`] | The `Surface` trait every paint backend implements |
//! | [`render`] | `Surface` backed by a 2D canvas context |
//! | [`consts`] | Default pen settings and compositing names |

pub mod consts;
pub mod engine;
pub mod reconcile;
pub mod render;
pub mod surface;
