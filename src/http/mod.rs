//! axum HTTP surface over the [`Engine`](crate::engine::Engine).
//!
//! Handlers parse and shape JSON; every rule lives in the engine.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
