//! Observer API server for the `SignalGrid` controller.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/lights`) for real-time light event
//!   streaming via [`tokio::sync::broadcast`]
//! - **REST endpoints** for reading and commanding lights (list, get,
//!   register, deregister, mode, color, status, recent events, summary)
//! - **Command endpoint** (`/api/commands`) accepting the serialized
//!   [`LightCommand`](signalgrid_types::LightCommand) envelope
//! - **Operator REST endpoints** for runtime control (pause, resume,
//!   speed, status, stop)
//! - **Minimal HTML page** (`GET /`) showing the current tick and fleet
//!   counts
//!
//! # Architecture
//!
//! Handlers call the controller's
//! [`CommandInterface`](signalgrid_core::command::CommandInterface)
//! directly. Each command locks only the light it targets, so the API
//! never blocks the tick loop. `WebSocket` clients receive light events
//! through the registry's broadcast channel with automatic lag handling.

pub mod error;
pub mod handlers;
pub mod operator;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ObserverServer, ServerConfig, ServerError};
pub use state::AppState;
