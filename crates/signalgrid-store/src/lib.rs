//! Persistence adapter for `SignalGrid` light state (`Dragonfly`).
//!
//! `Dragonfly` mirrors the controller's in-memory light table so that a
//! restarted controller resumes with the last known fleet, and carries
//! change notifications written by other clients (the dashboard) back to
//! the controller. The controller never blocks on this crate: writes arrive
//! through its sync worker and failures are logged, not surfaced.
//!
//! # Modules
//!
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) light state and change feed
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;

// Re-export primary types for convenience.
pub use dragonfly::{CHANGES_CHANNEL, DragonflyStore, LIGHT_INDEX_KEY, light_state_key};
pub use error::StoreError;
