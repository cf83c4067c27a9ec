//! Shared type definitions for the `SignalGrid` traffic-light controller.
//!
//! This crate is the single source of truth for all types used across the
//! `SignalGrid` workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the monitoring dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Light and event identifiers
//! - [`enums`] -- Color, mode, status and event-kind enumerations
//! - [`structs`] -- Light snapshots, registration input, remote patches,
//!   events and fleet summaries
//! - [`commands`] -- Serializable command envelope for remote callers

pub mod commands;
pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use commands::{CommandReply, LightCommand};
pub use enums::{Color, LightEventKind, Mode, Status};
pub use ids::{EventId, InvalidLightId, LightId, MAX_LIGHT_ID_LEN};
pub use structs::{
    FleetSummary, LightEvent, LightPatch, RemoteUpdate, TrafficLight, TrafficLightInit,
};
