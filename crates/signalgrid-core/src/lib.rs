//! Light state machines, registry, tick clock and controller loop for
//! `SignalGrid`.
//!
//! A single global tick drives every light: the [`runner`] issues ticks
//! from the [`clock`], the [`registry`] fans each tick out to the
//! per-light state machines in [`light`], and every resulting change is
//! published to live subscribers and, through [`sync`], to the durable
//! store.
//!
//! # Modules
//!
//! - [`clock`] -- Monotonic tick provider.
//! - [`config`] -- Configuration loading from `signalgrid-config.yaml` into
//!   strongly-typed structs.
//! - [`error`] -- [`ControlError`], the rejection returned by commands.
//! - [`light`] -- Per-light state machine (auto cycle, manual, emergency).
//! - [`registry`] -- [`LightRegistry`]: ownership, tick fan-out, events.
//! - [`command`] -- [`CommandInterface`] for external callers.
//! - [`sync`] -- Store backends, fire-and-forget sync worker and the remote
//!   change feed.
//! - [`operator`] -- Pause/resume/speed/stop control state.
//! - [`runner`] -- The async tick loop.
//!
//! [`ControlError`]: error::ControlError
//! [`LightRegistry`]: registry::LightRegistry
//! [`CommandInterface`]: command::CommandInterface

pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod light;
pub mod operator;
pub mod registry;
pub mod runner;
pub mod sync;
