//! Core entity structs shared by the controller, the store adapter and the
//! observer API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Color, LightEventKind, Mode, Status};
use crate::ids::{EventId, LightId};

// ---------------------------------------------------------------------------
// Traffic light snapshot
// ---------------------------------------------------------------------------

/// Read-only snapshot of one traffic light.
///
/// This is the shape returned by `get`/`list`, stored by the persistence
/// collaborator, and rendered by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TrafficLight {
    /// Stable identifier.
    pub id: LightId,
    /// Display name, e.g. `Main & 5th`.
    pub name: String,
    /// Display location, e.g. `Downtown`.
    pub location: String,
    /// Current control mode.
    pub mode: Mode,
    /// Current device status.
    pub status: Status,
    /// Currently displayed signal.
    pub color: Color,
    /// Seconds until the next automatic transition. Present only in
    /// [`Mode::Auto`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_time: Option<u32>,
    /// Time of the last state-changing operation (last-writer-wins key).
    pub updated_at: DateTime<Utc>,
}

/// Initial state for registering a light.
///
/// Every field except `name` has a default so that seed files only need to
/// state what differs from an online red light in auto mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TrafficLightInit {
    /// Identifier to register under. Generated when absent.
    #[serde(default)]
    pub id: Option<LightId>,
    /// Display name.
    pub name: String,
    /// Display location.
    #[serde(default)]
    pub location: String,
    /// Initial control mode.
    #[serde(default = "default_mode")]
    pub mode: Mode,
    /// Initial device status.
    #[serde(default = "default_status")]
    pub status: Status,
    /// Initial signal.
    #[serde(default = "default_color")]
    pub color: Color,
    /// Initial countdown for auto mode. Seeded from the dwell table when
    /// absent or zero.
    #[serde(default)]
    pub remaining_time: Option<u32>,
}

impl TrafficLightInit {
    /// An online red light in auto mode with no explicit id.
    pub fn new(name: &str, location: &str) -> Self {
        Self {
            id: None,
            name: name.to_owned(),
            location: location.to_owned(),
            mode: default_mode(),
            status: default_status(),
            color: default_color(),
            remaining_time: None,
        }
    }

    /// Set the identifier.
    #[must_use]
    pub fn with_id(mut self, id: LightId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the control mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the device status.
    #[must_use]
    pub const fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Set the displayed color.
    #[must_use]
    pub const fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Set the initial countdown.
    #[must_use]
    pub const fn with_remaining_time(mut self, seconds: u32) -> Self {
        self.remaining_time = Some(seconds);
        self
    }
}

const fn default_mode() -> Mode {
    Mode::Auto
}

const fn default_status() -> Status {
    Status::Online
}

const fn default_color() -> Color {
    Color::Red
}

// ---------------------------------------------------------------------------
// Remote changes
// ---------------------------------------------------------------------------

/// Partial light state written by another client.
///
/// Only the fields that are `Some` are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LightPatch {
    /// New control mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    /// New device status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// New displayed signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    /// New countdown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_time: Option<u32>,
}

impl LightPatch {
    /// Whether the patch carries no changes.
    pub const fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.status.is_none()
            && self.color.is_none()
            && self.remaining_time.is_none()
    }
}

/// An externally originated change notification from the persistence
/// collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RemoteUpdate {
    /// The light the change applies to.
    pub id: LightId,
    /// The changed fields.
    pub patch: LightPatch,
    /// When the remote writer made the change.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A state change produced by the registry.
///
/// Carries the full post-change snapshot so that subscribers (sync worker,
/// `WebSocket` clients, event log) never need to query back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LightEvent {
    /// Unique event identifier.
    pub id: EventId,
    /// What happened.
    pub kind: LightEventKind,
    /// Tick number for tick-driven events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick: Option<u64>,
    /// The light state after the change.
    pub light: TrafficLight,
    /// Wall-clock time the event was produced.
    pub at: DateTime<Utc>,
}

impl LightEvent {
    /// Build an event for `light` stamped with the light's `updated_at`.
    pub fn new(kind: LightEventKind, light: TrafficLight, tick: Option<u64>) -> Self {
        let at = light.updated_at;
        Self {
            id: EventId::new(),
            kind,
            tick,
            light,
            at,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Fleet-wide counts shown on the dashboard's stat cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FleetSummary {
    /// Number of registered lights.
    pub total: u32,
    /// Lights with [`Status::Online`].
    pub online: u32,
    /// Lights with [`Status::Offline`].
    pub offline: u32,
    /// Lights with [`Status::Maintenance`].
    pub maintenance: u32,
    /// Lights in [`Mode::Auto`].
    pub auto: u32,
    /// Lights in [`Mode::Manual`].
    pub manual: u32,
    /// Lights in [`Mode::Emergency`].
    pub emergency: u32,
    /// Lights showing red.
    pub red: u32,
    /// Lights showing yellow.
    pub yellow: u32,
    /// Lights showing green.
    pub green: u32,
}

impl FleetSummary {
    /// Count one light into the summary.
    pub const fn record(&mut self, light: &TrafficLight) {
        self.total = self.total.saturating_add(1);
        match light.status {
            Status::Online => self.online = self.online.saturating_add(1),
            Status::Offline => self.offline = self.offline.saturating_add(1),
            Status::Maintenance => self.maintenance = self.maintenance.saturating_add(1),
        }
        match light.mode {
            Mode::Auto => self.auto = self.auto.saturating_add(1),
            Mode::Manual => self.manual = self.manual.saturating_add(1),
            Mode::Emergency => self.emergency = self.emergency.saturating_add(1),
        }
        match light.color {
            Color::Red => self.red = self.red.saturating_add(1),
            Color::Yellow => self.yellow = self.yellow.saturating_add(1),
            Color::Green => self.green = self.green.saturating_add(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(status: Status, mode: Mode, color: Color) -> TrafficLight {
        TrafficLight {
            id: LightId::generate(),
            name: String::from("Main & 5th"),
            location: String::from("Downtown"),
            mode,
            status,
            color,
            remaining_time: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn init_defaults_fill_missing_fields() {
        let init: TrafficLightInit =
            serde_json::from_str(r#"{"name": "Broadway & Park"}"#).unwrap_or_else(|_| {
                TrafficLightInit::new("fallback", "")
            });
        assert_eq!(init.name, "Broadway & Park");
        assert_eq!(init.mode, Mode::Auto);
        assert_eq!(init.status, Status::Online);
        assert_eq!(init.color, Color::Red);
        assert!(init.id.is_none());
        assert!(init.remaining_time.is_none());
    }

    #[test]
    fn remaining_time_omitted_outside_auto() {
        let manual = light(Status::Online, Mode::Manual, Color::Green);
        let json = serde_json::to_value(&manual).unwrap_or_default();
        assert!(json.get("remaining_time").is_none());
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(LightPatch::default().is_empty());
        let patch = LightPatch {
            color: Some(Color::Green),
            ..LightPatch::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn summary_counts_each_dimension() {
        let mut summary = FleetSummary::default();
        summary.record(&light(Status::Online, Mode::Auto, Color::Red));
        summary.record(&light(Status::Online, Mode::Manual, Color::Green));
        summary.record(&light(Status::Maintenance, Mode::Auto, Color::Red));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.online, 2);
        assert_eq!(summary.maintenance, 1);
        assert_eq!(summary.auto, 2);
        assert_eq!(summary.manual, 1);
        assert_eq!(summary.red, 2);
        assert_eq!(summary.green, 1);
        assert_eq!(summary.yellow, 0);
    }
}
