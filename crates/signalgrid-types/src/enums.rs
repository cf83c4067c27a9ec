//! Enumeration types for the `SignalGrid` controller.
//!
//! Closed variant sets for signal color, control mode, device status and
//! event kinds. All serialize as lowercase strings to match the dashboard's
//! document schema.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Signal color
// ---------------------------------------------------------------------------

/// The signal currently displayed by a traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Color {
    /// Stop.
    Red,
    /// Prepare to stop.
    Yellow,
    /// Proceed.
    Green,
}

impl Color {
    /// All colors in declaration order.
    pub const ALL: [Self; 3] = [Self::Red, Self::Yellow, Self::Green];

    /// The color entered after this one in the automatic cycle
    /// `red -> green -> yellow -> red`.
    pub const fn next(self) -> Self {
        match self {
            Self::Red => Self::Green,
            Self::Green => Self::Yellow,
            Self::Yellow => Self::Red,
        }
    }

    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
        }
    }
}

impl core::fmt::Display for Color {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Control mode
// ---------------------------------------------------------------------------

/// The control regime that decides who drives color changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Mode {
    /// The controller cycles colors on the dwell timer.
    Auto,
    /// An operator sets the color directly; no timer runs.
    Manual,
    /// Forced red, cycling suspended. Displayed as flashing red.
    Emergency,
}

impl Mode {
    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Emergency => "emergency",
        }
    }
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Device status
// ---------------------------------------------------------------------------

/// Operational availability of the light's hardware and link.
///
/// Independent of the displayed signal. Anything other than
/// [`Status::Online`] freezes the light: ticks are ignored and commands
/// are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Status {
    /// Reachable and accepting ticks and commands.
    Online,
    /// Unreachable.
    Offline,
    /// Taken out of service by field crews.
    Maintenance,
}

impl Status {
    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Maintenance => "maintenance",
        }
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What caused a [`LightEvent`](crate::LightEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LightEventKind {
    /// The light was added to the registry.
    Registered,
    /// A tick decremented the countdown without changing color.
    Countdown,
    /// A tick exhausted the dwell period and advanced the color.
    AutoAdvanced,
    /// The control mode changed.
    ModeChanged,
    /// An operator set the color in manual mode.
    ColorSet,
    /// The device status changed.
    StatusChanged,
    /// A newer externally originated state was merged.
    RemoteMerged,
    /// The light was removed from the registry.
    Deregistered,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_visits_every_color_and_returns() {
        let mut color = Color::Red;
        let mut seen = Vec::new();
        for _ in 0..3 {
            color = color.next();
            seen.push(color);
        }
        assert_eq!(seen, vec![Color::Green, Color::Yellow, Color::Red]);
    }

    #[test]
    fn enums_use_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&Mode::Emergency).ok().as_deref(),
            Some("\"emergency\"")
        );
        assert_eq!(
            serde_json::to_string(&Status::Maintenance).ok().as_deref(),
            Some("\"maintenance\"")
        );
        let color: Result<Color, _> = serde_json::from_str("\"yellow\"");
        assert_eq!(color.ok(), Some(Color::Yellow));
        let bad: Result<Color, _> = serde_json::from_str("\"blue\"");
        assert!(bad.is_err());
    }

    #[test]
    fn display_matches_wire_name() {
        for color in Color::ALL {
            let json = serde_json::to_string(&color).unwrap_or_default();
            assert_eq!(json, format!("\"{color}\""));
        }
        assert_eq!(Mode::Manual.to_string(), "manual");
        assert_eq!(Status::Offline.to_string(), "offline");
    }

    #[test]
    fn event_kind_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&LightEventKind::AutoAdvanced).ok().as_deref(),
            Some("\"auto_advanced\"")
        );
    }
}
