//! Command envelope for remote control channels.
//!
//! A [`LightCommand`] is the serializable form of the operations the
//! controller exposes to external callers. The observer API accepts it at
//! `POST /api/commands`; any other transport can carry the same JSON.
//!
//! ```json
//! { "command": "set_mode", "id": "tl-001", "mode": "emergency" }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Color, Mode, Status};
use crate::ids::LightId;
use crate::structs::TrafficLight;

/// An operation requested by an external caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "command", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LightCommand {
    /// Change the control mode of one light.
    SetMode {
        /// Target light.
        id: LightId,
        /// Requested mode.
        mode: Mode,
    },
    /// Set the color of one light in manual mode.
    SetColor {
        /// Target light.
        id: LightId,
        /// Requested color.
        color: Color,
    },
    /// Change the device status of one light.
    SetStatus {
        /// Target light.
        id: LightId,
        /// Reported status.
        status: Status,
    },
    /// Read one light.
    Get {
        /// Target light.
        id: LightId,
    },
    /// Read every light.
    List,
}

impl LightCommand {
    /// Short operation name used in logs and error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetMode { .. } => "set_mode",
            Self::SetColor { .. } => "set_color",
            Self::SetStatus { .. } => "set_status",
            Self::Get { .. } => "get",
            Self::List => "list",
        }
    }
}

/// Successful result of a [`LightCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "reply", content = "data", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CommandReply {
    /// The state of one light after the command.
    Light(TrafficLight),
    /// Every light.
    Lights(Vec<TrafficLight>),
}
