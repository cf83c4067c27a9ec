//! Errors returned by controller operations.
//!
//! Every variant is a synchronous, caller-recoverable rejection of one
//! operation. The rejected operation leaves the light untouched.

use signalgrid_types::{LightId, Mode, Status};

/// Rejection of a registry or state-machine operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// No light is registered under the given id.
    #[error("light {id} not found")]
    NotFound {
        /// The unknown id.
        id: LightId,
    },

    /// The id is already registered, or belonged to a deregistered light.
    #[error("light id {id} is already in use")]
    DuplicateId {
        /// The conflicting id.
        id: LightId,
    },

    /// The operation is not valid in the light's current mode.
    #[error("{operation} is not allowed on light {id} in {mode} mode")]
    InvalidModeForOperation {
        /// The target light.
        id: LightId,
        /// The light's current mode.
        mode: Mode,
        /// The rejected operation.
        operation: &'static str,
    },

    /// The light is not online, so it does not accept commands.
    #[error("light {id} is {status}; commands require online status")]
    NotOnline {
        /// The target light.
        id: LightId,
        /// The light's current status.
        status: Status,
    },

    /// The registration input is malformed.
    #[error("invalid light definition: {reason}")]
    InvalidInit {
        /// What is wrong with the input.
        reason: String,
    },
}
