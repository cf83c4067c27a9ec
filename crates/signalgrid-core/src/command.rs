//! Command interface for external callers.
//!
//! [`CommandInterface`] is the handle the rendering layer and remote
//! channels use to drive lights. It wraps the shared registry, so clones
//! are cheap and every call is safe to run concurrently with ticking.

use std::sync::Arc;

use signalgrid_types::{Color, CommandReply, LightCommand, LightId, Mode, Status, TrafficLight};
use tracing::debug;

use crate::error::ControlError;
use crate::registry::LightRegistry;

/// Synchronous command surface over a [`LightRegistry`].
#[derive(Debug, Clone)]
pub struct CommandInterface {
    registry: Arc<LightRegistry>,
}

impl CommandInterface {
    /// Wrap a shared registry.
    pub const fn new(registry: Arc<LightRegistry>) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    pub const fn registry(&self) -> &Arc<LightRegistry> {
        &self.registry
    }

    /// Change a light's control mode.
    pub fn set_mode(&self, id: &LightId, mode: Mode) -> Result<TrafficLight, ControlError> {
        self.registry.set_mode(id, mode)
    }

    /// Set a light's color. Only valid in manual mode.
    pub fn set_color(&self, id: &LightId, color: Color) -> Result<TrafficLight, ControlError> {
        self.registry.set_color(id, color)
    }

    /// Change a light's device status.
    pub fn set_status(&self, id: &LightId, status: Status) -> Result<TrafficLight, ControlError> {
        self.registry.set_status(id, status)
    }

    /// Read one light.
    pub fn get(&self, id: &LightId) -> Result<TrafficLight, ControlError> {
        self.registry.get(id)
    }

    /// Read every light, sorted by id.
    pub fn list(&self) -> Vec<TrafficLight> {
        self.registry.list()
    }

    /// Run a command received over a remote channel.
    pub fn execute(&self, command: LightCommand) -> Result<CommandReply, ControlError> {
        debug!(command = command.name(), "Executing command");
        match command {
            LightCommand::SetMode { id, mode } => self.set_mode(&id, mode).map(CommandReply::Light),
            LightCommand::SetColor { id, color } => {
                self.set_color(&id, color).map(CommandReply::Light)
            }
            LightCommand::SetStatus { id, status } => {
                self.set_status(&id, status).map(CommandReply::Light)
            }
            LightCommand::Get { id } => self.get(&id).map(CommandReply::Light),
            LightCommand::List => Ok(CommandReply::Lights(self.list())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use signalgrid_types::TrafficLightInit;

    use super::*;
    use crate::config::ControllerConfig;

    fn interface() -> (CommandInterface, LightId) {
        let registry = Arc::new(LightRegistry::new(&ControllerConfig::default()));
        let id = registry
            .register(
                TrafficLightInit::new("Broadway & Park", "Midtown")
                    .with_id(LightId::parse("tl-002").unwrap()),
            )
            .unwrap();
        (CommandInterface::new(registry), id)
    }

    fn light(reply: CommandReply) -> TrafficLight {
        match reply {
            CommandReply::Light(light) => light,
            CommandReply::Lights(mut lights) => lights.pop().unwrap(),
        }
    }

    #[test]
    fn execute_manual_override() {
        let (commands, id) = interface();
        let after = commands
            .execute(LightCommand::SetMode {
                id: id.clone(),
                mode: Mode::Manual,
            })
            .unwrap();
        assert_eq!(light(after).mode, Mode::Manual);

        let after = commands
            .execute(LightCommand::SetColor {
                id: id.clone(),
                color: Color::Green,
            })
            .unwrap();
        assert_eq!(light(after).color, Color::Green);
        assert_eq!(commands.get(&id).unwrap().color, Color::Green);
    }

    #[test]
    fn execute_reports_control_errors() {
        let (commands, id) = interface();
        let result = commands.execute(LightCommand::SetColor {
            id,
            color: Color::Yellow,
        });
        assert!(matches!(
            result,
            Err(ControlError::InvalidModeForOperation { .. })
        ));

        let missing = LightId::parse("tl-404").unwrap();
        let result = commands.execute(LightCommand::Get { id: missing });
        assert!(matches!(result, Err(ControlError::NotFound { .. })));
    }

    #[test]
    fn execute_status_then_rejects_commands() {
        let (commands, id) = interface();
        let after = commands
            .execute(LightCommand::SetStatus {
                id: id.clone(),
                status: Status::Maintenance,
            })
            .unwrap();
        assert_eq!(light(after).status, Status::Maintenance);

        let result = commands.execute(LightCommand::SetMode {
            id,
            mode: Mode::Emergency,
        });
        assert!(matches!(result, Err(ControlError::NotOnline { .. })));
    }

    #[test]
    fn execute_list_returns_every_light() {
        let (commands, _) = interface();
        commands
            .registry()
            .register(TrafficLightInit::new("Highway 101 Exit", "North"))
            .unwrap();
        let reply = commands.execute(LightCommand::List).unwrap();
        assert!(matches!(reply, CommandReply::Lights(ref lights) if lights.len() == 2));
        assert_eq!(commands.list().len(), 2);
    }

    #[test]
    fn clones_share_state() {
        let (commands, id) = interface();
        let other = commands.clone();
        other.set_mode(&id, Mode::Emergency).unwrap();
        assert_eq!(commands.get(&id).unwrap().mode, Mode::Emergency);
    }
}
