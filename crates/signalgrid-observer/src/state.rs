//! Shared application state for the Observer API server.
//!
//! [`AppState`] holds the controller's [`CommandInterface`] and, when the
//! tick loop is running, its operator control state. Every REST call goes
//! straight to the registry; there is no separate snapshot to keep in
//! step with the controller.

use std::sync::Arc;

use signalgrid_core::command::CommandInterface;
use signalgrid_core::operator::OperatorState;
use signalgrid_core::registry::LightRegistry;
use signalgrid_types::LightEvent;
use tokio::sync::broadcast;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Command surface over the shared light registry.
    pub commands: CommandInterface,
    /// Shared operator control state (present when the tick loop is running).
    pub operator_state: Option<Arc<OperatorState>>,
}

impl AppState {
    /// Create application state without operator controls.
    pub const fn new(commands: CommandInterface) -> Self {
        Self {
            commands,
            operator_state: None,
        }
    }

    /// Create application state with operator control state attached.
    pub const fn with_operator(commands: CommandInterface, operator: Arc<OperatorState>) -> Self {
        Self {
            commands,
            operator_state: Some(operator),
        }
    }

    /// The shared light registry.
    pub const fn registry(&self) -> &Arc<LightRegistry> {
        self.commands.registry()
    }

    /// Subscribe to the live light event feed.
    pub fn subscribe(&self) -> broadcast::Receiver<LightEvent> {
        self.registry().subscribe()
    }
}
