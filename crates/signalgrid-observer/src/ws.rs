//! `WebSocket` handler for real-time light event streaming.
//!
//! Clients connect to `GET /ws/lights` and receive one JSON-encoded
//! [`LightEvent`](signalgrid_types::LightEvent) text frame per state
//! change: registrations, countdowns, color advances, commands and
//! merged remote updates. Every client subscribes to the registry's
//! broadcast channel, so all clients see the same stream.
//!
//! `GET /ws/lights?id=tl-001` narrows the stream to one light, which is
//! what a light's detail view subscribes to.
//!
//! If a client falls behind, lagged events are skipped and the client
//! resumes from the most recent one. Since every event carries the full
//! light snapshot, a skipped event never leaves a client with a partial
//! light.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use signalgrid_types::{LightEvent, LightId};
use tracing::{debug, warn};

use crate::error::ObserverError;
use crate::state::AppState;

/// Query parameters for `GET /ws/lights`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct WsFilter {
    /// Only stream events for this light.
    pub id: Option<String>,
}

impl WsFilter {
    /// Validate the filter, returning the light to follow if any.
    fn light(&self) -> Result<Option<LightId>, ObserverError> {
        self.id
            .as_deref()
            .map(|raw| {
                LightId::parse(raw).ok_or_else(|| {
                    ObserverError::InvalidRequest(format!("invalid light id: {raw:?}"))
                })
            })
            .transpose()
    }
}

/// Whether `event` passes the optional light filter.
fn wanted(event: &LightEvent, only: Option<&LightId>) -> bool {
    only.is_none_or(|id| event.light.id == *id)
}

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming light events.
///
/// # Route
///
/// `GET /ws/lights[?id=...]`
///
/// An unknown id is rejected with 404 before the upgrade.
pub async fn ws_lights(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<WsFilter>,
) -> Result<impl IntoResponse, ObserverError> {
    let only = filter.light()?;
    if let Some(id) = &only {
        state.commands.get(id)?;
    }
    Ok(ws.on_upgrade(move |socket| handle_ws(socket, state, only)))
}

/// Handle the `WebSocket` lifecycle: subscribe to the event feed and
/// forward each event as a text frame.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, only: Option<LightId>) {
    debug!(light_id = ?only, "WebSocket client connected");

    let mut rx = state.subscribe();

    loop {
        tokio::select! {
            // Receive a light event from the registry.
            result = rx.recv() => {
                match result {
                    Ok(event) if !wanted(&event, only.as_ref()) => {}
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!(light_id = %event.light.id, "Failed to serialize light event: {e}");
                                continue;
                            }
                        };
                        let msg: Message = Message::Text(json.into());
                        if socket.send(msg).await.is_err() {
                            debug!("WebSocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Event feed closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            // Check if the client sent a close frame or disconnected.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let pong = Message::Pong(data);
                        if socket.send(pong).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return;
                    }
                    _ => {
                        // Clients only listen; commands go through REST.
                    }
                }
            }
        }
    }
}
