//! REST API endpoint handlers for the Observer server.
//!
//! Every handler calls the controller's [`CommandInterface`] through the
//! shared [`AppState`]. Commands run synchronously against the registry
//! and never wait on the tick loop or the store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/lights` | List all lights |
//! | `POST` | `/api/lights` | Register a light |
//! | `GET` | `/api/lights/{id}` | Get a single light |
//! | `DELETE` | `/api/lights/{id}` | Deregister a light |
//! | `POST` | `/api/lights/{id}/mode` | Change control mode |
//! | `POST` | `/api/lights/{id}/color` | Set color (manual mode) |
//! | `POST` | `/api/lights/{id}/status` | Change device status |
//! | `GET` | `/api/lights/{id}/events` | Recent events for one light |
//! | `GET` | `/api/summary` | Fleet counts by status, mode and color |
//! | `POST` | `/api/commands` | Execute a [`LightCommand`] envelope |
//!
//! [`CommandInterface`]: signalgrid_core::command::CommandInterface

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use signalgrid_types::{Color, LightCommand, LightId, Mode, Status, TrafficLightInit};

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Request body for `POST /api/lights/{id}/mode`.
#[derive(Debug, serde::Deserialize)]
pub struct SetModeRequest {
    /// Requested control mode.
    pub mode: Mode,
}

/// Request body for `POST /api/lights/{id}/color`.
#[derive(Debug, serde::Deserialize)]
pub struct SetColorRequest {
    /// Requested color.
    pub color: Color,
}

/// Request body for `POST /api/lights/{id}/status`.
#[derive(Debug, serde::Deserialize)]
pub struct SetStatusRequest {
    /// Reported device status.
    pub status: Status,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing fleet counts and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let summary = state.registry().summary();
    let tick = state
        .operator_state
        .as_ref()
        .map_or(0, |operator| operator.current_tick());

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>SignalGrid Observer</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
        }}
        a {{ color: #58a6ff; }}
        td {{ padding: 0.2rem 1rem 0.2rem 0; }}
    </style>
</head>
<body>
    <h1>SignalGrid Observer</h1>
    <table>
        <tr><td>Tick</td><td>{tick}</td></tr>
        <tr><td>Lights</td><td>{total}</td></tr>
        <tr><td>Online / Offline / Maintenance</td><td>{online} / {offline} / {maintenance}</td></tr>
        <tr><td>Auto / Manual / Emergency</td><td>{auto} / {manual} / {emergency}</td></tr>
    </table>

    <h2>API Endpoints</h2>
    <ul>
        <li><a href="/api/lights">/api/lights</a> -- List all lights</li>
        <li><a href="/api/summary">/api/summary</a> -- Fleet summary</li>
        <li><a href="/api/operator/status">/api/operator/status</a> -- Controller status</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li style="list-style:none;"><code>ws://host:port/ws/lights</code> -- Live light event stream</li>
    </ul>
</body>
</html>"#,
        total = summary.total,
        online = summary.online,
        offline = summary.offline,
        maintenance = summary.maintenance,
        auto = summary.auto,
        manual = summary.manual,
        emergency = summary.emergency,
    ))
}

// ---------------------------------------------------------------------------
// Lights
// ---------------------------------------------------------------------------

/// List every light, sorted by id.
pub async fn list_lights(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let lights = state.commands.list();
    Json(serde_json::json!({
        "count": lights.len(),
        "lights": lights,
    }))
}

/// Get one light.
pub async fn get_light(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = parse_light_id(&id)?;
    Ok(Json(state.commands.get(&id)?))
}

/// Register a light. Responds `201 Created` with the new light.
pub async fn create_light(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TrafficLightInit>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Json(init) = payload?;
    let registry = state.registry();
    let id = registry.register(init)?;
    Ok((StatusCode::CREATED, Json(registry.get(&id)?)))
}

/// Deregister a light and return its final state.
pub async fn delete_light(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = parse_light_id(&id)?;
    Ok(Json(state.registry().deregister(&id)?))
}

/// Change a light's control mode.
pub async fn set_mode(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<SetModeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = parse_light_id(&id)?;
    let Json(body) = payload?;
    Ok(Json(state.commands.set_mode(&id, body.mode)?))
}

/// Set a light's color. Only valid in manual mode.
pub async fn set_color(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<SetColorRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = parse_light_id(&id)?;
    let Json(body) = payload?;
    Ok(Json(state.commands.set_color(&id, body.color)?))
}

/// Change a light's device status.
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<SetStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = parse_light_id(&id)?;
    let Json(body) = payload?;
    Ok(Json(state.commands.set_status(&id, body.status)?))
}

/// Recent events for one light, oldest first.
pub async fn light_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = parse_light_id(&id)?;
    let events = state.registry().recent_events(&id)?;
    Ok(Json(serde_json::json!({
        "count": events.len(),
        "events": events,
    })))
}

// ---------------------------------------------------------------------------
// Aggregates and commands
// ---------------------------------------------------------------------------

/// Fleet counts by status, mode and color.
pub async fn summary(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry().summary())
}

/// Execute a serialized [`LightCommand`].
pub async fn execute_command(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LightCommand>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Json(command) = payload?;
    Ok(Json(state.commands.execute(command)?))
}

fn parse_light_id(raw: &str) -> Result<LightId, ObserverError> {
    LightId::parse(raw)
        .ok_or_else(|| ObserverError::InvalidRequest(format!("invalid light id: {raw:?}")))
}
