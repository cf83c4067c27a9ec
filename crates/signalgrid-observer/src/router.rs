//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::operator;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/lights` -- `WebSocket` light event stream
/// - `GET|POST /api/lights` -- list or register lights
/// - `GET|DELETE /api/lights/{id}` -- read or deregister one light
/// - `POST /api/lights/{id}/mode|color|status` -- light commands
/// - `GET /api/lights/{id}/events` -- recent events for one light
/// - `GET /api/summary` -- fleet counts
/// - `POST /api/commands` -- serialized command envelope
/// - `/api/operator/*` -- tick loop controls
///
/// CORS is configured to allow any origin for development. In
/// production this should be restricted.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/lights", get(ws::ws_lights))
        // Lights
        .route(
            "/api/lights",
            get(handlers::list_lights).post(handlers::create_light),
        )
        .route(
            "/api/lights/{id}",
            get(handlers::get_light).delete(handlers::delete_light),
        )
        .route("/api/lights/{id}/mode", post(handlers::set_mode))
        .route("/api/lights/{id}/color", post(handlers::set_color))
        .route("/api/lights/{id}/status", post(handlers::set_status))
        .route("/api/lights/{id}/events", get(handlers::light_events))
        .route("/api/summary", get(handlers::summary))
        .route("/api/commands", post(handlers::execute_command))
        // Operator
        .route("/api/operator/pause", post(operator::pause))
        .route("/api/operator/resume", post(operator::resume))
        .route("/api/operator/speed", post(operator::set_speed))
        .route("/api/operator/status", get(operator::status))
        .route("/api/operator/stop", post(operator::stop))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
