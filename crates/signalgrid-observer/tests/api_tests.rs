//! Integration tests for the Observer API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. This validates handler logic and routing
//! without needing a live network connection.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use signalgrid_core::command::CommandInterface;
use signalgrid_core::config::{ControllerConfig, RunBoundsConfig};
use signalgrid_core::operator::OperatorState;
use signalgrid_core::registry::LightRegistry;
use signalgrid_observer::router::build_router;
use signalgrid_observer::state::AppState;
use signalgrid_types::{Color, LightEventKind, LightId, Mode, Status, TrafficLightInit};
use tower::ServiceExt;

fn make_test_state() -> Arc<AppState> {
    let registry = Arc::new(LightRegistry::new(&ControllerConfig::default()));
    let seeds = [
        TrafficLightInit::new("Main & 5th", "Downtown").with_id(id("tl-001")),
        TrafficLightInit::new("Broadway & Park", "Midtown")
            .with_id(id("tl-002"))
            .with_color(Color::Green),
        TrafficLightInit::new("Industrial Zone", "East District")
            .with_id(id("tl-004"))
            .with_status(Status::Maintenance),
    ];
    for seed in seeds {
        registry.register(seed).unwrap();
    }
    let operator = Arc::new(OperatorState::new(1000, &RunBoundsConfig::default()));
    Arc::new(AppState::with_operator(
        CommandInterface::new(registry),
        operator,
    ))
}

fn id(raw: &str) -> LightId {
    LightId::parse(raw).unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(path: &str, body: &Value) -> Request<Body> {
    Request::post(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_index_returns_html() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.contains("text/html"));
}

#[tokio::test]
async fn test_list_lights_sorted() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(Request::get("/api/lights").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 3);
    assert_eq!(json["lights"][0]["id"], "tl-001");
    assert_eq!(json["lights"][1]["id"], "tl-002");
    assert_eq!(json["lights"][2]["id"], "tl-004");
}

#[tokio::test]
async fn test_get_light_by_id() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(
            Request::get("/api/lights/tl-002")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["name"], "Broadway & Park");
    assert_eq!(json["mode"], "auto");
    assert_eq!(json["color"], "green");
    assert_eq!(json["remaining_time"], 25);
}

#[tokio::test]
async fn test_get_light_not_found() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(
            Request::get("/api/lights/tl-404")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 404);
    assert!(json["error"].as_str().unwrap().contains("tl-404"));
}

#[tokio::test]
async fn test_get_light_invalid_id() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(
            Request::get("/api/lights/bad%20id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_light() {
    let state = make_test_state();
    let router = build_router(Arc::clone(&state));

    let body = serde_json::json!({
        "id": "tl-003",
        "name": "Highway 101 Exit",
        "location": "North",
        "color": "yellow",
    });
    let response = router
        .oneshot(post_json("/api/lights", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["id"], "tl-003");
    assert_eq!(json["remaining_time"], 5);
    assert_eq!(state.registry().len(), 4);
}

#[tokio::test]
async fn test_create_duplicate_light_conflicts() {
    let router = build_router(make_test_state());

    let body = serde_json::json!({ "id": "tl-001", "name": "Again" });
    let response = router
        .oneshot(post_json("/api/lights", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_light_empty_name_rejected() {
    let router = build_router(make_test_state());

    let body = serde_json::json!({ "name": "   " });
    let response = router
        .oneshot(post_json("/api/lights", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_light() {
    let state = make_test_state();

    let response = build_router(Arc::clone(&state))
        .oneshot(
            Request::delete("/api/lights/tl-001")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["id"], "tl-001");

    let response = build_router(state)
        .oneshot(
            Request::get("/api/lights/tl-001")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_manual_override_flow() {
    let state = make_test_state();

    let response = build_router(Arc::clone(&state))
        .oneshot(post_json(
            "/api/lights/tl-001/mode",
            &serde_json::json!({ "mode": "manual" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["mode"], "manual");
    assert!(json.get("remaining_time").is_none());

    let response = build_router(Arc::clone(&state))
        .oneshot(post_json(
            "/api/lights/tl-001/color",
            &serde_json::json!({ "color": "green" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["color"], "green");

    assert_eq!(state.commands.get(&id("tl-001")).unwrap().color, Color::Green);
}

#[tokio::test]
async fn test_set_color_in_auto_is_unprocessable() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(post_json(
            "/api/lights/tl-001/color",
            &serde_json::json!({ "color": "yellow" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_command_on_maintenance_light_conflicts() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(post_json(
            "/api/lights/tl-004/mode",
            &serde_json::json!({ "mode": "emergency" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_status_change_brings_light_online() {
    let state = make_test_state();

    let response = build_router(Arc::clone(&state))
        .oneshot(post_json(
            "/api/lights/tl-004/status",
            &serde_json::json!({ "status": "online" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "online");
    assert!(state.commands.set_mode(&id("tl-004"), Mode::Emergency).is_ok());
}

#[tokio::test]
async fn test_unknown_mode_is_bad_request() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(post_json(
            "/api/lights/tl-001/mode",
            &serde_json::json!({ "mode": "blinking" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_execute_command_envelope() {
    let router = build_router(make_test_state());

    let body = serde_json::json!({
        "command": "set_mode",
        "id": "tl-002",
        "mode": "emergency",
    });
    let response = router
        .oneshot(post_json("/api/commands", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["reply"], "light");
    assert_eq!(json["data"]["mode"], "emergency");
    assert_eq!(json["data"]["color"], "red");
}

#[tokio::test]
async fn test_execute_list_command() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(post_json(
            "/api/commands",
            &serde_json::json!({ "command": "list" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["reply"], "lights");
    assert_eq!(json["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_light_events_record_commands() {
    let state = make_test_state();
    state
        .commands
        .set_mode(&id("tl-001"), Mode::Emergency)
        .unwrap();

    let response = build_router(state)
        .oneshot(
            Request::get("/api/lights/tl-001/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["events"][0]["kind"], "registered");
    assert_eq!(json["events"][1]["kind"], "mode_changed");
}

#[tokio::test]
async fn test_summary_counts() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(Request::get("/api/summary").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["total"], 3);
    assert_eq!(json["online"], 2);
    assert_eq!(json["maintenance"], 1);
    assert_eq!(json["green"], 1);
}

#[tokio::test]
async fn test_operator_pause_and_status() {
    let state = make_test_state();

    let response = build_router(Arc::clone(&state))
        .oneshot(Request::post("/api/operator/pause").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = build_router(state)
        .oneshot(
            Request::get("/api/operator/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["paused"], true);
    assert_eq!(json["lights_total"], 3);
}

#[tokio::test]
async fn test_operator_speed_rejects_small_interval() {
    let state = make_test_state();

    let response = build_router(Arc::clone(&state))
        .oneshot(post_json(
            "/api/operator/speed",
            &serde_json::json!({ "tick_interval_ms": 10 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = build_router(Arc::clone(&state))
        .oneshot(post_json(
            "/api/operator/speed",
            &serde_json::json!({ "tick_interval_ms": 250 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["previous_interval_ms"], 1000);
    assert_eq!(
        state.operator_state.as_ref().unwrap().tick_interval_ms(),
        250
    );
}

#[tokio::test]
async fn test_operator_without_state_is_internal_error() {
    let registry = Arc::new(LightRegistry::new(&ControllerConfig::default()));
    let state = Arc::new(AppState::new(CommandInterface::new(registry)));

    let response = build_router(state)
        .oneshot(Request::post("/api/operator/stop").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_event_feed_broadcasts_commands() {
    let state = make_test_state();
    let mut rx = state.subscribe();

    state.commands.set_mode(&id("tl-001"), Mode::Manual).unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.kind, LightEventKind::ModeChanged);
    assert_eq!(event.light.id, id("tl-001"));
    assert_eq!(event.light.mode, Mode::Manual);
}

#[tokio::test]
async fn test_nonexistent_route_returns_404() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(
            Request::get("/api/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
