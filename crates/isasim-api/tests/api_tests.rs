//! Integration tests for the simulator API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures::StreamExt;
use isasim_api::router::build_router;
use isasim_api::state::AppState;
use isasim_core::StreamEngine;
use isasim_core::config::EventTableConfig;
use isasim_core::event_table::build_event_table;
use isasim_types::{
    EnginePhase, ErrorInfo, ErrorStatus, Stage, StepEvent, StepInfo,
};
use serde_json::Value;
use tower::ServiceExt;

const TICK: Duration = Duration::from_millis(2_000);

fn seeded_table() -> Vec<StepEvent> {
    build_event_table(&EventTableConfig {
        error_probability: 0.0,
        seed: Some(7),
    })
}

fn progress(stage: Stage, completion: u8) -> StepEvent {
    StepEvent::progress(
        stage,
        StepInfo {
            completion,
            popup_step: stage.wire_name().to_owned(),
            pedal_position: 12,
            engine_rpm: 34,
        },
    )
}

fn fault_table() -> Vec<StepEvent> {
    vec![
        progress(Stage::BrakeCal, 0),
        StepEvent::fault(
            Stage::BrakeCal,
            ErrorInfo {
                code: String::from("E004"),
                message: String::from("Brake calibration incomplete."),
                status: ErrorStatus::Repeat,
                resume_step: Stage::BrakeCal,
            },
        ),
        progress(Stage::BrakeCal, 50),
        progress(Stage::BrakeCal, 75),
    ]
}

fn make_state(events: Vec<StepEvent>, response_delay: Duration) -> Arc<AppState> {
    let engine = Arc::new(StreamEngine::new(events, TICK));
    Arc::new(AppState::new(engine, response_delay))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(path: &str) -> Request<Body> {
    Request::post(path).body(Body::empty()).unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

/// Parse one `data: <json>\n\n` SSE frame.
fn parse_frame(bytes: &[u8]) -> Value {
    let text = std::str::from_utf8(bytes).unwrap();
    assert!(text.starts_with("data: "), "unexpected frame: {text:?}");
    assert!(text.ends_with("\n\n"), "unexpected frame: {text:?}");
    serde_json::from_str(text.trim_start_matches("data: ").trim_end()).unwrap()
}

// =========================================================================
// Health and metadata
// =========================================================================

#[tokio::test]
async fn test_health_check() {
    let router = build_router(make_state(seeded_table(), Duration::ZERO));

    let response = router.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json, serde_json::json!({"message": "Server is running ..."}));
}

#[tokio::test]
async fn test_steps_lists_seven_steps() {
    let router = build_router(make_state(seeded_table(), Duration::ZERO));

    let response = router.oneshot(post("/service/steps")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache"
    );
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["PlusLiteReady"], true);
    assert_eq!(json["ServiceInfo"], "ISA Installation");
    let steps = json["ServiceSteps"].as_array().unwrap();
    assert_eq!(steps.len(), 7);
    assert_eq!(steps[0]["StepName"], "Verify Connected Device");
    assert_eq!(steps[0]["StepAbbreviation"], "ISAConnect");
    assert_eq!(steps[0]["StepStatusType"], "Message");
    assert_eq!(steps[5]["StepAbbreviation"], "ISAVerfiyCal");
    assert_eq!(steps[6]["StepName"], "Option Configuration");
}

#[tokio::test]
async fn test_start_uses_start_flag() {
    let router = build_router(make_state(seeded_table(), Duration::ZERO));

    let response = router.oneshot(post("/service/start")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["startPerfomService"], true);
    assert!(json.get("PlusLiteReady").is_none());
    assert_eq!(json["ServiceSteps"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_step_list_ignores_engine_state() {
    let state = make_state(fault_table(), Duration::ZERO);
    let router = build_router(Arc::clone(&state));

    let before = body_to_json(
        router
            .clone()
            .oneshot(post("/service/steps"))
            .await
            .unwrap()
            .into_body(),
    )
    .await;

    state.engine.tick();
    state.engine.tick();
    assert!(state.engine.is_paused());

    let after = body_to_json(
        router
            .clone()
            .oneshot(post("/service/steps"))
            .await
            .unwrap()
            .into_body(),
    )
    .await;
    let start = body_to_json(router.oneshot(post("/service/start")).await.unwrap().into_body()).await;

    assert_eq!(before, after);
    assert_eq!(after["ServiceSteps"], start["ServiceSteps"]);
}

// =========================================================================
// Control
// =========================================================================

#[tokio::test]
async fn test_resume_clears_pause_and_advances() {
    let state = make_state(fault_table(), Duration::ZERO);
    state.engine.tick();
    state.engine.tick();
    assert_eq!(state.engine.cursor(), 2);

    let router = build_router(Arc::clone(&state));
    let response = router.oneshot(post("/service/resume")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json, serde_json::json!({"message": "Stream resumed"}));
    assert!(!state.engine.is_paused());
    assert_eq!(state.engine.cursor(), 3);
}

#[tokio::test]
async fn test_temper_clears_pause_and_advances() {
    let state = make_state(fault_table(), Duration::ZERO);
    state.engine.tick();
    state.engine.tick();

    let router = build_router(Arc::clone(&state));
    let response = router.oneshot(post("/service/temper")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["message"], "Device is not tempered resumed");
    assert!(!state.engine.is_paused());
    assert_eq!(state.engine.cursor(), 3);
}

#[tokio::test]
async fn test_cancel_rewinds() {
    let state = make_state(fault_table(), Duration::ZERO);
    state.engine.tick();
    state.engine.tick();

    let router = build_router(Arc::clone(&state));
    let response = router.oneshot(post("/service/cancel")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(
        json["message"],
        "Stream canceled and clients disconnected"
    );
    assert_eq!(state.engine.cursor(), 0);
    assert!(!state.engine.is_paused());
    assert_eq!(state.engine.phase(), EnginePhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_control_reply_is_delayed_after_state_change() {
    let state = make_state(fault_table(), Duration::from_secs(2));
    state.engine.tick();
    state.engine.tick();

    let router = build_router(Arc::clone(&state));
    let started = tokio::time::Instant::now();
    let pending = tokio::spawn(router.oneshot(post("/service/resume")));

    // Let the handler run up to its sleep.
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!state.engine.is_paused());
    assert!(!pending.is_finished());

    let response = pending.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_steps_reply_is_delayed() {
    let router = build_router(make_state(seeded_table(), Duration::from_secs(2)));
    let started = tokio::time::Instant::now();

    let response = router.oneshot(post("/service/steps")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

// =========================================================================
// Event stream
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sse_streams_events_in_order() {
    let events = seeded_table();
    let state = make_state(events.clone(), Duration::ZERO);
    let router = build_router(Arc::clone(&state));

    let response = router.oneshot(get("/service/sse")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/event-stream"));
    assert_eq!(state.engine.phase(), EnginePhase::Streaming);

    let mut body = response.into_body().into_data_stream();
    for expected in events.iter().take(3) {
        let frame = body.next().await.unwrap().unwrap();
        let json = parse_frame(&frame);
        assert_eq!(json, serde_json::to_value(expected).unwrap());
        assert_eq!(json["ErrorInfo"], Value::Null);
    }
    assert_eq!(state.engine.cursor(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_sse_disconnect_resets_engine() {
    let state = make_state(seeded_table(), Duration::ZERO);
    let router = build_router(Arc::clone(&state));

    let response = router.oneshot(get("/service/sse")).await.unwrap();
    let mut body = response.into_body().into_data_stream();
    body.next().await.unwrap().unwrap();
    body.next().await.unwrap().unwrap();
    assert_eq!(state.engine.cursor(), 2);

    drop(body);

    assert_eq!(state.engine.phase(), EnginePhase::Idle);
    assert_eq!(state.engine.cursor(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sse_fault_pauses_until_resume() {
    let events = fault_table();
    let state = make_state(events.clone(), Duration::ZERO);
    let router = build_router(Arc::clone(&state));

    let response = router.clone().oneshot(get("/service/sse")).await.unwrap();
    let mut body = response.into_body().into_data_stream();

    let first = parse_frame(&body.next().await.unwrap().unwrap());
    assert_eq!(first["StepInfo"]["Completion"], 0);

    let fault = parse_frame(&body.next().await.unwrap().unwrap());
    assert_eq!(fault["StepInfo"], Value::Null);
    assert_eq!(fault["ErrorInfo"]["Error"], "E004");
    assert_eq!(state.engine.phase(), EnginePhase::PausedOnError);

    // Held for several periods.
    tokio::time::sleep(TICK * 3).await;
    assert_eq!(state.engine.cursor(), 2);

    let response = router.oneshot(post("/service/resume")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The event right after the fault is skipped.
    let next = parse_frame(&body.next().await.unwrap().unwrap());
    assert_eq!(next["StepInfo"]["Completion"], 75);
}

// =========================================================================
// Diagnostics and plumbing
// =========================================================================

#[tokio::test]
async fn test_status_reports_engine() {
    let state = make_state(seeded_table(), Duration::ZERO);
    state.engine.tick();
    let router = build_router(Arc::clone(&state));

    let response = router.oneshot(get("/service/status")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["phase"], "idle");
    assert_eq!(json["cursor"], 1);
    assert_eq!(json["paused"], false);
    assert_eq!(json["total_events"], 35);
    assert!(json["started_at"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let router = build_router(make_state(seeded_table(), Duration::ZERO));

    let response = router.oneshot(get("/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 404);
    assert!(json["error"].as_str().unwrap().contains("/nope"));
}

#[tokio::test]
async fn test_control_endpoints_require_post() {
    let router = build_router(make_state(seeded_table(), Duration::ZERO));

    let response = router.oneshot(get("/service/resume")).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let router = build_router(make_state(seeded_table(), Duration::ZERO));

    let request = Request::get("/")
        .header(header::ORIGIN, "http://installer.example")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}
