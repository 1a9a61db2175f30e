//! HTTP contract tests

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use slotpilot_engine::{BookingEngine, Credentials, RawEvent, SessionManager, SubmissionOutcome};
use slotpilot_service::{routes, AppState, SandboxSalon};
use slotpilot_test_utils::{fast_config, ScriptedSalon, FILL_AND_SUBMIT};
use std::sync::Arc;
use warp::http::StatusCode;

fn state_for(launcher: Arc<dyn slotpilot_engine::DriverLauncher>, default: Option<&str>) -> AppState {
    let config = fast_config();
    let sessions = Arc::new(SessionManager::with_driver_login(
        Arc::clone(&launcher),
        Credentials::new("owner@salon.test", "s3cret"),
        &config,
    ));
    let engine = BookingEngine::new(launcher, sessions, config).unwrap();
    AppState::new(Arc::new(engine), default.map(str::to_string))
}

async fn post(state: AppState, path: &str, body: Value) -> (StatusCode, Value) {
    let response = warp::test::request()
        .method("POST")
        .path(path)
        .json(&body)
        .reply(&routes(state))
        .await;
    let status = response.status();
    let body = serde_json::from_slice(response.body()).unwrap();
    (status, body)
}

fn booking_body() -> Value {
    json!({
        "clientName": "Carlos Lima",
        "professionalId": "Ana",
        "date": "2025-03-14",
        "startTime": "10:00",
        "durationMinutes": 60,
        "services": ["Corte"]
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let salon = ScriptedSalon::new();
    let response = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&routes(state_for(salon.launcher(), None)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn availability_lists_slots() {
    let salon = ScriptedSalon::new()
        .with_events(0, vec![RawEvent::appointment("09:00 – 19:00 : Dia cheio")]);
    let (status, body) = post(
        state_for(salon.launcher(), None),
        "/availability",
        json!({"professionalId": "ana", "date": "2025-03-14"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["professionalId"], "Ana Souza");
    assert_eq!(body["freeSlots"], json!(["19:00", "19:30"]));
    assert_eq!(body["freePeriods"], json!([{"start": "19:00", "end": "19:30"}]));
    assert_eq!(body["occupiedIntervals"][0]["kind"], "appointment");
}

#[tokio::test]
async fn availability_falls_back_to_default_professional() {
    let salon = ScriptedSalon::new();
    let (status, body) = post(
        state_for(salon.launcher(), Some("Bruno")),
        "/availability",
        json!({"date": "2025-03-14"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["professionalId"], "Bruno Oliveira");
}

#[tokio::test]
async fn missing_professional_without_default_is_bad_request() {
    let salon = ScriptedSalon::new();
    let (status, body) = post(state_for(salon.launcher(), None), "/availability", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn unknown_professional_is_not_found() {
    let salon = ScriptedSalon::new();
    let (status, body) = post(
        state_for(salon.launcher(), None),
        "/availability",
        json!({"professionalId": "Zélia", "date": "2025-03-14"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "PROFESSIONAL_NOT_FOUND");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn booking_succeeds() {
    let salon = ScriptedSalon::new();
    let (status, body) = post(state_for(salon.launcher(), None), "/bookings", booking_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["appointment"]["clientName"], "Carlos Lima");
    assert_eq!(body["appointment"]["endTime"], "11:00");
    assert_eq!(body["appointment"]["services"], json!(["Corte"]));
}

#[tokio::test]
async fn busy_slot_is_conflict_with_suggestions() {
    let salon = ScriptedSalon::new()
        .with_events(0, vec![RawEvent::appointment("10:00 – 11:00 : Maria")]);
    let (status, body) = post(state_for(salon.launcher(), None), "/bookings", booking_body()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SLOT_UNAVAILABLE");
    assert_eq!(
        body["suggestions"],
        json!(["09:00", "09:30", "11:00", "11:30", "12:00"])
    );
    assert_eq!(salon.calls(FILL_AND_SUBMIT), 0);
}

#[tokio::test]
async fn remote_rejection_is_bad_gateway_with_verbatim_message() {
    let salon = ScriptedSalon::new().with_outcome(SubmissionOutcome::error("Horário bloqueado"));
    let (status, body) = post(state_for(salon.launcher(), None), "/bookings", booking_body()).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Horário bloqueado");
    assert_eq!(body["code"], "EXTERNAL_SYSTEM_REJECTED");
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let salon = ScriptedSalon::new();
    let (status, body) = post(
        state_for(salon.launcher(), None),
        "/bookings",
        json!({"clientName": "Carlos", "startTime": "25:99"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn automate_requires_known_action() {
    let salon = ScriptedSalon::new();

    let (status, body) = post(state_for(salon.launcher(), None), "/automate", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid request: action is required");

    let (status, body) = post(
        state_for(salon.launcher(), None),
        "/automate",
        json!({"action": "cancel"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid request: invalid action");
}

#[tokio::test]
async fn automate_check_and_book() {
    let salon = ScriptedSalon::new();

    let (status, body) = post(
        state_for(salon.launcher(), None),
        "/automate",
        json!({"action": "list", "professionalName": "Ana", "date": "2025-03-14"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["freeSlots"].as_array().unwrap().len(), 22);

    let (status, body) = post(
        state_for(salon.launcher(), None),
        "/automate",
        json!({
            "action": "book",
            "professionalName": "Ana",
            "date": "2025-03-14",
            "clientName": "Carlos Lima",
            "startTime": "15:00",
            "durationMinutes": 30
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["appointment"]["startTime"], "15:00");
}

#[tokio::test]
async fn sandbox_salon_round_trip() {
    let salon = SandboxSalon::from_yaml(
        r#"
credentials: { email: owner@salon.test, password: s3cret }
professionals: [Ana Souza]
clients: [{ id: c1, name: Carlos Lima }]
services: [{ id: s1, name: Corte }]
"#,
    )
    .unwrap();
    let state = state_for(Arc::new(salon.clone()), None);

    let (status, _) = post(state.clone(), "/bookings", booking_body()).await;
    assert_eq!(status, StatusCode::OK);

    // The booked hour is now occupied.
    let (status, body) = post(state, "/bookings", booking_body()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SLOT_UNAVAILABLE");
}

#[tokio::test]
async fn cors_preflight_is_allowed() {
    let salon = ScriptedSalon::new();
    let response = warp::test::request()
        .method("OPTIONS")
        .path("/bookings")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .reply(&routes(state_for(salon.launcher(), None)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}
