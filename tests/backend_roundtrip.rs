//! Drives the HTTP client and the lifecycle controller against an
//! in-process mock of the Remote Session Service.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use studysync::client::http::ApiError;
use studysync::core::controller::{SessionController, StartForm, SummaryFailure};
use studysync::StudySyncClient;

#[derive(Clone, Default)]
struct MockBackend {
    sessions: Arc<Mutex<Vec<Value>>>,
    hits: Arc<AtomicUsize>,
}

async fn all_sessions(State(state): State<MockBackend>) -> Json<Value> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    Json(Value::Array(state.sessions.lock().unwrap().clone()))
}

async fn start_session(
    State(state): State<MockBackend>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let mut sessions = state.sessions.lock().unwrap();
    let id = format!("mock-{}", sessions.len() + 1);
    // Stored the way older backend versions wrote records: `_id` and
    // `focus`, exercising the client's alias normalization.
    sessions.push(json!({
        "_id": id,
        "name": body["name"],
        "subject": body["subject"],
        "focus": body["focusLevel"],
        "startTime": "2025-03-01T09:00:00Z",
    }));
    Json(json!({ "sessionId": id }))
}

async fn end_session(State(state): State<MockBackend>, Json(body): Json<Value>) -> Json<Value> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let session_id = body["sessionId"].as_str().unwrap_or_default().to_string();
    let mut sessions = state.sessions.lock().unwrap();
    for session in sessions.iter_mut() {
        if session["_id"] == json!(session_id) {
            session["endTime"] = json!("2025-03-01T10:00:00Z");
            session["durationMinutes"] = body["durationMinutes"].clone();
        }
    }
    Json(json!({ "ok": true }))
}

fn mock_router(state: MockBackend) -> Router {
    Router::new()
        .route("/study/all", get(all_sessions))
        .route("/study/start", post(start_session))
        .route("/study/end", post(end_session))
        .with_state(state)
}

async fn spawn_backend(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn form() -> StartForm {
    StartForm {
        name: "ada".to_string(),
        subject: "math".to_string(),
        focus_level: Some(4),
    }
}

#[tokio::test]
async fn start_tick_end_roundtrip() {
    let state = MockBackend::default();
    let addr = spawn_backend(mock_router(state.clone())).await;
    let client = StudySyncClient::new(format!("http://{}", addr));
    let mut controller = SessionController::new();

    // Start.
    let payload = controller.begin_start(&form()).unwrap();
    let id = client.start_session(&payload).await.unwrap();
    assert_eq!(id, "mock-1");
    controller.start_succeeded(id.clone());
    assert!(controller.is_running());
    assert_eq!(controller.elapsed_seconds(), 0);

    // Refresh after start, the way the dashboard does.
    let sessions = client.fetch_sessions().await.unwrap();
    controller.sessions_loaded(sessions);
    assert_eq!(controller.stats().total_sessions, 1);
    assert_eq!(controller.stats().avg_focus, 4.0);
    assert!(controller.sessions()[0].is_open());

    // Two minutes and five seconds on the clock.
    for _ in 0..125 {
        controller.tick();
    }

    // End: optimistic stop, client-estimated duration on the wire.
    let payload = controller.begin_end(&id).unwrap();
    assert!(!controller.is_running());
    assert_eq!(payload.duration_minutes, 2);
    client.end_session(&payload).await.unwrap();
    controller.end_succeeded();

    let sessions = client.fetch_sessions().await.unwrap();
    controller.sessions_loaded(sessions);
    let ended = &controller.sessions()[0];
    assert!(!ended.is_open());
    assert_eq!(ended.duration_minutes, Some(2));
    assert_eq!(controller.stats().total_minutes, 2);
}

#[tokio::test]
async fn drifted_field_names_normalize_at_the_boundary() {
    let state = MockBackend::default();
    state.sessions.lock().unwrap().push(json!({
        "_id": "legacy-1",
        "subject": "history",
        "focus": 2,
        "startTime": "2025-02-01T08:00:00Z",
        "endTime": "2025-02-01T08:30:00Z",
        "durationMinutes": 30,
    }));
    let addr = spawn_backend(mock_router(state)).await;
    let client = StudySyncClient::new(format!("http://{}", addr));

    let sessions = client.fetch_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, "legacy-1");
    assert_eq!(sessions[0].focus_level, Some(2));
}

#[tokio::test]
async fn rejected_start_issues_no_request() {
    let state = MockBackend::default();
    let addr = spawn_backend(mock_router(state.clone())).await;
    let _client = StudySyncClient::new(format!("http://{}", addr));
    let mut controller = SessionController::new();

    let mut blank = form();
    blank.name = String::new();
    assert!(controller.begin_start(&blank).is_err());

    let mut blank = form();
    blank.subject = "  ".to_string();
    assert!(controller.begin_start(&blank).is_err());

    assert_eq!(state.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn server_failure_preserves_cached_sessions() {
    async fn failing_all() -> (StatusCode, Json<Value>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "boom" })),
        )
    }
    let app = Router::new().route("/study/all", get(failing_all));
    let addr = spawn_backend(app).await;
    let client = StudySyncClient::new(format!("http://{}", addr));

    let err = client.fetch_sessions().await.unwrap_err();
    match err {
        ApiError::Server { status, message } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(message, "boom");
        }
        ApiError::Transport(e) => panic!("expected server error, got transport: {}", e),
    }

    let mut controller = SessionController::new();
    controller.sessions_loaded(vec![]);
    controller.load_failed("Couldn't fetch sessions. Try again.");
    assert!(controller.error().is_some());
    assert!(controller.pending().is_idle());
}

#[tokio::test]
async fn summary_server_error_and_transport_error_differ() {
    async fn failing_summary() -> (StatusCode, Json<Value>) {
        (StatusCode::BAD_GATEWAY, Json(json!({ "error": "llm down" })))
    }
    let app = Router::new().route("/study/ai-summary", post(failing_summary));
    let addr = spawn_backend(app).await;
    let client = StudySyncClient::new(format!("http://{}", addr));

    let err = client.ai_summary(&[]).await.unwrap_err();
    assert_eq!(
        SummaryFailure::from(err),
        SummaryFailure::Server(Some("llm down".to_string()))
    );

    // A port nobody listens on: the request never completes.
    let dead_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = dead_listener.local_addr().unwrap();
    drop(dead_listener);
    let unreachable = StudySyncClient::new(format!("http://{}", dead_addr));

    let err = unreachable.ai_summary(&[]).await.unwrap_err();
    assert_eq!(SummaryFailure::from(err), SummaryFailure::Transport);
}

#[tokio::test]
async fn summary_success_returns_text() {
    async fn summary() -> Json<Value> {
        Json(json!({ "summary": "You studied mostly math this week." }))
    }
    let app = Router::new().route("/study/ai-summary", post(summary));
    let addr = spawn_backend(app).await;
    let client = StudySyncClient::new(format!("http://{}", addr));

    let summary = client.ai_summary(&[]).await.unwrap();
    assert_eq!(
        summary.as_deref(),
        Some("You studied mostly math this week.")
    );
}
