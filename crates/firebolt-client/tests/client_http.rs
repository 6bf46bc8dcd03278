//! Client tests against an in-process mock of the Firebolt API.
//!
//! The mock serves the auth, account, engine and query endpoints from a
//! single fallback handler (engine paths contain `:` which the router would
//! read as captures).

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use connector_core::{CancellationToken, Value};
use firebolt_client::{
    Client, ClientOptions, EngineStatus, Error, LoginParams, RetryConfig,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;

const RUNNING: &str = "ENGINE_STATUS_RUNNING_REVISION_SERVING";
const PROVISIONING: &str = "ENGINE_STATUS_PROVISIONING_STARTED";
const TERMINATED: &str = "ENGINE_STATUS_TERMINATION_FINISHED";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: String,
    body: String,
}

struct MockState {
    base_url: String,
    current_token: String,
    issued_refresh: String,
    refresh_fails: bool,
    account_known: bool,
    start_statuses: VecDeque<&'static str>,
    poll_statuses: VecDeque<&'static str>,
    query_failures: u32,
    start_calls: u32,
    refresh_calls: u32,
    query_calls: u32,
    requests: Vec<Recorded>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            current_token: "token-1".to_string(),
            issued_refresh: "refresh-1".to_string(),
            refresh_fails: false,
            account_known: true,
            start_statuses: VecDeque::from([RUNNING]),
            poll_statuses: VecDeque::from([RUNNING]),
            query_failures: 0,
            start_calls: 0,
            refresh_calls: 0,
            query_calls: 0,
            requests: Vec::new(),
        }
    }
}

type Shared = Arc<Mutex<MockState>>;

/// Pops the next scripted status, repeating the last one.
fn next_status(queue: &mut VecDeque<&'static str>) -> &'static str {
    if queue.len() > 1 {
        queue.pop_front().unwrap_or(RUNNING)
    } else {
        queue.front().copied().unwrap_or(RUNNING)
    }
}

fn status(code: StatusCode, body: serde_json::Value) -> Response {
    (code, Json(body)).into_response()
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let mut state = state.lock().unwrap();
    let path = uri.path().to_string();
    let query = uri.query().unwrap_or_default().to_string();
    state.requests.push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        body: body.clone(),
    });

    match (method.as_str(), path.as_str()) {
        ("POST", "/auth/v1/login") => {
            let creds: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
            if creds["username"] == "test@test.com" && creds["password"] == "secret" {
                let token = state.current_token.clone();
                let refresh = state.issued_refresh.clone();
                status(
                    StatusCode::OK,
                    json!({"access_token": token, "refresh_token": refresh}),
                )
            } else {
                status(StatusCode::UNAUTHORIZED, json!({"error": "bad credentials"}))
            }
        }
        ("POST", "/auth/v1/refresh") => {
            state.refresh_calls += 1;
            let creds: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
            if state.refresh_fails || creds["refresh_token"] != state.issued_refresh.as_str() {
                return status(StatusCode::BAD_REQUEST, json!({"error": "invalid refresh token"}));
            }
            let token = state.current_token.clone();
            status(StatusCode::OK, json!({"access_token": token}))
        }
        _ => {
            let expected = format!("Bearer {}", state.current_token);
            let authorized = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(|v| v == expected)
                .unwrap_or(false);
            if !authorized {
                return status(StatusCode::UNAUTHORIZED, json!({"error": "token expired"}));
            }
            route_authorized(&mut state, method.as_str(), &path, &query)
        }
    }
}

fn route_authorized(state: &mut MockState, method: &str, path: &str, query: &str) -> Response {
    match (method, path) {
        ("GET", "/iam/v2/accounts:getIdByName") => {
            if state.account_known && query == "account_name=acc" {
                status(StatusCode::OK, json!({"account_id": "acc-id"}))
            } else {
                status(StatusCode::OK, json!({}))
            }
        }
        ("GET", "/core/v1/accounts/acc-id/engines:getIdByName") => status(
            StatusCode::OK,
            json!({"engine_id": {"account_id": "acc-id", "engine_id": "eng-id"}}),
        ),
        ("GET", "/core/v1/accounts/acc-id/engines") => {
            let endpoint = state.base_url.clone();
            status(
                StatusCode::OK,
                json!({"edges": [{"node": {"name": "eng", "endpoint": endpoint}}]}),
            )
        }
        ("POST", "/core/v1/accounts/acc-id/engines/eng-id:start") => {
            state.start_calls += 1;
            let current = next_status(&mut state.start_statuses);
            status(StatusCode::OK, json!({"engine": {"current_status": current}}))
        }
        ("GET", "/core/v1/accounts/acc-id/engines/eng-id") => {
            let current = next_status(&mut state.poll_statuses);
            status(StatusCode::OK, json!({"engine": {"current_status": current}}))
        }
        ("POST", "/") => {
            state.query_calls += 1;
            if state.query_failures > 0 {
                state.query_failures -= 1;
                return status(StatusCode::SERVICE_UNAVAILABLE, json!({"error": "busy"}));
            }
            if query != "database=db" {
                return status(StatusCode::NOT_FOUND, json!({"error": "unknown database"}));
            }
            status(
                StatusCode::OK,
                json!({
                    "meta": [
                        {"name": "ID", "type": "Int32"},
                        {"name": "active", "type": "UInt8"},
                        {"name": "created", "type": "Date"}
                    ],
                    "data": [
                        {"ID": 1, "active": 1, "created": "2022-09-01"},
                        {"ID": 2, "active": 0, "created": null}
                    ],
                    "rows": 2,
                    "statistics": {"elapsed": 0.001, "rows_read": 2, "bytes_read": 32}
                }),
            )
        }
        _ => status(StatusCode::NOT_FOUND, json!({"error": "not found"})),
    }
}

async fn start_mock(state: MockState) -> (Shared, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shared = Arc::new(Mutex::new(state));
    shared.lock().unwrap().base_url = format!("http://{addr}");

    let app = Router::new()
        .fallback(handle)
        .with_state(shared.clone())
        .layer(ServiceBuilder::new());

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (shared, handle)
}

fn options(state: &Shared) -> ClientOptions {
    ClientOptions {
        base_url: state.lock().unwrap().base_url.clone(),
        retry: RetryConfig {
            max_retries: 3,
            min_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
        },
        engine_poll_interval: Duration::from_millis(10),
    }
}

fn params() -> LoginParams {
    LoginParams {
        email: "test@test.com".to_string(),
        password: "secret".to_string(),
        account_name: "acc".to_string(),
        engine_name: "eng".to_string(),
    }
}

async fn logged_in(state: &Shared) -> Client {
    let client = Client::with_options("db", options(state)).unwrap();
    client
        .login(&CancellationToken::new(), &params())
        .await
        .unwrap();
    client
}

#[tokio::test]
async fn test_login_resolves_account_engine_and_endpoint() {
    let _ = tracing_subscriber::fmt().with_env_filter("debug").try_init();
    let (state, server) = start_mock(MockState::default()).await;

    let client = logged_in(&state).await;
    assert_eq!(client.access_token().await, "token-1");
    assert_eq!(client.engine_endpoint().await, state.lock().unwrap().base_url);

    let paths: Vec<String> = state
        .lock()
        .unwrap()
        .requests
        .iter()
        .map(|r| r.path.clone())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/auth/v1/login",
            "/iam/v2/accounts:getIdByName",
            "/core/v1/accounts/acc-id/engines:getIdByName",
            "/core/v1/accounts/acc-id/engines",
        ]
    );

    server.abort();
}

#[tokio::test]
async fn test_login_with_bad_credentials_is_auth_error() {
    let (state, server) = start_mock(MockState::default()).await;
    let client = Client::with_options("db", options(&state)).unwrap();

    let mut bad = params();
    bad.password = "wrong".to_string();
    let err = client
        .login(&CancellationToken::new(), &bad)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth { status: 401, .. }), "{err}");
    // no refresh attempt for the login call itself
    assert_eq!(state.lock().unwrap().refresh_calls, 0);

    server.abort();
}

#[tokio::test]
async fn test_login_without_access_token_is_auth_error() {
    let (state, server) = start_mock(MockState {
        current_token: String::new(),
        ..Default::default()
    })
    .await;
    let client = Client::with_options("db", options(&state)).unwrap();

    let err = client
        .login(&CancellationToken::new(), &params())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth { status: 200, .. }), "{err}");

    // nothing is sent with an empty bearer token
    let paths: Vec<String> = state
        .lock()
        .unwrap()
        .requests
        .iter()
        .map(|r| r.path.clone())
        .collect();
    assert_eq!(paths, vec!["/auth/v1/login".to_string()]);
    assert!(client.access_token().await.is_empty());

    server.abort();
}

#[tokio::test]
async fn test_login_unknown_account_is_resolution_error() {
    let (state, server) = start_mock(MockState {
        account_known: false,
        ..Default::default()
    })
    .await;
    let client = Client::with_options("db", options(&state)).unwrap();

    let err = client
        .login(&CancellationToken::new(), &params())
        .await
        .unwrap_err();

    assert!(
        matches!(err.root(), Error::Resolution { what: "account id", name } if name == "acc"),
        "{err}"
    );

    server.abort();
}

#[tokio::test]
async fn test_run_query_normalizes_rows() {
    let (state, server) = start_mock(MockState::default()).await;
    let client = logged_in(&state).await;

    let response = client
        .run_query(&CancellationToken::new(), "SELECT * FROM t")
        .await
        .unwrap();

    assert_eq!(response.rows, 2);
    assert_eq!(response.data[0]["id"], Value::Int(1));
    assert_eq!(response.data[0]["active"], Value::Bool(true));
    assert!(matches!(response.data[0]["created"], Value::Timestamp(_)));
    assert_eq!(response.data[1]["active"], Value::Bool(false));
    assert_eq!(response.data[1]["created"], Value::Null);

    let last = state.lock().unwrap().requests.last().cloned().unwrap();
    assert_eq!(last.method, Method::POST);
    assert_eq!(last.query, "database=db");
    assert_eq!(last.body, "SELECT * FROM t");

    server.abort();
}

#[tokio::test]
async fn test_expired_token_is_refreshed_once_and_reused() {
    let (state, server) = start_mock(MockState::default()).await;
    let client = logged_in(&state).await;
    let cancel = CancellationToken::new();

    // token-1 expires
    state.lock().unwrap().current_token = "token-2".to_string();

    client.run_query(&cancel, "SELECT 1").await.unwrap();
    assert_eq!(client.access_token().await, "token-2");
    assert_eq!(state.lock().unwrap().refresh_calls, 1);

    // later calls use the new token directly
    client.run_query(&cancel, "SELECT 2").await.unwrap();
    assert_eq!(state.lock().unwrap().refresh_calls, 1);

    server.abort();
}

#[tokio::test]
async fn test_failed_refresh_is_surfaced() {
    let (state, server) = start_mock(MockState::default()).await;
    let client = logged_in(&state).await;

    {
        let mut state = state.lock().unwrap();
        state.current_token = "token-2".to_string();
        state.refresh_fails = true;
    }

    let err = client
        .run_query(&CancellationToken::new(), "SELECT 1")
        .await
        .unwrap_err();

    assert!(matches!(err.root(), Error::TokenRefresh(_)), "{err}");
    assert!(!err.is_cancelled());
    let query_attempts = state
        .lock()
        .unwrap()
        .requests
        .iter()
        .filter(|r| r.path == "/")
        .count();
    assert_eq!(query_attempts, 1);

    server.abort();
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let (state, server) = start_mock(MockState::default()).await;
    let client = logged_in(&state).await;

    state.lock().unwrap().query_failures = 2;
    client
        .run_query(&CancellationToken::new(), "SELECT 1")
        .await
        .unwrap();
    assert_eq!(state.lock().unwrap().query_calls, 3);

    server.abort();
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let (state, server) = start_mock(MockState::default()).await;
    let client = logged_in(&state).await;

    state.lock().unwrap().query_failures = 100;
    let err = client
        .run_query(&CancellationToken::new(), "SELECT 1")
        .await
        .unwrap_err();

    assert!(
        matches!(err.root(), Error::InvalidStatus { status: 503, .. }),
        "{err}"
    );
    // first attempt plus three retries
    assert_eq!(state.lock().unwrap().query_calls, 4);

    server.abort();
}

#[tokio::test]
async fn test_start_engine_reports_running() {
    let (state, server) = start_mock(MockState {
        start_statuses: VecDeque::from([PROVISIONING, RUNNING]),
        ..Default::default()
    })
    .await;
    let client = logged_in(&state).await;
    let cancel = CancellationToken::new();

    assert!(!client.start_engine(&cancel).await.unwrap());
    assert!(client.start_engine(&cancel).await.unwrap());
    assert_eq!(
        client.engine_status(&cancel).await.unwrap(),
        EngineStatus::Running
    );

    server.abort();
}

#[tokio::test]
async fn test_wait_engine_started_restarts_terminated_engine() {
    let (state, server) = start_mock(MockState {
        start_statuses: VecDeque::from([PROVISIONING, PROVISIONING]),
        poll_statuses: VecDeque::from([PROVISIONING, TERMINATED, PROVISIONING, RUNNING]),
        ..Default::default()
    })
    .await;
    let client = logged_in(&state).await;

    client
        .wait_engine_started(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(state.lock().unwrap().start_calls, 2);

    server.abort();
}

#[tokio::test]
async fn test_wait_engine_started_honours_cancellation() {
    let (state, server) = start_mock(MockState {
        start_statuses: VecDeque::from([PROVISIONING]),
        poll_statuses: VecDeque::from([PROVISIONING]),
        ..Default::default()
    })
    .await;
    let client = logged_in(&state).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = client.wait_engine_started(&cancel).await.unwrap_err();
    assert!(err.is_cancelled(), "{err}");

    server.abort();
}

#[tokio::test]
async fn test_close_is_idempotent_and_final() {
    let (state, server) = start_mock(MockState::default()).await;
    let client = logged_in(&state).await;

    client.close().await;
    client.close().await;

    let err = client
        .run_query(&CancellationToken::new(), "SELECT 1")
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::Closed), "{err}");

    server.abort();
}

#[tokio::test]
async fn test_ensure_engine_running_times_out() {
    let (state, server) = start_mock(MockState {
        start_statuses: VecDeque::from([PROVISIONING]),
        poll_statuses: VecDeque::from([PROVISIONING]),
        ..Default::default()
    })
    .await;
    let client = logged_in(&state).await;

    let err = client
        .ensure_engine_running(&CancellationToken::new(), Duration::from_millis(60))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EngineStartTimeout(_)), "{err}");

    server.abort();
}

#[tokio::test]
async fn test_ensure_engine_running_skips_wait_for_running_engine() {
    let (state, server) = start_mock(MockState::default()).await;
    let client = logged_in(&state).await;

    client
        .ensure_engine_running(&CancellationToken::new(), Duration::from_secs(5))
        .await
        .unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.start_calls, 1);
    assert!(!state
        .requests
        .iter()
        .any(|r| r.method == Method::GET && r.path == "/core/v1/accounts/acc-id/engines/eng-id"));
    drop(state);

    server.abort();
}

#[tokio::test]
async fn test_ensure_engine_running_sends_one_start_request() {
    let (state, server) = start_mock(MockState {
        start_statuses: VecDeque::from([PROVISIONING]),
        poll_statuses: VecDeque::from([PROVISIONING, RUNNING]),
        ..Default::default()
    })
    .await;
    let client = logged_in(&state).await;

    client
        .ensure_engine_running(&CancellationToken::new(), Duration::from_secs(5))
        .await
        .unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.start_calls, 1);
    let starts = state
        .requests
        .iter()
        .filter(|r| r.method == Method::POST && r.path.ends_with(":start"))
        .count();
    assert_eq!(starts, 1);
    drop(state);

    server.abort();
}
