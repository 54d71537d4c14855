//! Request pipeline behaviour against a scripted auth server and API.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokenward::client::*;
use tokenward::domain_model::*;
use tokenward::domain_port::TokenStore;
use tokenward::infra_http::{HttpAuthServerClient, HttpAuthServerConfig};
use tokenward::infra_memory::MemoryTokenStore;
use tokio::sync::broadcast;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REFRESH_PATH: &str = "/api/auth/refresh";
const PROTECTED_PATH: &str = "/api/test/protected";

struct Harness {
    server: MockServer,
    store: Arc<MemoryTokenStore>,
    pipeline: Arc<HttpPipeline>,
    events: broadcast::Receiver<SessionEvent>,
}

fn session(access: Option<&str>, refresh: Option<&str>) -> Session {
    Session {
        access_token: access.map(|t| AccessToken(t.to_string())),
        refresh_token: refresh.map(|t| RefreshToken(t.to_string())),
    }
}

async fn harness(initial: Session) -> Harness {
    tokenward::logger::init_test_logging();

    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::with_session(initial));
    let auth_server = Arc::new(
        HttpAuthServerClient::new(HttpAuthServerConfig {
            base_url: server.uri(),
            refresh_path: REFRESH_PATH.to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap(),
    );
    let events = SessionEvents::new();
    let rx = events.subscribe();
    let coordinator = Arc::new(RefreshCoordinator::new(
        auth_server,
        store.clone(),
        events,
        Duration::from_secs(5),
    ));
    let pipeline = Arc::new(
        HttpPipeline::builder()
            .base_url(server.uri())
            .refresh_path(REFRESH_PATH)
            .log_bodies(true)
            .store(store.clone())
            .coordinator(coordinator)
            .build()
            .unwrap(),
    );

    Harness {
        server,
        store,
        pipeline,
        events: rx,
    }
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn login_required(events: &[SessionEvent]) -> Vec<TeardownReason> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::LoginRequired { reason } => Some(*reason),
            _ => None,
        })
        .collect()
}

fn unauthorized() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "success": false,
        "message": "Token has expired",
    }))
}

async fn mount_protected(server: &MockServer, token: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(PROTECTED_PATH))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_replayed() {
    let mut h = harness(session(Some("A1"), Some("R1"))).await;

    mount_protected(&h.server, "A1", unauthorized()).await;
    mount_protected(
        &h.server,
        "A2",
        ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": { "ok": 1 } })),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({ "refreshToken": "R1" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": "A2", "refreshToken": "R2" })),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let response = h.pipeline.get(PROTECTED_PATH).await.unwrap();

    assert_eq!(response.status.as_u16(), 200);
    let data: serde_json::Value = response.data().unwrap();
    assert_eq!(data["ok"], 1);
    assert_eq!(h.store.snapshot(), session(Some("A2"), Some("R2")));

    let events = drain(&mut h.events);
    assert!(login_required(&events).is_empty());
    assert!(events.iter().any(|e| matches!(e, SessionEvent::Refreshed)));
}

#[tokio::test]
async fn concurrent_expiries_share_one_refresh() {
    let h = harness(session(Some("A1"), Some("R1"))).await;

    mount_protected(&h.server, "A1", unauthorized()).await;
    mount_protected(
        &h.server,
        "A2",
        ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": null })),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "success": true,
                    "data": { "accessToken": "A2", "refreshToken": "R2" }
                }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let (a, b, c) = tokio::join!(
        h.pipeline.get(PROTECTED_PATH),
        h.pipeline.get(PROTECTED_PATH),
        h.pipeline.get(PROTECTED_PATH),
    );

    for result in [a, b, c] {
        assert_eq!(result.unwrap().status.as_u16(), 200);
    }

    let replays = h
        .server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| {
            r.url.path() == PROTECTED_PATH
                && r.headers.get("authorization").map(|v| v.as_bytes()) == Some(&b"Bearer A2"[..])
        })
        .count();
    assert_eq!(replays, 3);
}

#[tokio::test]
async fn rejected_refresh_tears_down_session_once() {
    let mut h = harness(session(Some("A1"), Some("R1"))).await;

    mount_protected(&h.server, "A1", unauthorized()).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "success": false, "message": "Token is not valid" }))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let (a, b, c) = tokio::join!(
        h.pipeline.get(PROTECTED_PATH),
        h.pipeline.get(PROTECTED_PATH),
        h.pipeline.get(PROTECTED_PATH),
    );

    for result in [a, b, c] {
        match result {
            Err(HttpError::RefreshExpired(RefreshError::Rejected { status, message })) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Token is not valid");
            }
            other => panic!("expected a rejected refresh, got {:?}", other.map(|r| r.status)),
        }
    }

    assert!(h.store.snapshot().is_empty());
    assert_eq!(
        login_required(&drain(&mut h.events)),
        vec![TeardownReason::RefreshFailed]
    );
}

#[tokio::test]
async fn replayed_request_is_not_retried_twice() {
    let mut h = harness(session(Some("A1"), Some("R1"))).await;

    Mock::given(method("GET"))
        .and(path(PROTECTED_PATH))
        .respond_with(unauthorized())
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": "A2", "refreshToken": "R2" })),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let result = h.pipeline.get(PROTECTED_PATH).await;

    assert!(matches!(result, Err(HttpError::RetryExhausted)));
    assert!(result.as_ref().is_err_and(HttpError::is_session_ended));
    assert!(h.store.snapshot().is_empty());
    assert_eq!(
        login_required(&drain(&mut h.events)),
        vec![TeardownReason::RetryExhausted]
    );
}

#[tokio::test]
async fn missing_refresh_token_fails_without_exchange() {
    let mut h = harness(session(Some("A1"), None)).await;

    mount_protected(&h.server, "A1", unauthorized()).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let result = h.pipeline.get(PROTECTED_PATH).await;

    assert!(matches!(
        result,
        Err(HttpError::RefreshExpired(RefreshError::NoRefreshToken))
    ));
    assert!(h.store.snapshot().is_empty());
    assert_eq!(
        login_required(&drain(&mut h.events)),
        vec![TeardownReason::RefreshFailed]
    );
}

#[tokio::test]
async fn rejection_on_refresh_endpoint_is_terminal() {
    let mut h = harness(session(Some("A1"), Some("R1"))).await;

    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&h.server)
        .await;

    let result = h
        .pipeline
        .post(REFRESH_PATH, json!({ "refreshToken": "R1" }))
        .await;

    assert!(matches!(
        result,
        Err(HttpError::RefreshExpired(RefreshError::Rejected { status: 401, .. }))
    ));
    assert!(!h.pipeline.coordinator().is_refreshing());
    assert!(h.store.snapshot().is_empty());
    assert_eq!(
        login_required(&drain(&mut h.events)),
        vec![TeardownReason::RefreshEndpointRejected]
    );
}

#[tokio::test]
async fn other_failures_pass_through_without_refresh() {
    let mut h = harness(session(Some("A1"), Some("R1"))).await;

    for (route, status) in [("/forbidden", 403u16), ("/missing", 404), ("/broken", 500), ("/down", 503)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(json!({ "success": false, "message": "nope" })),
            )
            .mount(&h.server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let forbidden = h.pipeline.get("/forbidden").await;
    assert!(matches!(forbidden, Err(HttpError::Forbidden(_))));
    assert!(!forbidden.as_ref().is_err_and(HttpError::is_session_ended));
    assert!(matches!(
        h.pipeline.get("/missing").await,
        Err(HttpError::NotFound(_))
    ));
    assert!(matches!(
        h.pipeline.get("/broken").await,
        Err(HttpError::Server { status: 500, .. })
    ));
    assert!(matches!(
        h.pipeline.get("/down").await,
        Err(HttpError::Unavailable(_))
    ));

    assert_eq!(h.store.snapshot(), session(Some("A1"), Some("R1")));
    assert!(drain(&mut h.events).is_empty());
}

#[tokio::test]
async fn anonymous_requests_carry_no_credentials() {
    let h = harness(Session::default()).await;

    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "hello": "world" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let response = h
        .pipeline
        .send(OutboundRequest::get("/public").query("page", "1"))
        .await
        .unwrap();

    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["hello"], "world");

    let requests = h.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
    assert_eq!(requests[0].url.query(), Some("page=1"));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let store = Arc::new(MemoryTokenStore::with_session(session(Some("A1"), Some("R1"))));
    let auth_server = Arc::new(
        HttpAuthServerClient::new(HttpAuthServerConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            refresh_path: REFRESH_PATH.to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap(),
    );
    let coordinator = Arc::new(RefreshCoordinator::new(
        auth_server,
        store.clone(),
        SessionEvents::new(),
        Duration::from_secs(1),
    ));
    let pipeline = HttpPipeline::builder()
        .base_url("http://127.0.0.1:9")
        .store(store.clone())
        .coordinator(coordinator)
        .build()
        .unwrap();

    assert!(matches!(
        pipeline.get(PROTECTED_PATH).await,
        Err(HttpError::Transport(_))
    ));
    assert!(store.has_access_token());
}
