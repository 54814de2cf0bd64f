//! End-to-end tests of the router on the in-memory stores.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, StatusCode, header},
};
use chrono::Duration;
use paddock_auth::error::{INVALID_LOGIN_MESSAGE, SIGN_IN_AGAIN_MESSAGE, TOO_MANY_ATTEMPTS_MESSAGE};
use paddock_auth::mocks::{MockAccountStore, MockAttemptStore, MockClock, MockSessionStore};
use paddock_auth::{
    AuthConfig, AuthService, CreateAccount, EventId, HashCost, Role, SigningSecret, ThrottlePolicy,
};
use paddock_web::cookies::{ACCESS_COOKIE, HINT_COOKIE, REFRESH_COOKIE};
use paddock_web::{AppState, CORRELATION_ID_HEADER, CookieSettings, TrustedProxies, app_router};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

const PASSWORD: &str = "correct horse battery staple";

type TestState = AppState<MockAccountStore, MockSessionStore, MockAttemptStore>;

struct TestApp {
    state: TestState,
    accounts: MockAccountStore,
}

fn config() -> AuthConfig {
    AuthConfig::new(SigningSecret::new("router-test-secret-0123456789abcdef").unwrap())
        .with_hash_cost(HashCost::minimal())
        .with_store_timeout(std::time::Duration::from_millis(100))
}

impl TestApp {
    fn new() -> Self {
        Self::build(config(), TrustedProxies::default())
    }

    fn build(config: AuthConfig, proxies: TrustedProxies) -> Self {
        let accounts = MockAccountStore::new();
        let service = AuthService::new(
            config,
            accounts.clone(),
            MockSessionStore::new(),
            MockAttemptStore::new(),
            Arc::new(MockClock::default()),
        )
        .unwrap();

        Self {
            state: AppState::new(service, CookieSettings::default(), "/login")
                .with_trusted_proxies(proxies),
            accounts,
        }
    }

    fn router(&self) -> Router {
        app_router(self.state.clone())
    }

    async fn account(&self, email: &str, role: Role, event: Option<i64>) {
        self.state
            .auth
            .create_account(CreateAccount {
                email: email.to_string(),
                password: PASSWORD.to_string(),
                display_name: "Router Test".to_string(),
                role,
                assigned_event_id: event.map(EventId),
            })
            .await
            .unwrap();
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    async fn login(&self, email: &str, secret: &str, remember_me: bool) -> Response<Body> {
        let body = json!({ "identifier": email, "secret": secret, "rememberMe": remember_me });
        self.send(
            Request::post("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Login arriving from `peer` with an `X-Forwarded-For` header; returns
    /// the response status.
    async fn login_via(&self, peer: &str, forwarded_for: &str, email: &str, secret: &str) -> StatusCode {
        let body = json!({ "identifier": email, "secret": secret });
        let mut request = Request::post("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Forwarded-For", forwarded_for)
            .body(Body::from(body.to_string()))
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>(format!("{peer}:40000").parse().unwrap()));
        self.send(request).await.status()
    }

    /// Log in and return the `Cookie` header value carrying every credential
    /// cookie that was set.
    async fn signed_in(&self, email: &str, remember_me: bool) -> String {
        let response = self.login(email, PASSWORD, remember_me).await;
        assert_eq!(response.status(), StatusCode::OK);
        cookie_header(&response)
    }
}

fn get(uri: &str, cookies: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::COOKIE, cookies)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, cookies: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::COOKIE, cookies)
        .body(Body::empty())
        .unwrap()
}

/// `name=value` pairs of every `Set-Cookie` header.
fn set_cookies(response: &Response<Body>) -> Vec<(String, String)> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn set_cookie_line(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

fn cookie_header(response: &Response<Body>) -> String {
    set_cookies(response)
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_sets_cookies_and_returns_summary() {
    let app = TestApp::new();
    app.account("organizer@paddock.test", Role::Organizer, Some(42))
        .await;

    let response = app.login("organizer@paddock.test", PASSWORD, false).await;
    assert_eq!(response.status(), StatusCode::OK);

    let names: Vec<String> = set_cookies(&response).into_iter().map(|(n, _)| n).collect();
    assert!(names.contains(&ACCESS_COOKIE.to_string()));
    assert!(names.contains(&HINT_COOKIE.to_string()));

    let access = set_cookie_line(&response, ACCESS_COOKIE).unwrap();
    assert!(access.contains("HttpOnly"));
    assert!(!access.contains("Max-Age"), "session cookie without remember me");

    let hint = set_cookie_line(&response, HINT_COOKIE).unwrap();
    assert!(!hint.contains("HttpOnly"));

    let body = json_body(response).await;
    assert_eq!(body["role"], "organizer");
    assert_eq!(body["assignedEventId"], 42);
    assert!(body["accountId"].is_string());
}

#[tokio::test]
async fn test_remember_me_sets_scoped_refresh_cookie() {
    let app = TestApp::new();
    app.account("admin@paddock.test", Role::Admin, None).await;

    let response = app.login("admin@paddock.test", PASSWORD, true).await;
    assert_eq!(response.status(), StatusCode::OK);

    let refresh = set_cookie_line(&response, REFRESH_COOKIE).unwrap();
    assert!(refresh.contains("Path=/auth"));
    assert!(refresh.contains("HttpOnly"));
    assert!(set_cookie_line(&response, ACCESS_COOKIE).unwrap().contains("Max-Age"));
}

#[tokio::test]
async fn test_failed_logins_share_one_message() {
    let app = TestApp::new();
    app.account("admin@paddock.test", Role::Admin, None).await;

    let wrong_password = app.login("admin@paddock.test", "nope", false).await;
    let unknown_email = app.login("ghost@paddock.test", PASSWORD, false).await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&wrong_password).is_empty());

    let a = json_body(wrong_password).await;
    let b = json_body(unknown_email).await;
    assert_eq!(a, b);
    assert_eq!(a["message"], INVALID_LOGIN_MESSAGE);
}

#[tokio::test]
async fn test_lockout_returns_429_without_remaining_time() {
    let app = TestApp::new();
    app.account("admin@paddock.test", Role::Admin, None).await;

    for _ in 0..5 {
        let response = app.login("admin@paddock.test", "wrong", false).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app.login("admin@paddock.test", PASSWORD, false).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(response).await;
    assert_eq!(body["message"], TOO_MANY_ATTEMPTS_MESSAGE);
}

#[tokio::test]
async fn test_store_outage_is_503() {
    let app = TestApp::new();
    app.account("admin@paddock.test", Role::Admin, None).await;
    app.accounts.set_unavailable(true);

    let response = app.login("admin@paddock.test", PASSWORD, false).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_gate_without_cookie_redirects_to_login() {
    let app = TestApp::new();

    let response = app
        .send(Request::get("/admin/events/42").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(set_cookies(&response).is_empty(), "nothing to clear");
}

#[tokio::test]
async fn test_gate_with_garbage_cookie_clears_it() {
    let app = TestApp::new();

    let response = app
        .send(get("/admin/api/me", &format!("{ACCESS_COOKIE}=not.a.token")))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(
        set_cookies(&response)
            .iter()
            .any(|(name, value)| name == ACCESS_COOKIE && value.is_empty())
    );
}

#[tokio::test]
async fn test_scoped_role_is_confined_to_its_event() {
    let app = TestApp::new();
    app.account("organizer@paddock.test", Role::Organizer, Some(42))
        .await;
    let cookies = app.signed_in("organizer@paddock.test", false).await;

    let other_event = app
        .send(get("/admin/events/7/registrations", &cookies))
        .await;
    assert_eq!(other_event.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&other_event), "/admin/events/42");

    let escape = app
        .send(get("/admin/events/42/%2e%2e/7", &cookies))
        .await;
    assert_eq!(escape.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&escape), "/admin/events/42");

    // Past the gate; no page is mounted there, so the fallback answers.
    let own_event = app
        .send(get("/admin/events/42/registrations", &cookies))
        .await;
    assert_eq!(own_event.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_global_role_reads_principal() {
    let app = TestApp::new();
    app.account("boss@paddock.test", Role::SuperAdmin, None).await;
    let cookies = app.signed_in("boss@paddock.test", false).await;

    let response = app.send(get("/admin/api/me", &cookies)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["role"], "super_admin");
    assert_eq!(body["assignedEventId"], Value::Null);
    assert!(body.get("sessionId").is_none());
}

#[tokio::test]
async fn test_logout_revokes_the_token() {
    let app = TestApp::new();
    app.account("admin@paddock.test", Role::Admin, None).await;
    let cookies = app.signed_in("admin@paddock.test", false).await;

    let before = app.send(get("/admin/api/me", &cookies)).await;
    assert_eq!(before.status(), StatusCode::OK);

    let logout = app.send(post("/auth/logout", &cookies)).await;
    assert_eq!(logout.status(), StatusCode::OK);
    assert!(
        set_cookies(&logout)
            .iter()
            .any(|(name, value)| name == ACCESS_COOKIE && value.is_empty())
    );

    // Replaying the old cookie after logout is refused.
    let replay = app.send(get("/admin/api/me", &cookies)).await;
    assert_eq!(replay.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&replay), "/login");
}

#[tokio::test]
async fn test_refresh_rotates_and_refuses_replay() {
    let app = TestApp::new();
    app.account("admin@paddock.test", Role::Admin, None).await;
    let cookies = app.signed_in("admin@paddock.test", true).await;

    let first = app.send(post("/auth/refresh", &cookies)).await;
    assert_eq!(first.status(), StatusCode::OK);
    let rotated = cookie_header(&first);
    assert!(rotated.contains(ACCESS_COOKIE));
    assert!(rotated.contains(REFRESH_COOKIE));

    let fresh = app.send(get("/admin/api/me", &rotated)).await;
    assert_eq!(fresh.status(), StatusCode::OK);

    let replay = app.send(post("/auth/refresh", &cookies)).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert!(
        set_cookies(&replay)
            .iter()
            .any(|(name, value)| name == REFRESH_COOKIE && value.is_empty())
    );
    let body = json_body(replay).await;
    assert_eq!(body["message"], SIGN_IN_AGAIN_MESSAGE);
}

#[tokio::test]
async fn test_refresh_without_cookie_is_401() {
    let app = TestApp::new();
    let response = app
        .send(Request::post("/auth/refresh").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sessions_listing_marks_current() {
    let app = TestApp::new();
    app.account("admin@paddock.test", Role::Admin, None).await;
    let _other = app.signed_in("admin@paddock.test", false).await;
    let cookies = app.signed_in("admin@paddock.test", false).await;

    let response = app.send(get("/admin/api/sessions", &cookies)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let sessions = body.as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(
        sessions.iter().filter(|s| s["current"] == true).count(),
        1
    );
}

#[tokio::test]
async fn test_revoke_all_ends_every_session() {
    let app = TestApp::new();
    app.account("admin@paddock.test", Role::Admin, None).await;
    let other = app.signed_in("admin@paddock.test", false).await;
    let cookies = app.signed_in("admin@paddock.test", false).await;

    let response = app
        .send(post("/admin/api/sessions/revoke-all", &cookies))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["revoked"], 2);

    for jar in [&cookies, &other] {
        let replay = app.send(get("/admin/api/me", jar)).await;
        assert_eq!(replay.status(), StatusCode::SEE_OTHER);
    }
}

#[tokio::test]
async fn test_gate_redirect_carries_correlation_id() {
    let app = TestApp::new();
    let id = "6f1c2a4e-1f7b-4c1e-9a7d-3c2b1a0f9e8d";
    let response = app
        .send(
            Request::get("/admin/events/42/registrations")
                .header(CORRELATION_ID_HEADER, id)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(
        response.headers().get(CORRELATION_ID_HEADER).unwrap(),
        id
    );
}

fn ip_throttled() -> AuthConfig {
    config().with_ip_throttle(Some(ThrottlePolicy::new(
        3,
        Duration::minutes(15),
        Duration::minutes(15),
    )))
}

#[tokio::test]
async fn test_forwarded_for_from_direct_client_is_ignored() {
    let app = TestApp::build(ip_throttled(), TrustedProxies::default());
    app.account("admin@paddock.test", Role::Admin, None).await;

    // Rotating the header does not dodge the per-address counter.
    for i in 0..3 {
        let status = app
            .login_via("203.0.113.5", &format!("198.51.100.{i}"), &format!("guess{i}@paddock.test"), "x")
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let status = app
        .login_via("203.0.113.5", "198.51.100.99", "admin@paddock.test", PASSWORD)
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Nor can it pin the lock on somebody else's address.
    let status = app
        .login_via("198.51.100.0", "203.0.113.5", "admin@paddock.test", PASSWORD)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_trusted_proxy_forwards_client_address() {
    let proxy = "10.0.0.1";
    let app = TestApp::build(
        ip_throttled(),
        TrustedProxies::new([proxy.parse().unwrap()]),
    );
    app.account("admin@paddock.test", Role::Admin, None).await;

    for i in 0..3 {
        let status = app
            .login_via(proxy, "6.6.6.6, 198.51.100.7", &format!("guess{i}@paddock.test"), "x")
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let locked = app
        .login_via(proxy, "1.2.3.4, 198.51.100.7", "admin@paddock.test", PASSWORD)
        .await;
    assert_eq!(locked, StatusCode::TOO_MANY_REQUESTS);

    // Other clients behind the same proxy are unaffected.
    let other = app
        .login_via(proxy, "198.51.100.8", "admin@paddock.test", PASSWORD)
        .await;
    assert_eq!(other, StatusCode::OK);
}
