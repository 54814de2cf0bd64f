//! Session registry integration tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Duration;
use paddock_auth::mocks::{MockClock, MockSessionStore};
use paddock_auth::{
    AccountId, AuthConfig, DeviceMeta, Role, SessionRegistry, SessionStatus, SigningSecret,
    TokenFingerprint, TokenKind, TokenService,
};
use std::sync::Arc;

fn registry(clock: &MockClock) -> (SessionRegistry<MockSessionStore>, MockSessionStore) {
    let store = MockSessionStore::new();
    let registry = SessionRegistry::new(
        store.clone(),
        Arc::new(clock.clone()),
        std::time::Duration::from_millis(200),
        Duration::seconds(60),
    );
    (registry, store)
}

fn device() -> DeviceMeta {
    DeviceMeta::from_request(
        "198.51.100.4".parse().ok(),
        Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile".into()),
    )
}

#[tokio::test]
async fn test_revoke_deactivates_unexpired_session() {
    let clock = MockClock::default();
    let (registry, _) = registry(&clock);
    let fingerprint = TokenFingerprint::of_jti("revoke-me");

    let id = registry
        .create(AccountId::new(), fingerprint.clone(), TokenKind::Access, Duration::hours(8), device())
        .await
        .unwrap();
    assert_eq!(registry.is_active(&fingerprint).await, Ok(true));

    assert_eq!(registry.revoke(id).await, Ok(true));
    assert_eq!(registry.is_active(&fingerprint).await, Ok(false));
    assert_eq!(registry.lookup(&fingerprint).await, Ok(SessionStatus::Revoked));

    // Revoking twice reports nothing changed.
    assert_eq!(registry.revoke(id).await, Ok(false));
}

#[tokio::test]
async fn test_expiry_alone_ends_session() {
    let clock = MockClock::default();
    let (registry, _) = registry(&clock);
    let fingerprint = TokenFingerprint::of_jti("short-lived");

    registry
        .create(AccountId::new(), fingerprint.clone(), TokenKind::Access, Duration::minutes(5), device())
        .await
        .unwrap();

    clock.advance(Duration::minutes(5));
    assert_eq!(registry.lookup(&fingerprint).await, Ok(SessionStatus::Expired));
}

#[tokio::test]
async fn test_revoke_all_covers_every_device() {
    let clock = MockClock::default();
    let (registry, _) = registry(&clock);
    let account = AccountId::new();
    let other = AccountId::new();

    let phone = TokenFingerprint::of_jti("phone");
    let laptop = TokenFingerprint::of_jti("laptop");
    let unrelated = TokenFingerprint::of_jti("someone-else");
    for (owner, fp) in [(account, &phone), (account, &laptop), (other, &unrelated)] {
        registry
            .create(owner, fp.clone(), TokenKind::Access, Duration::hours(1), device())
            .await
            .unwrap();
    }
    assert_eq!(registry.active_sessions(account).await.unwrap().len(), 2);

    assert_eq!(registry.revoke_all(account).await, Ok(2));
    assert_eq!(registry.is_active(&phone).await, Ok(false));
    assert_eq!(registry.is_active(&laptop).await, Ok(false));
    assert_eq!(registry.is_active(&unrelated).await, Ok(true));
    assert!(registry.active_sessions(account).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_register_uses_token_fingerprint_and_ttl() {
    let clock = MockClock::default();
    let (registry, store) = registry(&clock);
    let config = AuthConfig::new(SigningSecret::new("registry-test-secret-0123456789abcdef").unwrap());
    let tokens = TokenService::new(&config, Arc::new(clock.clone()));

    let account = AccountId::new();
    let issued = tokens
        .issue_access(account, Role::GateStaff, Some(paddock_auth::EventId(3)), Duration::hours(2))
        .unwrap();
    let id = registry.register(account, &issued, device()).await.unwrap();

    let row = store.get(id).unwrap().unwrap();
    assert_eq!(row.fingerprint, issued.fingerprint);
    assert_ne!(row.fingerprint.as_str(), issued.token);
    assert_ne!(row.fingerprint.as_str(), issued.jti);
    assert_eq!(row.issued_at, issued.issued_at);
    assert_eq!(row.expires_at, issued.expires_at);
    assert_eq!(row.device.device_type, "mobile");
}

#[tokio::test]
async fn test_store_errors_propagate() {
    let clock = MockClock::default();
    let (registry, store) = registry(&clock);
    store.set_unavailable(true);

    let result = registry.lookup(&TokenFingerprint::of_jti("any")).await;
    assert!(result.unwrap_err().is_transient());
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_times_out() {
    let clock = MockClock::default();
    let (registry, store) = registry(&clock);
    store.set_latency(Some(std::time::Duration::from_secs(5)));

    let result = registry.is_active(&TokenFingerprint::of_jti("slow")).await;
    assert!(matches!(result, Err(paddock_auth::AuthError::StoreUnavailable(_))));
}

#[tokio::test]
async fn test_leeway_extends_expiry_check() {
    let clock = MockClock::default();
    let (registry, _) = registry(&clock);
    let registry = registry.with_leeway(Duration::seconds(30));
    let fingerprint = TokenFingerprint::of_jti("skewed");

    registry
        .create(AccountId::new(), fingerprint.clone(), TokenKind::Access, Duration::minutes(1), device())
        .await
        .unwrap();

    clock.advance(Duration::seconds(80));
    assert!(registry.is_active(&fingerprint).await.unwrap());

    clock.advance(Duration::seconds(11));
    assert_eq!(registry.lookup(&fingerprint).await.unwrap(), SessionStatus::Expired);
}
