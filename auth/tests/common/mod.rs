//! Shared fixtures for the service-level tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use paddock_auth::mocks::{MockAccountStore, MockAttemptStore, MockClock, MockSessionStore};
use paddock_auth::{
    Account, AuthConfig, AuthService, CreateAccount, DeviceMeta, EventId, HashCost, LoginRequest,
    Role, SigningSecret,
};
use std::sync::Arc;

pub const PASSWORD: &str = "correct horse battery staple";

pub type TestService = AuthService<MockAccountStore, MockSessionStore, MockAttemptStore>;

pub struct Harness {
    pub service: TestService,
    pub accounts: MockAccountStore,
    pub sessions: MockSessionStore,
    pub attempts: MockAttemptStore,
    pub clock: MockClock,
}

pub fn config() -> AuthConfig {
    AuthConfig::new(SigningSecret::new("integration-test-secret-0123456789abcdef").unwrap())
        .with_hash_cost(HashCost::minimal())
        .with_store_timeout(std::time::Duration::from_millis(100))
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn harness_with(config: AuthConfig) -> Harness {
    let accounts = MockAccountStore::new();
    let sessions = MockSessionStore::new();
    let attempts = MockAttemptStore::new();
    let clock = MockClock::default();
    let service = AuthService::new(
        config,
        accounts.clone(),
        sessions.clone(),
        attempts.clone(),
        Arc::new(clock.clone()),
    )
    .unwrap();

    Harness {
        service,
        accounts,
        sessions,
        attempts,
        clock,
    }
}

impl Harness {
    pub async fn account(&self, email: &str, role: Role, event: Option<i64>) -> Account {
        self.service
            .create_account(CreateAccount {
                email: email.to_string(),
                password: PASSWORD.to_string(),
                display_name: "Test Account".to_string(),
                role,
                assigned_event_id: event.map(EventId),
            })
            .await
            .unwrap()
    }
}

pub fn login(email: &str, secret: &str) -> LoginRequest {
    LoginRequest {
        identifier: email.to_string(),
        secret: secret.to_string(),
        remember_me: false,
    }
}

pub fn remembered(email: &str, secret: &str) -> LoginRequest {
    LoginRequest {
        remember_me: true,
        ..login(email, secret)
    }
}

pub fn device() -> DeviceMeta {
    DeviceMeta::from_request("192.0.2.10".parse().ok(), Some("Mozilla/5.0 (X11; Linux)".into()))
}
