//! Login throttle integration tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Duration;
use paddock_auth::mocks::{MockAttemptStore, MockClock};
use paddock_auth::throttle::account_key;
use paddock_auth::{Clock, LoginThrottle, ThrottlePolicy};
use std::sync::Arc;

fn throttle(clock: &MockClock, policy: ThrottlePolicy) -> LoginThrottle<MockAttemptStore> {
    LoginThrottle::new(
        MockAttemptStore::new(),
        Arc::new(clock.clone()),
        std::time::Duration::from_secs(1),
        policy,
        None,
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_are_not_lost() {
    const ATTEMPTS: u32 = 64;

    let clock = MockClock::default();
    let throttle = throttle(
        &clock,
        ThrottlePolicy::new(1000, Duration::minutes(15), Duration::minutes(15)),
    );
    let key = account_key("user@x.com");

    let handles: Vec<_> = (0..ATTEMPTS)
        .map(|_| {
            let throttle = throttle.clone();
            let key = key.clone();
            tokio::spawn(async move { throttle.record_failure(&key).await })
        })
        .collect();

    let mut counts = Vec::new();
    for handle in handles {
        counts.push(handle.await.unwrap().unwrap());
    }

    let record = throttle.status(&key).await.unwrap().unwrap();
    assert_eq!(record.failure_count, ATTEMPTS);

    // Every increment observed a distinct count.
    counts.sort_unstable();
    assert_eq!(counts, (1..=ATTEMPTS).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_reach_lock() {
    let clock = MockClock::default();
    let throttle = throttle(&clock, ThrottlePolicy::default());
    let key = account_key("user@x.com");

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let throttle = throttle.clone();
            let key = key.clone();
            tokio::spawn(async move { throttle.record_failure(&key).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(throttle.is_locked(&key).await, Ok(true));
    let until = throttle.lock_status(&key).await.unwrap().unwrap();
    assert_eq!(until, clock.now() + Duration::minutes(15));
}

#[tokio::test]
async fn test_lock_is_not_extended_by_more_failures() {
    let clock = MockClock::default();
    let throttle = throttle(&clock, ThrottlePolicy::default());
    let key = account_key("user@x.com");

    for _ in 0..5 {
        throttle.record_failure(&key).await.unwrap();
    }
    let until = throttle.lock_status(&key).await.unwrap().unwrap();

    clock.advance(Duration::minutes(10));
    assert_eq!(throttle.record_failure(&key).await, Ok(6));
    assert_eq!(throttle.lock_status(&key).await, Ok(Some(until)));

    clock.advance(Duration::minutes(5));
    assert_eq!(throttle.is_locked(&key).await, Ok(false));
}

#[tokio::test]
async fn test_failures_outside_window_restart_count() {
    let clock = MockClock::default();
    let throttle = throttle(&clock, ThrottlePolicy::default());
    let key = account_key("user@x.com");

    for _ in 0..4 {
        throttle.record_failure(&key).await.unwrap();
    }
    clock.advance(Duration::minutes(16));
    assert_eq!(throttle.record_failure(&key).await, Ok(1));
    assert_eq!(throttle.is_locked(&key).await, Ok(false));
}

#[tokio::test]
async fn test_success_resets_counter_and_lock() {
    let clock = MockClock::default();
    let throttle = throttle(&clock, ThrottlePolicy::default());
    let key = account_key("user@x.com");

    for _ in 0..5 {
        throttle.record_failure(&key).await.unwrap();
    }
    assert_eq!(throttle.is_locked(&key).await, Ok(true));

    throttle.record_success(&key).await.unwrap();
    assert_eq!(throttle.is_locked(&key).await, Ok(false));
    assert_eq!(throttle.status(&key).await, Ok(None));
    assert_eq!(throttle.record_failure(&key).await, Ok(1));
}

#[tokio::test]
async fn test_keys_are_case_insensitive() {
    let clock = MockClock::default();
    let throttle = throttle(&clock, ThrottlePolicy::default());

    for email in ["User@X.com", "user@x.com", " USER@x.COM "] {
        throttle.record_failure(&account_key(email)).await.unwrap();
    }
    let record = throttle.status(&account_key("user@x.com")).await.unwrap().unwrap();
    assert_eq!(record.failure_count, 3);
}
