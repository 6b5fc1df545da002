//! End-to-end scenarios against the in-memory backend: a brute-force run
//! that exhausts the rate limit, a lockout with administrative recovery, and
//! the response shapes collaborators hand back to callers.

use std::sync::Arc;

use authguard::{
    Authguard, AuthguardConfig, Error, EventFilter, IdentityDimension, MemoryRepositoryProvider,
    RateLimitRule, RequestContext, SecurityEventType, UserId,
};
use chrono::{Duration, Utc};
use serde_json::{Map, json};

fn guard() -> Authguard<MemoryRepositoryProvider> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Authguard::new(Arc::new(MemoryRepositoryProvider::new()))
}

fn login_ctx(email: &str, ip: &str) -> RequestContext {
    RequestContext::builder()
        .operation("login")
        .email(email)
        .ip_address(ip)
        .user_agent("integration-test/1.0")
        .build()
}

#[tokio::test]
async fn login_rate_limit_exhausts_then_resets_identity_scoped() {
    let guard = guard();
    let ctx = login_ctx("attacker@example.com", "203.0.113.7");

    // Default login rule: 5 attempts per 15 minutes per email
    for _ in 0..5 {
        assert!(guard.check_rate_limit(&ctx).await.allowed);
    }
    let rejected = guard.check_rate_limit(&ctx).await;
    assert!(!rejected.allowed);
    assert_eq!(rejected.remaining, 0);

    // A different email is an independent counter
    let other = login_ctx("bystander@example.com", "203.0.113.7");
    assert!(guard.check_rate_limit(&other).await.allowed);
}

#[tokio::test]
async fn enforce_rate_limit_records_event_and_shapes_response() {
    let guard = guard();
    let ctx = login_ctx("attacker@example.com", "203.0.113.7");

    for _ in 0..5 {
        guard.enforce_rate_limit(&ctx).await.unwrap();
    }
    let err = guard.enforce_rate_limit(&ctx).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));

    let response = guard.handle_error(err, &ctx).await;
    assert_eq!(response.status, 429);
    assert!(response.retry_after.is_some());
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["error"]["type"], "RATE_LIMIT_EXCEEDED");
    let message = response.body["error"]["message"].as_str().unwrap();
    assert!(message.contains("try again"));

    // The rejection itself reached the event log
    let failures = guard
        .query_events(&EventFilter {
            event_type: Some(SecurityEventType::LoginAttempt),
            success: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!failures.is_empty());
    assert_eq!(
        failures[0].email.as_deref(),
        Some("attacker@example.com")
    );
}

#[tokio::test]
async fn custom_rule_keys_on_ip() {
    let config = AuthguardConfig::default().with_rules(vec![
        RateLimitRule::new(
            "registration",
            2,
            Duration::hours(1),
            IdentityDimension::Ip,
        )
        .unwrap(),
    ]);
    let guard = Authguard::with_config(Arc::new(MemoryRepositoryProvider::new()), config);

    let from_ip = |email: &str| {
        RequestContext::builder()
            .operation("registration")
            .email(email)
            .ip_address("198.51.100.4")
            .build()
    };

    assert!(guard.check_rate_limit(&from_ip("a@example.com")).await.allowed);
    assert!(guard.check_rate_limit(&from_ip("b@example.com")).await.allowed);
    // Third registration from the same address is rejected regardless of email
    assert!(!guard.check_rate_limit(&from_ip("c@example.com")).await.allowed);

    // Unconfigured operations pass through
    let unconfigured = RequestContext::builder()
        .operation("profile_update")
        .email("a@example.com")
        .build();
    assert!(guard.check_rate_limit(&unconfigured).await.allowed);
}

#[tokio::test]
async fn five_failures_lock_the_account_and_admin_unlocks_it() {
    let guard = guard();
    let user = UserId::new("usr_victim");
    let admin = UserId::new("usr_admin");
    let ctx = login_ctx("victim@example.com", "203.0.113.9");

    for _ in 0..4 {
        let decision = guard
            .record_login_outcome(&user, false, &ctx)
            .await
            .unwrap();
        assert!(!decision.locked);
    }
    let decision = guard
        .record_login_outcome(&user, false, &ctx)
        .await
        .unwrap();
    assert!(decision.locked);
    assert!(decision.just_locked);
    assert_eq!(decision.lockout_count, 1);

    let status = guard.lockout_status(&user).await.unwrap();
    assert!(status.locked);
    assert!(status.locked_until.is_some());

    // The rejection a caller would receive
    let locked_error = guard.account_locked_error(&status);
    let response = guard.handle_error(Error::Auth(locked_error), &ctx).await;
    assert_eq!(response.status, 423);
    assert_eq!(response.body["error"]["type"], "ACCOUNT_LOCKED");

    let mut extra = Map::new();
    extra.insert("ticket".to_string(), json!("OPS-4431"));
    let after_unlock = guard.unlock_account(&user, &admin, extra).await.unwrap();
    assert!(!after_unlock.locked);
    assert_eq!(after_unlock.failed_attempts, 0);
    // Escalation history survives the override
    assert_eq!(after_unlock.lockout_count, 1);

    assert!(!guard.lockout_status(&user).await.unwrap().locked);

    // LOGIN_ATTEMPT x5, ACCOUNT_LOCKED, ACCOUNT_UNLOCK
    let unlock_events = guard
        .query_events(&EventFilter {
            event_type: Some(SecurityEventType::AccountUnlock),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(unlock_events.len(), 1);
    assert_eq!(unlock_events[0].metadata["actor"], "usr_admin");
    assert_eq!(unlock_events[0].metadata["ticket"], "OPS-4431");
    assert_eq!(
        guard
            .count_events(&EventFilter {
                event_type: Some(SecurityEventType::AccountLocked),
                ..Default::default()
            })
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn report_over_brute_force_run_flags_the_source_ip() {
    let guard = guard();
    let ctx = login_ctx("victim@example.com", "192.0.2.66");
    let start = Utc::now() - Duration::minutes(5);

    // Twelve distinct users attacked from one address
    for i in 0..12 {
        let user = UserId::new(&format!("usr_{i}"));
        guard
            .record_login_outcome(&user, false, &ctx)
            .await
            .unwrap();
    }

    let report = guard
        .generate_report(start, Utc::now() + Duration::minutes(5))
        .await
        .unwrap();

    assert_eq!(report.total_events, 12);
    assert_eq!(report.failed_events, 12);
    assert_eq!(
        report.events_by_type[&SecurityEventType::LoginAttempt],
        12
    );
    assert_eq!(report.top_ip_addresses[0].ip_address, "192.0.2.66");

    assert_eq!(report.suspicious_activity.len(), 1);
    let anomaly = &report.suspicious_activity[0];
    assert_eq!(anomaly.kind, "brute_force_attempt");
    assert_eq!(anomaly.count, 12);
    assert!(anomaly.description.contains("192.0.2.66"));
}

#[tokio::test]
async fn collaborator_events_are_queryable_by_identity() {
    let guard = guard();
    let ctx = RequestContext::builder()
        .operation("password_change")
        .email("user@example.com")
        .user_id(UserId::new("usr_1"))
        .ip_address("203.0.113.20")
        .build();

    let mut metadata = Map::new();
    metadata.insert("method".to_string(), json!("self_service"));
    guard
        .record_event(SecurityEventType::PasswordChange, true, &ctx, metadata)
        .await;

    let by_user = guard
        .query_events(&EventFilter {
            user_id: Some(UserId::new("usr_1")),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_user.len(), 1);
    assert_eq!(by_user[0].event_type, SecurityEventType::PasswordChange);
    assert_eq!(by_user[0].metadata["method"], "self_service");
}

#[tokio::test]
async fn malformed_email_renders_as_email_format() {
    let guard = guard();
    let ctx = RequestContext::builder()
        .operation("registration")
        .email("not-an-email")
        .ip_address("203.0.113.25")
        .build();

    let err = authguard::validate_email("not-an-email").unwrap_err();
    let response = guard.handle_error(err, &ctx).await;

    assert_eq!(response.status, 400);
    assert_eq!(response.body["error"]["type"], "EMAIL_FORMAT");
    // The rejected value itself never reaches the body
    assert!(!response.body.to_string().contains("not-an-email"));
}

#[tokio::test]
async fn unclassified_failures_surface_as_internal_error() {
    let guard = guard();
    let ctx = login_ctx("user@example.com", "203.0.113.30");

    let response = guard
        .handle_error(
            Error::Unexpected("connection pool exhausted at pg://db:5432".to_string()),
            &ctx,
        )
        .await;

    assert_eq!(response.status, 500);
    assert_eq!(response.body["error"]["type"], "INTERNAL_ERROR");
    // Diagnostic detail stays out of the caller-facing body
    let rendered = response.body.to_string();
    assert!(!rendered.contains("pg://db:5432"));
    assert!(!rendered.contains("connection pool"));
}

#[tokio::test]
async fn success_envelope_shape() {
    let guard = guard();
    let response =
        guard.success_response(json!({"user_id": "usr_1"}), "Signed in successfully");

    assert_eq!(response.status, 200);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["data"]["user_id"], "usr_1");
    assert!(response.body["timestamp"].is_string());
    assert!(
        response.body["request_id"]
            .as_str()
            .unwrap()
            .starts_with("req_")
    );
}

#[tokio::test]
async fn cleanup_task_stops_on_shutdown() {
    let guard = guard();
    let (tx, rx) = tokio::sync::watch::channel(false);

    let handle = guard.start_cleanup_task(rx);
    tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn health_check_passes_for_memory_backend() {
    let guard = guard();
    guard.health_check().await.unwrap();
}
