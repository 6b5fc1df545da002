//! # Authguard
//!
//! Authguard protects credential-based login and account-management flows
//! from abuse while producing audit-grade security telemetry. It bundles
//! four tightly coupled responsibilities behind one facade:
//!
//! - Per-operation rate limiting keyed by identity/network attributes
//! - An account lockout state machine driven by repeated login failures,
//!   with escalating lockout durations and administrative override
//! - An append-only security event log with filtered queries, aggregate
//!   reports, and brute-force anomaly detection
//! - A closed error taxonomy that renders every failure into a safe,
//!   consistently shaped response while keeping full diagnostic detail in
//!   the operational log
//!
//! Credential checking, token issuance, and user persistence stay with your
//! application; Authguard only decides whether an operation is currently
//! permitted, consumes the outcomes you report, and shapes the envelopes you
//! hand back.
//!
//! ## Example
//!
//! ```rust,no_run
//! use authguard::{Authguard, MemoryRepositoryProvider, RequestContext, UserId};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let guard = Authguard::new(Arc::new(MemoryRepositoryProvider::new()));
//!
//!     let ctx = RequestContext::builder()
//!         .operation("login")
//!         .email("user@example.com")
//!         .ip_address("203.0.113.7")
//!         .build();
//!
//!     if let Err(e) = guard.enforce_rate_limit(&ctx).await {
//!         let response = guard.handle_error(e, &ctx).await;
//!         // hand `response` back to your transport layer
//!         let _ = response;
//!         return;
//!     }
//!
//!     // ... verify credentials with your user store ...
//!     let decision = guard
//!         .record_login_outcome(&UserId::new("usr_1"), false, &ctx)
//!         .await
//!         .unwrap();
//!     if decision.locked {
//!         // reject with guard.account_locked_error(&decision)
//!     }
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use authguard_core::{
    repositories::{
        LockoutRepositoryAdapter, RateLimitRepositoryAdapter, RepositoryProvider,
        SecurityEventRepositoryAdapter,
    },
    response::classify,
    services::{AuditService, LockoutService, RateLimiterService},
};

/// Re-export core types from authguard_core
///
/// These types are commonly used when working with the Authguard API.
pub use authguard_core::{
    AuthError, Error, ErrorKind, EventFilter, IdentityDimension, LockoutDecision, LockoutPolicy,
    RateLimitDecision, RateLimitRule, RequestContext, Response, SecurityEvent, SecurityEventType,
    SecurityReport, UserId,
};

pub use authguard_core::services::{FailurePolicy, RateLimiterConfig, ReportConfig};
pub use authguard_core::validation::validate_email;

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding
/// feature is enabled.
#[cfg(feature = "memory")]
pub use authguard_storage_memory::MemoryRepositoryProvider;

/// Configuration for an [`Authguard`] instance.
#[derive(Debug, Clone)]
pub struct AuthguardConfig {
    pub rate_limiter: RateLimiterConfig,
    pub lockout_policy: LockoutPolicy,
    pub report: ReportConfig,
    /// Upper bound on every backing-store call.
    pub store_timeout: std::time::Duration,
}

impl Default for AuthguardConfig {
    fn default() -> Self {
        Self {
            rate_limiter: RateLimiterConfig::default(),
            lockout_policy: LockoutPolicy::default(),
            report: ReportConfig::default(),
            store_timeout: std::time::Duration::from_secs(2),
        }
    }
}

impl AuthguardConfig {
    pub fn with_rules(mut self, rules: Vec<RateLimitRule>) -> Self {
        self.rate_limiter.rules = rules;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.rate_limiter.failure_policy = failure_policy;
        self
    }

    pub fn with_lockout_policy(mut self, lockout_policy: LockoutPolicy) -> Self {
        self.lockout_policy = lockout_policy;
        self
    }

    pub fn with_report_config(mut self, report: ReportConfig) -> Self {
        self.report = report;
        self
    }

    pub fn with_store_timeout(mut self, store_timeout: std::time::Duration) -> Self {
        self.store_timeout = store_timeout;
        self.rate_limiter.store_timeout = store_timeout;
        self
    }
}

/// The authentication-resilience coordinator.
///
/// Wires the rate limiter, lockout state machine, and audit log over one
/// repository provider and exposes the collaborator-facing operations.
pub struct Authguard<R: RepositoryProvider> {
    repositories: Arc<R>,
    rate_limiter: RateLimiterService<RateLimitRepositoryAdapter<R>>,
    lockout_service:
        LockoutService<LockoutRepositoryAdapter<R>, SecurityEventRepositoryAdapter<R>>,
    audit_service: AuditService<SecurityEventRepositoryAdapter<R>>,
}

impl<R: RepositoryProvider> Authguard<R> {
    /// Create an Authguard instance with the default configuration.
    pub fn new(repositories: Arc<R>) -> Self {
        Self::with_config(repositories, AuthguardConfig::default())
    }

    /// Create an Authguard instance with explicit configuration.
    pub fn with_config(repositories: Arc<R>, config: AuthguardConfig) -> Self {
        let rate_limit_repo = Arc::new(RateLimitRepositoryAdapter::new(repositories.clone()));
        let lockout_repo = Arc::new(LockoutRepositoryAdapter::new(repositories.clone()));
        let event_repo = Arc::new(SecurityEventRepositoryAdapter::new(repositories.clone()));

        let audit_service = AuditService::new(event_repo)
            .with_report_config(config.report.clone())
            .with_store_timeout(config.store_timeout);

        Self {
            repositories,
            rate_limiter: RateLimiterService::new(rate_limit_repo, config.rate_limiter),
            lockout_service: LockoutService::new(
                lockout_repo,
                audit_service.clone(),
                config.lockout_policy,
            )
            .with_store_timeout(config.store_timeout),
            audit_service,
        }
    }

    /// Health check for the backing stores.
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Check whether the request's operation is currently allowed for its
    /// identity, consuming one attempt if so.
    pub async fn check_rate_limit(&self, ctx: &RequestContext) -> RateLimitDecision {
        self.rate_limiter.check(ctx, Utc::now()).await
    }

    /// [`Self::check_rate_limit`], but a rejection is recorded to the event
    /// log and returned as a ready-to-render rate-limit error.
    pub async fn enforce_rate_limit(&self, ctx: &RequestContext) -> Result<RateLimitDecision, Error> {
        let now = Utc::now();
        let decision = self.rate_limiter.check(ctx, now).await;
        if decision.allowed {
            return Ok(decision);
        }

        let retry_after = decision.retry_after_seconds(now);
        let mut metadata = Map::new();
        metadata.insert("rate_limited".to_string(), json!(true));
        metadata.insert("retry_after_seconds".to_string(), json!(retry_after));
        self.audit_service
            .record_from_context(
                event_type_for_operation(&ctx.operation),
                false,
                ctx,
                metadata,
            )
            .await;

        Err(Error::Auth(AuthError::rate_limited(
            retry_after,
            &ctx.operation,
        )))
    }

    /// Report the outcome of a login attempt.
    ///
    /// Updates the lockout state machine, writes the `LOGIN_ATTEMPT` event
    /// (and `ACCOUNT_LOCKED` when the threshold is crossed), and returns
    /// whether the account is now locked and until when.
    pub async fn record_login_outcome(
        &self,
        user_id: &UserId,
        success: bool,
        ctx: &RequestContext,
    ) -> Result<LockoutDecision, Error> {
        self.lockout_service
            .record_outcome(user_id, success, ctx, Utc::now())
            .await
    }

    /// Current lockout state for an account, with expiry evaluated lazily.
    ///
    /// Callers reject a login attempt against a locked account here, before
    /// any credential check.
    pub async fn lockout_status(&self, user_id: &UserId) -> Result<LockoutDecision, Error> {
        self.lockout_service.status(user_id, Utc::now()).await
    }

    /// Administrative unlock. The `ACCOUNT_UNLOCK` event records the actor,
    /// the prior state, and any extra metadata supplied.
    pub async fn unlock_account(
        &self,
        user_id: &UserId,
        actor: &UserId,
        metadata: Map<String, Value>,
    ) -> Result<LockoutDecision, Error> {
        self.lockout_service
            .unlock(user_id, actor, metadata, Utc::now())
            .await
    }

    /// Record a security event for an authentication-relevant action owned
    /// by a collaborator (registration, password change, ...).
    pub async fn record_event(
        &self,
        event_type: SecurityEventType,
        success: bool,
        ctx: &RequestContext,
        metadata: Map<String, Value>,
    ) {
        self.audit_service
            .record_from_context(event_type, success, ctx, metadata)
            .await;
    }

    /// Events matching the filter, newest first, paginated.
    pub async fn query_events(&self, filter: &EventFilter) -> Result<Vec<SecurityEvent>, Error> {
        self.audit_service.query(filter).await
    }

    /// Exact count of events matching the filter.
    pub async fn count_events(&self, filter: &EventFilter) -> Result<u64, Error> {
        self.audit_service.count(filter).await
    }

    /// Aggregate report over `[start, end]`: totals, per-type and per-hour
    /// counts, top source addresses, and detected anomalies.
    pub async fn generate_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SecurityReport, Error> {
        self.audit_service.generate_report(start, end).await
    }

    /// Render a lockout decision as the error a rejected caller receives.
    pub fn account_locked_error(&self, decision: &LockoutDecision) -> AuthError {
        let minutes = decision
            .retry_after_seconds(Utc::now())
            .map(|secs| secs.div_ceil(60))
            .unwrap_or(0)
            .max(1);
        AuthError::account_locked(minutes)
    }

    /// Classify any failure into the closed taxonomy and build the final
    /// response.
    ///
    /// A security event is always written from the context before the
    /// response is returned. Unclassified failures surface as
    /// `INTERNAL_ERROR`; their detail reaches the operational log only.
    pub async fn handle_error(&self, err: impl Into<Error>, ctx: &RequestContext) -> Response {
        let auth_error = classify(err.into());

        tracing::error!(
            kind = %auth_error.kind,
            operation = %ctx.operation,
            log_message = %auth_error.log_message,
            "Authentication operation rejected"
        );

        let mut metadata = Map::new();
        metadata.insert("error_type".to_string(), json!(auth_error.kind));
        metadata.insert("status_code".to_string(), json!(auth_error.status_code));
        self.audit_service
            .record_from_context(
                event_type_for_operation(&ctx.operation),
                false,
                ctx,
                metadata,
            )
            .await;

        Response::failure(&auth_error)
    }

    /// Build the success envelope for a completed operation.
    pub fn success_response(&self, data: Value, message: impl Into<String>) -> Response {
        Response::success(data, message)
    }

    /// Start the periodic cleanup of idle rate-limit counters.
    pub fn start_cleanup_task(
        &self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        self.rate_limiter.start_cleanup_task(shutdown)
    }
}

/// Event type used when logging a rejection for an operation owned by a
/// collaborator.
fn event_type_for_operation(operation: &str) -> SecurityEventType {
    match operation {
        "login" => SecurityEventType::LoginAttempt,
        "registration" => SecurityEventType::Registration,
        "password_change" | "password_reset" => SecurityEventType::PasswordChange,
        _ => SecurityEventType::SuspiciousActivity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_for_operation() {
        assert_eq!(
            event_type_for_operation("login"),
            SecurityEventType::LoginAttempt
        );
        assert_eq!(
            event_type_for_operation("password_reset"),
            SecurityEventType::PasswordChange
        );
        assert_eq!(
            event_type_for_operation("csv_export"),
            SecurityEventType::SuspiciousActivity
        );
    }
}
