//! Account lockout service.
//!
//! Consumes login outcomes, drives the per-account state machine through the
//! repository's atomic transitions, and writes the security events each
//! transition carries: every outcome is a `LOGIN_ATTEMPT`, crossing the
//! threshold adds `ACCOUNT_LOCKED`, and an administrative override adds
//! `ACCOUNT_UNLOCK` with the actor and the prior state in metadata.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::{
    Error, UserId,
    context::RequestContext,
    error::StorageError,
    events::SecurityEventType,
    lockout::{LockoutDecision, LockoutPolicy, LockoutRecord},
    repositories::{LockoutRepository, SecurityEventRepository},
    services::AuditService,
};

/// Service for managing account lockout.
///
/// Thread-safe; the underlying repository serializes transitions per user.
pub struct LockoutService<L: LockoutRepository, E: SecurityEventRepository> {
    repository: Arc<L>,
    audit: AuditService<E>,
    policy: LockoutPolicy,
    store_timeout: std::time::Duration,
}

impl<L: LockoutRepository, E: SecurityEventRepository> LockoutService<L, E> {
    pub fn new(repository: Arc<L>, audit: AuditService<E>, policy: LockoutPolicy) -> Self {
        Self {
            repository,
            audit,
            policy,
            store_timeout: std::time::Duration::from_secs(2),
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: std::time::Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Current lockout state, with expiry evaluated lazily against `now`.
    /// Accounts without a record are ACTIVE.
    pub async fn status(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<LockoutDecision, Error> {
        let record = self
            .bounded(self.repository.get(user_id))
            .await?
            .unwrap_or_else(|| LockoutRecord::new(user_id.clone()));
        Ok(LockoutDecision::from_record(&record, now))
    }

    /// Report the outcome of a login attempt and return the updated state.
    ///
    /// Always writes a `LOGIN_ATTEMPT` event; a threshold crossing also
    /// writes `ACCOUNT_LOCKED`.
    pub async fn record_outcome(
        &self,
        user_id: &UserId,
        success: bool,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<LockoutDecision, Error> {
        let decision = if success {
            self.bounded(self.repository.record_success(user_id, now))
                .await?
        } else {
            self.bounded(self.repository.record_failure(user_id, &self.policy, now))
                .await?
        };

        let mut metadata = Map::new();
        metadata.insert(
            "failed_attempts".to_string(),
            json!(decision.failed_attempts),
        );
        let mut ctx = ctx.clone();
        ctx.user_id = Some(user_id.clone());
        self.audit
            .record_from_context(SecurityEventType::LoginAttempt, success, &ctx, metadata)
            .await;

        if decision.just_locked {
            tracing::warn!(
                user_id = %user_id,
                lockout_count = decision.lockout_count,
                locked_until = ?decision.locked_until,
                "Account locked after repeated login failures"
            );
            let mut metadata = Map::new();
            metadata.insert("lockout_count".to_string(), json!(decision.lockout_count));
            metadata.insert("locked_until".to_string(), json!(decision.locked_until));
            metadata.insert(
                "threshold".to_string(),
                json!(self.policy.max_failed_attempts),
            );
            self.audit
                .record_from_context(SecurityEventType::AccountLocked, false, &ctx, metadata)
                .await;
        }

        Ok(decision)
    }

    /// Administrative unlock. Escalation history (`lockout_count`) is
    /// preserved; the prior state goes into the `ACCOUNT_UNLOCK` event.
    pub async fn unlock(
        &self,
        user_id: &UserId,
        actor: &UserId,
        extra_metadata: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<LockoutDecision, Error> {
        let outcome = self.bounded(self.repository.unlock(user_id, now)).await?;

        tracing::info!(
            user_id = %user_id,
            actor = %actor,
            was_locked = outcome.was_locked,
            "Account unlocked by administrator"
        );

        let mut metadata = Map::new();
        metadata.insert("actor".to_string(), json!(actor.as_str()));
        metadata.insert("was_locked".to_string(), json!(outcome.was_locked));
        metadata.insert(
            "previous_failed_attempts".to_string(),
            json!(outcome.previous_failed_attempts),
        );
        metadata.insert(
            "previous_locked_until".to_string(),
            json!(outcome.previous_locked_until),
        );
        for (key, value) in extra_metadata {
            metadata.insert(key, value);
        }

        let ctx = RequestContext::builder()
            .operation("unlock_account")
            .user_id(user_id.clone())
            .build();
        self.audit
            .record_from_context(SecurityEventType::AccountUnlock, true, &ctx, metadata)
            .await;

        Ok(outcome.decision)
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Storage(StorageError::Timeout(self.store_timeout))),
        }
    }
}
