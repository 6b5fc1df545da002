use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use authguard_core::{
    Error, UserId,
    lockout::{LockoutDecision, LockoutPolicy, LockoutRecord, apply_failure, apply_success,
        apply_unlock},
    repositories::{LockoutRepository, UnlockOutcome},
};

/// Lockout records keyed by user.
///
/// Transitions run under the DashMap entry lock for the user, so concurrent
/// failure reports serialize and the threshold is crossed exactly once.
/// Records are never removed; `lockout_count` is permanent history.
#[derive(Default)]
pub struct MemoryLockoutRepository {
    records: DashMap<UserId, LockoutRecord>,
}

impl MemoryLockoutRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockoutRepository for MemoryLockoutRepository {
    async fn get(&self, user_id: &UserId) -> Result<Option<LockoutRecord>, Error> {
        Ok(self.records.get(user_id).map(|r| r.clone()))
    }

    async fn record_failure(
        &self,
        user_id: &UserId,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutDecision, Error> {
        let mut entry = self
            .records
            .entry(user_id.clone())
            .or_insert_with(|| LockoutRecord::new(user_id.clone()));
        Ok(apply_failure(entry.value_mut(), policy, now))
    }

    async fn record_success(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<LockoutDecision, Error> {
        let mut entry = self
            .records
            .entry(user_id.clone())
            .or_insert_with(|| LockoutRecord::new(user_id.clone()));
        Ok(apply_success(entry.value_mut(), now))
    }

    async fn unlock(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<UnlockOutcome, Error> {
        let mut entry = self
            .records
            .entry(user_id.clone())
            .or_insert_with(|| LockoutRecord::new(user_id.clone()));
        let record = entry.value_mut();

        let was_locked = record.is_locked(now);
        let previous_failed_attempts = record.failed_attempts;
        let previous_locked_until = record.locked_until.filter(|until| *until > now);
        let decision = apply_unlock(record, now);

        Ok(UnlockOutcome {
            was_locked,
            previous_failed_attempts,
            previous_locked_until,
            decision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_failure_then_success_round_trip() {
        let repo = MemoryLockoutRepository::new();
        let user = UserId::new("usr_a");
        let policy = LockoutPolicy::default();
        let now = Utc::now();

        let d1 = repo.record_failure(&user, &policy, now).await.unwrap();
        assert_eq!(d1.failed_attempts, 1);

        let d2 = repo.record_success(&user, now).await.unwrap();
        assert_eq!(d2.failed_attempts, 0);
        assert!(!d2.locked);

        let record = repo.get(&user).await.unwrap().unwrap();
        assert_eq!(record.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_get_unknown_user_is_none() {
        let repo = MemoryLockoutRepository::new();
        assert!(repo.get(&UserId::new("usr_nobody")).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_failures_lock_exactly_once() {
        let repo = Arc::new(MemoryLockoutRepository::new());
        let user = UserId::new("usr_target");
        let policy = Arc::new(LockoutPolicy::default());
        let now = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let repo = Arc::clone(&repo);
            let user = user.clone();
            let policy = Arc::clone(&policy);
            handles.push(tokio::spawn(async move {
                repo.record_failure(&user, &policy, now)
                    .await
                    .unwrap()
                    .just_locked
            }));
        }

        let mut lock_transitions = 0;
        for handle in handles {
            if handle.await.unwrap() {
                lock_transitions += 1;
            }
        }
        assert_eq!(lock_transitions, 1);

        let record = repo.get(&user).await.unwrap().unwrap();
        assert_eq!(record.lockout_count, 1);
        assert!(record.is_locked(now));
    }

    #[tokio::test]
    async fn test_unlock_reports_prior_state() {
        let repo = MemoryLockoutRepository::new();
        let user = UserId::new("usr_a");
        let policy = LockoutPolicy::default();
        let now = Utc::now();

        for _ in 0..5 {
            repo.record_failure(&user, &policy, now).await.unwrap();
        }

        let outcome = repo.unlock(&user, now).await.unwrap();
        assert!(outcome.was_locked);
        assert!(outcome.previous_locked_until.is_some());
        assert!(!outcome.decision.locked);
        assert_eq!(outcome.decision.lockout_count, 1);
    }
}
