//! Repository trait for account lockout records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error, UserId,
    lockout::{LockoutDecision, LockoutPolicy, LockoutRecord},
};

/// Prior state captured by an administrative unlock, for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockOutcome {
    pub was_locked: bool,
    pub previous_failed_attempts: u32,
    pub previous_locked_until: Option<DateTime<Utc>>,
    pub decision: LockoutDecision,
}

/// Repository for per-account lockout state.
///
/// Records are created on the first failed login and never hard-deleted;
/// `lockout_count` is permanent escalation history. Implementations must
/// apply the transition functions in [`crate::lockout`] atomically per user:
/// two concurrent failure reports at the threshold must produce exactly one
/// `just_locked` decision.
#[async_trait]
pub trait LockoutRepository: Send + Sync + 'static {
    /// Fetch the record for a user, if one exists. Expiry is not resolved;
    /// callers evaluate it lazily against their own `now`.
    async fn get(&self, user_id: &UserId) -> Result<Option<LockoutRecord>, Error>;

    /// Apply [`crate::lockout::apply_failure`] atomically, creating the
    /// record if absent.
    async fn record_failure(
        &self,
        user_id: &UserId,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutDecision, Error>;

    /// Apply [`crate::lockout::apply_success`] atomically, creating the
    /// record if absent.
    async fn record_success(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<LockoutDecision, Error>;

    /// Apply [`crate::lockout::apply_unlock`] atomically and report the
    /// prior state for the audit event.
    async fn unlock(&self, user_id: &UserId, now: DateTime<Utc>)
    -> Result<UnlockOutcome, Error>;
}
