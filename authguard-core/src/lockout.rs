//! Account lockout state machine
//!
//! Two states, `ACTIVE` and `LOCKED`, cyclic by design. Repeated failed
//! logins move an account toward `LOCKED`; success, lockout expiry, or an
//! administrative unlock move it back to `ACTIVE`. The lifetime
//! `lockout_count` never resets, so repeat offenders serve escalating
//! lockout durations.
//!
//! Transitions are pure functions over a [`LockoutRecord`]; storage backends
//! apply them under a per-user lock so the threshold is crossed exactly once
//! even under concurrent failure reports. Expiry is lazy: it is resolved on
//! the next access rather than by a timer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Lockout configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failed attempts that trigger a lockout. Default 5.
    pub max_failed_attempts: u32,
    /// Duration of the first lockout. Default 30 minutes.
    pub base_lockout: Duration,
    /// Ceiling for escalated lockouts. Default 24 hours.
    pub max_lockout: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            base_lockout: Duration::minutes(30),
            max_lockout: Duration::hours(24),
        }
    }
}

impl LockoutPolicy {
    /// Lockout duration for the `n`-th lockout (1-based): the base duration
    /// doubled per prior lockout, capped at `max_lockout`. Monotonically
    /// non-decreasing in `n`.
    pub fn lockout_duration(&self, n: u32) -> Duration {
        let doublings = n.saturating_sub(1).min(30);
        let escalated = self
            .base_lockout
            .checked_mul(1i32 << doublings)
            .unwrap_or(self.max_lockout);
        escalated.min(self.max_lockout)
    }
}

/// Per-account lockout state. Created on first failed login, retained
/// indefinitely for audit and escalation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutRecord {
    pub user_id: UserId,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    /// Lifetime number of times this account has entered `LOCKED`.
    pub lockout_count: u32,
}

impl LockoutRecord {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            failed_attempts: 0,
            locked_until: None,
            lockout_count: 0,
        }
    }

    /// `locked_until` set and not yet elapsed.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// Lazily transition `LOCKED -> ACTIVE` when the lockout has elapsed.
    /// Called at the start of every access; attempts stay at zero.
    pub fn resolve_expiry(&mut self, now: DateTime<Utc>) {
        if self.locked_until.is_some_and(|until| until <= now) {
            self.locked_until = None;
        }
    }
}

/// Outcome of a lockout-state access, returned to callers so they can reject
/// or admit the surrounding operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutDecision {
    pub locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
    pub failed_attempts: u32,
    pub lockout_count: u32,
    /// True only on the failure that crossed the threshold.
    pub just_locked: bool,
}

impl LockoutDecision {
    pub fn from_record(record: &LockoutRecord, now: DateTime<Utc>) -> Self {
        Self {
            locked: record.is_locked(now),
            locked_until: record.locked_until.filter(|until| *until > now),
            failed_attempts: record.failed_attempts,
            lockout_count: record.lockout_count,
            just_locked: false,
        }
    }

    /// Seconds until the lockout expires, floored at zero.
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> Option<u64> {
        self.locked_until
            .map(|until| (until - now).num_seconds().max(0) as u64)
    }
}

/// Apply a failed login at time `now`.
///
/// - While `LOCKED`: no increment; the attempt was rejected before any
///   credential check.
/// - While `ACTIVE` below threshold: increment `failed_attempts`.
/// - Reaching the threshold: transition to `LOCKED` with the escalated
///   duration, bump `lockout_count`, reset `failed_attempts` to zero.
pub fn apply_failure(
    record: &mut LockoutRecord,
    policy: &LockoutPolicy,
    now: DateTime<Utc>,
) -> LockoutDecision {
    record.resolve_expiry(now);

    if record.is_locked(now) {
        return LockoutDecision::from_record(record, now);
    }

    record.failed_attempts += 1;

    if record.failed_attempts >= policy.max_failed_attempts {
        record.lockout_count += 1;
        record.locked_until = Some(now + policy.lockout_duration(record.lockout_count));
        record.failed_attempts = 0;

        let mut decision = LockoutDecision::from_record(record, now);
        decision.just_locked = true;
        return decision;
    }

    LockoutDecision::from_record(record, now)
}

/// Apply a successful login: reset `failed_attempts`. Only reachable when the
/// account is not locked, since a locked account is rejected before the
/// credential check.
pub fn apply_success(record: &mut LockoutRecord, now: DateTime<Utc>) -> LockoutDecision {
    record.resolve_expiry(now);
    record.failed_attempts = 0;
    LockoutDecision::from_record(record, now)
}

/// Apply an administrative unlock: clear `locked_until` and the attempt
/// counter. `lockout_count` is escalation history and is preserved.
pub fn apply_unlock(record: &mut LockoutRecord, now: DateTime<Utc>) -> LockoutDecision {
    record.locked_until = None;
    record.failed_attempts = 0;
    LockoutDecision::from_record(record, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> LockoutRecord {
        LockoutRecord::new(UserId::new("usr_test"))
    }

    #[test]
    fn test_threshold_triggers_lockout() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let mut rec = record();

        for attempt in 1..5 {
            let decision = apply_failure(&mut rec, &policy, now);
            assert!(!decision.locked);
            assert_eq!(decision.failed_attempts, attempt);
        }

        let decision = apply_failure(&mut rec, &policy, now);
        assert!(decision.locked);
        assert!(decision.just_locked);
        assert_eq!(decision.failed_attempts, 0);
        assert_eq!(decision.lockout_count, 1);
        assert_eq!(decision.locked_until, Some(now + Duration::minutes(30)));
    }

    #[test]
    fn test_failure_while_locked_does_not_increment() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let mut rec = record();

        for _ in 0..5 {
            apply_failure(&mut rec, &policy, now);
        }
        assert!(rec.is_locked(now));

        let decision = apply_failure(&mut rec, &policy, now + Duration::minutes(1));
        assert!(decision.locked);
        assert!(!decision.just_locked);
        assert_eq!(decision.failed_attempts, 0);
        assert_eq!(decision.lockout_count, 1);
    }

    #[test]
    fn test_lazy_expiry_returns_to_active() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let mut rec = record();

        for _ in 0..5 {
            apply_failure(&mut rec, &policy, now);
        }

        let after = now + Duration::minutes(31);
        rec.resolve_expiry(after);
        assert!(!rec.is_locked(after));
        assert_eq!(rec.failed_attempts, 0);
        // Escalation history survives expiry
        assert_eq!(rec.lockout_count, 1);
    }

    #[test]
    fn test_success_resets_attempts() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let mut rec = record();

        apply_failure(&mut rec, &policy, now);
        apply_failure(&mut rec, &policy, now);
        assert_eq!(rec.failed_attempts, 2);

        let decision = apply_success(&mut rec, now);
        assert!(!decision.locked);
        assert_eq!(decision.failed_attempts, 0);
    }

    #[test]
    fn test_unlock_preserves_lockout_count() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let mut rec = record();

        for _ in 0..5 {
            apply_failure(&mut rec, &policy, now);
        }
        assert_eq!(rec.lockout_count, 1);

        let decision = apply_unlock(&mut rec, now);
        assert!(!decision.locked);
        assert_eq!(decision.failed_attempts, 0);
        assert_eq!(decision.lockout_count, 1);
        assert_eq!(rec.locked_until, None);
    }

    #[test]
    fn test_escalation_doubles_and_caps() {
        let policy = LockoutPolicy::default();

        assert_eq!(policy.lockout_duration(1), Duration::minutes(30));
        assert_eq!(policy.lockout_duration(2), Duration::hours(1));
        assert_eq!(policy.lockout_duration(3), Duration::hours(2));
        assert_eq!(policy.lockout_duration(6), Duration::hours(16));
        assert_eq!(policy.lockout_duration(7), Duration::hours(24));
        assert_eq!(policy.lockout_duration(100), Duration::hours(24));
    }

    #[test]
    fn test_escalation_is_monotonic() {
        let policy = LockoutPolicy::default();
        let mut previous = Duration::zero();
        for n in 1..64 {
            let d = policy.lockout_duration(n);
            assert!(d >= previous, "duration must not decrease at n={n}");
            assert!(d <= policy.max_lockout);
            previous = d;
        }
    }

    #[test]
    fn test_second_lockout_is_longer() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let mut rec = record();

        for _ in 0..5 {
            apply_failure(&mut rec, &policy, now);
        }
        let first_until = rec.locked_until.unwrap();

        let after_expiry = first_until + Duration::seconds(1);
        for _ in 0..4 {
            let decision = apply_failure(&mut rec, &policy, after_expiry);
            assert!(!decision.locked);
        }
        let decision = apply_failure(&mut rec, &policy, after_expiry);
        assert!(decision.just_locked);
        assert_eq!(decision.lockout_count, 2);
        assert_eq!(
            decision.locked_until,
            Some(after_expiry + Duration::hours(1))
        );
    }
}
