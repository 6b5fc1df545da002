//! Repository trait for rate-limit counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    rate_limit::{RateLimitDecision, RateLimitRule},
};

/// Repository for rate-limit counter state.
///
/// Counters are keyed by `(operation, identity key)` and created lazily on
/// first attempt. Implementations must apply [`crate::rate_limit::consume`]
/// as an atomic read-modify-write per key: when one slot remains, two
/// concurrent callers must never both observe `allowed = true`.
#[async_trait]
pub trait RateLimitRepository: Send + Sync + 'static {
    /// Look up or create the counter for `(operation, key)` and apply one
    /// attempt under `rule` at time `now`, atomically.
    async fn try_consume(
        &self,
        operation: &str,
        key: &str,
        rule: &RateLimitRule,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, Error>;

    /// Evict counters whose window started before `before`.
    ///
    /// Counters need not persist across restarts; this exists so long-lived
    /// processes do not accumulate entries for identities that stopped
    /// trying. Correctness does not depend on when (or whether) it runs.
    ///
    /// Returns the number of counters evicted.
    async fn cleanup_expired(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}
