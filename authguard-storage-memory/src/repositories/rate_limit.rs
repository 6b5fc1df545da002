use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use authguard_core::{
    Error,
    rate_limit::{RateLimitCounter, RateLimitDecision, RateLimitRule, consume},
    repositories::RateLimitRepository,
};

/// Rate-limit counters keyed by `(operation, identity key)`.
///
/// `try_consume` runs under the DashMap entry lock for the key, so two
/// concurrent callers racing for the last slot serialize and exactly one
/// sees `allowed = true`.
#[derive(Default)]
pub struct MemoryRateLimitRepository {
    counters: DashMap<(String, String), RateLimitCounter>,
}

impl MemoryRateLimitRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl RateLimitRepository for MemoryRateLimitRepository {
    async fn try_consume(
        &self,
        operation: &str,
        key: &str,
        rule: &RateLimitRule,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, Error> {
        let mut entry = self
            .counters
            .entry((operation.to_string(), key.to_string()))
            .or_insert_with(|| RateLimitCounter::new(now));
        Ok(consume(entry.value_mut(), rule, now))
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let before_len = self.counters.len();
        self.counters.retain(|_, counter| counter.window_start >= before);
        Ok((before_len - self.counters.len()) as u64)
    }
}
