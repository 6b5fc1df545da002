//! Rate limiting service for authentication-related operations.
//!
//! Coordinates the per-operation rule table with the counter store. The
//! store call is bounded by a timeout; when the store is unreachable the
//! service fails open or closed per the configured [`FailurePolicy`].
//! Fail-open is the default: availability wins, and account lockout remains
//! as the secondary defense against credential stuffing.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};

use crate::{
    context::RequestContext,
    rate_limit::{RateLimitDecision, RateLimitRule},
    repositories::RateLimitRepository,
};

/// What a rate limit check does when the counter store is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Allow the attempt and log a warning.
    #[default]
    Open,
    /// Reject the attempt.
    Closed,
}

/// Configuration for the rate limiter service.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub rules: Vec<RateLimitRule>,
    pub failure_policy: FailurePolicy,
    /// Bound on each counter-store call.
    pub store_timeout: std::time::Duration,
    /// Counters idle longer than this are eligible for cleanup.
    pub counter_retention: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            rules: RateLimitRule::defaults(),
            failure_policy: FailurePolicy::Open,
            store_timeout: std::time::Duration::from_secs(2),
            counter_retention: Duration::hours(24),
        }
    }
}

/// Service answering "is this operation currently allowed for this caller,
/// and if not, retry after how long?".
pub struct RateLimiterService<R: RateLimitRepository> {
    repository: Arc<R>,
    rules: HashMap<String, RateLimitRule>,
    failure_policy: FailurePolicy,
    store_timeout: std::time::Duration,
    counter_retention: Duration,
}

impl<R: RateLimitRepository> RateLimiterService<R> {
    pub fn new(repository: Arc<R>, config: RateLimiterConfig) -> Self {
        let rules = config
            .rules
            .into_iter()
            .map(|rule| (rule.operation.clone(), rule))
            .collect();
        Self {
            repository,
            rules,
            failure_policy: config.failure_policy,
            store_timeout: config.store_timeout,
            counter_retention: config.counter_retention,
        }
    }

    pub fn rule(&self, operation: &str) -> Option<&RateLimitRule> {
        self.rules.get(operation)
    }

    /// Check and consume one attempt for the request's operation.
    ///
    /// Operations without a configured rule, and requests lacking the
    /// attribute the rule tracks, are allowed. A store failure or timeout is
    /// resolved per the configured failure policy.
    pub async fn check(&self, ctx: &RequestContext, now: DateTime<Utc>) -> RateLimitDecision {
        let Some(rule) = self.rules.get(&ctx.operation) else {
            tracing::debug!(operation = %ctx.operation, "No rate limit rule; allowing");
            return RateLimitDecision::unlimited(now);
        };

        let Some(key) = rule.identity_key(ctx) else {
            tracing::debug!(
                operation = %ctx.operation,
                "Request lacks identity attribute for rule; allowing"
            );
            return RateLimitDecision::unlimited(now);
        };

        let attempt = tokio::time::timeout(
            self.store_timeout,
            self.repository.try_consume(&ctx.operation, &key, rule, now),
        )
        .await;

        match attempt {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => self.resolve_store_failure(rule, now, &e.to_string()),
            Err(_) => self.resolve_store_failure(rule, now, "counter store call timed out"),
        }
    }

    fn resolve_store_failure(
        &self,
        rule: &RateLimitRule,
        now: DateTime<Utc>,
        detail: &str,
    ) -> RateLimitDecision {
        match self.failure_policy {
            FailurePolicy::Open => {
                tracing::warn!(
                    operation = %rule.operation,
                    detail,
                    "Counter store unavailable; failing open"
                );
                RateLimitDecision::unlimited(now)
            }
            FailurePolicy::Closed => {
                tracing::warn!(
                    operation = %rule.operation,
                    detail,
                    "Counter store unavailable; failing closed"
                );
                RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_at: now + rule.window,
                }
            }
        }
    }

    /// Start the periodic cleanup of idle counters.
    ///
    /// Delayed or skipped runs do not affect correctness; expired windows
    /// are also reset lazily on access.
    pub fn start_cleanup_task(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let repository = Arc::clone(&self.repository);
        let retention = self.counter_retention;

        // Cleanup runs hourly
        const CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(CLEANUP_INTERVAL);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let before = Utc::now() - retention;
                        match repository.cleanup_expired(before).await {
                            Ok(count) if count > 0 => {
                                tracing::info!(count, "Evicted idle rate limit counters");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Rate limit counter cleanup did not complete");
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down rate limit cleanup task");
                        break;
                    }
                }
            }
        })
    }
}
