//! Fixed-window rate limiting primitives
//!
//! A [`RateLimitRule`] is static per-operation configuration; a
//! [`RateLimitCounter`] is the runtime state for one `(operation, identity
//! key)` pair. The window is fixed, not sliding: the counter resets whenever
//! `now - window_start >= window`. Rejected attempts never increment the
//! counter, so hammering a limited key does not extend the window.
//!
//! The transition itself is the pure [`consume`] function; storage backends
//! apply it under their per-key lock so that concurrent callers can never
//! both take the last slot.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{context::RequestContext, error::ValidationError};

/// Which request attribute a rule tracks attempts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityDimension {
    Email,
    Ip,
    EmailAndIp,
}

/// Static configuration for one rate-limited operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRule {
    pub operation: String,
    pub max_attempts: u32,
    pub window: Duration,
    pub dimension: IdentityDimension,
}

impl RateLimitRule {
    pub fn new(
        operation: impl Into<String>,
        max_attempts: u32,
        window: Duration,
        dimension: IdentityDimension,
    ) -> Result<Self, ValidationError> {
        if max_attempts < 1 {
            return Err(ValidationError::InvalidRule(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if window < Duration::seconds(1) {
            return Err(ValidationError::InvalidRule(
                "window must be at least one second".to_string(),
            ));
        }
        Ok(Self {
            operation: operation.into(),
            max_attempts,
            window,
            dimension,
        })
    }

    /// Derive the identity key this rule tracks for a given request, or
    /// `None` when the context lacks the attribute the rule needs.
    pub fn identity_key(&self, ctx: &RequestContext) -> Option<String> {
        match self.dimension {
            IdentityDimension::Email => ctx.normalized_email(),
            IdentityDimension::Ip => ctx.ip_address.clone(),
            IdentityDimension::EmailAndIp => {
                let email = ctx.normalized_email()?;
                let ip = ctx.ip_address.clone()?;
                Some(format!("{email}|{ip}"))
            }
        }
    }

    /// The default per-operation rule set: login 5/15min per email,
    /// registration 5/hour per IP, verification resend 5/hour per email,
    /// password reset 3/15min per email.
    pub fn defaults() -> Vec<RateLimitRule> {
        vec![
            RateLimitRule {
                operation: "login".to_string(),
                max_attempts: 5,
                window: Duration::minutes(15),
                dimension: IdentityDimension::Email,
            },
            RateLimitRule {
                operation: "registration".to_string(),
                max_attempts: 5,
                window: Duration::hours(1),
                dimension: IdentityDimension::Ip,
            },
            RateLimitRule {
                operation: "resend_verification".to_string(),
                max_attempts: 5,
                window: Duration::hours(1),
                dimension: IdentityDimension::Email,
            },
            RateLimitRule {
                operation: "password_reset".to_string(),
                max_attempts: 3,
                window: Duration::minutes(15),
                dimension: IdentityDimension::Email,
            },
        ]
    }
}

/// Runtime attempt state for one `(operation, identity key)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitCounter {
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

impl RateLimitCounter {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Seconds until the window resets, floored at zero. Only meaningful for
    /// rejected decisions.
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> u64 {
        (self.reset_at - now).num_seconds().max(0) as u64
    }

    /// Decision used when limiting is skipped (no rule, no identity key, or
    /// the configured policy says to fail open).
    pub fn unlimited(now: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            remaining: u32::MAX,
            reset_at: now,
        }
    }
}

/// Apply one attempt to the counter under `rule` at time `now`.
///
/// Fixed-window semantics: an elapsed window resets `count` and advances
/// `window_start` before the attempt is judged. A rejected attempt leaves the
/// counter untouched.
pub fn consume(
    counter: &mut RateLimitCounter,
    rule: &RateLimitRule,
    now: DateTime<Utc>,
) -> RateLimitDecision {
    if now - counter.window_start >= rule.window {
        counter.count = 0;
        counter.window_start = now;
    }

    let reset_at = counter.window_start + rule.window;

    if counter.count >= rule.max_attempts {
        return RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_at,
        };
    }

    counter.count += 1;
    RateLimitDecision {
        allowed: true,
        remaining: rule.max_attempts - counter.count,
        reset_at,
    }
}
