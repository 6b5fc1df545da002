//! Adapters that wrap a [`RepositoryProvider`] and implement the individual
//! repository traits, so services generic over one repository can be built
//! from a provider that owns them all.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error, UserId,
    events::{EventFilter, SecurityEvent},
    lockout::{LockoutDecision, LockoutPolicy, LockoutRecord},
    rate_limit::{RateLimitDecision, RateLimitRule},
    repositories::{
        LockoutRepository, LockoutRepositoryProvider, RateLimitRepository,
        RateLimitRepositoryProvider, RepositoryProvider, SecurityEventRepository,
        SecurityEventRepositoryProvider, UnlockOutcome,
    },
};

pub struct RateLimitRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> RateLimitRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> RateLimitRepository for RateLimitRepositoryAdapter<R> {
    async fn try_consume(
        &self,
        operation: &str,
        key: &str,
        rule: &RateLimitRule,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, Error> {
        self.provider
            .rate_limit()
            .try_consume(operation, key, rule, now)
            .await
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.rate_limit().cleanup_expired(before).await
    }
}

pub struct LockoutRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LockoutRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LockoutRepository for LockoutRepositoryAdapter<R> {
    async fn get(&self, user_id: &UserId) -> Result<Option<LockoutRecord>, Error> {
        self.provider.lockout().get(user_id).await
    }

    async fn record_failure(
        &self,
        user_id: &UserId,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutDecision, Error> {
        self.provider
            .lockout()
            .record_failure(user_id, policy, now)
            .await
    }

    async fn record_success(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<LockoutDecision, Error> {
        self.provider.lockout().record_success(user_id, now).await
    }

    async fn unlock(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<UnlockOutcome, Error> {
        self.provider.lockout().unlock(user_id, now).await
    }
}

pub struct SecurityEventRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> SecurityEventRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> SecurityEventRepository for SecurityEventRepositoryAdapter<R> {
    async fn append(&self, event: SecurityEvent) -> Result<(), Error> {
        self.provider.events().append(event).await
    }

    async fn query(&self, filter: &EventFilter) -> Result<Vec<SecurityEvent>, Error> {
        self.provider.events().query(filter).await
    }

    async fn count(&self, filter: &EventFilter) -> Result<u64, Error> {
        self.provider.events().count(filter).await
    }
}
