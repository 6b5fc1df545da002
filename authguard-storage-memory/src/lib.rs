//! In-process storage backend for authguard
//!
//! Keyed state (rate-limit counters, lockout records) lives in [`DashMap`]s,
//! whose per-shard entry locks give the atomic read-modify-write the core
//! repository contracts require. The event log is a `tokio::sync::RwLock`
//! over an append-only vector.
//!
//! Nothing here survives a restart; that is within contract for counters,
//! and deployments needing durable lockout records or event retention swap
//! in a backend over a transactional store.

pub mod repositories;

pub use repositories::{
    MemoryLockoutRepository, MemoryRateLimitRepository, MemorySecurityEventRepository,
};

use async_trait::async_trait;
use authguard_core::{
    Error,
    repositories::{
        LockoutRepositoryProvider, RateLimitRepositoryProvider, RepositoryProvider,
        SecurityEventRepositoryProvider,
    },
};

/// Provider bundling the three in-memory repositories.
#[derive(Default)]
pub struct MemoryRepositoryProvider {
    rate_limit: MemoryRateLimitRepository,
    lockout: MemoryLockoutRepository,
    events: MemorySecurityEventRepository,
}

impl MemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitRepositoryProvider for MemoryRepositoryProvider {
    type RateLimitRepo = MemoryRateLimitRepository;

    fn rate_limit(&self) -> &Self::RateLimitRepo {
        &self.rate_limit
    }
}

impl LockoutRepositoryProvider for MemoryRepositoryProvider {
    type LockoutRepo = MemoryLockoutRepository;

    fn lockout(&self) -> &Self::LockoutRepo {
        &self.lockout
    }
}

impl SecurityEventRepositoryProvider for MemoryRepositoryProvider {
    type EventRepo = MemorySecurityEventRepository;

    fn events(&self) -> &Self::EventRepo {
        &self.events
    }
}

#[async_trait]
impl RepositoryProvider for MemoryRepositoryProvider {
    async fn health_check(&self) -> Result<(), Error> {
        // In-process maps; reachable by construction
        Ok(())
    }
}
