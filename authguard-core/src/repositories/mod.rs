//! Repository traits for the shared mutable state
//!
//! The only shared mutable resources in this core are the keyed rate-limit
//! counters, the per-account lockout records, and the append-only security
//! event log. Each lives behind a repository trait so in-memory and
//! distributed backing stores are interchangeable without touching logic.
//!
//! # Trait Hierarchy
//!
//! - Individual `*Repository` traits define the operations for each data domain
//! - Individual `*RepositoryProvider` traits provide access to each repository type
//! - [`RepositoryProvider`] is a supertrait combining all provider traits plus
//!   lifecycle methods

pub mod adapter;
pub mod events;
pub mod lockout;
pub mod rate_limit;

pub use adapter::{
    LockoutRepositoryAdapter, RateLimitRepositoryAdapter, SecurityEventRepositoryAdapter,
};
pub use events::SecurityEventRepository;
pub use lockout::{LockoutRepository, UnlockOutcome};
pub use rate_limit::RateLimitRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for rate-limit counter repository access.
pub trait RateLimitRepositoryProvider: Send + Sync + 'static {
    /// The rate limit repository implementation type
    type RateLimitRepo: RateLimitRepository;

    /// Get the rate limit repository
    fn rate_limit(&self) -> &Self::RateLimitRepo;
}

/// Provider trait for lockout record repository access.
pub trait LockoutRepositoryProvider: Send + Sync + 'static {
    /// The lockout repository implementation type
    type LockoutRepo: LockoutRepository;

    /// Get the lockout repository
    fn lockout(&self) -> &Self::LockoutRepo;
}

/// Provider trait for security event repository access.
pub trait SecurityEventRepositoryProvider: Send + Sync + 'static {
    /// The security event repository implementation type
    type EventRepo: SecurityEventRepository;

    /// Get the security event repository
    fn events(&self) -> &Self::EventRepo;
}

/// Provider trait that storage implementations must implement to provide all
/// repositories, plus a health check used by deployments to verify the
/// backing store is reachable.
#[async_trait]
pub trait RepositoryProvider:
    RateLimitRepositoryProvider + LockoutRepositoryProvider + SecurityEventRepositoryProvider
{
    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
