//! Core functionality for the authguard project
//!
//! This crate contains the building blocks of the authentication-resilience
//! core: per-operation rate limiting, the account lockout state machine, the
//! append-only security event log with aggregate reporting, and the closed
//! error taxonomy with its safe response envelopes.
//!
//! The crate is storage-agnostic: shared mutable state (counters, lockout
//! records, the event log) lives behind the traits in [`repositories`], and
//! backends implement [`repositories::RepositoryProvider`] to supply them.
//! The services in [`services`] carry the logic; the `authguard` crate wires
//! them together behind a single facade.

pub mod context;
pub mod error;
pub mod events;
pub mod id;
pub mod lockout;
pub mod rate_limit;
pub mod repositories;
pub mod response;
pub mod services;
pub mod validation;

pub use context::{RequestContext, UserId};
pub use error::Error;
pub use events::{EventFilter, SecurityEvent, SecurityEventType, SecurityReport};
pub use lockout::{LockoutDecision, LockoutPolicy, LockoutRecord};
pub use rate_limit::{IdentityDimension, RateLimitDecision, RateLimitRule};
pub use response::{AuthError, ErrorKind, Response};
