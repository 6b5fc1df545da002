//! Service layer for the resilience logic
//!
//! This module contains concrete service implementations that encapsulate
//! rate limiting, account lockout, and security event logging.

pub mod audit;
pub mod lockout;
pub mod rate_limit;

pub use audit::{AuditService, ReportConfig, build_report};
pub use lockout::LockoutService;
pub use rate_limit::{FailurePolicy, RateLimiterConfig, RateLimiterService};
