//! In-memory repository implementations.

pub mod events;
pub mod lockout;
pub mod rate_limit;

pub use events::MemorySecurityEventRepository;
pub use lockout::MemoryLockoutRepository;
pub use rate_limit::MemoryRateLimitRepository;
