//! Repository trait for the security event log.

use async_trait::async_trait;

use crate::{
    Error,
    events::{EventFilter, SecurityEvent},
};

/// Append-only store of security events.
///
/// Events are immutable once appended and are never deleted; retention is a
/// deployment concern outside this trait. Queries return events ordered by
/// `occurred_at` descending with `limit`/`offset` pagination, and `count`
/// gives exact totals when a caller asks for them.
#[async_trait]
pub trait SecurityEventRepository: Send + Sync + 'static {
    /// Append one event. Callers in the auth path never let a failure here
    /// fail the surrounding operation; see
    /// [`crate::services::AuditService::record`].
    async fn append(&self, event: SecurityEvent) -> Result<(), Error>;

    /// Events matching the filter, newest first, paginated.
    async fn query(&self, filter: &EventFilter) -> Result<Vec<SecurityEvent>, Error>;

    /// Exact count of events matching the filter, ignoring pagination.
    async fn count(&self, filter: &EventFilter) -> Result<u64, Error>;
}
