use async_trait::async_trait;
use tokio::sync::RwLock;

use authguard_core::{
    Error,
    events::{EventFilter, SecurityEvent},
    repositories::SecurityEventRepository,
};

/// Append-only in-memory event log.
///
/// Appends take the write lock briefly; queries clone matching events under
/// the read lock. Events are never mutated or removed.
#[derive(Default)]
pub struct MemorySecurityEventRepository {
    events: RwLock<Vec<SecurityEvent>>,
}

impl MemorySecurityEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecurityEventRepository for MemorySecurityEventRepository {
    async fn append(&self, event: SecurityEvent) -> Result<(), Error> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn query(&self, filter: &EventFilter) -> Result<Vec<SecurityEvent>, Error> {
        let events = self.events.read().await;
        let mut matching: Vec<SecurityEvent> = events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        // Newest first; stable sort keeps insertion order within a timestamp
        matching.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

        let offset = filter.offset.unwrap_or(0);
        let matching: Vec<SecurityEvent> = match filter.limit {
            Some(limit) => matching.into_iter().skip(offset).take(limit).collect(),
            None => matching.into_iter().skip(offset).collect(),
        };
        Ok(matching)
    }

    async fn count(&self, filter: &EventFilter) -> Result<u64, Error> {
        let events = self.events.read().await;
        Ok(events.iter().filter(|e| filter.matches(e)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authguard_core::events::SecurityEventType;
    use chrono::{Duration, Utc};

    fn event(ip: &str, success: bool, minutes_ago: i64) -> SecurityEvent {
        SecurityEvent::builder(SecurityEventType::LoginAttempt)
            .success(success)
            .email("a@example.com")
            .ip_address(ip)
            .occurred_at(Utc::now() - Duration::minutes(minutes_ago))
            .build()
    }

    #[tokio::test]
    async fn test_query_orders_newest_first() {
        let repo = MemorySecurityEventRepository::new();
        repo.append(event("1.1.1.1", true, 30)).await.unwrap();
        repo.append(event("2.2.2.2", true, 10)).await.unwrap();
        repo.append(event("3.3.3.3", true, 20)).await.unwrap();

        let results = repo.query(&EventFilter::default()).await.unwrap();
        let ips: Vec<_> = results
            .iter()
            .map(|e| e.ip_address.as_deref().unwrap())
            .collect();
        assert_eq!(ips, ["2.2.2.2", "3.3.3.3", "1.1.1.1"]);
    }

    #[tokio::test]
    async fn test_pagination() {
        let repo = MemorySecurityEventRepository::new();
        for i in 0..10 {
            repo.append(event("1.1.1.1", true, i)).await.unwrap();
        }

        let page = repo
            .query(&EventFilter {
                limit: Some(3),
                offset: Some(3),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 3);

        // Count ignores pagination
        let total = repo
            .count(&EventFilter {
                limit: Some(3),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 10);
    }

    #[tokio::test]
    async fn test_filters_apply() {
        let repo = MemorySecurityEventRepository::new();
        repo.append(event("1.1.1.1", true, 5)).await.unwrap();
        repo.append(event("1.1.1.1", false, 4)).await.unwrap();
        repo.append(event("2.2.2.2", false, 3)).await.unwrap();

        let failures_from_ip = repo
            .query(&EventFilter {
                ip_address: Some("1.1.1.1".to_string()),
                success: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(failures_from_ip.len(), 1);
    }
}
