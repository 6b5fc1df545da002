//! Security event log service: best-effort writes, queries, and reports.
//!
//! Writes never fail the calling operation. An authentication decision must
//! not depend on the audit backend being healthy, so `record` bounds the
//! append with a timeout and swallows failures with a warning. Queries and
//! reports propagate errors normally; they run outside the auth path.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::{
    Error,
    context::RequestContext,
    events::{
        EventFilter, HourBucket, IpAddressCount, SecurityEvent, SecurityEventType,
        SecurityReport, SuspiciousActivity,
    },
    repositories::SecurityEventRepository,
};

/// Configuration for report generation and anomaly detection.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Number of entries kept in `top_ip_addresses`.
    pub top_ip_count: usize,
    /// Failed login attempts from one IP within the range that flag a
    /// `brute_force_attempt` anomaly.
    pub brute_force_threshold: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_ip_count: 10,
            brute_force_threshold: 10,
        }
    }
}

/// Service over the append-only security event log.
pub struct AuditService<R: SecurityEventRepository> {
    repository: Arc<R>,
    report_config: ReportConfig,
    store_timeout: std::time::Duration,
}

impl<R: SecurityEventRepository> Clone for AuditService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            report_config: self.report_config.clone(),
            store_timeout: self.store_timeout,
        }
    }
}

impl<R: SecurityEventRepository> AuditService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            report_config: ReportConfig::default(),
            store_timeout: std::time::Duration::from_secs(2),
        }
    }

    pub fn with_report_config(mut self, report_config: ReportConfig) -> Self {
        self.report_config = report_config;
        self
    }

    pub fn with_store_timeout(mut self, store_timeout: std::time::Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Append an event, best-effort.
    ///
    /// The append attempt is always made, but a slow or failing backend is
    /// reduced to a warning so the surrounding auth flow proceeds.
    pub async fn record(&self, event: SecurityEvent) {
        let event_type = event.event_type;
        match tokio::time::timeout(self.store_timeout, self.repository.append(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(%event_type, error = %e, "Security event was not recorded");
            }
            Err(_) => {
                tracing::warn!(%event_type, "Security event append timed out");
            }
        }
    }

    /// Build and record an event from a request context.
    pub async fn record_from_context(
        &self,
        event_type: SecurityEventType,
        success: bool,
        ctx: &RequestContext,
        metadata: Map<String, Value>,
    ) {
        let mut builder = SecurityEvent::builder(event_type).success(success);
        if let Some(email) = &ctx.email {
            builder = builder.email(email.clone());
        }
        if let Some(user_id) = &ctx.user_id {
            builder = builder.user_id(user_id.clone());
        }
        if let Some(ip) = &ctx.ip_address {
            builder = builder.ip_address(ip.clone());
        }
        if let Some(user_agent) = &ctx.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        for (key, value) in metadata {
            builder = builder.metadata(key, value);
        }
        self.record(builder.build()).await;
    }

    /// Events matching the filter, newest first.
    pub async fn query(&self, filter: &EventFilter) -> Result<Vec<SecurityEvent>, Error> {
        self.repository.query(filter).await
    }

    /// Exact count of matching events, ignoring pagination.
    pub async fn count(&self, filter: &EventFilter) -> Result<u64, Error> {
        self.repository.count(filter).await
    }

    /// Aggregate report over `[start, end]`.
    ///
    /// A pure fold over the queried events, so two reports over the same
    /// closed range with no new events are identical.
    pub async fn generate_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SecurityReport, Error> {
        let filter = EventFilter::range(start, end)?;
        let events = self.repository.query(&filter).await?;
        Ok(build_report(&events, start, end, &self.report_config))
    }
}

/// Fold a set of events into a [`SecurityReport`]. Deterministic: every
/// collection in the output has a total order.
pub fn build_report(
    events: &[SecurityEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    config: &ReportConfig,
) -> SecurityReport {
    let total_events = events.len() as u64;
    let successful_events = events.iter().filter(|e| e.success).count() as u64;

    let mut events_by_type: BTreeMap<SecurityEventType, u64> = BTreeMap::new();
    let mut events_by_hour: BTreeMap<i64, u64> = BTreeMap::new();
    let mut by_ip: HashMap<&str, u64> = HashMap::new();
    let mut failed_logins_by_ip: HashMap<&str, u64> = HashMap::new();

    for event in events {
        *events_by_type.entry(event.event_type).or_default() += 1;

        let hour_secs = event.occurred_at.timestamp().div_euclid(3600) * 3600;
        *events_by_hour.entry(hour_secs).or_default() += 1;

        if let Some(ip) = event.ip_address.as_deref() {
            *by_ip.entry(ip).or_default() += 1;

            if event.event_type == SecurityEventType::LoginAttempt && !event.success {
                *failed_logins_by_ip.entry(ip).or_default() += 1;
            }
        }
    }

    let events_by_hour = events_by_hour
        .into_iter()
        .map(|(secs, count)| HourBucket {
            hour: DateTime::from_timestamp(secs, 0).unwrap_or(start),
            count,
        })
        .collect();

    let mut top_ip_addresses: Vec<IpAddressCount> = by_ip
        .into_iter()
        .map(|(ip_address, count)| IpAddressCount {
            ip_address: ip_address.to_string(),
            count,
        })
        .collect();
    top_ip_addresses.sort_by(|a, b| b.count.cmp(&a.count).then(a.ip_address.cmp(&b.ip_address)));
    top_ip_addresses.truncate(config.top_ip_count);

    let mut suspicious_activity: Vec<SuspiciousActivity> = failed_logins_by_ip
        .into_iter()
        .filter(|(_, count)| *count >= config.brute_force_threshold)
        .map(|(ip, count)| SuspiciousActivity {
            kind: "brute_force_attempt".to_string(),
            count,
            description: format!("{count} unsuccessful login attempts from IP address {ip}"),
        })
        .collect();
    suspicious_activity.sort_by(|a, b| b.count.cmp(&a.count).then(a.description.cmp(&b.description)));

    SecurityReport {
        start,
        end,
        total_events,
        successful_events,
        failed_events: total_events - successful_events,
        events_by_type,
        events_by_hour,
        top_ip_addresses,
        suspicious_activity,
    }
}
