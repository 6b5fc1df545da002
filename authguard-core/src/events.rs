//! Security event records and report types
//!
//! Every authentication-relevant action produces a [`SecurityEvent`]: an
//! immutable, append-only audit record. Events are written through
//! [`crate::services::AuditService`] and consumed only by query and report
//! operations; once appended they are never mutated or deleted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{UserId, error::ValidationError, id::generate_prefixed_id};

/// Kind of authentication-relevant action an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventType {
    LoginAttempt,
    Registration,
    PasswordChange,
    SuspiciousActivity,
    AccountLocked,
    AccountUnlock,
}

impl std::fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SecurityEventType::LoginAttempt => "LOGIN_ATTEMPT",
            SecurityEventType::Registration => "REGISTRATION",
            SecurityEventType::PasswordChange => "PASSWORD_CHANGE",
            SecurityEventType::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
            SecurityEventType::AccountLocked => "ACCOUNT_LOCKED",
            SecurityEventType::AccountUnlock => "ACCOUNT_UNLOCK",
        };
        write!(f, "{name}")
    }
}

/// An immutable audit record of an authentication-relevant action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: String,
    pub event_type: SecurityEventType,
    pub success: bool,
    pub email: Option<String>,
    pub user_id: Option<UserId>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
    /// Event-specific detail, e.g. admin actor or previous attempt counts.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SecurityEvent {
    pub fn builder(event_type: SecurityEventType) -> SecurityEventBuilder {
        SecurityEventBuilder::new(event_type)
    }
}

pub struct SecurityEventBuilder {
    event_type: SecurityEventType,
    success: bool,
    email: Option<String>,
    user_id: Option<UserId>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    occurred_at: Option<DateTime<Utc>>,
    metadata: Map<String, Value>,
}

impl SecurityEventBuilder {
    fn new(event_type: SecurityEventType) -> Self {
        Self {
            event_type,
            success: false,
            email: None,
            user_id: None,
            ip_address: None,
            user_agent: None,
            occurred_at: None,
            metadata: Map::new(),
        }
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn build(self) -> SecurityEvent {
        SecurityEvent {
            id: generate_prefixed_id("evt"),
            event_type: self.event_type,
            success: self.success,
            email: self.email,
            user_id: self.user_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
            metadata: self.metadata,
        }
    }
}

/// Filters for querying the security event log.
///
/// All fields are conjunctive; unset fields match everything. Results are
/// ordered by `occurred_at` descending and paginated via `limit`/`offset`.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub user_id: Option<UserId>,
    pub email: Option<String>,
    pub event_type: Option<SecurityEventType>,
    pub success: Option<bool>,
    pub ip_address: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl EventFilter {
    /// Whether the event passes every set filter field.
    pub fn matches(&self, event: &SecurityEvent) -> bool {
        if let Some(user_id) = &self.user_id
            && event.user_id.as_ref() != Some(user_id)
        {
            return false;
        }
        if let Some(email) = &self.email
            && event.email.as_deref() != Some(email.as_str())
        {
            return false;
        }
        if let Some(event_type) = self.event_type
            && event.event_type != event_type
        {
            return false;
        }
        if let Some(success) = self.success
            && event.success != success
        {
            return false;
        }
        if let Some(ip) = &self.ip_address
            && event.ip_address.as_deref() != Some(ip.as_str())
        {
            return false;
        }
        if let Some(start) = self.start
            && event.occurred_at < start
        {
            return false;
        }
        if let Some(end) = self.end
            && event.occurred_at > end
        {
            return false;
        }
        true
    }

    pub fn range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidField(
                "end must not precede start".to_string(),
            ));
        }
        Ok(Self {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        })
    }
}

/// Count of events within one hour bucket of `occurred_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourBucket {
    pub hour: DateTime<Utc>,
    pub count: u64,
}

/// Count of events originating from one IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddressCount {
    pub ip_address: String,
    pub count: u64,
}

/// A pattern detected over aggregated security events that exceeds a
/// configured anomaly threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspiciousActivity {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u64,
    pub description: String,
}

/// Aggregate report over a closed time range of the security event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_events: u64,
    pub successful_events: u64,
    pub failed_events: u64,
    pub events_by_type: BTreeMap<SecurityEventType, u64>,
    pub events_by_hour: Vec<HourBucket>,
    pub top_ip_addresses: Vec<IpAddressCount>,
    pub suspicious_activity: Vec<SuspiciousActivity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: SecurityEventType, success: bool) -> SecurityEvent {
        SecurityEvent::builder(event_type)
            .success(success)
            .email("test@example.com")
            .ip_address("127.0.0.1")
            .build()
    }

    #[test]
    fn test_event_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&SecurityEventType::LoginAttempt).unwrap();
        assert_eq!(json, "\"LOGIN_ATTEMPT\"");
        assert_eq!(SecurityEventType::AccountUnlock.to_string(), "ACCOUNT_UNLOCK");
    }

    #[test]
    fn test_builder_assigns_id_and_timestamp() {
        let e = event(SecurityEventType::Registration, true);
        assert!(e.id.starts_with("evt_"));
        assert!(e.occurred_at <= Utc::now());
    }

    #[test]
    fn test_filter_matches_conjunctively() {
        let e = event(SecurityEventType::LoginAttempt, false);

        let mut filter = EventFilter {
            event_type: Some(SecurityEventType::LoginAttempt),
            success: Some(false),
            ..Default::default()
        };
        assert!(filter.matches(&e));

        filter.ip_address = Some("10.0.0.1".to_string());
        assert!(!filter.matches(&e));
    }

    #[test]
    fn test_filter_date_bounds() {
        let e = event(SecurityEventType::LoginAttempt, false);

        let past = EventFilter {
            end: Some(e.occurred_at - chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert!(!past.matches(&e));

        let covering = EventFilter {
            start: Some(e.occurred_at - chrono::Duration::hours(1)),
            end: Some(e.occurred_at + chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert!(covering.matches(&e));
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        let now = Utc::now();
        assert!(EventFilter::range(now, now - chrono::Duration::hours(1)).is_err());
        assert!(EventFilter::range(now - chrono::Duration::hours(1), now).is_ok());
    }
}
