//! Clock/identity context for authentication-relevant requests
//!
//! Every call into the core carries a [`RequestContext`]: the operation being
//! attempted plus whatever identity and network attributes the transport
//! layer observed. Pure input, no logic.

use serde::{Deserialize, Serialize};

use crate::id::{generate_prefixed_id, validate_prefixed_id};

/// A unique, stable identifier for a specific user.
///
/// This value should be treated as opaque; it is supplied by the external
/// user store and is never interpreted beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> Self {
        UserId(id.to_string())
    }

    pub fn new_random() -> Self {
        UserId(generate_prefixed_id("usr"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that this ID has the correct format for a user ID
    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "usr")
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        UserId(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request attributes an inbound authentication-related call carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    /// Operation name, e.g. `login`, `registration`, `password_reset`.
    pub operation: String,
    pub email: Option<String>,
    pub user_id: Option<UserId>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Default::default()
        }
    }

    /// Email lowered for use as an identity key. Rate limiting treats
    /// `User@Example.com` and `user@example.com` as the same caller.
    pub fn normalized_email(&self) -> Option<String> {
        self.email.as_ref().map(|e| e.trim().to_lowercase())
    }
}

#[derive(Default)]
pub struct RequestContextBuilder {
    operation: Option<String>,
    email: Option<String>,
    user_id: Option<UserId>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl RequestContextBuilder {
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
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

    pub fn build(self) -> RequestContext {
        RequestContext {
            operation: self.operation.unwrap_or_default(),
            email: self.email,
            user_id: self.user_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
        }
    }
}
