//! Error taxonomy and response envelopes
//!
//! The taxonomy is a closed set: every failure leaving this core is one of
//! the [`ErrorKind`] variants, rendered from a static catalog built once at
//! startup. The catalog carries two renderings per kind: a user message that
//! must never leak internals, and a log message that keeps full diagnostic
//! detail for the operational log. The no-leak contract is mechanically
//! checked in tests against a forbidden-vocabulary list.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{error::Error, id::generate_prefixed_id};

/// Closed set of failure kinds this core can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidCredentials,
    AccountLocked,
    EmailNotVerified,
    RateLimitExceeded,
    ValidationError,
    PasswordStrength,
    EmailFormat,
    SuspiciousActivity,
    TokenExpired,
    TokenInvalid,
    ServiceUnavailable,
    InternalError,
}

impl ErrorKind {
    /// Every kind, for mechanical checks over the catalog.
    pub const ALL: [ErrorKind; 12] = [
        ErrorKind::InvalidCredentials,
        ErrorKind::AccountLocked,
        ErrorKind::EmailNotVerified,
        ErrorKind::RateLimitExceeded,
        ErrorKind::ValidationError,
        ErrorKind::PasswordStrength,
        ErrorKind::EmailFormat,
        ErrorKind::SuspiciousActivity,
        ErrorKind::TokenExpired,
        ErrorKind::TokenInvalid,
        ErrorKind::ServiceUnavailable,
        ErrorKind::InternalError,
    ];

    pub fn entry(&self) -> &'static CatalogEntry {
        catalog_entry(*self)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorKind::AccountLocked => "ACCOUNT_LOCKED",
            ErrorKind::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            ErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::PasswordStrength => "PASSWORD_STRENGTH",
            ErrorKind::EmailFormat => "EMAIL_FORMAT",
            ErrorKind::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
            ErrorKind::TokenExpired => "TOKEN_EXPIRED",
            ErrorKind::TokenInvalid => "TOKEN_INVALID",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{name}")
    }
}

/// Static defaults for one error kind.
pub struct CatalogEntry {
    pub user_message: &'static str,
    pub log_message: &'static str,
    pub status_code: u16,
    pub suggestions: &'static [&'static str],
}

fn catalog_entry(kind: ErrorKind) -> &'static CatalogEntry {
    match kind {
        ErrorKind::InvalidCredentials => &CatalogEntry {
            user_message: "The email or password you entered is incorrect.",
            log_message: "Credential check rejected the supplied email/password pair",
            status_code: 401,
            suggestions: &[
                "Double-check your email address and password",
                "Use the password reset option if you cannot remember your password",
            ],
        },
        ErrorKind::AccountLocked => &CatalogEntry {
            user_message:
                "Your account is temporarily locked after too many unsuccessful sign-in attempts.",
            log_message: "Account is in LOCKED state; attempt rejected before credential check",
            status_code: 423,
            suggestions: &[
                "Wait until the lockout period ends, then try again",
                "Reset your password to regain access sooner",
            ],
        },
        ErrorKind::EmailNotVerified => &CatalogEntry {
            user_message: "Please confirm your email address before signing in.",
            log_message: "Login rejected: email address not verified",
            status_code: 403,
            suggestions: &[
                "Check your inbox for the confirmation message",
                "Request a new confirmation message if the original has expired",
            ],
        },
        ErrorKind::RateLimitExceeded => &CatalogEntry {
            user_message: "Too many attempts. Please wait a little while before trying again.",
            log_message: "Rate limit exceeded for operation",
            status_code: 429,
            suggestions: &["Wait for the indicated time before retrying"],
        },
        ErrorKind::ValidationError => &CatalogEntry {
            user_message: "Some of the information you provided needs attention.",
            log_message: "Request payload did not pass validation",
            status_code: 400,
            suggestions: &["Review the highlighted fields and submit again"],
        },
        ErrorKind::PasswordStrength => &CatalogEntry {
            user_message: "Your password does not meet the security requirements.",
            log_message: "Password rejected by strength policy",
            status_code: 400,
            suggestions: &["Choose a longer password that mixes letters, numbers and symbols"],
        },
        ErrorKind::EmailFormat => &CatalogEntry {
            user_message: "That email address does not look right.",
            log_message: "Email address rejected by format validation",
            status_code: 400,
            suggestions: &["Check for typos such as a missing @ or domain name"],
        },
        ErrorKind::SuspiciousActivity => &CatalogEntry {
            user_message:
                "We noticed unusual activity and paused this request to keep your account safe.",
            log_message: "Request blocked by anomaly detection",
            status_code: 403,
            suggestions: &[
                "Try again later",
                "Contact support if this keeps happening",
            ],
        },
        ErrorKind::TokenExpired => &CatalogEntry {
            user_message: "This link has expired.",
            log_message: "Presented token is past its expiry",
            status_code: 401,
            suggestions: &["Request a new link and use it promptly"],
        },
        ErrorKind::TokenInvalid => &CatalogEntry {
            user_message: "This link is not valid.",
            log_message: "Presented token did not match any issued token",
            status_code: 401,
            suggestions: &[
                "Request a new link",
                "Make sure you opened the most recent message sent to you",
            ],
        },
        ErrorKind::ServiceUnavailable => &CatalogEntry {
            user_message: "We are having trouble completing your request right now.",
            log_message: "A backing store or collaborator was unreachable or timed out",
            status_code: 503,
            suggestions: &["Try again in a few minutes"],
        },
        ErrorKind::InternalError => &CatalogEntry {
            user_message: "Something went wrong on our side. Please try again.",
            log_message: "Unclassified failure reached the boundary",
            status_code: 500,
            suggestions: &[
                "Try again in a few moments",
                "Contact support if the problem continues",
            ],
        },
    }
}

/// Render minutes as human text: "`H hour(s) and M minutes`" when `H > 0`,
/// else "`M minutes`".
pub fn format_minutes(minutes: u64) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    let minute_word = if rest == 1 { "minute" } else { "minutes" };
    if hours > 0 {
        let hour_word = if hours == 1 { "hour" } else { "hours" };
        format!("{hours} {hour_word} and {rest} {minute_word}")
    } else {
        format!("{rest} {minute_word}")
    }
}

/// Render a whole-second retry window in human units, rounding partial
/// minutes up so the caller never retries early.
pub fn format_seconds(seconds: u64) -> String {
    format_minutes(seconds.div_ceil(60).max(1))
}

/// A classified failure, carrying both the safe user rendering and the
/// internal diagnostic rendering. Transient: rendered into a [`Response`]
/// and optionally logged, never persisted.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {log_message}")]
pub struct AuthError {
    pub kind: ErrorKind,
    pub user_message: String,
    /// Internal-only; may contain sensitive diagnostic detail.
    pub log_message: String,
    pub status_code: u16,
    pub field: Option<String>,
    pub details: Option<Value>,
    /// Whole seconds until the caller may retry.
    pub retry_after: Option<u64>,
    pub suggestions: Vec<String>,
}

impl AuthError {
    /// An error carrying the catalog defaults for `kind`. The log message
    /// defaults to the user message's catalog counterpart.
    pub fn new(kind: ErrorKind) -> Self {
        let entry = kind.entry();
        Self {
            kind,
            user_message: entry.user_message.to_string(),
            log_message: entry.log_message.to_string(),
            status_code: entry.status_code,
            field: None,
            details: None,
            retry_after: None,
            suggestions: entry.suggestions.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_log_message(mut self, log_message: impl Into<String>) -> Self {
        self.log_message = log_message.into();
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_credentials() -> Self {
        Self::new(ErrorKind::InvalidCredentials)
    }

    pub fn email_not_verified() -> Self {
        Self::new(ErrorKind::EmailNotVerified)
    }

    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable).with_log_message(detail)
    }

    /// Wrap an unclassified failure. The original detail survives only in
    /// the log message.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError)
            .with_log_message(format!("Unclassified failure: {}", detail.into()))
    }

    /// A validation failure over per-field messages. The user message is the
    /// first message of `focus_field` when given, else the first message
    /// found across all fields.
    pub fn validation(
        field_errors: HashMap<String, Vec<String>>,
        focus_field: Option<&str>,
    ) -> Self {
        let focused = focus_field
            .and_then(|f| field_errors.get(f))
            .and_then(|msgs| msgs.first());
        let first_any = || {
            let mut fields: Vec<_> = field_errors.keys().collect();
            fields.sort();
            fields
                .into_iter()
                .find_map(|f| field_errors.get(f).and_then(|msgs| msgs.first()))
        };
        let message = focused
            .cloned()
            .or_else(|| first_any().cloned())
            .unwrap_or_else(|| ErrorKind::ValidationError.entry().user_message.to_string());

        let mut error = Self::new(ErrorKind::ValidationError)
            .with_details(json!(field_errors))
            .with_log_message(format!(
                "Validation rejected fields: {:?}",
                field_errors.keys().collect::<Vec<_>>()
            ));
        error.user_message = message;
        if let Some(field) = focus_field {
            error.field = Some(field.to_string());
        }
        error
    }

    /// A rate-limit rejection with the retry window rendered in human units.
    pub fn rate_limited(retry_after_seconds: u64, operation: &str) -> Self {
        let window = format_seconds(retry_after_seconds);
        let mut error = Self::new(ErrorKind::RateLimitExceeded).with_log_message(format!(
            "Rate limit exceeded for operation {operation}; retry after {retry_after_seconds}s"
        ));
        error.user_message =
            format!("Too many attempts. Please try again in {window}.");
        error.retry_after = Some(retry_after_seconds);
        error
    }

    /// An account-lockout rejection embedding the formatted duration.
    pub fn account_locked(lockout_minutes: u64) -> Self {
        let window = format_minutes(lockout_minutes);
        let mut error = Self::new(ErrorKind::AccountLocked)
            .with_log_message(format!("Account locked for {lockout_minutes} minutes"));
        error.user_message = format!(
            "Your account is temporarily locked after too many unsuccessful sign-in attempts. Please try again in {window}."
        );
        error.retry_after = Some(lockout_minutes * 60);
        error
    }

    /// A password-strength rejection listing the unmet requirements.
    pub fn password_strength(requirements: Vec<String>) -> Self {
        let suggestions: Vec<String> =
            requirements.iter().map(|r| format!("• {r}")).collect();
        let mut error = Self::new(ErrorKind::PasswordStrength)
            .with_field("password")
            .with_details(json!({ "requirements": requirements }));
        error.suggestions = suggestions;
        error
    }
}

/// A transport-neutral response: an HTTP-style status code, an optional
/// `Retry-After` value in whole seconds, and a serializable body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    /// Rendered as a `Retry-After` header by HTTP bindings.
    pub retry_after: Option<u64>,
    pub body: Value,
}

impl Response {
    /// The success envelope: `{ success, data, message, timestamp, request_id }`.
    pub fn success(data: Value, message: impl Into<String>) -> Self {
        Self::success_with_status(data, message, 200)
    }

    pub fn success_with_status(data: Value, message: impl Into<String>, status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: json!({
                "success": true,
                "data": data,
                "message": message.into(),
                "timestamp": Utc::now(),
                "request_id": generate_prefixed_id("req"),
            }),
        }
    }

    /// The failure envelope. Only the safe renderings of `error` appear in
    /// the body; the log message never does.
    pub fn failure(error: &AuthError) -> Self {
        let mut body_error = json!({
            "type": error.kind,
            "message": error.user_message,
            "suggestions": error.suggestions,
        });
        if let Some(field) = &error.field
            && let Some(map) = body_error.as_object_mut()
        {
            map.insert("field".to_string(), json!(field));
        }

        Self {
            status: error.status_code,
            retry_after: error.retry_after,
            body: json!({
                "success": false,
                "error": body_error,
                "timestamp": Utc::now(),
                "request_id": generate_prefixed_id("req"),
            }),
        }
    }
}

/// Classify any internal failure into a renderable [`AuthError`].
///
/// Already-classified errors pass through; storage failures surface as
/// `SERVICE_UNAVAILABLE`; everything else collapses to `INTERNAL_ERROR` with
/// the original detail preserved only in the log message.
pub fn classify(err: Error) -> AuthError {
    match err {
        Error::Auth(auth) => auth,
        Error::Storage(storage) => AuthError::service_unavailable(storage.to_string()),
        Error::Validation(validation) => match validation {
            crate::error::ValidationError::InvalidEmail(detail) => {
                AuthError::new(ErrorKind::EmailFormat).with_log_message(detail)
            }
            other => AuthError::new(ErrorKind::ValidationError).with_log_message(other.to_string()),
        },
        Error::Event(event) => AuthError::internal(event.to_string()),
        Error::Unexpected(detail) => AuthError::internal(detail),
    }
}
