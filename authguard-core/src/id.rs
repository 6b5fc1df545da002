//! ID generation utilities with prefix support
//!
//! Prefixed opaque identifiers (`usr_…` for users, `evt_…` for security
//! events, `req_…` for request correlation). IDs carry at least 96 bits of
//! entropy and are URL-safe.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

/// Generate a prefixed ID with at least 96 bits of entropy.
///
/// The ID format is: `{prefix}_{random_string}`
/// where the random string is base64 URL-safe encoded without padding.
pub fn generate_prefixed_id(prefix: &str) -> String {
    // 12 bytes (96 bits) of random data
    let mut bytes = [0u8; 12];
    OsRng.try_fill_bytes(&mut bytes).unwrap();

    let encoded = BASE64_URL_SAFE_NO_PAD.encode(bytes);

    format!("{prefix}_{encoded}")
}

/// Validate that an ID has the expected prefix and a plausible random part.
pub fn validate_prefixed_id(id: &str, prefix: &str) -> bool {
    let Some(rest) = id.strip_prefix(prefix).and_then(|r| r.strip_prefix('_')) else {
        return false;
    };

    // 12 bytes encode to 16 base64 characters without padding
    rest.len() >= 16
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_has_prefix() {
        let id = generate_prefixed_id("evt");
        assert!(id.starts_with("evt_"));
        assert!(validate_prefixed_id(&id, "evt"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_prefixed_id("req");
        let b = generate_prefixed_id("req");
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_rejects_wrong_prefix() {
        let id = generate_prefixed_id("usr");
        assert!(!validate_prefixed_id(&id, "evt"));
        assert!(!validate_prefixed_id("usr_short", "usr"));
        assert!(!validate_prefixed_id("usr", "usr"));
    }
}
