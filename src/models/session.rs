use chrono::{DateTime, Utc};

use crate::crypto::token::SessionKey;
use crate::error::{Result, SessionError};
use crate::models::attribute::Attributes;

/// A session as persisted in the backing store.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    /// The storage key (hash of the session token).
    pub key: SessionKey,
    /// The session attributes. `None` when the stored record carries no
    /// `data` attribute, which the session layer treats as "not found".
    pub data: Option<Attributes>,
    /// Absolute expiry in epoch seconds.
    pub expires_at: i64,
}

impl SessionRecord {
    /// Whether the record is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp()
    }
}

/// Computes the absolute expiry (epoch seconds) of a write made at `now`.
pub fn expiry_from(now: DateTime<Utc>, ttl_seconds: i64) -> Result<i64> {
    now.timestamp().checked_add(ttl_seconds).ok_or_else(|| {
        SessionError::Config(format!("session expiry overflows with a TTL of {}s", ttl_seconds))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_adds_ttl_to_now() {
        let now = Utc::now();
        assert_eq!(expiry_from(now, 900).unwrap(), now.timestamp() + 900);
    }

    #[test]
    fn overflowing_expiry_is_an_error() {
        assert!(matches!(
            expiry_from(Utc::now(), i64::MAX),
            Err(SessionError::Config(_))
        ));
    }
}
