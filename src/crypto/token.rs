use std::fmt;

use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SessionError};

/// The size of a session token in bytes, before encoding.
const SESSION_TOKEN_SIZE: usize = 32;

/// The random identifier handed to the client in the session cookie.
///
/// ⚠️ Never persisted. The store only ever sees the `SessionKey` derived
/// from it, so the token is the only thing that can reach the record.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps a token value, e.g. one read back from a cookie.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The literal token value, as it goes into the cookie.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for SessionToken {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for SessionToken {}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// The storage key of a session: SHA-256 of the token, URL-safe base64.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Wraps an already-derived key, e.g. one read back from the store.
    pub fn from_encoded(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The encoded key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates a new random session token.
///
/// # Returns
///
/// A URL-safe base64-encoded token carrying 256 bits from the OS RNG.
pub fn generate() -> Result<SessionToken> {
    let mut bytes = [0u8; SESSION_TOKEN_SIZE];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SessionError::Random(format!("Failed to generate session token: {}", e)))?;

    let token = SessionToken(general_purpose::URL_SAFE_NO_PAD.encode(bytes));
    bytes.zeroize();
    Ok(token)
}

/// Derives the storage key for a token.
///
/// Deterministic and one-way: the same token always yields the same key,
/// and the key cannot be turned back into the token.
pub fn derive_key(token: &SessionToken) -> SessionKey {
    let digest = Sha256::digest(token.as_str().as_bytes());
    SessionKey(general_purpose::URL_SAFE_NO_PAD.encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_distinct_and_url_safe() {
        let a = generate().unwrap();
        let b = generate().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 43);
        assert!(
            a.as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn derive_key_is_deterministic() {
        let token = SessionToken::new("12345");
        assert_eq!(derive_key(&token), derive_key(&token));
        assert_eq!(derive_key(&token), derive_key(&SessionToken::new("12345")));
    }

    #[test]
    fn derive_key_matches_sha256() {
        // sha256("12345") = 5994471abb01112afcc18159f6cc74b4f511b99806da59b3caf5a9c173cacfc5
        let key = derive_key(&SessionToken::new("12345"));
        assert_eq!(key.as_str(), "WZRHGrsBESr8wYFZ9sx0tPURuZgG2lmzyvWpwXPKz8U");
    }

    #[test]
    fn distinct_tokens_give_distinct_keys() {
        let a = generate().unwrap();
        let b = generate().unwrap();
        assert_ne!(derive_key(&a), derive_key(&b));
        assert_ne!(derive_key(&a).as_str(), a.as_str());
    }

    #[test]
    fn debug_output_hides_the_token() {
        let token = SessionToken::new("super-secret");
        assert!(!format!("{:?}", token).contains("super-secret"));
    }
}
