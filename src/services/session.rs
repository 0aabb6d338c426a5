use std::sync::Arc;

use chrono::Utc;
use http::HeaderMap;

use crate::{
    config::SessionConfig,
    cookie,
    crypto::token::{self, SessionKey, SessionToken},
    error::{Result, SessionError},
    models::{
        attribute::{AttributeValue, Attributes, FromAttribute},
        session::expiry_from,
    },
    repositories::session::SessionStore,
};

/// The attribute that marks a session as logged in.
pub const LOGGED_IN_ATTRIBUTE: &str = "loggedin";

/// Where a handle is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Constructed from a cookie (or none); nothing read or written yet.
    New,
    /// A record was loaded from the store.
    Loaded,
    /// A new session was written by this handle.
    Created,
    /// At least one update went through.
    Mutated,
    /// A write was refused, or went through on a handle whose copy cannot
    /// mirror the store. Without a token only `create` recovers it.
    Failed,
}

/// Opens per-request session handles on a shared store.
///
/// Cheap to clone; build one at start-up and hand clones to request
/// handlers.
pub struct SessionManager<S> {
    store: Arc<S>,
    config: SessionConfig,
}

impl<S> Clone for SessionManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: SessionStore> SessionManager<S> {
    /// Creates a new `SessionManager`.
    ///
    /// # Arguments
    ///
    /// * `store` - The table session records live in.
    /// * `config` - The session configuration.
    pub fn new(store: S, config: SessionConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// Overrides the configured session lifetime for this manager.
    ///
    /// Fails with `SessionError::Config` for a lifetime the configuration
    /// would reject.
    pub fn with_ttl_minutes(mut self, ttl_minutes: i64) -> Result<Self> {
        self.config = self.config.with_ttl_minutes(ttl_minutes)?;
        Ok(self)
    }

    /// The configuration in use.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Opens a handle for a request carrying `cookie_header`.
    ///
    /// Nothing is read from the store yet.
    pub fn handle(&self, cookie_header: Option<&str>) -> SessionHandle<S> {
        let session_token = cookie_header.and_then(cookie::decode);
        SessionHandle::new(Arc::clone(&self.store), self.config.ttl_seconds(), session_token)
    }

    /// Opens a handle for a request with the given headers.
    pub fn handle_from_headers(&self, headers: &HeaderMap) -> SessionHandle<S> {
        let session_token = cookie::decode_headers(headers);
        SessionHandle::new(Arc::clone(&self.store), self.config.ttl_seconds(), session_token)
    }

    /// Opens a handle for a request and loads its session.
    ///
    /// A missing cookie or record leaves the handle unloaded; check
    /// `SessionHandle::is_loaded`.
    pub async fn init(&self, cookie_header: Option<&str>) -> Result<SessionHandle<S>> {
        let mut handle = self.handle(cookie_header);
        handle.load().await?;
        Ok(handle)
    }
}

/// The session of a single request.
///
/// Owns the token from the cookie, the key derived from it and, once
/// loaded, a copy of the attributes. Not meant to be shared between tasks.
pub struct SessionHandle<S> {
    store: Arc<S>,
    ttl_seconds: i64,
    token: Option<SessionToken>,
    key: Option<SessionKey>,
    cache: Option<Attributes>,
    state: HandleState,
}

impl<S: SessionStore> SessionHandle<S> {
    fn new(store: Arc<S>, ttl_seconds: i64, session_token: Option<SessionToken>) -> Self {
        let key = session_token.as_ref().map(token::derive_key);
        Self {
            store,
            ttl_seconds,
            token: session_token,
            key,
            cache: None,
            state: HandleState::New,
        }
    }

    /// The session token, if the request sent one or a session was created.
    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    /// The storage key derived from the token.
    pub fn key(&self) -> Option<&SessionKey> {
        self.key.as_ref()
    }

    /// The lifecycle state.
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// The lifetime every write gives the session, in seconds.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Whether attributes are available without a store round-trip.
    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }

    /// The `Set-Cookie` header value for this session.
    pub fn set_cookie_header(&self) -> String {
        cookie::encode(self.token.as_ref())
    }

    /// Loads the session record.
    ///
    /// # Returns
    ///
    /// `true` if a live record was found. A handle without a token, a
    /// missing record, a record without attributes and an expired record
    /// all give `false` and drop whatever the handle had cached. Store
    /// failures are errors and leave the handle untouched.
    pub async fn load(&mut self) -> Result<bool> {
        let Some(key) = self.key.as_ref() else {
            tracing::debug!("No session cookie, nothing to load");
            return Ok(false);
        };

        let record = self.store.get_item(key).await.map_err(|e| {
            tracing::error!("❌ Failed to load session {}: {}", key, e);
            e
        })?;

        let Some(record) = record else {
            tracing::debug!("Session {} not found", key);
            self.forget_cached();
            return Ok(false);
        };

        if record.is_expired_at(Utc::now()) {
            tracing::debug!("Session {} expired at {}", key, record.expires_at);
            self.forget_cached();
            return Ok(false);
        }

        let Some(data) = record.data else {
            tracing::warn!("⚠️ Session {} has no data attribute, ignoring it", key);
            self.forget_cached();
            return Ok(false);
        };

        tracing::debug!("✅ Session {} loaded", key);
        self.cache = Some(data);
        self.state = HandleState::Loaded;
        Ok(true)
    }

    fn forget_cached(&mut self) {
        self.cache = None;
        self.state = HandleState::New;
    }

    /// Starts a new session holding `attributes`.
    ///
    /// A fresh token replaces whatever token the handle had; the old
    /// session, if any, is left to expire.
    ///
    /// # Returns
    ///
    /// The new token, to be sent back with `set_cookie_header`.
    pub async fn create(&mut self, attributes: Attributes) -> Result<SessionToken> {
        let new_token = token::generate()?;
        let new_key = token::derive_key(&new_token);
        let expires_at = expiry_from(Utc::now(), self.ttl_seconds)?;

        self.store
            .put_item(&new_key, &attributes, expires_at)
            .await
            .map_err(|e| {
                tracing::error!("❌ Failed to create session: {}", e);
                e
            })?;

        tracing::info!("✅ Session {} created, expires at {}", new_key, expires_at);

        self.token = Some(new_token.clone());
        self.key = Some(new_key);
        self.cache = Some(attributes);
        self.state = HandleState::Created;
        Ok(new_token)
    }

    /// Replaces the session's attributes with `attributes` and renews its
    /// expiry.
    ///
    /// Fails without contacting the store when the handle has no session.
    /// Fails after the write when the handle never loaded or created the
    /// session, since its copy would no longer match the store.
    pub async fn update(&mut self, attributes: Attributes) -> Result<()> {
        let Some(key) = self.key.as_ref() else {
            tracing::warn!("❌ Update attempted without a session");
            self.state = HandleState::Failed;
            return Err(SessionError::InvalidOperation(
                "cannot update a session without a session cookie".to_string(),
            ));
        };

        let expires_at = expiry_from(Utc::now(), self.ttl_seconds)?;
        let stored = self
            .store
            .update_item(key, &attributes, expires_at)
            .await
            .map_err(|e| {
                tracing::error!("❌ Failed to update session {}: {}", key, e);
                e
            })?;

        if self.cache.is_none() {
            tracing::error!("❌ Session {} updated on a handle that never loaded it", key);
            self.state = HandleState::Failed;
            return Err(SessionError::StaleHandle);
        }

        tracing::debug!("✅ Session {} updated, expires at {}", key, expires_at);
        self.cache = Some(stored);
        self.state = HandleState::Mutated;
        Ok(())
    }

    /// Deletes the session record and forgets the token.
    ///
    /// Send `cookie::encode_removal()` to clear the client's cookie.
    pub async fn destroy(&mut self) -> Result<()> {
        let Some(key) = self.key.take() else {
            tracing::debug!("No session to destroy");
            return Ok(());
        };

        if let Err(e) = self.store.delete_item(&key).await {
            tracing::error!("❌ Failed to delete session {}: {}", key, e);
            self.key = Some(key);
            return Err(e);
        }

        tracing::info!("✅ Session {} deleted", key);
        self.token = None;
        self.cache = None;
        self.state = HandleState::New;
        Ok(())
    }

    /// The cached value of an attribute.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.cache.as_ref()?.get(name)
    }

    /// All cached attributes, if the session is loaded.
    pub fn attributes(&self) -> Option<&Attributes> {
        self.cache.as_ref()
    }

    /// The cached value of an attribute as a `T`.
    ///
    /// `None` when the session is not loaded, the attribute is missing or
    /// it holds another type.
    pub fn get_value<T: FromAttribute>(&self, name: &str) -> Option<T> {
        self.attribute(name).and_then(T::from_attribute)
    }

    /// Whether the session carries `loggedin = true`.
    pub fn is_logged_in(&self) -> bool {
        self.get_value::<bool>(LOGGED_IN_ATTRIBUTE).unwrap_or(false)
    }

    /// Sets one attribute, keeping the others.
    pub async fn set_value(
        &mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Result<()> {
        let mut values = Attributes::new();
        values.insert(name.into(), value.into());
        self.set_values(values).await
    }

    /// Sets several attributes in a single write, keeping the others.
    ///
    /// Loads the session first when nothing is cached. The load and the
    /// write are separate round-trips: concurrent writers to the same
    /// session overwrite each other.
    pub async fn set_values(&mut self, values: Attributes) -> Result<()> {
        if self.cache.is_none() {
            self.load().await?;
        }

        let mut merged = self.cache.clone().unwrap_or_default();
        merged.extend(values);
        self.update(merged).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attribute::attributes;
    use crate::repositories::memory::MemoryStore;

    fn manager() -> SessionManager<MemoryStore> {
        SessionManager::new(MemoryStore::new("sessions"), SessionConfig::default())
    }

    #[tokio::test]
    async fn new_handle_without_cookie_is_empty() {
        let manager = manager();
        let handle = manager.handle(None);
        assert_eq!(handle.state(), HandleState::New);
        assert!(handle.token().is_none());
        assert!(handle.key().is_none());
        assert!(!handle.is_logged_in());
        assert!(handle.get_value::<String>("anything").is_none());
    }

    #[tokio::test]
    async fn handle_key_is_derived_from_cookie() {
        let manager = manager();
        let handle = manager.handle(Some("session=12345;"));
        assert_eq!(
            handle.key(),
            Some(&token::derive_key(&SessionToken::new("12345")))
        );
    }

    #[tokio::test]
    async fn create_moves_to_created_and_caches() {
        let manager = manager();
        let mut handle = manager.handle(None);
        let token = handle.create(attributes([("test", "ok")])).await.unwrap();

        assert_eq!(handle.state(), HandleState::Created);
        assert_eq!(handle.token(), Some(&token));
        assert_eq!(handle.get_value::<String>("test").as_deref(), Some("ok"));
        assert!(handle.set_cookie_header().starts_with(&format!("session={}", token.as_str())));
    }

    #[tokio::test]
    async fn update_without_session_fails_and_marks_handle() {
        let manager = manager();
        let mut handle = manager.handle(Some(""));
        let err = handle.update(Attributes::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidOperation(_)));
        assert_eq!(handle.state(), HandleState::Failed);
        assert_eq!(manager.store().calls().total(), 0);

        handle.create(Attributes::new()).await.unwrap();
        assert_eq!(handle.state(), HandleState::Created);
        handle.set_value("k", "v").await.unwrap();
        assert_eq!(handle.state(), HandleState::Mutated);
    }

    #[tokio::test]
    async fn update_on_never_loaded_handle_is_stale() {
        let manager = manager();
        let mut handle = manager.handle(Some("session=unknown"));
        let err = handle.update(attributes([("a", "b")])).await.unwrap_err();
        assert!(matches!(err, SessionError::StaleHandle));
        assert_eq!(handle.state(), HandleState::Failed);
        assert_eq!(manager.store().calls().update, 1);
    }

    #[tokio::test]
    async fn destroy_without_session_is_a_no_op() {
        let manager = manager();
        let mut handle = manager.handle(None);
        handle.destroy().await.unwrap();
        assert_eq!(manager.store().calls().total(), 0);
    }
}
