use std::future::Future;

use crate::{
    crypto::token::SessionKey,
    error::Result,
    models::{attribute::Attributes, session::SessionRecord},
};

/// The key-value table session records live in.
///
/// Every operation is a single round-trip keyed by `SessionKey`; per-key
/// atomicity is whatever the backend gives. Implementations must surface
/// transport failures as errors and never as "not found".
pub trait SessionStore: Send + Sync + 'static {
    /// Fetches the record stored under `key`, if any.
    fn get_item(
        &self,
        key: &SessionKey,
    ) -> impl Future<Output = Result<Option<SessionRecord>>> + Send;

    /// Writes a new record, replacing whatever was stored under `key`.
    fn put_item(
        &self,
        key: &SessionKey,
        data: &Attributes,
        expires_at: i64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Replaces the attributes and expiry stored under `key`, creating the
    /// record if it is missing.
    ///
    /// # Returns
    ///
    /// The attribute mapping now stored under `key`.
    fn update_item(
        &self,
        key: &SessionKey,
        data: &Attributes,
        expires_at: i64,
    ) -> impl Future<Output = Result<Attributes>> + Send;

    /// Removes the record stored under `key`. Removing a missing record
    /// is not an error.
    fn delete_item(&self, key: &SessionKey) -> impl Future<Output = Result<()>> + Send;
}
