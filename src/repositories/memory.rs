use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    crypto::token::SessionKey,
    error::{Result, SessionError},
    models::{attribute::Attributes, session::SessionRecord},
    repositories::session::SessionStore,
};

/// How many times each store operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub get: usize,
    pub put: usize,
    pub update: usize,
    pub delete: usize,
}

impl StoreCalls {
    /// The number of write calls (put + update).
    pub fn writes(&self) -> usize {
        self.put + self.update
    }

    /// The number of calls of any kind.
    pub fn total(&self) -> usize {
        self.get + self.put + self.update + self.delete
    }
}

#[derive(Default)]
struct Counters {
    get: AtomicUsize,
    put: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
}

struct Inner {
    table_name: String,
    table_exists: AtomicBool,
    items: RwLock<HashMap<SessionKey, SessionRecord>>,
    failure: RwLock<Option<String>>,
    counters: Counters,
}

/// An in-process session table.
///
/// Counts every call and can be told to fail, which makes it the store the
/// session lifecycle is tested against.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Creates a new `MemoryStore` with an existing, empty table.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                table_name: table_name.into(),
                table_exists: AtomicBool::new(true),
                items: RwLock::new(HashMap::new()),
                failure: RwLock::new(None),
                counters: Counters::default(),
            }),
        }
    }

    /// The name of the table.
    pub fn table_name(&self) -> &str {
        &self.inner.table_name
    }

    /// Creates the table. Creating an existing table is a no-op.
    pub async fn create_table(&self) {
        self.inner.table_exists.store(true, Ordering::SeqCst);
        tracing::debug!("🗄️ Table {} created", self.inner.table_name);
    }

    /// Deletes the table and every record in it.
    pub async fn delete_table(&self) {
        self.inner.table_exists.store(false, Ordering::SeqCst);
        self.inner.items.write().await.clear();
        tracing::debug!("🗑️ Table {} deleted", self.inner.table_name);
    }

    /// Stores a record directly, bypassing the call counters.
    pub async fn seed(&self, record: SessionRecord) {
        self.inner
            .items
            .write()
            .await
            .insert(record.key.clone(), record);
    }

    /// Reads a record directly, bypassing the call counters.
    pub async fn record(&self, key: &SessionKey) -> Option<SessionRecord> {
        self.inner.items.read().await.get(key).cloned()
    }

    /// The number of records in the table.
    pub async fn len(&self) -> usize {
        self.inner.items.read().await.len()
    }

    /// Whether the table holds no records.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Makes every following call fail with `message` until
    /// `clear_failure` is called.
    pub async fn fail_with(&self, message: impl Into<String>) {
        *self.inner.failure.write().await = Some(message.into());
    }

    /// Stops failing calls.
    pub async fn clear_failure(&self) {
        *self.inner.failure.write().await = None;
    }

    /// The calls made so far.
    pub fn calls(&self) -> StoreCalls {
        let c = &self.inner.counters;
        StoreCalls {
            get: c.get.load(Ordering::SeqCst),
            put: c.put.load(Ordering::SeqCst),
            update: c.update.load(Ordering::SeqCst),
            delete: c.delete.load(Ordering::SeqCst),
        }
    }

    /// Removes every expired record, the way a TTL reaper would.
    ///
    /// # Returns
    ///
    /// The number of records removed.
    pub async fn reap_expired(&self) -> usize {
        let now = Utc::now();
        let mut items = self.inner.items.write().await;
        let before = items.len();
        items.retain(|_, record| !record.is_expired_at(now));
        let removed = before - items.len();
        if removed > 0 {
            tracing::debug!("🧹 Reaped {} expired sessions from {}", removed, self.inner.table_name);
        }
        removed
    }

    async fn check_available(&self) -> Result<()> {
        if let Some(message) = self.inner.failure.read().await.as_ref() {
            return Err(SessionError::Store(message.clone()));
        }
        if !self.inner.table_exists.load(Ordering::SeqCst) {
            return Err(SessionError::Store(format!(
                "Table {} does not exist",
                self.inner.table_name
            )));
        }
        Ok(())
    }
}

impl SessionStore for MemoryStore {
    async fn get_item(&self, key: &SessionKey) -> Result<Option<SessionRecord>> {
        self.inner.counters.get.fetch_add(1, Ordering::SeqCst);
        self.check_available().await?;
        Ok(self.inner.items.read().await.get(key).cloned())
    }

    async fn put_item(&self, key: &SessionKey, data: &Attributes, expires_at: i64) -> Result<()> {
        self.inner.counters.put.fetch_add(1, Ordering::SeqCst);
        self.check_available().await?;
        let record = SessionRecord {
            key: key.clone(),
            data: Some(data.clone()),
            expires_at,
        };
        self.inner.items.write().await.insert(key.clone(), record);
        Ok(())
    }

    async fn update_item(
        &self,
        key: &SessionKey,
        data: &Attributes,
        expires_at: i64,
    ) -> Result<Attributes> {
        self.inner.counters.update.fetch_add(1, Ordering::SeqCst);
        self.check_available().await?;
        let mut items = self.inner.items.write().await;
        let record = items.entry(key.clone()).or_insert_with(|| SessionRecord {
            key: key.clone(),
            data: None,
            expires_at,
        });
        record.data = Some(data.clone());
        record.expires_at = expires_at;
        Ok(data.clone())
    }

    async fn delete_item(&self, key: &SessionKey) -> Result<()> {
        self.inner.counters.delete.fetch_add(1, Ordering::SeqCst);
        self.check_available().await?;
        self.inner.items.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attribute::attributes;

    fn key(value: &str) -> SessionKey {
        SessionKey::from_encoded(value)
    }

    #[tokio::test]
    async fn put_then_get_returns_record() {
        let store = MemoryStore::new("sessions");
        let data = attributes([("test", "ok")]);
        store.put_item(&key("k1"), &data, 100).await.unwrap();

        let record = store.get_item(&key("k1")).await.unwrap().unwrap();
        assert_eq!(record.data, Some(data));
        assert_eq!(record.expires_at, 100);
        assert_eq!(store.calls(), StoreCalls { get: 1, put: 1, update: 0, delete: 0 });
    }

    #[tokio::test]
    async fn update_upserts_and_returns_stored_mapping() {
        let store = MemoryStore::new("sessions");
        let data = attributes([("loggedin", true)]);
        let stored = store.update_item(&key("k1"), &data, 200).await.unwrap();
        assert_eq!(stored, data);
        assert_eq!(store.record(&key("k1")).await.unwrap().expires_at, 200);
    }

    #[tokio::test]
    async fn injected_failure_is_an_error() {
        let store = MemoryStore::new("sessions");
        store.fail_with("throttled").await;
        let err = store.get_item(&key("k1")).await.unwrap_err();
        assert!(matches!(err, SessionError::Store(ref m) if m == "throttled"));

        store.clear_failure().await;
        assert!(store.get_item(&key("k1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleted_table_rejects_calls_until_recreated() {
        let store = MemoryStore::new("sessions");
        store.put_item(&key("k1"), &Attributes::new(), 100).await.unwrap();
        store.delete_table().await;
        assert!(store.get_item(&key("k1")).await.is_err());

        store.create_table().await;
        assert!(store.get_item(&key("k1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reaper_removes_only_expired_records() {
        let store = MemoryStore::new("sessions");
        let now = Utc::now().timestamp();
        store.put_item(&key("old"), &Attributes::new(), now - 1).await.unwrap();
        store.put_item(&key("new"), &Attributes::new(), now + 600).await.unwrap();

        assert_eq!(store.reap_expired().await, 1);
        assert!(store.record(&key("old")).await.is_none());
        assert!(store.record(&key("new")).await.is_some());
    }
}
