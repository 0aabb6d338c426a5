use std::collections::HashMap;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};

use crate::{
    config::SessionConfig,
    crypto::token::SessionKey,
    error::{Result, SessionError},
    models::{
        attribute::{AttributeValue, Attributes},
        session::SessionRecord,
    },
    repositories::session::SessionStore,
};

/// The number of keys requested per SCAN round-trip.
const SCAN_BATCH_SIZE: usize = 100;

/// A type-tagged attribute value as stored in Redis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum WireValue {
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// Numbers travel as strings so no precision is lost in JSON.
    #[serde(rename = "N")]
    N(String),
}

/// A session record as stored in Redis.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecord {
    key: SessionKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<HashMap<String, WireValue>>,
    expires_at: i64,
}

fn to_wire(value: &AttributeValue) -> WireValue {
    match value {
        AttributeValue::Text(s) => WireValue::S(s.clone()),
        AttributeValue::Boolean(b) => WireValue::Bool(*b),
        AttributeValue::Number(n) => WireValue::N(n.to_string()),
    }
}

fn from_wire(name: &str, value: WireValue) -> Result<AttributeValue> {
    Ok(match value {
        WireValue::S(s) => AttributeValue::Text(s),
        WireValue::Bool(b) => AttributeValue::Boolean(b),
        WireValue::N(n) => AttributeValue::Number(n.parse().map_err(|_| {
            SessionError::Serialization(format!("Attribute {} is not a number: {}", name, n))
        })?),
    })
}

fn encode_record(key: &SessionKey, data: &Attributes, expires_at: i64) -> Result<String> {
    let record = WireRecord {
        key: key.clone(),
        data: Some(data.iter().map(|(k, v)| (k.clone(), to_wire(v))).collect()),
        expires_at,
    };
    sonic_rs::to_string(&record)
        .map_err(|e| SessionError::Serialization(format!("Session serialization failed: {}", e)))
}

fn decode_record(raw: &str) -> Result<SessionRecord> {
    let record: WireRecord = sonic_rs::from_str(raw)
        .map_err(|e| SessionError::Serialization(format!("Invalid session JSON: {}", e)))?;

    let data = match record.data {
        Some(wire) => Some(
            wire
                .into_iter()
                .map(|(name, value)| from_wire(&name, value).map(|v| (name, v)))
                .collect::<Result<Attributes>>()?,
        ),
        None => None,
    };

    Ok(SessionRecord {
        key: record.key,
        data,
        expires_at: record.expires_at,
    })
}

/// A session table in Redis.
///
/// Each record is a JSON document under `<table>:<key>`, written with
/// `EXAT` so Redis itself reaps it at `expiresAt`.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    table_name: String,
}

impl RedisStore {
    /// Connects to the Redis server named in the configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The session configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `RedisStore`.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("✅ Redis Connection Manager initialized for table {}", config.table_name);
        Ok(Self::from_manager(conn, config.table_name.clone()))
    }

    /// Creates a `RedisStore` on an existing connection manager.
    pub fn from_manager(conn: ConnectionManager, table_name: impl Into<String>) -> Self {
        Self {
            conn,
            table_name: table_name.into(),
        }
    }

    /// The name of the table.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn item_key(&self, key: &SessionKey) -> String {
        format!("{}:{}", self.table_name, key)
    }

    async fn set_record(&self, key: &SessionKey, data: &Attributes, expires_at: i64) -> Result<()> {
        let json = encode_record(key, data, expires_at)?;
        let _: () = redis::cmd("SET")
            .arg(self.item_key(key))
            .arg(&json)
            .arg("EXAT")
            .arg(expires_at)
            .query_async(&mut self.conn.clone())
            .await
            .map_err(|e| {
                tracing::error!("❌ Redis SET failed for session {}: {}", key, e);
                SessionError::Redis(e)
            })?;
        Ok(())
    }

    /// Redis has no tables; a table exists as soon as a record is written.
    pub async fn create_table(&self) -> Result<()> {
        tracing::debug!("🗄️ Table {} ready", self.table_name);
        Ok(())
    }

    /// Deletes every record of the table.
    ///
    /// # Returns
    ///
    /// The number of records removed.
    pub async fn delete_table(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}:*", self.table_name);
        let mut cursor: u64 = 0;
        let mut removed = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let _: () = conn.del(&keys).await?;
                removed += keys.len();
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::debug!("🗑️ Table {} deleted ({} records)", self.table_name, removed);
        Ok(removed)
    }
}

impl SessionStore for RedisStore {
    async fn get_item(&self, key: &SessionKey) -> Result<Option<SessionRecord>> {
        let raw: Option<String> = self
            .conn
            .clone()
            .get(self.item_key(key))
            .await
            .map_err(|e| {
                tracing::error!("❌ Redis GET failed for session {}: {}", key, e);
                SessionError::Redis(e)
            })?;

        raw.map(|r| decode_record(&r)).transpose()
    }

    async fn put_item(&self, key: &SessionKey, data: &Attributes, expires_at: i64) -> Result<()> {
        self.set_record(key, data, expires_at).await
    }

    async fn update_item(
        &self,
        key: &SessionKey,
        data: &Attributes,
        expires_at: i64,
    ) -> Result<Attributes> {
        self.set_record(key, data, expires_at).await?;
        Ok(data.clone())
    }

    async fn delete_item(&self, key: &SessionKey) -> Result<()> {
        let _: () = self
            .conn
            .clone()
            .del(self.item_key(key))
            .await
            .map_err(|e| {
                tracing::error!("❌ Redis DEL failed for session {}: {}", key, e);
                SessionError::Redis(e)
            })?;
        Ok(())
    }
}
