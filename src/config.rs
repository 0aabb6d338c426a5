use std::env;
use anyhow::{Context, Result};

use crate::error::SessionError;

/// The default session lifetime in minutes.
pub const DEFAULT_TTL_MINUTES: i64 = 15;
/// The longest session lifetime accepted, in minutes (366 days).
pub const MAX_TTL_MINUTES: i64 = 366 * 24 * 60;
/// The default table name.
pub const DEFAULT_TABLE_NAME: &str = "sessions";
/// The default Redis URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

const SECONDS_PER_MINUTE: i64 = 60;

/// Checks a session lifetime in minutes.
///
/// # Returns
///
/// The lifetime, if it lies in `1..=MAX_TTL_MINUTES`.
pub fn validate_ttl_minutes(ttl_minutes: i64) -> std::result::Result<i64, SessionError> {
    if !(1..=MAX_TTL_MINUTES).contains(&ttl_minutes) {
        return Err(SessionError::Config(format!(
            "session TTL must be between 1 and {} minutes, got {}",
            MAX_TTL_MINUTES, ttl_minutes
        )));
    }
    Ok(ttl_minutes)
}

/// The session store's configuration.
///
/// Built once at start-up and handed to `SessionManager::new`; nothing in
/// the session lifecycle reads the environment.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// The table (key namespace) holding session records.
    pub table_name: String,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// Always within `1..=MAX_TTL_MINUTES`.
    ttl_minutes: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            ttl_minutes: DEFAULT_TTL_MINUTES,
        }
    }
}

impl SessionConfig {
    /// Creates a new `SessionConfig` from environment variables.
    ///
    /// Reads a `.env` file first if one exists.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `SessionConfig`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let ttl_minutes: i64 = env::var("SESSION_TTL_MINUTES")
            .unwrap_or_else(|_| DEFAULT_TTL_MINUTES.to_string())
            .parse()
            .context("Invalid SESSION_TTL_MINUTES")?;

        Ok(Self {
            table_name: env::var("SESSION_TABLE")
                .context("SESSION_TABLE must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            ttl_minutes: validate_ttl_minutes(ttl_minutes)
                .context("Invalid SESSION_TTL_MINUTES")?,
        })
    }

    /// Sets the table name.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Sets the session lifetime in minutes.
    ///
    /// Fails with `SessionError::Config` outside `1..=MAX_TTL_MINUTES`.
    pub fn with_ttl_minutes(mut self, ttl_minutes: i64) -> std::result::Result<Self, SessionError> {
        self.ttl_minutes = validate_ttl_minutes(ttl_minutes)?;
        Ok(self)
    }

    /// The session lifetime in minutes.
    pub fn ttl_minutes(&self) -> i64 {
        self.ttl_minutes
    }

    /// The session lifetime in seconds.
    pub fn ttl_seconds(&self) -> i64 {
        // Bounded by MAX_TTL_MINUTES, far from overflowing.
        self.ttl_minutes
            .checked_mul(SECONDS_PER_MINUTE)
            .unwrap_or(MAX_TTL_MINUTES * SECONDS_PER_MINUTE)
    }
}
