//! Cookie-keyed server-side sessions in a key-value table with expiry.
//!
//! A request's `Cookie` header carries a random token. The token is hashed
//! into the storage key, so the table never holds a usable cookie value.
//! Each request gets a [`SessionHandle`] that loads, creates and updates
//! the session's attributes; every write renews the record's expiry.
//!
//! ```no_run
//! use kv_sessions::{SessionConfig, SessionManager, attributes, cookie};
//! use kv_sessions::repositories::redis::RedisStore;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = SessionConfig::from_env()?;
//! let store = RedisStore::connect(&config).await?;
//! let sessions = SessionManager::new(store, config);
//!
//! let mut session = sessions.init(Some("session=abc")).await?;
//! if !session.is_loaded() {
//!     session.create(attributes([("loggedin", false)])).await?;
//! }
//! session.set_value("loggedin", true).await?;
//! let set_cookie = session.set_cookie_header();
//! # let _ = (set_cookie, cookie::SESSION_COOKIE_NAME);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cookie;
pub mod error;

pub mod crypto {
    pub mod token;
}

pub mod models {
    pub mod attribute;
    pub mod session;
}

pub mod repositories {
    pub mod memory;
    pub mod redis;
    pub mod session;
}

pub mod services {
    pub mod session;
}

pub use config::SessionConfig;
pub use crypto::token::{SessionKey, SessionToken};
pub use error::{Result, SessionError};
pub use models::attribute::{AttributeValue, Attributes, FromAttribute, attributes};
pub use models::session::SessionRecord;
pub use repositories::session::SessionStore;
pub use services::session::{HandleState, SessionHandle, SessionManager};
