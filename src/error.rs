use http::StatusCode;
use thiserror::Error;

/// The session store's error type.
///
/// "No session" and "record not found" are not errors: they come back as
/// `None`/`false` from the handle. Everything in here is a genuine failure
/// that the calling request handler has to turn into an error response.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A record could not be encoded for, or decoded from, the store.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Any other failure reported by the backing store.
    #[error("Store error: {0}")]
    Store(String),

    /// A write was attempted on a handle that has no session key.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A write succeeded but the handle had never loaded or created a
    /// session, so its cached copy cannot mirror the store.
    #[error("Stale handle: updated a session that was never loaded or created")]
    StaleHandle,

    /// The OS random source failed.
    #[error("Random source error: {0}")]
    Random(String),

    /// A configuration value is out of range.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A `Result` type that uses `SessionError` as the error type.
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Maps the error to the status code a request handler should answer
    /// with, logging it on the way.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SessionError::Redis(e) => {
                tracing::error!("Redis error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }

            SessionError::Serialization(msg) => {
                tracing::error!("Serialization error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }

            SessionError::Store(msg) => {
                tracing::error!("Store error: {}", msg);
                StatusCode::SERVICE_UNAVAILABLE
            }

            SessionError::InvalidOperation(msg) => {
                tracing::warn!("Invalid session operation: {}", msg);
                StatusCode::UNAUTHORIZED
            }

            SessionError::StaleHandle => {
                tracing::error!("Stale session handle");
                StatusCode::INTERNAL_SERVER_ERROR
            }

            SessionError::Random(msg) => {
                tracing::error!("Random source error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }

            SessionError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the error came from the backing store rather than from
    /// misuse of the handle.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            SessionError::Redis(_) | SessionError::Serialization(_) | SessionError::Store(_)
        )
    }
}
