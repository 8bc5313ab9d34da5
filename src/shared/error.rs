//! Error Types
//!
//! One error enum per layer. Lower layers convert upward with `#[from]`.

use std::time::Duration;

use crate::domain::models::EntityKind;
use crate::domain::value_objects::Scope;

/// Store backend errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} entries cannot be stored under {scope}")]
    InvalidScope { kind: EntityKind, scope: Scope },

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Payload decoding errors. Any of these drops the event.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported gateway opcode: {0}")]
    UnsupportedOpcode(u8),
}

/// Classified REST failures
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("Not found: {route}")]
    NotFound { route: String },

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Authorization rejected with status {status}")]
    PermanentAuth { status: u16 },

    #[error("Unexpected HTTP status {status}")]
    Http { status: u16 },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Undecodable response body: {0}")]
    Decode(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl RestError {
    /// Whether retrying the same request later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RestError::RateLimited { .. } | RestError::Transient(_))
    }
}

/// Broker and state controller faults. These are wiring bugs, not stale state.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Unknown scope {scope} for {kind}")]
    UnknownScope { kind: EntityKind, scope: Scope },

    #[error("{kind} entries cannot live under {scope}")]
    InvalidScope { kind: EntityKind, scope: Scope },

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidScope { kind, scope } => CacheError::InvalidScope { kind, scope },
            other => CacheError::Store(other),
        }
    }
}

/// Errors raised while processing a single gateway event
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Malformed payload: {0}")]
    Malformed(#[from] CodecError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Processing cancelled")]
    Cancelled,
}

/// Errors surfaced to application code by the client façade
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("REST error: {0}")]
    Rest(#[from] RestError),

    #[error("Decode error: {0}")]
    Decode(#[from] CodecError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0} entities cannot be fetched over REST")]
    NotFetchable(EntityKind),

    #[error("Configuration error: {0}")]
    Config(String),
}
