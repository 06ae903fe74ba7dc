use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Failure of a shared-store operation.
///
/// These never leave the cache layer: [`crate::cache::SharedCacheClient`]
/// turns every variant into [`crate::cache::StoreReply::Unavailable`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("shared store unavailable: {0}")]
    Unavailable(String),

    #[error("shared store timed out after {0:?}")]
    Timeout(Duration),

    #[error("shared store command failed: {0}")]
    Backend(String),

    #[error("payload codec error: {0}")]
    Codec(String),
}

impl StoreError {
    /// Connectivity problems, as opposed to a misbehaving command.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
        {
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Backend(e.to_string())
        }
    }
}

impl From<deadpool_redis::PoolError> for StoreError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Failure of a call to the text-generation service.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("judge API key is not configured")]
    MissingApiKey,

    #[error("judge request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("judge returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("judge returned no text")]
    EmptyResponse,
}

/// Errors surfaced to the caller of the game service.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("game session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("guess cannot be empty")]
    EmptyGuess,
}

/// Failure while assembling the runtime.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to build judge client: {0}")]
    Judge(#[from] JudgeError),
}
