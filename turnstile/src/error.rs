//! Error types for queue operations and their backing stores.

use thiserror::Error;

use crate::participant::{ParticipantId, ParticipantStatus};

/// Failure reported by a [`ParticipantStore`](crate::ParticipantStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data could not be interpreted.
    #[error("corrupt store data: {0}")]
    Corrupt(String),

    #[error("unsupported store backend: {0}")]
    Unsupported(&'static str),
}

/// Error returned by [`QueueEngine`](crate::QueueEngine) operations.
///
/// Nothing is retried internally. Only [`QueueError::StoreUnavailable`]
/// may succeed on retry; see [`QueueError::is_transient`].
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("unknown participant {0}")]
    NotFound(ParticipantId),

    #[error("participant {id} is {status}, not draft")]
    NotInDraft {
        id: ParticipantId,
        status: ParticipantStatus,
    },

    #[error("participant store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("invalid queue configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl QueueError {
    pub fn is_transient(&self) -> bool {
        matches!(self, QueueError::StoreUnavailable(_))
    }
}

/// Invalid queue configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },
}
