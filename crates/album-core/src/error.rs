//! Error types for the album pipeline.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote side refused the request (bad file id, missing rights, ...).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The remote side could not be reached or timed out.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// A grouped post stopped part-way. `message_ids` are already visible
    /// in the destination and still need cleaning up.
    #[error("post stopped after {} message(s): {reason}", .message_ids.len())]
    Partial { message_ids: Vec<i32>, reason: String },
}

impl TransportError {
    /// Messages the failed call left behind in the destination.
    pub fn delivered(&self) -> &[i32] {
        match self {
            TransportError::Partial { message_ids, .. } => message_ids,
            _ => &[],
        }
    }
}

/// Failure reported by a [`Repository`](crate::Repository) implementation.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// SQLite backend error.
    #[error(transparent)]
    Database(#[from] database::DatabaseError),

    /// The backend is temporarily unreachable.
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    /// A stored document could not be mapped back into a domain value.
    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Errors from core operations other than publishing.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An upload with no items cannot become an album.
    #[error("upload contains no media items")]
    EmptyUpload,

    /// Deletion delay below the configured floor.
    #[error("delete delay {requested:?} is below the minimum of {minimum:?}")]
    DeleteDelayTooShort { requested: Duration, minimum: Duration },

    /// Persistence failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Terminal outcomes of a publish attempt that did not deliver anything.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The key is unknown (invalid or expired link).
    #[error("no album or collection for key {key}")]
    NotFound { key: String },

    /// Restricted mode and the requester is not allow-listed.
    #[error("requester {requester} is not authorized")]
    Unauthorized { requester: i64 },

    /// The subscription gate is on and membership could not be verified.
    #[error("requester must join {channel} first")]
    SubscriptionRequired { channel: String },

    /// The key was published recently and its messages are still visible.
    #[error("key {key} was already published")]
    AlreadyPublished { key: String },

    /// Nothing could be sent.
    #[error("delivery of {key} failed: {reason}")]
    DeliveryFailed { key: String, reason: String },
}
