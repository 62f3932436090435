//! Error types for telegram-client.

use thiserror::Error;

use crate::types::Message;

/// Errors that can occur when talking to the Bot API.
#[derive(Debug, Error)]
pub enum BotApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The Bot API answered with `ok: false`.
    #[error("API error {code}: {description}")]
    Api {
        code: i32,
        description: String,
        /// Seconds to wait before retrying (flood control).
        retry_after: Option<u64>,
    },

    /// Non-JSON response from the server.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A request that needs at least one item was given none.
    #[error("Nothing to send")]
    EmptyMedia,
}

impl BotApiError {
    /// Flood-control hint from the server, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            BotApiError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// A multi-group post that failed part-way.
///
/// `sent` holds the messages already visible in the chat before `error`
/// stopped the post; it is empty when nothing went out.
#[derive(Debug, Error)]
#[error("post stopped after {} message(s): {error}", .sent.len())]
pub struct PartialPost {
    pub sent: Vec<Message>,
    #[source]
    pub error: BotApiError,
}

impl PartialPost {
    fn new(sent: Vec<Message>, error: BotApiError) -> Self {
        Self { sent, error }
    }

    pub(crate) fn nothing_sent(error: BotApiError) -> Self {
        Self::new(Vec::new(), error)
    }

    pub(crate) fn after(sent: Vec<Message>, error: BotApiError) -> Self {
        Self::new(sent, error)
    }
}

impl From<PartialPost> for BotApiError {
    fn from(partial: PartialPost) -> Self {
        partial.error
    }
}
