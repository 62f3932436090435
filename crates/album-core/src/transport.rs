//! Outbound transport seam.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::MediaItem;

/// Operations the pipeline needs from the messaging transport.
///
/// Message ids are transport-assigned references to posted messages.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `items` to `destination` as one grouped post, in order.
    ///
    /// `caption` goes on the first item only. Returns the produced message ids.
    /// A post that fails after some messages went out reports them through
    /// [`TransportError::Partial`].
    async fn send_grouped_post(
        &self,
        destination: i64,
        items: &[MediaItem],
        caption: Option<&str>,
    ) -> Result<Vec<i32>, TransportError>;

    /// Delete one posted message.
    async fn delete_message(&self, destination: i64, message_id: i32)
        -> Result<(), TransportError>;

    /// Whether `user` is a member of `channel`.
    async fn verify_membership(&self, user: i64, channel: &str) -> Result<bool, TransportError>;

    /// Copy an inbound message to the archive chat, if one is configured.
    async fn archive(&self, from_chat: i64, message_id: i32) -> Result<(), TransportError>;
}
