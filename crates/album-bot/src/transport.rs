//! [`Transport`] implementation over the Telegram Bot API.

use album_core::{MediaItem, MediaKind, Transport, TransportError};
use async_trait::async_trait;
use telegram_client::{BotApiError, ChatRef, InputMedia, Message, PartialPost, TelegramClient};

/// Sends, deletes and archives through a [`TelegramClient`].
#[derive(Clone)]
pub struct TelegramTransport {
    client: TelegramClient,
    archive_chat: Option<ChatRef>,
}

impl TelegramTransport {
    pub fn new(client: TelegramClient, archive_chat: Option<ChatRef>) -> Self {
        Self {
            client,
            archive_chat,
        }
    }
}

/// Build the Bot API media list for a post. The caption goes on the first item.
pub fn input_media(items: &[MediaItem], caption: Option<&str>) -> Vec<InputMedia> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let media = match item.kind {
                MediaKind::Photo => InputMedia::photo(&item.file_id),
                MediaKind::Video => InputMedia::video(&item.file_id),
                MediaKind::Document => InputMedia::document(&item.file_id),
            };
            match caption {
                Some(caption) if index == 0 => media.with_caption(caption),
                _ => media,
            }
        })
        .collect()
}

fn transport_error(error: BotApiError) -> TransportError {
    let transient = match &error {
        BotApiError::Http(_) | BotApiError::Connection(_) => true,
        BotApiError::Api { code, .. } => *code == 429 || *code >= 500,
        _ => false,
    };
    if transient {
        TransportError::Unavailable(error.to_string())
    } else {
        TransportError::Rejected(error.to_string())
    }
}

fn message_ids(messages: &[Message]) -> Vec<i32> {
    messages.iter().map(|message| message.message_id).collect()
}

/// Keep the ids of groups that went out before the post broke off.
fn partial_post_error(partial: PartialPost) -> TransportError {
    if partial.sent.is_empty() {
        return transport_error(partial.error);
    }
    TransportError::Partial {
        message_ids: message_ids(&partial.sent),
        reason: partial.error.to_string(),
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_grouped_post(
        &self,
        destination: i64,
        items: &[MediaItem],
        caption: Option<&str>,
    ) -> Result<Vec<i32>, TransportError> {
        let messages = self
            .client
            .send_post(destination, input_media(items, caption))
            .await
            .map_err(partial_post_error)?;
        Ok(message_ids(&messages))
    }

    async fn delete_message(
        &self,
        destination: i64,
        message_id: i32,
    ) -> Result<(), TransportError> {
        self.client
            .delete_message(destination, message_id)
            .await
            .map_err(transport_error)
    }

    async fn verify_membership(&self, user: i64, channel: &str) -> Result<bool, TransportError> {
        let member = self
            .client
            .get_chat_member(ChatRef::parse(channel), user)
            .await
            .map_err(transport_error)?;
        Ok(member.is_member())
    }

    async fn archive(&self, from_chat: i64, message_id: i32) -> Result<(), TransportError> {
        let Some(archive_chat) = &self.archive_chat else {
            return Ok(());
        };
        self.client
            .forward_message(archive_chat.clone(), from_chat, message_id)
            .await
            .map_err(transport_error)?;
        Ok(())
    }
}
