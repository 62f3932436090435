//! Update and message types received from the Bot API.

use serde::{Deserialize, Serialize};

/// An incoming update from `getUpdates`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Update {
    /// Monotonic update identifier, used as the polling offset.
    pub update_id: i64,

    /// New incoming message.
    #[serde(default)]
    pub message: Option<Message>,

    /// Inline keyboard button press.
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// A Telegram user or bot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier.
    pub id: i64,

    #[serde(default)]
    pub is_bot: bool,

    #[serde(default)]
    pub first_name: String,

    /// Username without the leading `@`.
    #[serde(default)]
    pub username: Option<String>,
}

/// A chat (private, group, supergroup or channel).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chat {
    /// Unique chat identifier.
    pub id: i64,

    /// Chat type ("private", "group", "supergroup", "channel").
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub username: Option<String>,
}

impl Chat {
    /// Whether this is a one-to-one chat with the bot.
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

/// One size of a photo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhotoSize {
    /// Identifier usable to resend the file.
    pub file_id: String,

    #[serde(default)]
    pub file_unique_id: String,

    #[serde(default)]
    pub width: u32,

    #[serde(default)]
    pub height: u32,

    #[serde(default)]
    pub file_size: Option<u64>,
}

/// A video, document, animation or audio file reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileRef {
    /// Identifier usable to resend the file.
    pub file_id: String,

    #[serde(default)]
    pub file_unique_id: String,

    #[serde(default)]
    pub file_name: Option<String>,

    #[serde(default)]
    pub mime_type: Option<String>,
}

/// A special entity in a text message (command, link, mention...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageEntity {
    /// Entity type ("bot_command", "url", "text_link", ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Offset in UTF-16 code units.
    #[serde(default)]
    pub offset: usize,

    /// Length in UTF-16 code units.
    #[serde(default)]
    pub length: usize,

    /// Target URL for "text_link" entities.
    #[serde(default)]
    pub url: Option<String>,
}

/// A message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    /// Identifier unique inside the chat.
    pub message_id: i32,

    /// Sender (absent for channel posts).
    #[serde(default)]
    pub from: Option<User>,

    /// Chat the message belongs to.
    #[serde(default)]
    pub chat: Chat,

    /// Unix timestamp. Zero for inaccessible messages.
    #[serde(default)]
    pub date: i64,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub caption: Option<String>,

    /// Shared by all messages of one album.
    #[serde(default)]
    pub media_group_id: Option<String>,

    /// Available sizes, smallest first.
    #[serde(default)]
    pub photo: Vec<PhotoSize>,

    #[serde(default)]
    pub video: Option<FileRef>,

    #[serde(default)]
    pub document: Option<FileRef>,

    #[serde(default)]
    pub animation: Option<FileRef>,

    #[serde(default)]
    pub audio: Option<FileRef>,

    #[serde(default)]
    pub entities: Vec<MessageEntity>,

    #[serde(default)]
    pub caption_entities: Vec<MessageEntity>,

    #[serde(default)]
    pub reply_to_message: Option<Box<Message>>,
}

impl Message {
    /// Sender user id, if the message has a sender.
    pub fn sender_id(&self) -> Option<i64> {
        self.from.as_ref().map(|u| u.id)
    }

    /// The largest available photo size.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo.last()
    }

    /// URLs of all "text_link" entities in the text and caption.
    pub fn text_links(&self) -> impl Iterator<Item = &str> {
        self.entities
            .iter()
            .chain(self.caption_entities.iter())
            .filter(|e| e.kind == "text_link")
            .filter_map(|e| e.url.as_deref())
    }
}

/// A callback query from an inline keyboard button.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Identifier to pass to `answerCallbackQuery`.
    pub id: String,

    /// User who pressed the button.
    pub from: User,

    /// Message carrying the keyboard.
    #[serde(default)]
    pub message: Option<Message>,

    /// Data attached to the button.
    #[serde(default)]
    pub data: Option<String>,
}
