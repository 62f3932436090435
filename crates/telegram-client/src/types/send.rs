//! Types for sending requests to the Bot API.

use serde::{Deserialize, Serialize};

/// Maximum number of items in one `sendMediaGroup` call.
pub const MAX_MEDIA_GROUP: usize = 10;

/// A chat addressed by numeric id or by public `@username`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatRef {
    Id(i64),
    Username(String),
}

impl ChatRef {
    /// Parse a configured chat reference: numeric ids stay numeric,
    /// `t.me/<name>` links become `@name`, anything else is treated as a
    /// username and gets a leading `@`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(id) = raw.parse::<i64>() {
            return ChatRef::Id(id);
        }
        let name = link_name(raw).unwrap_or(raw);
        ChatRef::Username(format!("@{}", name.trim_start_matches('@')))
    }

    /// Like [`ChatRef::parse`], but only for references the Bot API can look
    /// up: ids, usernames and public links. Invite links and malformed
    /// names give `None`.
    pub fn parse_public(raw: &str) -> Option<Self> {
        let parsed = Self::parse(raw);
        match &parsed {
            ChatRef::Id(_) => Some(parsed),
            ChatRef::Username(name) => {
                let name = name.trim_start_matches('@');
                let valid = !name.is_empty()
                    && name != "joinchat"
                    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                valid.then_some(parsed)
            }
        }
    }
}

/// The first path segment of a `t.me` or `telegram.me` link.
fn link_name(raw: &str) -> Option<&str> {
    let rest = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .unwrap_or(raw);
    let path = ["t.me/", "www.t.me/", "telegram.me/", "www.telegram.me/"]
        .iter()
        .find_map(|host| rest.strip_prefix(host))?;
    path.split(|c| matches!(c, '/' | '?' | '#')).next()
}

impl From<i64> for ChatRef {
    fn from(id: i64) -> Self {
        ChatRef::Id(id)
    }
}

impl std::fmt::Display for ChatRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRef::Id(id) => write!(f, "{}", id),
            ChatRef::Username(name) => write!(f, "{}", name),
        }
    }
}

/// Parameters for `sendMessage`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageParams {
    pub chat_id: ChatRef,

    pub text: String,

    /// "HTML" or "MarkdownV2".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i32>,
}

impl SendMessageParams {
    /// Plain text message.
    pub fn text(chat_id: impl Into<ChatRef>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            parse_mode: None,
            reply_markup: None,
            reply_to_message_id: None,
        }
    }

    /// HTML-formatted message.
    pub fn html(chat_id: impl Into<ChatRef>, text: impl Into<String>) -> Self {
        Self {
            parse_mode: Some("HTML".to_string()),
            ..Self::text(chat_id, text)
        }
    }

    /// Attach an inline keyboard.
    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.reply_markup = Some(keyboard);
        self
    }

    /// Reply to another message.
    pub fn replying_to(mut self, message_id: i32) -> Self {
        self.reply_to_message_id = Some(message_id);
        self
    }
}

/// Body shared by all `InputMedia*` variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputMediaBody {
    /// File id of a file already on Telegram servers.
    pub media: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// One item of a media group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputMedia {
    Photo(InputMediaBody),
    Video(InputMediaBody),
    Document(InputMediaBody),
}

impl InputMedia {
    pub fn photo(file_id: impl Into<String>) -> Self {
        InputMedia::Photo(InputMediaBody {
            media: file_id.into(),
            caption: None,
        })
    }

    pub fn video(file_id: impl Into<String>) -> Self {
        InputMedia::Video(InputMediaBody {
            media: file_id.into(),
            caption: None,
        })
    }

    pub fn document(file_id: impl Into<String>) -> Self {
        InputMedia::Document(InputMediaBody {
            media: file_id.into(),
            caption: None,
        })
    }

    /// Set the caption shown under this item.
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.body_mut().caption = Some(caption.into());
        self
    }

    pub fn body(&self) -> &InputMediaBody {
        match self {
            InputMedia::Photo(b) | InputMedia::Video(b) | InputMedia::Document(b) => b,
        }
    }

    fn body_mut(&mut self) -> &mut InputMediaBody {
        match self {
            InputMedia::Photo(b) | InputMedia::Video(b) | InputMedia::Document(b) => b,
        }
    }

    /// Photos and videos may share a media group; documents only group
    /// with other documents.
    pub fn is_document(&self) -> bool {
        matches!(self, InputMedia::Document(_))
    }

    /// Bot API method and file field for sending this item on its own.
    pub fn single_method(&self) -> (&'static str, &'static str) {
        match self {
            InputMedia::Photo(_) => ("sendPhoto", "photo"),
            InputMedia::Video(_) => ("sendVideo", "video"),
            InputMedia::Document(_) => ("sendDocument", "document"),
        }
    }
}

/// Split a post into sendable groups: consecutive runs of compatible media,
/// at most [`MAX_MEDIA_GROUP`] items each, original order preserved.
pub fn split_media_groups(media: Vec<InputMedia>) -> Vec<Vec<InputMedia>> {
    let mut groups: Vec<Vec<InputMedia>> = Vec::new();

    for item in media {
        let fits = groups.last().is_some_and(|group| {
            group.len() < MAX_MEDIA_GROUP && group[0].is_document() == item.is_document()
        });
        if fits {
            if let Some(group) = groups.last_mut() {
                group.push(item);
            }
        } else {
            groups.push(vec![item]);
        }
    }

    groups
}

/// Parameters for `sendMediaGroup`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMediaGroupParams {
    pub chat_id: ChatRef,
    pub media: Vec<InputMedia>,
}

/// Parameters for `forwardMessage`.
#[derive(Debug, Clone, Serialize)]
pub struct ForwardMessageParams {
    pub chat_id: ChatRef,
    pub from_chat_id: i64,
    pub message_id: i32,
}

/// Parameters for `deleteMessage`.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteMessageParams {
    pub chat_id: ChatRef,
    pub message_id: i32,
}

/// Parameters for `getChat`.
#[derive(Debug, Clone, Serialize)]
pub struct GetChatParams {
    pub chat_id: ChatRef,
}

/// Parameters for `getChatMember`.
#[derive(Debug, Clone, Serialize)]
pub struct GetChatMemberParams {
    pub chat_id: ChatRef,
    pub user_id: i64,
}

/// Parameters for `answerCallbackQuery`.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerCallbackParams {
    pub callback_query_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub show_alert: bool,
}

/// Parameters for `getUpdates`.
#[derive(Debug, Clone, Serialize)]
pub struct GetUpdatesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,

    /// Long-polling timeout in seconds.
    pub timeout: u64,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_updates: Vec<String>,
}

/// Inline keyboard attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// One button per row.
    pub fn column(buttons: Vec<InlineKeyboardButton>) -> Self {
        Self {
            inline_keyboard: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }
}

/// A button of an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineKeyboardButton {
    /// Button that sends `data` back as a callback query.
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    /// Button that opens a URL.
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

/// Membership record returned by `getChatMember`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    /// "creator", "administrator", "member", "restricted", "left" or "kicked".
    pub status: String,

    #[serde(default)]
    pub user: Option<super::User>,

    /// Only present for "restricted" members.
    #[serde(default)]
    pub is_member: Option<bool>,
}

impl ChatMember {
    /// Whether the user currently belongs to the chat.
    pub fn is_member(&self) -> bool {
        match self.status.as_str() {
            "creator" | "administrator" | "member" => true,
            "restricted" => self.is_member.unwrap_or(false),
            _ => false,
        }
    }
}
