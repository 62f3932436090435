//! Domain types shared by the pipeline components.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of items Telegram accepts in one grouped post.
pub const MAX_ALBUM_ITEMS: usize = 10;

/// Kind of a stored media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            "document" => Ok(MediaKind::Document),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// One captured media item. The file id is an opaque transport handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub file_id: String,
    pub kind: MediaKind,
    pub caption: Option<String>,
}

impl MediaItem {
    pub fn new(file_id: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            file_id: file_id.into(),
            kind,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// A media message as it arrives from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMedia {
    /// Identity of the uploader.
    pub uploader: i64,
    /// Chat the message arrived in.
    pub chat_id: i64,
    /// Message id inside `chat_id`, used for archival forwarding.
    pub message_id: i32,
    /// Correlates items of one upload burst; `None` for standalone media.
    pub group_id: Option<String>,
    pub item: MediaItem,
}

/// A finalized, ordered group of at most [`MAX_ALBUM_ITEMS`] items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub key: String,
    pub items: Vec<MediaItem>,
    pub uploader: i64,
    pub created_at: DateTime<Utc>,
    pub caption: Option<String>,
    /// Parent collection key when this album is one chunk of a larger upload.
    pub collection_key: Option<String>,
}

/// Fan-out index over child albums, in stored order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub key: String,
    pub album_keys: Vec<String>,
    pub total_items: usize,
    pub uploader: i64,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What a key names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Album(Album),
    Collection(Collection),
}

impl Resolved {
    pub fn key(&self) -> &str {
        match self {
            Resolved::Album(album) => &album.key,
            Resolved::Collection(collection) => &collection.key,
        }
    }

    pub fn item_count(&self) -> usize {
        match self {
            Resolved::Album(album) => album.items.len(),
            Resolved::Collection(collection) => collection.total_items,
        }
    }
}

/// Who may trigger a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Everyone qualifies.
    Open,
    /// Only allow-listed identities qualify.
    Restricted,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Open => "open",
            AccessMode::Restricted => "restricted",
        }
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(AccessMode::Open),
            "restricted" => Ok(AccessMode::Restricted),
            other => Err(format!("unknown access mode: {other}")),
        }
    }
}

/// Process-wide mutable settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub access_mode: AccessMode,
    /// How long published messages stay visible.
    pub delete_after: Duration,
    /// Channel requesters must have joined; the gate is off when `None`.
    pub subscription_channel: Option<String>,
}

impl Settings {
    pub fn subscription_gate_enabled(&self) -> bool {
        self.subscription_channel.is_some()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            access_mode: AccessMode::Open,
            delete_after: Duration::from_secs(300),
            subscription_channel: None,
        }
    }
}

/// A stored publication whose messages may still need deleting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationRecord {
    pub id: i64,
    pub key: String,
    pub destination: i64,
    pub message_ids: Vec<i32>,
    pub delete_at: DateTime<Utc>,
}

/// Caption of an upload: the first non-empty item caption in arrival order.
pub fn upload_caption(items: &[MediaItem]) -> Option<String> {
    items
        .iter()
        .filter_map(|item| item.caption.as_deref())
        .map(str::trim)
        .find(|caption| !caption.is_empty())
        .map(str::to_string)
}
