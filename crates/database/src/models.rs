//! Database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The singleton settings row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SettingsRecord {
    /// Always `global`.
    pub id: String,
    /// "open" or "restricted".
    pub access_mode: String,
    /// Seconds before published messages are deleted.
    pub delete_after_secs: i64,
    /// Channel users must join before opening albums; gate is off when None.
    pub subscription_channel: Option<String>,
    /// Last update timestamp.
    pub updated_at: String,
}

/// An allow-listed identity for one destination chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AllowedUser {
    pub destination_id: i64,
    pub user_id: i64,
    pub created_at: String,
}

/// Album header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AlbumRecord {
    /// Shareable key.
    pub album_key: String,
    /// Telegram user id of the uploader.
    pub uploader_id: i64,
    pub caption: Option<String>,
    /// Parent collection, when this album is one chunk of a larger upload.
    pub collection_key: Option<String>,
    /// Unix seconds.
    pub created_at: i64,
}

/// One media item of an album, in posting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AlbumItemRecord {
    pub album_key: String,
    /// Zero-based position inside the album.
    pub position: i64,
    /// Telegram file id.
    pub file_id: String,
    /// "photo", "video" or "document".
    pub kind: String,
    pub caption: Option<String>,
}

/// An album with its ordered items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAlbum {
    pub album: AlbumRecord,
    pub items: Vec<AlbumItemRecord>,
}

/// Collection header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CollectionRecord {
    pub collection_key: String,
    pub uploader_id: i64,
    /// Sum of the item counts of all child albums.
    pub total_items: i64,
    pub caption: Option<String>,
    /// Unix seconds.
    pub created_at: i64,
}

/// A collection with its ordered child album keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCollection {
    pub collection: CollectionRecord,
    pub album_keys: Vec<String>,
}

/// Which kind of document a key names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Album,
    Collection,
}

/// A recorded publication of an album or collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Publication {
    pub id: i64,
    /// Album or collection key that was published.
    pub content_key: String,
    /// Chat the messages were posted to.
    pub destination_id: i64,
    /// JSON array of posted message ids.
    pub message_ids: String,
    /// Unix seconds.
    pub published_at: i64,
    /// Unix seconds after which the messages should be deleted.
    pub delete_at: i64,
    pub deleted: bool,
}

impl Publication {
    /// Decode the posted message ids.
    pub fn message_ids(&self) -> crate::Result<Vec<i32>> {
        Ok(serde_json::from_str(&self.message_ids)?)
    }
}
