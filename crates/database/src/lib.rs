//! SQLite persistence layer for the album relay bot.
//!
//! Stores global settings, per-destination allow-lists, albums with their
//! ordered items, collections of albums, and publication records used to
//! resume pending deletions after a restart.
//!
//! # Example
//!
//! ```no_run
//! use database::{album, models::{AlbumItemRecord, AlbumRecord}, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:albums.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let record = AlbumRecord {
//!         album_key: "xK3-p9QaZ0w".to_string(),
//!         uploader_id: 42,
//!         caption: None,
//!         collection_key: None,
//!         created_at: 1_700_000_000,
//!     };
//!     let items = vec![AlbumItemRecord {
//!         album_key: record.album_key.clone(),
//!         position: 0,
//!         file_id: "AgACAgIAAxkBAAI".to_string(),
//!         kind: "photo".to_string(),
//!         caption: None,
//!     }];
//!     album::insert_album(db.pool(), &record, &items).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod album;
pub mod allowlist;
pub mod collection;
pub mod error;
pub mod models;
pub mod publication;
pub mod settings;

pub use error::{DatabaseError, Result};
pub use models::{
    AlbumItemRecord, AlbumRecord, AllowedUser, CollectionRecord, ContentKind, Publication,
    SettingsRecord, StoredAlbum, StoredCollection,
};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 10;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// let db = database::Database::connect("sqlite:data/albums.db?mode=rwc").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    ///
    /// In-memory databases must use a pool size of 1, since every
    /// connection opens its own private database.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn album_record(key: &str, collection: Option<&str>) -> AlbumRecord {
        AlbumRecord {
            album_key: key.to_string(),
            uploader_id: 7,
            caption: Some("trip".to_string()),
            collection_key: collection.map(str::to_string),
            created_at: 1_700_000_000,
        }
    }

    fn items(key: &str, n: usize) -> Vec<AlbumItemRecord> {
        (0..n)
            .map(|i| AlbumItemRecord {
                album_key: key.to_string(),
                position: i as i64,
                file_id: format!("file-{i}"),
                kind: if i % 2 == 0 { "photo" } else { "video" }.to_string(),
                caption: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_settings_bootstrap_and_update() {
        let db = test_db().await;

        let result = settings::get_settings(db.pool()).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));

        assert!(settings::insert_settings_if_absent(db.pool(), "open", 300, None)
            .await
            .unwrap());
        // Second bootstrap leaves the row alone
        assert!(!settings::insert_settings_if_absent(db.pool(), "restricted", 60, None)
            .await
            .unwrap());

        let fetched = settings::get_settings(db.pool()).await.unwrap();
        assert_eq!(fetched.access_mode, "open");
        assert_eq!(fetched.delete_after_secs, 300);
        assert_eq!(fetched.subscription_channel, None);

        settings::upsert_settings(db.pool(), "restricted", 45, Some("@news"))
            .await
            .unwrap();
        let fetched = settings::get_settings(db.pool()).await.unwrap();
        assert_eq!(fetched.access_mode, "restricted");
        assert_eq!(fetched.delete_after_secs, 45);
        assert_eq!(fetched.subscription_channel.as_deref(), Some("@news"));
    }

    #[tokio::test]
    async fn test_allowlist() {
        let db = test_db().await;

        assert!(allowlist::add_allowed(db.pool(), -100, 1).await.unwrap());
        assert!(!allowlist::add_allowed(db.pool(), -100, 1).await.unwrap());
        assert!(allowlist::add_allowed(db.pool(), -100, 2).await.unwrap());
        assert!(allowlist::add_allowed(db.pool(), -200, 3).await.unwrap());

        assert!(allowlist::is_allowed(db.pool(), -100, 1).await.unwrap());
        assert!(!allowlist::is_allowed(db.pool(), -200, 1).await.unwrap());

        let listed = allowlist::list_allowed(db.pool(), -100).await.unwrap();
        let ids: Vec<i64> = listed.iter().map(|u| u.user_id).collect();
        assert_eq!(ids, vec![1, 2]);

        assert!(allowlist::remove_allowed(db.pool(), -100, 1).await.unwrap());
        assert!(!allowlist::remove_allowed(db.pool(), -100, 1).await.unwrap());
        assert!(!allowlist::is_allowed(db.pool(), -100, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_album_roundtrip_keeps_order() {
        let db = test_db().await;
        let record = album_record("abc", None);

        album::insert_album(db.pool(), &record, &items("abc", 4))
            .await
            .unwrap();

        let stored = album::get_album(db.pool(), "abc").await.unwrap();
        assert_eq!(stored.album, record);
        let files: Vec<&str> = stored.items.iter().map(|i| i.file_id.as_str()).collect();
        assert_eq!(files, vec!["file-0", "file-1", "file-2", "file-3"]);
        assert_eq!(stored.items[1].kind, "video");

        let duplicate = album::insert_album(db.pool(), &record, &items("abc", 1)).await;
        assert!(matches!(duplicate, Err(DatabaseError::AlreadyExists { .. })));

        let missing = album::get_album(db.pool(), "nope").await;
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_collection_and_content_kind() {
        let db = test_db().await;

        for key in ["c1", "c2"] {
            album::insert_album(db.pool(), &album_record(key, Some("parent")), &items(key, 10))
                .await
                .unwrap();
        }
        let parent = CollectionRecord {
            collection_key: "parent".to_string(),
            uploader_id: 7,
            total_items: 20,
            caption: None,
            created_at: 1_700_000_000,
        };
        collection::insert_collection(db.pool(), &parent, &["c1".to_string(), "c2".to_string()])
            .await
            .unwrap();

        let stored = collection::get_collection(db.pool(), "parent").await.unwrap();
        assert_eq!(stored.album_keys, vec!["c1", "c2"]);
        assert_eq!(stored.collection.total_items, 20);

        assert_eq!(
            album::content_kind(db.pool(), "c1").await.unwrap(),
            Some(ContentKind::Album)
        );
        assert_eq!(
            album::content_kind(db.pool(), "parent").await.unwrap(),
            Some(ContentKind::Collection)
        );
        assert_eq!(album::content_kind(db.pool(), "zzz").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_publications() {
        let db = test_db().await;

        let first = publication::insert_publication(db.pool(), "abc", -100, &[10, 11], 100, 400)
            .await
            .unwrap();
        let second = publication::insert_publication(db.pool(), "def", -100, &[12], 100, 200)
            .await
            .unwrap();

        let pending = publication::pending_publications(db.pool()).await.unwrap();
        assert_eq!(pending.len(), 2);
        // Soonest deletion first
        assert_eq!(pending[0].id, second);
        assert_eq!(pending[1].message_ids().unwrap(), vec![10, 11]);

        publication::mark_deleted(db.pool(), first).await.unwrap();
        let pending = publication::pending_publications(db.pool()).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].content_key, "def");

        let missing = publication::mark_deleted(db.pool(), 9999).await;
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }
}
