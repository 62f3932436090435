//! [`Repository`] backed by the SQLite `database` crate.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::models::{AlbumItemRecord, AlbumRecord, CollectionRecord, ContentKind};
use database::{album, allowlist, collection, publication, settings, Database, DatabaseError};

use crate::error::RepositoryError;
use crate::repository::Repository;
use crate::types::{
    AccessMode, Album, Collection, MediaItem, MediaKind, PublicationRecord, Resolved, Settings,
};

/// SQLite-backed repository.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    db: Database,
}

impl SqliteRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn timestamp(key: &str, secs: i64) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| RepositoryError::Corrupt {
        key: key.to_string(),
        reason: format!("timestamp out of range: {secs}"),
    })
}

fn album_from_record(
    record: AlbumRecord,
    items: Vec<AlbumItemRecord>,
) -> Result<Album, RepositoryError> {
    let items = items
        .into_iter()
        .map(|item| {
            let kind: MediaKind = item.kind.parse().map_err(|reason| RepositoryError::Corrupt {
                key: record.album_key.clone(),
                reason,
            })?;
            Ok(MediaItem {
                file_id: item.file_id,
                kind,
                caption: item.caption,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

    Ok(Album {
        created_at: timestamp(&record.album_key, record.created_at)?,
        key: record.album_key,
        items,
        uploader: record.uploader_id,
        caption: record.caption,
        collection_key: record.collection_key,
    })
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn load_settings(&self) -> Result<Option<Settings>, RepositoryError> {
        let record = match settings::get_settings(self.db.pool()).await {
            Ok(record) => record,
            Err(DatabaseError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let access_mode: AccessMode =
            record
                .access_mode
                .parse()
                .map_err(|reason| RepositoryError::Corrupt {
                    key: record.id.clone(),
                    reason,
                })?;
        let delete_after = u64::try_from(record.delete_after_secs).map_err(|_| {
            RepositoryError::Corrupt {
                key: record.id.clone(),
                reason: format!("negative delete delay: {}", record.delete_after_secs),
            }
        })?;

        Ok(Some(Settings {
            access_mode,
            delete_after: Duration::from_secs(delete_after),
            subscription_channel: record.subscription_channel,
        }))
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), RepositoryError> {
        settings::upsert_settings(
            self.db.pool(),
            settings.access_mode.as_str(),
            settings.delete_after.as_secs() as i64,
            settings.subscription_channel.as_deref(),
        )
        .await?;
        Ok(())
    }

    async fn init_settings_if_absent(&self, defaults: &Settings) -> Result<bool, RepositoryError> {
        let written = settings::insert_settings_if_absent(
            self.db.pool(),
            defaults.access_mode.as_str(),
            defaults.delete_after.as_secs() as i64,
            defaults.subscription_channel.as_deref(),
        )
        .await?;
        Ok(written)
    }

    async fn list_allowed(&self, destination: i64) -> Result<Vec<i64>, RepositoryError> {
        let users = allowlist::list_allowed(self.db.pool(), destination).await?;
        Ok(users.into_iter().map(|user| user.user_id).collect())
    }

    async fn is_allowed(&self, destination: i64, user: i64) -> Result<bool, RepositoryError> {
        Ok(allowlist::is_allowed(self.db.pool(), destination, user).await?)
    }

    async fn add_allowed(&self, destination: i64, user: i64) -> Result<bool, RepositoryError> {
        Ok(allowlist::add_allowed(self.db.pool(), destination, user).await?)
    }

    async fn remove_allowed(&self, destination: i64, user: i64) -> Result<bool, RepositoryError> {
        Ok(allowlist::remove_allowed(self.db.pool(), destination, user).await?)
    }

    async fn insert_album(&self, album: &Album) -> Result<(), RepositoryError> {
        let record = AlbumRecord {
            album_key: album.key.clone(),
            uploader_id: album.uploader,
            caption: album.caption.clone(),
            collection_key: album.collection_key.clone(),
            created_at: album.created_at.timestamp(),
        };
        let items: Vec<AlbumItemRecord> = album
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| AlbumItemRecord {
                album_key: album.key.clone(),
                position: position as i64,
                file_id: item.file_id.clone(),
                kind: item.kind.as_str().to_string(),
                caption: item.caption.clone(),
            })
            .collect();

        album::insert_album(self.db.pool(), &record, &items).await?;
        Ok(())
    }

    async fn insert_collection(&self, collection: &Collection) -> Result<(), RepositoryError> {
        let record = CollectionRecord {
            collection_key: collection.key.clone(),
            uploader_id: collection.uploader,
            total_items: collection.total_items as i64,
            caption: collection.caption.clone(),
            created_at: collection.created_at.timestamp(),
        };
        collection::insert_collection(self.db.pool(), &record, &collection.album_keys).await?;
        Ok(())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<Resolved>, RepositoryError> {
        match album::content_kind(self.db.pool(), key).await? {
            None => Ok(None),
            Some(ContentKind::Album) => {
                let stored = album::get_album(self.db.pool(), key).await?;
                Ok(Some(Resolved::Album(album_from_record(
                    stored.album,
                    stored.items,
                )?)))
            }
            Some(ContentKind::Collection) => {
                let stored = collection::get_collection(self.db.pool(), key).await?;
                let record = stored.collection;
                Ok(Some(Resolved::Collection(Collection {
                    created_at: timestamp(key, record.created_at)?,
                    key: record.collection_key,
                    album_keys: stored.album_keys,
                    total_items: record.total_items.max(0) as usize,
                    uploader: record.uploader_id,
                    caption: record.caption,
                })))
            }
        }
    }

    async fn record_publication(
        &self,
        key: &str,
        destination: i64,
        message_ids: &[i32],
        published_at: DateTime<Utc>,
        delete_at: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        Ok(publication::insert_publication(
            self.db.pool(),
            key,
            destination,
            message_ids,
            published_at.timestamp(),
            delete_at.timestamp(),
        )
        .await?)
    }

    async fn pending_publications(&self) -> Result<Vec<PublicationRecord>, RepositoryError> {
        publication::pending_publications(self.db.pool())
            .await?
            .into_iter()
            .map(|row| {
                Ok(PublicationRecord {
                    id: row.id,
                    message_ids: row.message_ids()?,
                    delete_at: timestamp(&row.content_key, row.delete_at)?,
                    key: row.content_key,
                    destination: row.destination_id,
                })
            })
            .collect()
    }

    async fn complete_publication(&self, id: i64) -> Result<(), RepositoryError> {
        publication::mark_deleted(self.db.pool(), id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::settings::SettingsStore;
    use std::sync::Arc;

    async fn repo() -> SqliteRepository {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        db.migrate().await.unwrap();
        SqliteRepository::new(db)
    }

    #[tokio::test]
    async fn test_settings_absent_then_saved() {
        let repo = repo().await;
        assert!(repo.load_settings().await.unwrap().is_none());

        let settings = Settings {
            access_mode: AccessMode::Restricted,
            delete_after: Duration::from_secs(30),
            subscription_channel: Some("@news".to_string()),
        };
        repo.save_settings(&settings).await.unwrap();
        assert_eq!(repo.load_settings().await.unwrap(), Some(settings));
    }

    #[tokio::test]
    async fn test_init_settings_keeps_existing_row() {
        let repo = repo().await;
        let defaults = Settings::default();
        assert!(repo.init_settings_if_absent(&defaults).await.unwrap());
        assert_eq!(repo.load_settings().await.unwrap(), Some(defaults.clone()));

        let changed = Settings {
            access_mode: AccessMode::Restricted,
            ..defaults.clone()
        };
        repo.save_settings(&changed).await.unwrap();

        assert!(!repo.init_settings_if_absent(&defaults).await.unwrap());
        assert_eq!(repo.load_settings().await.unwrap(), Some(changed));
    }

    #[tokio::test]
    async fn test_settings_store_bootstraps_over_sqlite() {
        let repo = Arc::new(repo().await);
        let config = CoreConfig::new(-100);

        let first = SettingsStore::new(repo.clone(), &config);
        assert_eq!(first.bootstrap().await.unwrap(), Settings::default());
        first
            .set_delete_after(Duration::from_secs(45))
            .await
            .unwrap();

        let restarted = SettingsStore::new(repo.clone(), &config);
        let settings = restarted.bootstrap().await.unwrap();
        assert_eq!(settings.delete_after, Duration::from_secs(45));
    }

    #[tokio::test]
    async fn test_album_and_collection_roundtrip() {
        let repo = repo().await;
        let created_at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let child = Album {
            key: "child1".to_string(),
            items: vec![
                MediaItem::new("p", MediaKind::Photo).with_caption("hi"),
                MediaItem::new("d", MediaKind::Document),
            ],
            uploader: 9,
            created_at,
            caption: Some("hi".to_string()),
            collection_key: Some("parent1".to_string()),
        };
        repo.insert_album(&child).await.unwrap();
        let parent = Collection {
            key: "parent1".to_string(),
            album_keys: vec!["child1".to_string()],
            total_items: 2,
            uploader: 9,
            caption: Some("hi".to_string()),
            created_at,
        };
        repo.insert_collection(&parent).await.unwrap();

        assert_eq!(
            repo.find_by_key("child1").await.unwrap(),
            Some(Resolved::Album(child))
        );
        assert_eq!(
            repo.find_by_key("parent1").await.unwrap(),
            Some(Resolved::Collection(parent))
        );
        assert_eq!(repo.find_by_key("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_publication_lifecycle() {
        let repo = repo().await;
        let now = Utc::now();
        let id = repo
            .record_publication("k", -1, &[5, 6], now, now + chrono::Duration::seconds(30))
            .await
            .unwrap();

        let pending = repo.pending_publications().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].message_ids, vec![5, 6]);

        repo.complete_publication(id).await.unwrap();
        assert!(repo.pending_publications().await.unwrap().is_empty());
    }
}
