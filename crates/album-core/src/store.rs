//! Album and collection creation and key resolution.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::error::CoreError;
use crate::key::generate_key;
use crate::repository::Repository;
use crate::types::{upload_caption, Album, Collection, MediaItem, Resolved, MAX_ALBUM_ITEMS};

/// Persists finalized uploads and resolves keys.
pub struct AlbumStore {
    repo: Arc<dyn Repository>,
}

impl AlbumStore {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Store an upload as a single album, or as a collection when it holds
    /// more than [`MAX_ALBUM_ITEMS`] items. Returns the shareable key.
    pub async fn create(&self, items: Vec<MediaItem>, uploader: i64) -> Result<String, CoreError> {
        if items.is_empty() {
            return Err(CoreError::EmptyUpload);
        }
        let caption = upload_caption(&items);
        if items.len() <= MAX_ALBUM_ITEMS {
            self.create_album(items, uploader, caption, None).await
        } else {
            self.create_collection(items, uploader, caption).await
        }
    }

    /// Store one album of at most [`MAX_ALBUM_ITEMS`] items.
    pub async fn create_album(
        &self,
        items: Vec<MediaItem>,
        uploader: i64,
        caption: Option<String>,
        collection_key: Option<String>,
    ) -> Result<String, CoreError> {
        if items.is_empty() {
            return Err(CoreError::EmptyUpload);
        }
        debug_assert!(items.len() <= MAX_ALBUM_ITEMS);

        let album = Album {
            key: generate_key(),
            items,
            uploader,
            created_at: Utc::now(),
            caption,
            collection_key,
        };
        self.repo.insert_album(&album).await?;
        Ok(album.key)
    }

    /// Split an upload into albums of at most [`MAX_ALBUM_ITEMS`] items and
    /// index them under one collection key.
    ///
    /// Children are written before the parent, so a resolvable parent
    /// always has all of its children.
    pub async fn create_collection(
        &self,
        items: Vec<MediaItem>,
        uploader: i64,
        caption: Option<String>,
    ) -> Result<String, CoreError> {
        if items.is_empty() {
            return Err(CoreError::EmptyUpload);
        }

        let key = generate_key();
        let total_items = items.len();
        let mut album_keys = Vec::with_capacity(total_items.div_ceil(MAX_ALBUM_ITEMS));

        for (index, chunk) in items.chunks(MAX_ALBUM_ITEMS).enumerate() {
            let chunk_caption = if index == 0 { caption.clone() } else { None };
            let child = self
                .create_album(chunk.to_vec(), uploader, chunk_caption, Some(key.clone()))
                .await?;
            album_keys.push(child);
        }

        let collection = Collection {
            key,
            album_keys,
            total_items,
            uploader,
            caption,
            created_at: Utc::now(),
        };
        self.repo.insert_collection(&collection).await?;

        info!(
            key = %collection.key,
            albums = collection.album_keys.len(),
            items = total_items,
            "Created collection"
        );
        Ok(collection.key)
    }

    /// Resolve a key to its album or collection.
    pub async fn resolve(&self, key: &str) -> Result<Option<Resolved>, CoreError> {
        Ok(self.repo.find_by_key(key).await?)
    }

    /// Resolve a key that must name an album.
    pub async fn resolve_album(&self, key: &str) -> Result<Option<Album>, CoreError> {
        match self.resolve(key).await? {
            Some(Resolved::Album(album)) => Ok(Some(album)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use crate::types::MediaKind;

    fn items(n: usize) -> Vec<MediaItem> {
        (0..n)
            .map(|i| MediaItem::new(format!("file-{i}"), MediaKind::Photo))
            .collect()
    }

    fn store() -> (Arc<MemoryRepository>, AlbumStore) {
        let repo = Arc::new(MemoryRepository::new());
        (repo.clone(), AlbumStore::new(repo))
    }

    async fn child_sizes(store: &AlbumStore, key: &str) -> Vec<usize> {
        let Some(Resolved::Collection(collection)) = store.resolve(key).await.unwrap() else {
            panic!("expected a collection for {key}");
        };
        let mut sizes = Vec::new();
        for child in &collection.album_keys {
            let album = store.resolve_album(child).await.unwrap().unwrap();
            assert_eq!(album.collection_key.as_deref(), Some(key));
            sizes.push(album.items.len());
        }
        sizes
    }

    #[tokio::test]
    async fn test_small_upload_is_single_album() {
        let (repo, store) = store();
        let key = store.create(items(10), 1).await.unwrap();

        let album = store.resolve_album(&key).await.unwrap().unwrap();
        assert_eq!(album.items.len(), 10);
        assert_eq!(album.collection_key, None);
        assert_eq!(repo.collection_count(), 0);
    }

    #[tokio::test]
    async fn test_large_upload_chunks_in_order() {
        let (_, store) = store();
        let key = store.create(items(23), 1).await.unwrap();
        assert_eq!(child_sizes(&store, &key).await, vec![10, 10, 3]);

        let Some(Resolved::Collection(collection)) = store.resolve(&key).await.unwrap() else {
            panic!("expected a collection");
        };
        assert_eq!(collection.total_items, 23);

        let mut flattened = Vec::new();
        for child in &collection.album_keys {
            let album = store.resolve_album(child).await.unwrap().unwrap();
            flattened.extend(album.items.into_iter().map(|item| item.file_id));
        }
        let expected: Vec<String> = items(23).into_iter().map(|item| item.file_id).collect();
        assert_eq!(flattened, expected);
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_empty_chunk() {
        let (repo, store) = store();
        let key = store.create(items(20), 1).await.unwrap();
        assert_eq!(child_sizes(&store, &key).await, vec![10, 10]);
        assert_eq!(repo.album_count(), 2);
    }

    #[tokio::test]
    async fn test_caption_only_on_first_chunk() {
        let (_, store) = store();
        let mut upload = items(12);
        upload[3].caption = Some("summer".to_string());
        let key = store.create(upload, 1).await.unwrap();

        let Some(Resolved::Collection(collection)) = store.resolve(&key).await.unwrap() else {
            panic!("expected a collection");
        };
        assert_eq!(collection.caption.as_deref(), Some("summer"));
        let first = store.resolve_album(&collection.album_keys[0]).await.unwrap().unwrap();
        let second = store.resolve_album(&collection.album_keys[1]).await.unwrap().unwrap();
        assert_eq!(first.caption.as_deref(), Some("summer"));
        assert_eq!(second.caption, None);
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let (repo, store) = store();
        assert!(matches!(
            store.create(Vec::new(), 1).await,
            Err(CoreError::EmptyUpload)
        ));
        assert_eq!(repo.album_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_unknown_key() {
        let (_, store) = store();
        assert!(store.resolve("nothing").await.unwrap().is_none());
        assert!(store.resolve_album("nothing").await.unwrap().is_none());
    }
}
