//! Album storage.

use sqlx::SqlitePool;

use crate::error::{map_unique, DatabaseError, Result};
use crate::models::{AlbumItemRecord, AlbumRecord, ContentKind, StoredAlbum};

/// Insert an album and its items in one transaction.
///
/// Item positions are taken from the slice order.
pub async fn insert_album(
    pool: &SqlitePool,
    album: &AlbumRecord,
    items: &[AlbumItemRecord],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO albums (album_key, uploader_id, caption, collection_key, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&album.album_key)
    .bind(album.uploader_id)
    .bind(&album.caption)
    .bind(&album.collection_key)
    .bind(album.created_at)
    .execute(&mut *tx)
    .await
    .map_err(map_unique("Album", &album.album_key))?;

    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO album_items (album_key, position, file_id, kind, caption)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&album.album_key)
        .bind(position as i64)
        .bind(&item.file_id)
        .bind(&item.kind)
        .bind(&item.caption)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(
        "Stored album {} ({} items)",
        album.album_key,
        items.len()
    );
    Ok(())
}

/// Get an album with its items in position order.
pub async fn get_album(pool: &SqlitePool, album_key: &str) -> Result<StoredAlbum> {
    let album = sqlx::query_as::<_, AlbumRecord>(
        r#"
        SELECT album_key, uploader_id, caption, collection_key, created_at
        FROM albums
        WHERE album_key = ?
        "#,
    )
    .bind(album_key)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Album",
        id: album_key.to_string(),
    })?;

    let items = sqlx::query_as::<_, AlbumItemRecord>(
        r#"
        SELECT album_key, position, file_id, kind, caption
        FROM album_items
        WHERE album_key = ?
        ORDER BY position
        "#,
    )
    .bind(album_key)
    .fetch_all(pool)
    .await?;

    Ok(StoredAlbum { album, items })
}

/// Find out whether a key names an album or a collection.
///
/// Returns `None` when the key is unknown.
pub async fn content_kind(pool: &SqlitePool, key: &str) -> Result<Option<ContentKind>> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT 'album' FROM albums WHERE album_key = ?
        UNION ALL
        SELECT 'collection' FROM collections WHERE collection_key = ?
        LIMIT 1
        "#,
    )
    .bind(key)
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(kind,)| match kind.as_str() {
        "collection" => ContentKind::Collection,
        _ => ContentKind::Album,
    }))
}
