//! Collection storage.

use sqlx::SqlitePool;

use crate::error::{map_unique, DatabaseError, Result};
use crate::models::{CollectionRecord, StoredCollection};

/// Insert a collection and its ordered child album keys.
///
/// Child albums must already exist.
pub async fn insert_collection(
    pool: &SqlitePool,
    collection: &CollectionRecord,
    album_keys: &[String],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO collections (collection_key, uploader_id, total_items, caption, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&collection.collection_key)
    .bind(collection.uploader_id)
    .bind(collection.total_items)
    .bind(&collection.caption)
    .bind(collection.created_at)
    .execute(&mut *tx)
    .await
    .map_err(map_unique("Collection", &collection.collection_key))?;

    for (position, album_key) in album_keys.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO collection_albums (collection_key, position, album_key)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&collection.collection_key)
        .bind(position as i64)
        .bind(album_key)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Get a collection with its child album keys in order.
pub async fn get_collection(pool: &SqlitePool, collection_key: &str) -> Result<StoredCollection> {
    let collection = sqlx::query_as::<_, CollectionRecord>(
        r#"
        SELECT collection_key, uploader_id, total_items, caption, created_at
        FROM collections
        WHERE collection_key = ?
        "#,
    )
    .bind(collection_key)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Collection",
        id: collection_key.to_string(),
    })?;

    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT album_key
        FROM collection_albums
        WHERE collection_key = ?
        ORDER BY position
        "#,
    )
    .bind(collection_key)
    .fetch_all(pool)
    .await?;

    Ok(StoredCollection {
        collection,
        album_keys: rows.into_iter().map(|(key,)| key).collect(),
    })
}
