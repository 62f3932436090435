//! Publication records used to resume deletions after a restart.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Publication;

/// Record posted messages that should be deleted at `delete_at`.
///
/// Returns the new publication id.
pub async fn insert_publication(
    pool: &SqlitePool,
    content_key: &str,
    destination_id: i64,
    message_ids: &[i32],
    published_at: i64,
    delete_at: i64,
) -> Result<i64> {
    let encoded = serde_json::to_string(message_ids)?;

    let result = sqlx::query(
        r#"
        INSERT INTO publications (content_key, destination_id, message_ids, published_at, delete_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(content_key)
    .bind(destination_id)
    .bind(encoded)
    .bind(published_at)
    .bind(delete_at)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// List publications whose messages have not been deleted yet, soonest first.
pub async fn pending_publications(pool: &SqlitePool) -> Result<Vec<Publication>> {
    let rows = sqlx::query_as::<_, Publication>(
        r#"
        SELECT id, content_key, destination_id, message_ids, published_at, delete_at, deleted
        FROM publications
        WHERE deleted = 0
        ORDER BY delete_at, id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Mark a publication's messages as deleted.
pub async fn mark_deleted(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE publications
        SET deleted = 1
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Publication",
            id: id.to_string(),
        });
    }

    Ok(())
}
