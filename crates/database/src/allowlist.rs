//! Per-destination allow-list operations.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::AllowedUser;

/// Add a user to the allow-list of a destination.
///
/// Returns false if the user was already present.
pub async fn add_allowed(pool: &SqlitePool, destination_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO allowed_users (destination_id, user_id)
        VALUES (?, ?)
        "#,
    )
    .bind(destination_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove a user from the allow-list of a destination.
///
/// Returns false if the user was not present.
pub async fn remove_allowed(pool: &SqlitePool, destination_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM allowed_users
        WHERE destination_id = ? AND user_id = ?
        "#,
    )
    .bind(destination_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Check whether a user is allow-listed for a destination.
pub async fn is_allowed(pool: &SqlitePool, destination_id: i64, user_id: i64) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        SELECT 1 FROM allowed_users
        WHERE destination_id = ? AND user_id = ?
        "#,
    )
    .bind(destination_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

/// List allow-listed users of a destination, oldest first.
pub async fn list_allowed(pool: &SqlitePool, destination_id: i64) -> Result<Vec<AllowedUser>> {
    let users = sqlx::query_as::<_, AllowedUser>(
        r#"
        SELECT destination_id, user_id, created_at
        FROM allowed_users
        WHERE destination_id = ?
        ORDER BY created_at, user_id
        "#,
    )
    .bind(destination_id)
    .fetch_all(pool)
    .await?;

    Ok(users)
}
