//! Global settings row.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::SettingsRecord;

/// Primary key of the singleton settings row.
pub const SETTINGS_ID: &str = "global";

/// Get the settings row.
pub async fn get_settings(pool: &SqlitePool) -> Result<SettingsRecord> {
    sqlx::query_as::<_, SettingsRecord>(
        r#"
        SELECT id, access_mode, delete_after_secs, subscription_channel, updated_at
        FROM settings
        WHERE id = ?
        "#,
    )
    .bind(SETTINGS_ID)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Settings",
        id: SETTINGS_ID.to_string(),
    })
}

/// Insert the settings row unless one already exists.
///
/// Returns true when the defaults were written.
pub async fn insert_settings_if_absent(
    pool: &SqlitePool,
    access_mode: &str,
    delete_after_secs: i64,
    subscription_channel: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO settings (id, access_mode, delete_after_secs, subscription_channel)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(SETTINGS_ID)
    .bind(access_mode)
    .bind(delete_after_secs)
    .bind(subscription_channel)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Write all settings fields.
pub async fn upsert_settings(
    pool: &SqlitePool,
    access_mode: &str,
    delete_after_secs: i64,
    subscription_channel: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (id, access_mode, delete_after_secs, subscription_channel, updated_at)
        VALUES (?, ?, ?, ?, datetime('now'))
        ON CONFLICT(id) DO UPDATE SET
            access_mode = excluded.access_mode,
            delete_after_secs = excluded.delete_after_secs,
            subscription_channel = excluded.subscription_channel,
            updated_at = datetime('now')
        "#,
    )
    .bind(SETTINGS_ID)
    .bind(access_mode)
    .bind(delete_after_secs)
    .bind(subscription_channel)
    .execute(pool)
    .await?;

    Ok(())
}
