use shared::models::{Notification, NotificationKind};
use sqlx::SqlitePool;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title_key, content_key, data, is_read, created_at";

pub async fn create(
    pool: &SqlitePool,
    user_id: &str,
    kind: NotificationKind,
    data: &serde_json::Value,
    now: i64,
) -> Result<i64, sqlx::Error> {
    let (title_key, content_key) = kind.message_keys();
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO user_notifications (user_id, kind, title_key, content_key, data, is_read, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(kind.as_db())
    .bind(title_key)
    .bind(content_key)
    .bind(data.to_string())
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn list_recent(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM user_notifications
         WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn count_unread(pool: &SqlitePool, user_id: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM user_notifications WHERE user_id = ? AND is_read = 0",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Only touches the row if it belongs to `user_id`.
pub async fn mark_read(pool: &SqlitePool, user_id: &str, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE user_notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_all_read(pool: &SqlitePool, user_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE user_notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
