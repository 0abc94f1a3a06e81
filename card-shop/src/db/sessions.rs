//! Login sessions
//!
//! Rows are written by the login flow; checkout and the admin gate only read
//! them to learn who is buying and which CSRF token to expect.

use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub csrf_token: String,
    pub expires_at: i64,
}

/// Session by id, if it has not expired at `now`
pub async fn find_active(
    pool: &SqlitePool,
    id: &str,
    now: i64,
) -> Result<Option<Session>, sqlx::Error> {
    sqlx::query_as::<_, Session>(
        "SELECT id, user_id, username, csrf_token, expires_at FROM sessions
         WHERE id = ? AND expires_at > ?",
    )
    .bind(id)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub async fn upsert(pool: &SqlitePool, session: &Session) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, username, csrf_token, expires_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(id) DO UPDATE SET
            user_id = excluded.user_id,
            username = excluded.username,
            csrf_token = excluded.csrf_token,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(&session.id)
    .bind(&session.user_id)
    .bind(&session.username)
    .bind(&session.csrf_token)
    .bind(session.expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_expired(pool: &SqlitePool, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
