//! Card ledger queries
//!
//! A card is free when `is_used = 0` and it is either unreserved or its
//! `reserved_at` is older than the reservation cutoff. Every claim below
//! re-checks that predicate in the UPDATE itself so concurrent callers can
//! never both win the same row.

use shared::models::Card;
use sqlx::{SqliteConnection, SqlitePool};

const CARD_COLUMNS: &str =
    "id, product_id, card_key, is_used, reserved_order_id, reserved_at, used_at, created_at";

/// Raw ledger counts for one product
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    /// `is_used = 0`
    pub unused: i64,
    /// Unused and free
    pub available: i64,
    /// Unused and reserved within the window
    pub locked: i64,
}

/// Card handed over to a buyer
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ClaimedCard {
    pub id: i64,
    pub card_key: String,
}

pub async fn counts(
    pool: &SqlitePool,
    product_id: &str,
    reservation_cutoff: i64,
) -> Result<LedgerCounts, sqlx::Error> {
    let (unused, available, locked): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN is_used = 0 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN is_used = 0
                AND (reserved_at IS NULL OR reserved_at < ?2) THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN is_used = 0
                AND reserved_at IS NOT NULL AND reserved_at >= ?2 THEN 1 ELSE 0 END), 0)
        FROM cards
        WHERE product_id = ?1
        "#,
    )
    .bind(product_id)
    .bind(reservation_cutoff)
    .fetch_one(pool)
    .await?;
    Ok(LedgerCounts {
        unused,
        available,
        locked,
    })
}

pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<Card>, sqlx::Error> {
    sqlx::query_as::<_, Card>(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_product(pool: &SqlitePool, product_id: &str) -> Result<Vec<Card>, sqlx::Error> {
    sqlx::query_as::<_, Card>(&format!(
        "SELECT {CARD_COLUMNS} FROM cards WHERE product_id = ? ORDER BY id ASC"
    ))
    .bind(product_id)
    .fetch_all(pool)
    .await
}

/// Unused card still bound to the order, regardless of reservation age
pub async fn find_reserved(pool: &SqlitePool, order_id: &str) -> Result<Option<Card>, sqlx::Error> {
    sqlx::query_as::<_, Card>(&format!(
        "SELECT {CARD_COLUMNS} FROM cards
         WHERE reserved_order_id = ? AND is_used = 0
         ORDER BY id ASC LIMIT 1"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_many(
    pool: &SqlitePool,
    product_id: &str,
    keys: &[String],
    now: i64,
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;
    for key in keys {
        inserted += sqlx::query("INSERT INTO cards (product_id, card_key, created_at) VALUES (?1, ?2, ?3)")
            .bind(product_id)
            .bind(key)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;
    Ok(inserted)
}

/// Delete a card only while it is unused and not reserved within the window.
pub async fn delete_if_free(
    pool: &SqlitePool,
    id: i64,
    reservation_cutoff: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM cards
        WHERE id = ?1 AND is_used = 0
          AND (reserved_at IS NULL OR reserved_at < ?2)
        "#,
    )
    .bind(id)
    .bind(reservation_cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Compare-and-swap the first free card of the product onto `order_id`.
pub async fn reserve(
    pool: &SqlitePool,
    product_id: &str,
    order_id: &str,
    now: i64,
    reservation_cutoff: i64,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE cards
        SET reserved_order_id = ?1, reserved_at = ?2
        WHERE id = (
                SELECT id FROM cards
                WHERE product_id = ?3 AND is_used = 0
                  AND (reserved_at IS NULL OR reserved_at < ?4)
                ORDER BY id ASC
                LIMIT 1
            )
          AND is_used = 0
          AND (reserved_at IS NULL OR reserved_at < ?4)
        RETURNING id
        "#,
    )
    .bind(order_id)
    .bind(now)
    .bind(product_id)
    .bind(reservation_cutoff)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.0))
}

/// Clear reservations on unused cards bound to `order_id`.
pub async fn release_for_order(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE cards SET reserved_order_id = NULL, reserved_at = NULL
         WHERE reserved_order_id = ? AND is_used = 0",
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Clear one card's reservation, only if it still belongs to `order_id`.
pub async fn release_card(
    pool: &SqlitePool,
    card_id: i64,
    order_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE cards SET reserved_order_id = NULL, reserved_at = NULL
         WHERE id = ?1 AND reserved_order_id = ?2 AND is_used = 0",
    )
    .bind(card_id)
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Consume the card reserved for `order_id`, even if its reservation aged out.
pub async fn consume_reserved(
    conn: &mut SqliteConnection,
    order_id: &str,
    now: i64,
) -> Result<Option<ClaimedCard>, sqlx::Error> {
    sqlx::query_as::<_, ClaimedCard>(
        r#"
        UPDATE cards
        SET is_used = 1, used_at = ?2, reserved_order_id = NULL, reserved_at = NULL
        WHERE id = (
                SELECT id FROM cards
                WHERE reserved_order_id = ?1 AND is_used = 0
                ORDER BY id ASC
                LIMIT 1
            )
          AND reserved_order_id = ?1
          AND is_used = 0
        RETURNING id, card_key
        "#,
    )
    .bind(order_id)
    .bind(now)
    .fetch_optional(conn)
    .await
}

/// Consume any free card of the product.
pub async fn consume_any(
    conn: &mut SqliteConnection,
    product_id: &str,
    now: i64,
    reservation_cutoff: i64,
) -> Result<Option<ClaimedCard>, sqlx::Error> {
    sqlx::query_as::<_, ClaimedCard>(
        r#"
        UPDATE cards
        SET is_used = 1, used_at = ?2, reserved_order_id = NULL, reserved_at = NULL
        WHERE id = (
                SELECT id FROM cards
                WHERE product_id = ?1 AND is_used = 0
                  AND (reserved_at IS NULL OR reserved_at < ?3)
                ORDER BY id ASC
                LIMIT 1
            )
          AND is_used = 0
          AND (reserved_at IS NULL OR reserved_at < ?3)
        RETURNING id, card_key
        "#,
    )
    .bind(product_id)
    .bind(now)
    .bind(reservation_cutoff)
    .fetch_optional(conn)
    .await
}

/// Oldest unused card of a shared product; read only, never consumed.
pub async fn peek_shared(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> Result<Option<ClaimedCard>, sqlx::Error> {
    sqlx::query_as::<_, ClaimedCard>(
        "SELECT id, card_key FROM cards WHERE product_id = ? AND is_used = 0 ORDER BY id ASC LIMIT 1",
    )
    .bind(product_id)
    .fetch_optional(conn)
    .await
}
