//! Stock ledger
//!
//! Counts and admin mutations over the card table. Counts are read live;
//! the cached product counters are refreshed afterwards by
//! [`super::aggregates`].

use shared::error::{AppError, ErrorCode};
use shared::models::{Card, parse_card_keys};
use sqlx::SqlitePool;

use super::{ShopRules, aggregates};
use crate::db;
use crate::error::ServiceResult;

/// Unused cards that are not reserved within the window
pub async fn count_available(
    pool: &SqlitePool,
    rules: &ShopRules,
    product_id: &str,
    now: i64,
) -> Result<i64, sqlx::Error> {
    let counts = db::cards::counts(pool, product_id, rules.reservation_cutoff(now)).await?;
    Ok(counts.available)
}

/// Unused cards reserved within the window
pub async fn count_locked(
    pool: &SqlitePool,
    rules: &ShopRules,
    product_id: &str,
    now: i64,
) -> Result<i64, sqlx::Error> {
    let counts = db::cards::counts(pool, product_id, rules.reservation_cutoff(now)).await?;
    Ok(counts.locked)
}

/// Summed quantity of paid and delivered orders.
///
/// Taken from orders rather than cards: a shared product never consumes its card.
pub async fn count_sold(pool: &SqlitePool, product_id: &str) -> Result<i64, sqlx::Error> {
    db::orders::sum_sold(pool, product_id).await
}

pub async fn list_cards(pool: &SqlitePool, product_id: &str) -> ServiceResult<Vec<Card>> {
    if db::products::find(pool, product_id).await?.is_none() {
        return Err(AppError::new(ErrorCode::ProductNotFound).into());
    }
    Ok(db::cards::list_by_product(pool, product_id).await?)
}

/// Bulk insert from a newline-delimited paste; returns the number inserted.
pub async fn add_cards(
    pool: &SqlitePool,
    rules: &ShopRules,
    product_id: &str,
    raw: &str,
    now: i64,
) -> ServiceResult<u64> {
    if db::products::find(pool, product_id).await?.is_none() {
        return Err(AppError::new(ErrorCode::ProductNotFound).into());
    }

    let keys = parse_card_keys(raw);
    if keys.is_empty() {
        return Err(AppError::validation("No card keys provided").into());
    }

    let inserted = db::cards::insert_many(pool, product_id, &keys, now).await?;
    tracing::info!(product_id, inserted, "Cards added");

    aggregates::recalc(pool, rules, product_id, now).await?;
    Ok(inserted)
}

/// Delete a card that is neither used nor reserved within the window.
pub async fn delete_card(
    pool: &SqlitePool,
    rules: &ShopRules,
    card_id: i64,
    now: i64,
) -> ServiceResult<()> {
    let Some(card) = db::cards::find(pool, card_id).await? else {
        return Err(AppError::new(ErrorCode::CardNotFound).into());
    };

    if db::cards::delete_if_free(pool, card_id, rules.reservation_cutoff(now)).await? {
        tracing::info!(card_id, product_id = %card.product_id, "Card deleted");
        aggregates::recalc(pool, rules, &card.product_id, now).await?;
        return Ok(());
    }

    // Re-read: the card may have changed between lookup and delete
    let card = db::cards::find(pool, card_id).await?.unwrap_or(card);
    if card.is_used {
        return Err(AppError::new(ErrorCode::CardAlreadyUsed)
            .with_detail("card_id", card_id)
            .into());
    }
    tracing::info!(card_id, order_id = ?card.reserved_order_id, "Card delete refused, reserved");
    Err(AppError::new(ErrorCode::CardReserved)
        .with_detail("card_id", card_id)
        .into())
}
