//! Reservation coordinator
//!
//! Binds a free card to a pending order at checkout and hands a card over at
//! settlement. Claims are single conditional UPDATEs (see `db::cards`), so at
//! most one caller wins a given row no matter how requests interleave.

use shared::models::Card;
use sqlx::{SqliteConnection, SqlitePool};

use super::ShopRules;
use crate::db;
use crate::db::cards::ClaimedCard;

/// Claim the first free card of `product_id` for `order_id`.
///
/// `None` means nothing was free; that is a normal outcome.
pub async fn reserve(
    pool: &SqlitePool,
    rules: &ShopRules,
    product_id: &str,
    order_id: &str,
    now: i64,
) -> Result<Option<i64>, sqlx::Error> {
    let card_id =
        db::cards::reserve(pool, product_id, order_id, now, rules.reservation_cutoff(now)).await?;
    match card_id {
        Some(card_id) => tracing::debug!(product_id, order_id, card_id, "Card reserved"),
        None => tracing::debug!(product_id, order_id, "No free card to reserve"),
    }
    Ok(card_id)
}

/// Clear every reservation still held by `order_id`; the sweeper calls this
/// inside the transaction that cancels the order.
pub async fn release(conn: &mut SqliteConnection, order_id: &str) -> Result<u64, sqlx::Error> {
    let released = db::cards::release_for_order(conn, order_id).await?;
    if released > 0 {
        tracing::debug!(order_id, released, "Reservation released");
    }
    Ok(released)
}

/// Undo one reservation taken for `order_id`; rollback path of order creation.
pub async fn release_card(
    pool: &SqlitePool,
    card_id: i64,
    order_id: &str,
) -> Result<bool, sqlx::Error> {
    db::cards::release_card(pool, card_id, order_id).await
}

pub async fn get_reserved(pool: &SqlitePool, order_id: &str) -> Result<Option<Card>, sqlx::Error> {
    db::cards::find_reserved(pool, order_id).await
}

/// Consume any free card of the product, without a prior reservation.
pub async fn claim_any(
    conn: &mut SqliteConnection,
    rules: &ShopRules,
    product_id: &str,
    now: i64,
) -> Result<Option<ClaimedCard>, sqlx::Error> {
    db::cards::consume_any(conn, product_id, now, rules.reservation_cutoff(now)).await
}

/// Card to deliver for a paid order.
///
/// Prefers the card still bound to the order, even if its reservation aged
/// out; otherwise takes any free card of the product. The buyer may then get
/// a different card than the one reserved at checkout.
pub async fn claim_for_order(
    conn: &mut SqliteConnection,
    rules: &ShopRules,
    product_id: &str,
    order_id: &str,
    now: i64,
) -> Result<Option<ClaimedCard>, sqlx::Error> {
    if let Some(card) = db::cards::consume_reserved(conn, order_id, now).await? {
        return Ok(Some(card));
    }
    let card = claim_any(conn, rules, product_id, now).await?;
    if let Some(card) = &card {
        tracing::info!(
            order_id,
            product_id,
            card_id = card.id,
            "Reservation gone, delivering another free card"
        );
    }
    Ok(card)
}
