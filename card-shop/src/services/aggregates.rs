//! Aggregate recalculation
//!
//! Keeps `products.stock_count / locked_count / sold_count` in line with the
//! card ledger and order history so listings never run per-row subqueries.
//! Staleness is tolerated: callers recalculate after the events that matter
//! and the background sweeper catches the rest.

use std::collections::BTreeSet;

use shared::models::{StockAggregates, UNLIMITED_STOCK};
use sqlx::SqlitePool;

use super::ShopRules;
use crate::db;

/// Derive counters from ledger counts.
///
/// A shared product sells one reusable secret, so any unused card means
/// unlimited stock.
pub fn derive(is_shared: bool, counts: db::cards::LedgerCounts, sold: i64) -> StockAggregates {
    let stock = if is_shared {
        if counts.unused > 0 { UNLIMITED_STOCK } else { 0 }
    } else {
        counts.available
    };
    StockAggregates {
        stock,
        locked: counts.locked,
        sold,
    }
}

/// Recompute and persist one product's counters.
///
/// `Ok(None)` when the product does not exist or the schema is not there yet.
pub async fn recalc(
    pool: &SqlitePool,
    rules: &ShopRules,
    product_id: &str,
    now: i64,
) -> Result<Option<StockAggregates>, sqlx::Error> {
    match recalc_inner(pool, rules, product_id, now).await {
        Err(e) if db::is_missing_schema(&e) => {
            tracing::warn!(product_id, error = %e, "Skipping aggregate refresh, schema not ready");
            Ok(None)
        }
        other => other,
    }
}

async fn recalc_inner(
    pool: &SqlitePool,
    rules: &ShopRules,
    product_id: &str,
    now: i64,
) -> Result<Option<StockAggregates>, sqlx::Error> {
    let Some(is_shared) = db::products::is_shared(pool, product_id).await? else {
        return Ok(None);
    };

    let counts = db::cards::counts(pool, product_id, rules.reservation_cutoff(now)).await?;
    let sold = db::orders::sum_sold(pool, product_id).await?;
    let aggregates = derive(is_shared, counts, sold);

    db::products::write_aggregates(pool, product_id, &aggregates).await?;
    tracing::debug!(
        product_id,
        stock = aggregates.stock,
        locked = aggregates.locked,
        sold = aggregates.sold,
        "Product aggregates refreshed"
    );
    Ok(Some(aggregates))
}

/// Best-effort refresh of several products; ids are trimmed and deduplicated.
///
/// Returns how many products were refreshed. A failure is logged and the
/// loop moves on.
pub async fn recalc_many<I, S>(pool: &SqlitePool, rules: &ShopRules, product_ids: I, now: i64) -> usize
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let ids: BTreeSet<String> = product_ids
        .into_iter()
        .map(|id| id.as_ref().trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();

    let mut refreshed = 0;
    for id in &ids {
        match recalc(pool, rules, id, now).await {
            Ok(Some(_)) => refreshed += 1,
            Ok(None) => {}
            Err(e) => tracing::warn!(product_id = %id, error = %e, "Aggregate refresh failed"),
        }
    }
    refreshed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::cards::LedgerCounts;
    use crate::db::test_support::{seed_cards, seed_product, test_pool};

    const NOW: i64 = 10_000_000;

    #[test]
    fn test_derive_shared_is_unlimited() {
        let counts = LedgerCounts {
            unused: 1,
            available: 1,
            locked: 0,
        };
        assert_eq!(derive(true, counts, 3).stock, UNLIMITED_STOCK);
        assert_eq!(derive(false, counts, 3).stock, 1);

        let empty = LedgerCounts::default();
        assert_eq!(derive(true, empty, 0).stock, 0);
    }

    #[tokio::test]
    async fn test_recalc_counts_available_locked_sold() {
        let (pool, _dir) = test_pool().await;
        let rules = ShopRules::default();
        seed_product(&pool, "p1", false, None).await;
        let ids = seed_cards(&pool, "p1", &["A", "B", "C", "D"]).await;

        // B reserved recently, C reservation lapsed, D consumed
        sqlx::query("UPDATE cards SET reserved_order_id = 'O1', reserved_at = ? WHERE id = ?")
            .bind(NOW - 1_000)
            .bind(ids[1])
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE cards SET reserved_order_id = 'O2', reserved_at = ? WHERE id = ?")
            .bind(NOW - rules.reservation_window_ms - 1)
            .bind(ids[2])
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE cards SET is_used = 1, used_at = ? WHERE id = ?")
            .bind(NOW)
            .bind(ids[3])
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO orders (order_id, product_id, product_name, amount, status, quantity, created_at)
             VALUES ('O3', 'p1', 'P', '9.90', 'delivered', 1, 0),
                    ('O4', 'p1', 'P', '9.90', 'paid', 2, 0),
                    ('O5', 'p1', 'P', '9.90', 'refunded', 1, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let aggregates = recalc(&pool, &rules, "p1", NOW).await.unwrap().unwrap();
        assert_eq!(
            aggregates,
            StockAggregates {
                stock: 2,
                locked: 1,
                sold: 3
            }
        );

        let product = db::products::find(&pool, "p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 2);
        assert_eq!(product.locked_count, 1);
        assert_eq!(product.sold_count, 3);
    }

    #[tokio::test]
    async fn test_recalc_is_idempotent() {
        let (pool, _dir) = test_pool().await;
        let rules = ShopRules::default();
        seed_product(&pool, "p1", false, None).await;
        seed_cards(&pool, "p1", &["A", "B"]).await;

        let first = recalc(&pool, &rules, "p1", NOW).await.unwrap();
        let second = recalc(&pool, &rules, "p1", NOW).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_shared_single_card_reports_unlimited() {
        let (pool, _dir) = test_pool().await;
        let rules = ShopRules::default();
        seed_product(&pool, "s1", true, None).await;
        seed_cards(&pool, "s1", &["SHARED"]).await;

        let aggregates = recalc(&pool, &rules, "s1", NOW).await.unwrap().unwrap();
        assert_eq!(aggregates.stock, UNLIMITED_STOCK);
    }

    #[tokio::test]
    async fn test_recalc_unknown_product_is_noop() {
        let (pool, _dir) = test_pool().await;
        let result = recalc(&pool, &ShopRules::default(), "missing", NOW).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_recalc_tolerates_missing_table() {
        let (pool, _dir) = test_pool().await;
        seed_product(&pool, "p1", false, None).await;
        sqlx::query("DROP TABLE orders").execute(&pool).await.unwrap();

        let result = recalc(&pool, &ShopRules::default(), "p1", NOW).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_recalc_many_dedups_and_skips_failures() {
        let (pool, _dir) = test_pool().await;
        let rules = ShopRules::default();
        seed_product(&pool, "p1", false, None).await;
        seed_product(&pool, "p2", false, None).await;
        seed_cards(&pool, "p2", &["X"]).await;

        let refreshed =
            recalc_many(&pool, &rules, ["p1", " p1 ", "", "missing", "p2"], NOW).await;
        assert_eq!(refreshed, 2);

        let p2 = db::products::find(&pool, "p2").await.unwrap().unwrap();
        assert_eq!(p2.stock_count, 1);
    }
}
