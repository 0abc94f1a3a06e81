//! Expiry sweeper
//!
//! Cancels pending orders whose payment window elapsed and returns their
//! reserved cards to the pool. Runs before storefront reads (scoped to what
//! the read needs) and on a background tick (global).

use std::time::Duration;

use serde::Serialize;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use super::{ShopRules, aggregates, reservation};
use crate::db;
use crate::db::orders::ExpiredFilter;

/// Narrows a sweep; all `None` sweeps everything
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepFilter<'a> {
    pub product_id: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub order_id: Option<&'a str>,
}

impl<'a> SweepFilter<'a> {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn product(product_id: &'a str) -> Self {
        Self {
            product_id: Some(product_id),
            ..Self::default()
        }
    }

    pub fn user(user_id: &'a str) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn order(order_id: &'a str) -> Self {
        Self {
            order_id: Some(order_id),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Orders moved `pending → cancelled`
    pub cancelled: Vec<String>,
    pub released_cards: u64,
    /// Products whose counters were refreshed
    pub products: Vec<String>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.cancelled.is_empty()
    }
}

/// Cancel expired pending orders matching `filter` and release their cards.
///
/// Idempotent: an order already cancelled is not selected again. A missing
/// table means there is nothing to sweep.
pub async fn sweep(
    pool: &SqlitePool,
    rules: &ShopRules,
    filter: SweepFilter<'_>,
    now: i64,
) -> Result<SweepReport, sqlx::Error> {
    match sweep_inner(pool, rules, filter, now).await {
        Err(e) if db::is_missing_schema(&e) => {
            tracing::warn!(error = %e, "Sweep skipped, schema not ready");
            Ok(SweepReport::default())
        }
        other => other,
    }
}

async fn sweep_inner(
    pool: &SqlitePool,
    rules: &ShopRules,
    filter: SweepFilter<'_>,
    now: i64,
) -> Result<SweepReport, sqlx::Error> {
    let expired = ExpiredFilter {
        product_id: filter.product_id,
        user_id: filter.user_id,
        order_id: filter.order_id,
        created_before: rules.payment_cutoff(now),
    };

    let mut tx = pool.begin().await?;
    let cancelled = db::orders::cancel_expired(&mut *tx, &expired).await?;
    if cancelled.is_empty() {
        tx.rollback().await?;
        return Ok(SweepReport::default());
    }

    let mut released_cards = 0;
    for (order_id, _) in &cancelled {
        released_cards += reservation::release(&mut *tx, order_id).await?;
    }
    tx.commit().await?;

    let (orders, mut products): (Vec<String>, Vec<String>) = cancelled.into_iter().unzip();
    products.sort();
    products.dedup();

    tracing::info!(
        cancelled = orders.len(),
        released_cards,
        "Expired pending orders cancelled"
    );
    aggregates::recalc_many(pool, rules, &products, now).await;

    Ok(SweepReport {
        cancelled: orders,
        released_cards,
        products,
    })
}

/// One background pass.
///
/// Reservations lapse without any order being cancelled, so products whose
/// cached `locked_count` is non-zero are refreshed too.
pub async fn tick(pool: &SqlitePool, rules: &ShopRules, now: i64) -> Result<SweepReport, sqlx::Error> {
    let report = sweep(pool, rules, SweepFilter::all(), now).await?;

    let stale: Vec<String> = match db::products::ids_with_locked(pool).await {
        Ok(ids) => ids
            .into_iter()
            .filter(|id| !report.products.contains(id))
            .collect(),
        Err(e) if db::is_missing_schema(&e) => Vec::new(),
        Err(e) => return Err(e),
    };
    if !stale.is_empty() {
        aggregates::recalc_many(pool, rules, &stale, now).await;
    }

    match db::sessions::delete_expired(pool, now).await {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "Expired sessions removed"),
        Err(e) => tracing::warn!(error = %e, "Failed to remove expired sessions"),
    }

    Ok(report)
}

/// Run [`tick`] every `interval` until `shutdown` fires.
pub async fn run_periodic(
    pool: SqlitePool,
    rules: ShopRules,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(interval_secs = interval.as_secs(), "Expiry sweeper started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Expiry sweeper stopped");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = tick(&pool, &rules, shared::util::now_millis()).await {
                    tracing::error!(error = %e, "Expiry sweep failed");
                }
            }
        }
    }
}
