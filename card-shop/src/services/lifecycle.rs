//! Order lifecycle
//!
//! `pending → {delivered, paid, cancelled}`, `cancelled → {delivered, paid}`,
//! `paid → {delivered, refunded}`, `delivered → refunded`.
//!
//! - [`create_order`]: checkout; reserves a card before the order row exists
//! - [`settle_payment`]: verified gateway notice; delivers or records an oversell
//! - [`fulfill`]: admin hands a card to an oversold (`paid`) order
//! - [`refund`]: admin bookkeeping after a gateway-side refund
//!
//! Expected negative outcomes are returned as values ([`CreateOutcome`],
//! [`Settlement`]); only infrastructure failures are errors.

use shared::error::{AppError, ErrorCode};
use shared::models::{NotificationKind, Order, OrderStatus};
use shared::util::generate_order_id;
use sqlx::SqlitePool;

use super::sweeper::{self, SweepFilter};
use super::{ShopRules, aggregates, notify, reservation};
use crate::db;
use crate::db::orders::CreateOrder;
use crate::db::sessions::Session;
use crate::error::ServiceResult;

/// Fresh ids tried before giving up on a primary-key collision
const MAX_ID_ATTEMPTS: usize = 3;

/// Why a checkout was turned away; `as_str` is the code shown to the buyer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyRejection {
    /// Submitted token does not match the session
    Csrf,
    /// Purchase limit reached
    Limit,
    /// No unused card at all
    OutOfStock,
    /// Every unused card is reserved by someone mid-checkout
    StockLocked,
    Inactive,
    /// Guest checkout disabled and no session
    Login,
}

impl BuyRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csrf => "csrf",
            Self::Limit => "limit",
            Self::OutOfStock => "out_of_stock",
            Self::StockLocked => "stock_locked",
            Self::Inactive => "inactive",
            Self::Login => "login",
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Csrf => ErrorCode::CsrfMismatch,
            Self::Limit => ErrorCode::PurchaseLimitReached,
            Self::OutOfStock => ErrorCode::ProductOutOfStock,
            Self::StockLocked => ErrorCode::StockLocked,
            Self::Inactive => ErrorCode::ProductInactive,
            Self::Login => ErrorCode::NotAuthenticated,
        }
    }
}

impl From<BuyRejection> for AppError {
    fn from(rejection: BuyRejection) -> Self {
        AppError::new(rejection.error_code()).with_detail("reason", rejection.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(Order),
    Rejected(BuyRejection),
}

/// Checkout input as submitted from the product page
#[derive(Debug, Clone, Copy)]
pub struct BuyRequest<'a> {
    pub product_id: &'a str,
    pub email: Option<&'a str>,
    pub csrf_token: Option<&'a str>,
    pub session: Option<&'a Session>,
}

/// Result of a verified payment notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Card handed over; order is `delivered`
    Delivered { card_id: i64, card_key: String },
    /// Money captured with no card left; order is `paid` and awaits an admin
    PaidUndelivered,
    /// Order was not payable any more (duplicate notice or a lost race)
    AlreadySettled(OrderStatus),
    UnknownOrder,
}

/// Create a pending order with a reserved card.
pub async fn create_order(
    pool: &SqlitePool,
    rules: &ShopRules,
    request: BuyRequest<'_>,
    now: i64,
) -> ServiceResult<CreateOutcome> {
    create_order_with_ids(pool, rules, request, now, generate_order_id).await
}

/// [`create_order`] with a caller-supplied id source.
pub async fn create_order_with_ids(
    pool: &SqlitePool,
    rules: &ShopRules,
    request: BuyRequest<'_>,
    now: i64,
    mut next_id: impl FnMut() -> String,
) -> ServiceResult<CreateOutcome> {
    let product_id = request.product_id;

    // 1. Who is buying
    match request.session {
        Some(session) => {
            if request.csrf_token != Some(session.csrf_token.as_str()) {
                tracing::warn!(product_id, user_id = %session.user_id, "Checkout CSRF token mismatch");
                return Ok(CreateOutcome::Rejected(BuyRejection::Csrf));
            }
        }
        None if !rules.allow_guest_checkout => {
            return Ok(CreateOutcome::Rejected(BuyRejection::Login));
        }
        None => {}
    }
    let user_id = request.session.map(|s| s.user_id.as_str());
    let username = request.session.map(|s| s.username.as_str());
    let email = request.email.map(str::trim).filter(|e| !e.is_empty());

    // 2. Free cards held by expired orders of this product
    sweeper::sweep(pool, rules, SweepFilter::product(product_id), now).await?;

    let Some(product) = db::products::find(pool, product_id).await? else {
        return Err(AppError::new(ErrorCode::ProductNotFound).into());
    };
    if !product.is_active {
        return Ok(CreateOutcome::Rejected(BuyRejection::Inactive));
    }

    // 3. Purchase limit, by whichever identities are present
    if let Some(limit) = product.purchase_limit.filter(|l| *l > 0)
        && (user_id.is_some() || email.is_some())
    {
        let bought = db::orders::count_purchases(pool, product_id, user_id, email).await?;
        if bought >= limit {
            tracing::info!(product_id, bought, limit, "Purchase limit reached");
            return Ok(CreateOutcome::Rejected(BuyRejection::Limit));
        }
    }

    // 4. Live stock
    let counts = db::cards::counts(pool, product_id, rules.reservation_cutoff(now)).await?;
    if product.is_shared {
        if counts.unused == 0 {
            return Ok(CreateOutcome::Rejected(BuyRejection::OutOfStock));
        }
    } else if counts.available == 0 {
        let rejection = if counts.locked > 0 {
            BuyRejection::StockLocked
        } else {
            BuyRejection::OutOfStock
        };
        return Ok(CreateOutcome::Rejected(rejection));
    }

    // 5. Reserve, then insert; a shared product keeps its card unreserved
    for attempt in 1..=MAX_ID_ATTEMPTS {
        let order_id = next_id();

        let card_id = if product.is_shared {
            None
        } else {
            match reservation::reserve(pool, rules, product_id, &order_id, now).await? {
                Some(card_id) => Some(card_id),
                None => return Ok(CreateOutcome::Rejected(BuyRejection::StockLocked)),
            }
        };

        let insert = db::orders::create(
            pool,
            &CreateOrder {
                order_id: &order_id,
                product_id,
                product_name: &product.name,
                amount: &product.price,
                email,
                user_id,
                username,
                now,
            },
        )
        .await;

        match insert {
            Ok(()) => {
                tracing::info!(order_id = %order_id, product_id, card_id, "Order created");
                if let Err(e) = aggregates::recalc(pool, rules, product_id, now).await {
                    tracing::warn!(product_id, error = %e, "Aggregate refresh after checkout failed");
                }
                return Ok(CreateOutcome::Created(Order {
                    order_id,
                    product_id: product.id.clone(),
                    product_name: product.name.clone(),
                    amount: product.price.clone(),
                    email: email.map(str::to_string),
                    status: OrderStatus::Pending,
                    trade_no: None,
                    card_key: None,
                    paid_at: None,
                    delivered_at: None,
                    user_id: user_id.map(str::to_string),
                    username: username.map(str::to_string),
                    quantity: 1,
                    points_used: 0,
                    created_at: now,
                }));
            }
            Err(e) => {
                // Release by card id: the order id may belong to someone else
                if let Some(card_id) = card_id
                    && let Err(release_err) =
                        reservation::release_card(pool, card_id, &order_id).await
                {
                    tracing::error!(card_id, error = %release_err, "Failed to release reservation");
                }
                if db::is_unique_violation(&e) && attempt < MAX_ID_ATTEMPTS {
                    tracing::warn!(order_id = %order_id, attempt, "Order id collision, retrying");
                    continue;
                }
                return Err(e.into());
            }
        }
    }

    Err(AppError::internal("Could not allocate an order id").into())
}

/// Apply a verified payment success for `order_id`.
///
/// A cancelled order is still honoured. The order update runs first in the
/// transaction and is conditional, so a duplicate notice rolls back without
/// consuming anything.
pub async fn settle_payment(
    pool: &SqlitePool,
    rules: &ShopRules,
    order_id: &str,
    trade_no: &str,
    now: i64,
) -> Result<Settlement, sqlx::Error> {
    let Some(order) = db::orders::find(pool, order_id).await? else {
        tracing::warn!(order_id, "Payment notice for unknown order");
        return Ok(Settlement::UnknownOrder);
    };
    if !order.status.accepts_payment() {
        tracing::info!(order_id, status = order.status.as_db(), "Duplicate payment notice ignored");
        return Ok(Settlement::AlreadySettled(order.status));
    }
    let is_shared = db::products::is_shared(pool, &order.product_id)
        .await?
        .unwrap_or(false);

    let mut tx = pool.begin().await?;
    if !db::orders::mark_paid(&mut *tx, order_id, trade_no, now).await? {
        tx.rollback().await?;
        let status = db::orders::find(pool, order_id)
            .await?
            .map(|o| o.status)
            .unwrap_or(order.status);
        tracing::info!(order_id, status = status.as_db(), "Order settled concurrently");
        return Ok(Settlement::AlreadySettled(status));
    }

    let card = if is_shared {
        db::cards::peek_shared(&mut *tx, &order.product_id).await?
    } else {
        reservation::claim_for_order(&mut *tx, rules, &order.product_id, order_id, now).await?
    };

    let settlement = match card {
        Some(card) => {
            if !db::orders::mark_delivered(&mut *tx, order_id, &card.card_key, now).await? {
                tx.rollback().await?;
                return Err(sqlx::Error::RowNotFound);
            }
            tx.commit().await?;
            tracing::info!(order_id, trade_no, card_id = card.id, "Order paid and delivered");
            Settlement::Delivered {
                card_id: card.id,
                card_key: card.card_key,
            }
        }
        None => {
            tx.commit().await?;
            tracing::warn!(
                order_id,
                trade_no,
                product_id = %order.product_id,
                "Oversell: order paid but no card available, manual delivery required"
            );
            Settlement::PaidUndelivered
        }
    };

    if let Err(e) = aggregates::recalc(pool, rules, &order.product_id, now).await {
        tracing::warn!(product_id = %order.product_id, error = %e, "Aggregate refresh after payment failed");
    }
    let kind = match settlement {
        Settlement::Delivered { .. } => NotificationKind::OrderDelivered,
        _ => NotificationKind::OrderPaidPending,
    };
    notify::notify_buyer(pool, &order, kind, now).await;

    Ok(settlement)
}

/// Deliver a card to a `paid` (oversold) order.
pub async fn fulfill(
    pool: &SqlitePool,
    rules: &ShopRules,
    order_id: &str,
    now: i64,
) -> ServiceResult<Order> {
    let Some(order) = db::orders::find(pool, order_id).await? else {
        return Err(AppError::new(ErrorCode::OrderNotFound).into());
    };
    if order.status != OrderStatus::Paid {
        return Err(AppError::new(ErrorCode::OrderNotFulfillable)
            .with_detail("status", order.status.as_db())
            .into());
    }
    let is_shared = db::products::is_shared(pool, &order.product_id)
        .await?
        .unwrap_or(false);

    let card_id = if is_shared {
        let mut conn = pool.acquire().await?;
        let Some(card) = db::cards::peek_shared(&mut conn, &order.product_id).await? else {
            return Err(AppError::new(ErrorCode::ProductOutOfStock).into());
        };
        if !db::orders::mark_delivered(&mut conn, order_id, &card.card_key, now).await? {
            return Err(AppError::new(ErrorCode::OrderNotFulfillable).into());
        }
        card.id
    } else {
        let mut tx = pool.begin().await?;
        let Some(card) = reservation::claim_any(&mut *tx, rules, &order.product_id, now).await?
        else {
            tx.rollback().await?;
            return Err(AppError::new(ErrorCode::ProductOutOfStock).into());
        };
        if !db::orders::mark_delivered(&mut *tx, order_id, &card.card_key, now).await? {
            tx.rollback().await?;
            return Err(AppError::new(ErrorCode::OrderNotFulfillable).into());
        }
        tx.commit().await?;
        card.id
    };
    tracing::info!(order_id, card_id, "Oversold order fulfilled");

    aggregates::recalc(pool, rules, &order.product_id, now).await?;
    notify::notify_buyer(pool, &order, NotificationKind::OrderDelivered, now).await;

    db::orders::find(pool, order_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound).into())
}

/// Mark a paid or delivered order refunded once the gateway refund is done.
pub async fn refund(
    pool: &SqlitePool,
    rules: &ShopRules,
    order_id: &str,
    now: i64,
) -> ServiceResult<Order> {
    let Some(order) = db::orders::find(pool, order_id).await? else {
        return Err(AppError::new(ErrorCode::OrderNotFound).into());
    };
    if !order.status.can_transition_to(OrderStatus::Refunded)
        || !db::orders::mark_refunded(pool, order_id).await?
    {
        return Err(AppError::new(ErrorCode::OrderNotRefundable)
            .with_detail("status", order.status.as_db())
            .into());
    }
    let order = Order {
        status: OrderStatus::Refunded,
        ..order
    };
    tracing::info!(order_id, "Order refunded");

    aggregates::recalc(pool, rules, &order.product_id, now).await?;
    notify::notify_buyer(pool, &order, NotificationKind::OrderRefunded, now).await;
    Ok(order)
}
