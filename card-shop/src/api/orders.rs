//! Order queries
//!
//! The order page always exists, whatever happened to the checkout. The card
//! secret is only shown to the buyer: the browser holding the
//! `pending_order` cookie or the signed-in owner.

use axum::Json;
use axum::extract::{Path, State};
use http::HeaderMap;
use shared::error::{AppError, ErrorCode};
use shared::models::Order;
use shared::util::now_millis;

use super::{ApiResult, PENDING_ORDER_COOKIE};
use crate::auth::{CurrentSession, MaybeSession, cookie_value};
use crate::db::{self, sessions::Session};
use crate::error::ServiceError;
use crate::services::sweeper::{self, SweepFilter};
use crate::state::AppState;

const MY_ORDERS_LIMIT: i64 = 50;

/// Whether the requester may see `order.card_key`
pub fn can_view_key(order: &Order, session: Option<&Session>, pending_order: Option<&str>) -> bool {
    if pending_order == Some(order.order_id.as_str()) {
        return true;
    }
    let Some(session) = session else {
        return false;
    };
    order.user_id.as_deref() == Some(session.user_id.as_str())
        || order.username.as_deref() == Some(session.username.as_str())
}

/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Path(order_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Order> {
    let now = now_millis();
    sweeper::sweep(&state.pool, &state.rules(), SweepFilter::order(&order_id), now)
        .await
        .map_err(ServiceError::from)?;

    let mut order = db::orders::find(&state.pool, &order_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;

    let pending = cookie_value(&headers, PENDING_ORDER_COOKIE);
    if !can_view_key(&order, session.as_ref(), pending.as_deref()) {
        order.card_key = None;
    }
    Ok(Json(order))
}

/// GET /api/orders
pub async fn list_my_orders(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult<Vec<Order>> {
    let now = now_millis();
    sweeper::sweep(&state.pool, &state.rules(), SweepFilter::user(&session.user_id), now)
        .await
        .map_err(ServiceError::from)?;

    let orders = db::orders::list_by_user(&state.pool, &session.user_id, MY_ORDERS_LIMIT)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(orders))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::OrderStatus;

    fn order(user_id: Option<&str>, username: Option<&str>) -> Order {
        Order {
            order_id: "ORD1".into(),
            product_id: "p1".into(),
            product_name: "P".into(),
            amount: "1.00".into(),
            email: None,
            status: OrderStatus::Delivered,
            trade_no: Some("T1".into()),
            card_key: Some("SECRET".into()),
            paid_at: Some(1),
            delivered_at: Some(1),
            user_id: user_id.map(str::to_string),
            username: username.map(str::to_string),
            quantity: 1,
            points_used: 0,
            created_at: 0,
        }
    }

    fn session(user_id: &str, username: &str) -> Session {
        Session {
            id: "s".into(),
            user_id: user_id.into(),
            username: username.into(),
            csrf_token: "t".into(),
            expires_at: i64::MAX,
        }
    }

    #[test]
    fn test_pending_cookie_grants_view() {
        let guest_order = order(None, None);
        assert!(can_view_key(&guest_order, None, Some("ORD1")));
        assert!(!can_view_key(&guest_order, None, Some("ORD2")));
        assert!(!can_view_key(&guest_order, None, None));
    }

    #[test]
    fn test_owner_by_user_id_or_username() {
        let owned = order(Some("u1"), Some("alice"));
        assert!(can_view_key(&owned, Some(&session("u1", "x")), None));
        assert!(can_view_key(&owned, Some(&session("u9", "alice")), None));
        assert!(!can_view_key(&owned, Some(&session("u2", "bob")), None));

        // A guest order never matches a session
        let guest_order = order(None, None);
        assert!(!can_view_key(&guest_order, Some(&session("u1", "alice")), None));
    }
}
