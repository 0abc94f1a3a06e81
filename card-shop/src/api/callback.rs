//! Buyer return from the gateway
//!
//! The buyer may come back before the notice arrives; sweep the order so its
//! page shows a current status, then redirect to it.

use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use http::HeaderMap;
use serde::Deserialize;
use shared::util::now_millis;

use super::PENDING_ORDER_COOKIE;
use crate::auth::cookie_value;
use crate::services::sweeper::{self, SweepFilter};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReturnQuery {
    pub out_trade_no: Option<String>,
}

/// GET /callback/{id}
pub async fn handle_return_with_id(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Query(query): Query<ReturnQuery>,
    headers: HeaderMap,
) -> Redirect {
    let order_id = clean_order_id(Some(order_id))
        .or_else(|| clean_order_id(query.out_trade_no))
        .or_else(|| clean_order_id(cookie_value(&headers, PENDING_ORDER_COOKIE)));
    finish(&state, order_id).await
}

/// GET /return, GET /callback
pub async fn handle_return(
    State(state): State<AppState>,
    Query(query): Query<ReturnQuery>,
    headers: HeaderMap,
) -> Redirect {
    let order_id = clean_order_id(query.out_trade_no)
        .or_else(|| clean_order_id(cookie_value(&headers, PENDING_ORDER_COOKIE)));
    finish(&state, order_id).await
}

/// Gateways sometimes append their own query to the return URL.
fn clean_order_id(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    let id = raw.split('?').next().unwrap_or_default().trim();
    if id.is_empty() { None } else { Some(id.to_string()) }
}

async fn finish(state: &AppState, order_id: Option<String>) -> Redirect {
    let Some(order_id) = order_id else {
        return Redirect::to("/");
    };
    if let Err(e) =
        sweeper::sweep(&state.pool, &state.rules(), SweepFilter::order(&order_id), now_millis()).await
    {
        tracing::warn!(order_id = %order_id, error = %e, "Sweep on return failed");
    }
    Redirect::to(&format!("/order/{order_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_order_id() {
        assert_eq!(clean_order_id(Some("ORD1".into())).as_deref(), Some("ORD1"));
        assert_eq!(
            clean_order_id(Some("ORD1?trade_status=TRADE_SUCCESS".into())).as_deref(),
            Some("ORD1")
        );
        assert_eq!(clean_order_id(Some(" ".into())), None);
        assert_eq!(clean_order_id(Some("?x=1".into())), None);
        assert_eq!(clean_order_id(None), None);
    }
}
