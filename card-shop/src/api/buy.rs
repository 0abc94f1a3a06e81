//! Checkout: create a pending order and hand the buyer to the gateway

use axum::Form;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use shared::error::AppError;
use shared::util::now_millis;

use super::PENDING_ORDER_COOKIE;
use crate::auth::MaybeSession;
use crate::epay;
use crate::services::lifecycle::{self, BuyRequest, CreateOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BuyForm {
    pub product_id: String,
    pub email: Option<String>,
    pub csrf_token: Option<String>,
}

/// POST /buy
///
/// Success renders a self-submitting gateway form; a rejection redirects
/// back to the product page with `?error={code}`, or is a JSON error for
/// callers that accept JSON.
pub async fn create_order(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    headers: HeaderMap,
    Form(form): Form<BuyForm>,
) -> Result<Response, AppError> {
    let product_id = form.product_id.trim();
    if product_id.is_empty() {
        return Err(AppError::validation("product_id is required"));
    }

    let request = BuyRequest {
        product_id,
        email: form.email.as_deref(),
        csrf_token: form.csrf_token.as_deref(),
        session: session.as_ref(),
    };
    let outcome = lifecycle::create_order(&state.pool, &state.rules(), request, now_millis()).await?;

    match outcome {
        CreateOutcome::Created(order) => {
            let params = epay::checkout_params(&order, &state.config);
            let html = epay::checkout_form(&state.config.pay_url, &params);
            let cookie = format!(
                "{PENDING_ORDER_COOKIE}={}; Path=/; SameSite=Lax; HttpOnly; Max-Age={}",
                order.order_id, state.config.payment_timeout_secs
            );
            Ok(([(http::header::SET_COOKIE, cookie)], Html(html)).into_response())
        }
        CreateOutcome::Rejected(rejection) => {
            tracing::info!(product_id, reason = rejection.as_str(), "Checkout rejected");
            if accepts_json(&headers) {
                return Err(rejection.into());
            }
            Ok(Redirect::to(&format!("/buy/{product_id}?error={}", rejection.as_str())).into_response())
        }
    }
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}
