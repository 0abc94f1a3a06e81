//! Gateway payment notice
//!
//! GET or POST /notify. Answers `success` once the notice is handled (or is
//! not a success notice) and `fail` otherwise, so the gateway retries.
//!
//! Fields come from the query string on GET and from the urlencoded body on
//! POST, whatever `Content-Type` the gateway sends.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{Method, StatusCode};
use shared::util::now_millis;

use crate::epay::{self, PaymentNotice};
use crate::services::lifecycle::{self, Settlement};
use crate::state::AppState;

pub async fn handle_notify(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let params: HashMap<String, String> = if method == Method::POST {
        url::form_urlencoded::parse(&body).into_owned().collect()
    } else {
        url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
            .into_owned()
            .collect()
    };

    // 1. Verify signature
    if let Err(e) = epay::verify(&params, &state.config.merchant_key) {
        tracing::warn!(error = e, out_trade_no = ?params.get("out_trade_no"), "Payment notice signature rejected");
        return (StatusCode::BAD_REQUEST, "fail");
    }

    let Some(notice) = PaymentNotice::from_params(&params) else {
        tracing::warn!(out_trade_no = ?params.get("out_trade_no"), "Malformed payment notice");
        return (StatusCode::BAD_REQUEST, "fail");
    };
    if !notice.is_success() {
        tracing::info!(order_id = %notice.out_trade_no, status = %notice.trade_status, "Non-success payment notice ignored");
        return (StatusCode::OK, "success");
    }

    // 2. Settle
    match lifecycle::settle_payment(
        &state.pool,
        &state.rules(),
        &notice.out_trade_no,
        &notice.trade_no,
        now_millis(),
    )
    .await
    {
        Ok(Settlement::UnknownOrder) => {
            // Nothing to retry for; acknowledge so the gateway stops
            (StatusCode::OK, "success")
        }
        Ok(_) => (StatusCode::OK, "success"),
        Err(e) => {
            tracing::error!(order_id = %notice.out_trade_no, error = %e, "Payment settlement failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "fail")
        }
    }
}
