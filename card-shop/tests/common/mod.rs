//! Shared fixtures for the integration tests

#![allow(dead_code)]

use card_shop::db::sessions::{self, Session};
use card_shop::services::{catalog, ledger};
use card_shop::{AppState, Config, epay};
use shared::models::ProductUpsert;
use shared::util::now_millis;
use tempfile::TempDir;

pub const MERCHANT_KEY: &str = "test-key";

/// Migrated state on a temp-dir database; keep the `TempDir` alive.
pub async fn test_state() -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("shop.db").display());
    let config = Config::from_lookup(|name| match name {
        "DATABASE_URL" => Some(url.clone()),
        "MERCHANT_ID" => Some("1001".into()),
        "MERCHANT_KEY" => Some(MERCHANT_KEY.into()),
        "PUBLIC_BASE_URL" => Some("https://shop.test".into()),
        "ADMIN_USERS" => Some("admin".into()),
        "DB_MAX_CONNECTIONS" => Some("8".into()),
        _ => None,
    })
    .unwrap();
    let state = AppState::new(&config).await.unwrap();
    (state, dir)
}

pub async fn seed_product(state: &AppState, id: &str, is_shared: bool, keys: &[&str]) {
    let payload = ProductUpsert {
        id: Some(id.into()),
        name: format!("Product {id}"),
        description: None,
        price: "9.90".into(),
        category: None,
        image: None,
        is_active: Some(true),
        is_shared: Some(is_shared),
        sort_order: None,
        purchase_limit: None,
    };
    let now = now_millis();
    catalog::upsert_product(&state.pool, &state.rules(), &payload, now)
        .await
        .unwrap();
    if !keys.is_empty() {
        ledger::add_cards(&state.pool, &state.rules(), id, &keys.join("\n"), now)
            .await
            .unwrap();
    }
}

/// Signed-in user; the session id doubles as the cookie value.
pub async fn seed_session(state: &AppState, user_id: &str, username: &str) -> Session {
    let session = Session {
        id: format!("sess-{user_id}"),
        user_id: user_id.into(),
        username: username.into(),
        csrf_token: format!("csrf-{user_id}"),
        expires_at: now_millis() + 3_600_000,
    };
    sessions::upsert(&state.pool, &session).await.unwrap();
    session
}

/// Form body of a gateway notice, signed with `key`
pub fn notice_body(order_id: &str, trade_no: &str, status: &str, key: &str) -> String {
    let mut pairs = vec![
        ("pid", "1001"),
        ("trade_no", trade_no),
        ("out_trade_no", order_id),
        ("type", "epay"),
        ("name", "Product"),
        ("money", "9.90"),
        ("trade_status", status),
    ];
    let sign = epay::sign(pairs.iter().copied(), key);
    pairs.push(("sign_type", "MD5"));
    let mut body = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    body.push_str(&format!("&sign={sign}"));
    body
}

pub async fn card_states(state: &AppState, product_id: &str) -> Vec<(bool, Option<String>)> {
    sqlx::query_as("SELECT is_used, reserved_order_id FROM cards WHERE product_id = ? ORDER BY id")
        .bind(product_id)
        .fetch_all(&state.pool)
        .await
        .unwrap()
}
