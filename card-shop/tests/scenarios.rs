//! End-to-end inventory scenarios on a migrated database

mod common;

use card_shop::AppState;
use card_shop::db;
use card_shop::services::lifecycle::{self, BuyRejection, BuyRequest, CreateOutcome, Settlement};
use card_shop::services::sweeper::{self, SweepFilter};
use card_shop::services::{aggregates, catalog, ledger, reservation};
use common::{seed_product, seed_session, test_state};
use shared::error::ErrorCode;
use shared::models::{Order, OrderStatus, ProductUpsert};
use shared::util::now_millis;

fn guest(product_id: &str) -> BuyRequest<'_> {
    BuyRequest {
        product_id,
        email: None,
        csrf_token: None,
        session: None,
    }
}

async fn buy(state: &AppState, request: BuyRequest<'_>, now: i64) -> Order {
    match lifecycle::create_order(&state.pool, &state.rules(), request, now)
        .await
        .unwrap()
    {
        CreateOutcome::Created(order) => order,
        CreateOutcome::Rejected(r) => panic!("checkout rejected: {}", r.as_str()),
    }
}

/// Card and order rows that break the ledger invariants
async fn assert_ledger_consistent(state: &AppState) {
    let (bad_cards,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM cards
         WHERE is_used = 1 AND (reserved_order_id IS NOT NULL OR reserved_at IS NOT NULL)",
    )
    .fetch_one(&state.pool)
    .await
    .unwrap();
    assert_eq!(bad_cards, 0, "used card still carries a reservation");

    let (bad_orders,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders
         WHERE card_key IS NOT NULL AND status NOT IN ('delivered', 'refunded')",
    )
    .fetch_one(&state.pool)
    .await
    .unwrap();
    assert_eq!(bad_orders, 0, "card key on an undelivered order");
}

#[tokio::test]
async fn test_expired_order_frees_card_for_next_buyer() {
    let (state, _dir) = test_state().await;
    let rules = state.rules();
    seed_product(&state, "p1", false, &["ONLY"]).await;
    let t0 = now_millis();

    let first = buy(&state, guest("p1"), t0).await;
    let held = reservation::get_reserved(&state.pool, &first.order_id)
        .await
        .unwrap()
        .unwrap();

    // Ten minutes without payment
    let later = t0 + 10 * 60_000;
    let report = sweeper::sweep(&state.pool, &rules, SweepFilter::all(), later)
        .await
        .unwrap();
    assert_eq!(report.cancelled, vec![first.order_id.clone()]);

    let order = db::orders::find(&state.pool, &first.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);

    let second = buy(&state, guest("p1"), later).await;
    let card = reservation::get_reserved(&state.pool, &second.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(card.id, held.id);
    assert_ledger_consistent(&state).await;
}

#[tokio::test]
async fn test_late_payment_after_cancel_is_honoured() {
    let (state, _dir) = test_state().await;
    let rules = state.rules();
    seed_product(&state, "p1", false, &["ONLY"]).await;
    let t0 = now_millis();

    let order = buy(&state, guest("p1"), t0).await;
    let swept_at = t0 + rules.payment_timeout_ms + 1;
    sweeper::sweep(&state.pool, &rules, SweepFilter::order(&order.order_id), swept_at)
        .await
        .unwrap();

    let settlement =
        lifecycle::settle_payment(&state.pool, &rules, &order.order_id, "T-LATE", swept_at + 1_000)
            .await
            .unwrap();
    assert!(matches!(settlement, Settlement::Delivered { ref card_key, .. } if card_key == "ONLY"));

    let order = db::orders::find(&state.pool, &order.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(order.trade_no.as_deref(), Some("T-LATE"));
    assert_ledger_consistent(&state).await;
}

#[tokio::test]
async fn test_late_payment_without_stock_is_recorded_paid() {
    let (state, _dir) = test_state().await;
    let rules = state.rules();
    seed_product(&state, "p1", false, &["ONLY"]).await;
    let t0 = now_millis();

    let first = buy(&state, guest("p1"), t0).await;
    let swept_at = t0 + rules.payment_timeout_ms + 1;
    sweeper::sweep(&state.pool, &rules, SweepFilter::all(), swept_at)
        .await
        .unwrap();

    // Someone else holds the only card when the late notice lands
    let second = buy(&state, guest("p1"), swept_at).await;
    let settlement =
        lifecycle::settle_payment(&state.pool, &rules, &first.order_id, "T-LATE", swept_at + 1_000)
            .await
            .unwrap();
    assert_eq!(settlement, Settlement::PaidUndelivered);

    let order = db::orders::find(&state.pool, &first.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.trade_no.as_deref(), Some("T-LATE"));
    assert!(order.card_key.is_none());

    // The other buyer's reservation is untouched
    let card = reservation::get_reserved(&state.pool, &second.order_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!card.is_used);

    let product = db::products::find(&state.pool, "p1").await.unwrap().unwrap();
    assert_eq!(product.sold_count, 1);
    assert_ledger_consistent(&state).await;
}

#[tokio::test]
async fn test_reserved_card_survives_delete_attempt() {
    let (state, _dir) = test_state().await;
    let rules = state.rules();
    seed_product(&state, "p1", false, &["ONLY"]).await;
    let now = now_millis();

    let order = buy(&state, guest("p1"), now).await;
    let card = reservation::get_reserved(&state.pool, &order.order_id)
        .await
        .unwrap()
        .unwrap();

    let err = ledger::delete_card(&state.pool, &rules, card.id, now + 1_000)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::CardReserved);

    let cards = ledger::list_cards(&state.pool, "p1").await.unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].reserved_order_id.as_deref(), Some(order.order_id.as_str()));
}

#[tokio::test]
async fn test_purchase_limit_leaves_no_reservation() {
    let (state, _dir) = test_state().await;
    let rules = state.rules();
    let now = now_millis();
    catalog::upsert_product(
        &state.pool,
        &rules,
        &ProductUpsert {
            id: Some("p1".into()),
            name: "Limited".into(),
            description: None,
            price: "5".into(),
            category: None,
            image: None,
            is_active: Some(true),
            is_shared: Some(false),
            sort_order: None,
            purchase_limit: Some(1),
        },
        now,
    )
    .await
    .unwrap();
    ledger::add_cards(&state.pool, &rules, "p1", "A\nB", now)
        .await
        .unwrap();
    let session = seed_session(&state, "u1", "alice").await;
    let request = BuyRequest {
        product_id: "p1",
        email: None,
        csrf_token: Some(&session.csrf_token),
        session: Some(&session),
    };

    let first = buy(&state, request, now).await;
    let settlement = lifecycle::settle_payment(&state.pool, &rules, &first.order_id, "T1", now + 1)
        .await
        .unwrap();
    assert!(matches!(settlement, Settlement::Delivered { .. }));

    let outcome = lifecycle::create_order(&state.pool, &rules, request, now + 2)
        .await
        .unwrap();
    assert!(matches!(outcome, CreateOutcome::Rejected(BuyRejection::Limit)));

    let (reserved,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM cards WHERE reserved_order_id IS NOT NULL")
            .fetch_one(&state.pool)
            .await
            .unwrap();
    assert_eq!(reserved, 0);
    assert_eq!(
        ledger::count_available(&state.pool, &rules, "p1", now + 2)
            .await
            .unwrap(),
        1
    );
    assert_ledger_consistent(&state).await;
}

#[tokio::test]
async fn test_purchase_limit_of_two_allows_second_order() {
    let (state, _dir) = test_state().await;
    let rules = state.rules();
    let now = now_millis();
    catalog::upsert_product(
        &state.pool,
        &rules,
        &ProductUpsert {
            id: Some("p2".into()),
            name: "Two per buyer".into(),
            description: None,
            price: "5".into(),
            category: None,
            image: None,
            is_active: Some(true),
            is_shared: Some(false),
            sort_order: None,
            purchase_limit: Some(2),
        },
        now,
    )
    .await
    .unwrap();
    ledger::add_cards(&state.pool, &rules, "p2", "A\nB\nC", now)
        .await
        .unwrap();
    let session = seed_session(&state, "u1", "alice").await;
    let request = BuyRequest {
        product_id: "p2",
        email: None,
        csrf_token: Some(&session.csrf_token),
        session: Some(&session),
    };

    for (i, trade_no) in ["T1", "T2"].into_iter().enumerate() {
        let at = now + i as i64 * 10;
        let order = buy(&state, request, at).await;
        let settlement =
            lifecycle::settle_payment(&state.pool, &rules, &order.order_id, trade_no, at + 1)
                .await
                .unwrap();
        assert!(matches!(settlement, Settlement::Delivered { .. }));
    }

    let outcome = lifecycle::create_order(&state.pool, &rules, request, now + 100)
        .await
        .unwrap();
    assert!(matches!(outcome, CreateOutcome::Rejected(BuyRejection::Limit)));
    assert_eq!(
        ledger::count_available(&state.pool, &rules, "p2", now + 100)
            .await
            .unwrap(),
        1
    );
    assert_ledger_consistent(&state).await;
}

#[tokio::test]
async fn test_shared_product_reports_unlimited() {
    let (state, _dir) = test_state().await;
    let rules = state.rules();
    seed_product(&state, "s1", true, &["SHARED-KEY"]).await;
    let now = now_millis();

    let product = db::products::find(&state.pool, "s1").await.unwrap().unwrap();
    assert_eq!(product.stock_count, shared::models::UNLIMITED_STOCK);

    let first = buy(&state, guest("s1"), now).await;
    let second = buy(&state, guest("s1"), now).await;
    for order in [&first, &second] {
        let settlement =
            lifecycle::settle_payment(&state.pool, &rules, &order.order_id, "T", now + 1)
                .await
                .unwrap();
        assert!(matches!(settlement, Settlement::Delivered { ref card_key, .. } if card_key == "SHARED-KEY"));
    }

    let refreshed = aggregates::recalc(&state.pool, &rules, "s1", now + 2)
        .await
        .unwrap()
        .unwrap();
    let again = aggregates::recalc(&state.pool, &rules, "s1", now + 2)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed, again);
    assert_eq!(refreshed.sold, 2);
    assert_ledger_consistent(&state).await;
}
