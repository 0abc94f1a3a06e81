//! In-site notifications raised by order transitions

use serde_json::json;
use shared::models::{NotificationKind, Order};
use sqlx::SqlitePool;

use crate::db;

/// Tell the buyer about a transition of their order.
///
/// Guest orders have nobody to notify. Failures are logged and swallowed;
/// the transition already committed.
pub async fn notify_buyer(pool: &SqlitePool, order: &Order, kind: NotificationKind, now: i64) {
    let Some(user_id) = order.user_id.as_deref() else {
        return;
    };
    let data = json!({
        "order_id": order.order_id,
        "product_name": order.product_name,
    });
    if let Err(e) = db::notifications::create(pool, user_id, kind, &data, now).await {
        tracing::warn!(
            order_id = %order.order_id,
            kind = kind.as_db(),
            error = %e,
            "Failed to write notification"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::orders::CreateOrder;
    use crate::db::test_support::{seed_product, test_pool};

    async fn order_for(pool: &SqlitePool, order_id: &str, user_id: Option<&str>) -> Order {
        db::orders::create(
            pool,
            &CreateOrder {
                order_id,
                product_id: "p1",
                product_name: "Gift card",
                amount: "9.90",
                email: Some("buyer@example.com"),
                user_id,
                username: user_id,
                now: 1,
            },
        )
        .await
        .unwrap();
        db::orders::find(pool, order_id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_notifies_signed_in_buyer() {
        let (pool, _dir) = test_pool().await;
        seed_product(&pool, "p1", false, None).await;
        let order = order_for(&pool, "O1", Some("u1")).await;

        notify_buyer(&pool, &order, NotificationKind::OrderDelivered, 5).await;

        let rows = db::notifications::list_recent(&pool, "u1", 20).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, "order_delivered");
        assert_eq!(rows[0].title_key, "notification.order_delivered.title");
        let data: serde_json::Value = serde_json::from_str(rows[0].data.as_deref().unwrap()).unwrap();
        assert_eq!(data["order_id"], "O1");
        assert_eq!(db::notifications::count_unread(&pool, "u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_guest_order_is_silent() {
        let (pool, _dir) = test_pool().await;
        seed_product(&pool, "p1", false, None).await;
        let order = order_for(&pool, "O1", None).await;

        notify_buyer(&pool, &order, NotificationKind::OrderDelivered, 5).await;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_notifications")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
