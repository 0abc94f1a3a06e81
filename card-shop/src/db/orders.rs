use shared::models::{Order, OrderStatus};
use sqlx::{SqliteConnection, SqlitePool};

const ORDER_COLUMNS: &str = "order_id, product_id, product_name, amount, email, status, trade_no, \
     card_key, paid_at, delivered_at, user_id, username, quantity, points_used, created_at";

pub struct CreateOrder<'a> {
    pub order_id: &'a str,
    pub product_id: &'a str,
    pub product_name: &'a str,
    pub amount: &'a str,
    pub email: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub username: Option<&'a str>,
    pub now: i64,
}

/// Pending orders that timed out, narrowed by whichever filters are set
pub struct ExpiredFilter<'a> {
    pub product_id: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub order_id: Option<&'a str>,
    pub created_before: i64,
}

pub async fn create(pool: &SqlitePool, order: &CreateOrder<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            order_id, product_id, product_name, amount, email,
            status, user_id, username, quantity, points_used, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, 1, 0, ?8)
        "#,
    )
    .bind(order.order_id)
    .bind(order.product_id)
    .bind(order.product_name)
    .bind(order.amount)
    .bind(order.email)
    .bind(order.user_id)
    .bind(order.username)
    .bind(order.now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find(pool: &SqlitePool, order_id: &str) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?"))
        .bind(order_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_user(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ? ORDER BY created_at DESC LIMIT ?"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn list(
    pool: &SqlitePool,
    status: Option<OrderStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
    ))
    .bind(status.map(|s| s.as_db()))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Paid/delivered orders of the product matching the user id OR the email.
pub async fn count_purchases(
    pool: &SqlitePool,
    product_id: &str,
    user_id: Option<&str>,
    email: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM orders
        WHERE product_id = ?1
          AND status IN ('paid', 'delivered')
          AND ((?2 IS NOT NULL AND user_id = ?2) OR (?3 IS NOT NULL AND email = ?3))
        "#,
    )
    .bind(product_id)
    .bind(user_id)
    .bind(email)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn sum_sold(pool: &SqlitePool, product_id: &str) -> Result<i64, sqlx::Error> {
    let (sold,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(quantity), 0) FROM orders
         WHERE product_id = ? AND status IN ('paid', 'delivered')",
    )
    .bind(product_id)
    .fetch_one(pool)
    .await?;
    Ok(sold)
}

/// Cancel timed-out pending orders; returns `(order_id, product_id)` of each.
pub async fn cancel_expired(
    conn: &mut SqliteConnection,
    filter: &ExpiredFilter<'_>,
) -> Result<Vec<(String, String)>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE orders
        SET status = 'cancelled'
        WHERE status = 'pending'
          AND created_at < ?1
          AND (?2 IS NULL OR product_id = ?2)
          AND (?3 IS NULL OR user_id = ?3)
          AND (?4 IS NULL OR order_id = ?4)
        RETURNING order_id, product_id
        "#,
    )
    .bind(filter.created_before)
    .bind(filter.product_id)
    .bind(filter.user_id)
    .bind(filter.order_id)
    .fetch_all(conn)
    .await
}

/// `pending | cancelled → paid`. False when the order is unknown or
/// already settled by someone else.
pub async fn mark_paid(
    conn: &mut SqliteConnection,
    order_id: &str,
    trade_no: &str,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = 'paid', paid_at = ?2, trade_no = NULLIF(TRIM(?3), '')
        WHERE order_id = ?1 AND status IN ('pending', 'cancelled')
        "#,
    )
    .bind(order_id)
    .bind(now)
    .bind(trade_no)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// `paid → delivered`, recording the handed-over secret.
pub async fn mark_delivered(
    conn: &mut SqliteConnection,
    order_id: &str,
    card_key: &str,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = 'delivered', delivered_at = ?2, card_key = ?3
        WHERE order_id = ?1 AND status = 'paid'
        "#,
    )
    .bind(order_id)
    .bind(now)
    .bind(card_key)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// `paid | delivered → refunded`, only once the gateway gave us a trade_no.
pub async fn mark_refunded(pool: &SqlitePool, order_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = 'refunded'
        WHERE order_id = ? AND status IN ('paid', 'delivered')
          AND trade_no IS NOT NULL AND trade_no <> ''
        "#,
    )
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
