use shared::models::{Product, ProductQuery, ProductSort, StockAggregates};
use sqlx::SqlitePool;

const PRODUCT_COLUMNS: &str = "id, name, description, price, category, image, is_active, is_shared, \
     sort_order, purchase_limit, stock_count, locked_count, sold_count, created_at";

/// Validated product write
pub struct UpsertProduct<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub price: &'a str,
    pub category: Option<&'a str>,
    pub image: Option<&'a str>,
    pub is_active: Option<bool>,
    pub is_shared: Option<bool>,
    pub sort_order: Option<i64>,
    pub purchase_limit: Option<i64>,
    pub now: i64,
}

pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Storefront ordering: `sort_order`, then oldest first
pub async fn list(pool: &SqlitePool, include_inactive: bool) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products
         WHERE (?1 OR is_active = 1)
         ORDER BY sort_order ASC, created_at ASC, id ASC"
    ))
    .bind(include_inactive)
    .fetch_all(pool)
    .await
}

fn order_clause(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Default => "sort_order ASC, created_at ASC, id ASC",
        ProductSort::PriceAsc => "CAST(price AS REAL) ASC, sort_order ASC, id ASC",
        ProductSort::PriceDesc => "CAST(price AS REAL) DESC, sort_order ASC, id ASC",
        ProductSort::StockDesc => "stock_count + locked_count DESC, sort_order ASC, id ASC",
        ProductSort::SoldDesc => "sold_count DESC, sort_order ASC, id ASC",
    }
}

/// `%term%` with LIKE wildcards in `term` matched literally
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// One page of active products matching `query`, with the total match count
pub async fn search(
    pool: &SqlitePool,
    query: &ProductQuery,
) -> Result<(Vec<Product>, i64), sqlx::Error> {
    const FILTER: &str = r#"is_active = 1
         AND (?1 IS NULL OR category = ?1)
         AND (?2 IS NULL OR name LIKE ?2 ESCAPE '\' OR COALESCE(description, '') LIKE ?2 ESCAPE '\')"#;
    let category = query.category_filter();
    let pattern = query.search_term().map(like_pattern);

    let items = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE {FILTER} ORDER BY {} LIMIT ?3 OFFSET ?4",
        order_clause(query.sort())
    ))
    .bind(category)
    .bind(pattern.as_deref())
    .bind(query.page_size())
    .bind(query.offset())
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products WHERE {FILTER}"))
        .bind(category)
        .bind(pattern.as_deref())
        .fetch_one(pool)
        .await?;
    Ok((items, total))
}

/// Distinct non-blank categories of active products, alphabetically
pub async fn categories(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT category FROM products
         WHERE is_active = 1 AND category IS NOT NULL AND TRIM(category) <> ''
         ORDER BY category ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// `None` when the product does not exist
pub async fn is_shared(pool: &SqlitePool, id: &str) -> Result<Option<bool>, sqlx::Error> {
    let row: Option<(bool,)> = sqlx::query_as("SELECT is_shared FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.0))
}

/// Products whose cached locked counter may be stale
pub async fn ids_with_locked(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM products WHERE locked_count > 0")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Insert or replace. Omitted flags keep the existing value (or the default
/// for a new row); cached aggregates are never touched here.
pub async fn upsert(pool: &SqlitePool, product: &UpsertProduct<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO products (
            id, name, description, price, category, image,
            is_active, is_shared, sort_order, purchase_limit, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, COALESCE(?7, 1), COALESCE(?8, 0), COALESCE(?9, 0), ?10, ?11)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            price = excluded.price,
            category = excluded.category,
            image = excluded.image,
            is_active = COALESCE(?7, products.is_active),
            is_shared = COALESCE(?8, products.is_shared),
            sort_order = COALESCE(?9, products.sort_order),
            purchase_limit = excluded.purchase_limit
        "#,
    )
    .bind(product.id)
    .bind(product.name)
    .bind(product.description)
    .bind(product.price)
    .bind(product.category)
    .bind(product.image)
    .bind(product.is_active)
    .bind(product.is_shared)
    .bind(product.sort_order)
    .bind(product.purchase_limit)
    .bind(product.now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_active(pool: &SqlitePool, id: &str, is_active: bool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE products SET is_active = ?1 WHERE id = ?2")
        .bind(is_active)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Rewrite `sort_order` as 0..n following `ids`.
pub async fn renumber(pool: &SqlitePool, ids: &[String]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for (index, id) in ids.iter().enumerate() {
        sqlx::query("UPDATE products SET sort_order = ?1 WHERE id = ?2")
            .bind(index as i64)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Delete unless a card of the product is reserved after `reservation_cutoff`.
///
/// Cards go with the product (ON DELETE CASCADE); orders stay as history.
pub async fn delete_unless_reserved(
    pool: &SqlitePool,
    id: &str,
    reservation_cutoff: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM products
        WHERE id = ?1
          AND NOT EXISTS (
              SELECT 1 FROM cards
              WHERE product_id = ?1 AND is_used = 0
                AND reserved_at IS NOT NULL AND reserved_at >= ?2
          )
        "#,
    )
    .bind(id)
    .bind(reservation_cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn write_aggregates(
    pool: &SqlitePool,
    id: &str,
    aggregates: &StockAggregates,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE products SET stock_count = ?1, locked_count = ?2, sold_count = ?3 WHERE id = ?4",
    )
    .bind(aggregates.stock)
    .bind(aggregates.locked)
    .bind(aggregates.sold)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}
