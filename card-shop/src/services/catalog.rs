//! Catalog: product admin and storefront reads

use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{Product, ProductPage, ProductQuery, ProductUpsert, normalize_price};
use sqlx::SqlitePool;

use super::sweeper::{self, SweepFilter};
use super::{ShopRules, aggregates};
use crate::db;
use crate::db::products::UpsertProduct;
use crate::error::ServiceResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

/// One page of active products matching `query`, after a global sweep.
pub async fn list_storefront(
    pool: &SqlitePool,
    rules: &ShopRules,
    query: &ProductQuery,
    now: i64,
) -> ServiceResult<ProductPage> {
    sweeper::sweep(pool, rules, SweepFilter::all(), now).await?;
    let (items, total) = db::products::search(pool, query).await?;
    Ok(ProductPage {
        items,
        total,
        page: query.page(),
        page_size: query.page_size(),
    })
}

/// Categories that have at least one active product
pub async fn list_categories(pool: &SqlitePool) -> ServiceResult<Vec<String>> {
    Ok(db::products::categories(pool).await?)
}

/// One active product, after sweeping its expired orders.
pub async fn get_storefront(
    pool: &SqlitePool,
    rules: &ShopRules,
    product_id: &str,
    now: i64,
) -> ServiceResult<Product> {
    sweeper::sweep(pool, rules, SweepFilter::product(product_id), now).await?;
    match db::products::find(pool, product_id).await? {
        Some(product) if product.is_active => Ok(product),
        _ => Err(AppError::new(ErrorCode::ProductNotFound).into()),
    }
}

pub async fn list_all(pool: &SqlitePool) -> ServiceResult<Vec<Product>> {
    Ok(db::products::list(pool, true).await?)
}

/// Create or replace a product.
pub async fn upsert_product(
    pool: &SqlitePool,
    rules: &ShopRules,
    payload: &ProductUpsert,
    now: i64,
) -> ServiceResult<Product> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::with_message(ErrorCode::RequiredField, "Product name is required")
            .with_detail("field", "name")
            .into());
    }
    let Some(price) = normalize_price(&payload.price) else {
        return Err(AppError::new(ErrorCode::ProductInvalidPrice)
            .with_detail("price", payload.price.clone())
            .into());
    };
    let id = payload
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("prod_{now}"));

    db::products::upsert(
        pool,
        &UpsertProduct {
            id: &id,
            name,
            description: payload.description.as_deref(),
            price: &price,
            category: payload.category.as_deref(),
            image: payload.image.as_deref(),
            is_active: payload.is_active,
            is_shared: payload.is_shared,
            sort_order: payload.sort_order,
            // Zero or negative means unlimited
            purchase_limit: payload.purchase_limit.filter(|l| *l > 0),
            now,
        },
    )
    .await?;
    tracing::info!(product_id = %id, "Product saved");

    aggregates::recalc(pool, rules, &id, now).await?;
    db::products::find(pool, &id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ProductNotFound).into())
}

pub async fn set_active(pool: &SqlitePool, product_id: &str, is_active: bool) -> ServiceResult<()> {
    if !db::products::set_active(pool, product_id, is_active).await? {
        return Err(AppError::new(ErrorCode::ProductNotFound).into());
    }
    tracing::info!(product_id, is_active, "Product visibility changed");
    Ok(())
}

/// Swap a product with its neighbour and renumber the whole list.
///
/// Moving past either end is a no-op.
pub async fn move_product(
    pool: &SqlitePool,
    product_id: &str,
    direction: MoveDirection,
) -> ServiceResult<()> {
    let mut ids: Vec<String> = db::products::list(pool, true)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();
    let Some(index) = ids.iter().position(|id| id == product_id) else {
        return Err(AppError::new(ErrorCode::ProductNotFound).into());
    };
    let target = match direction {
        MoveDirection::Up => index.checked_sub(1),
        MoveDirection::Down => Some(index + 1).filter(|t| *t < ids.len()),
    };
    if let Some(target) = target {
        ids.swap(index, target);
        db::products::renumber(pool, &ids).await?;
    }
    Ok(())
}

/// Delete a product and its cards unless a card is reserved within the window.
pub async fn delete_product(
    pool: &SqlitePool,
    rules: &ShopRules,
    product_id: &str,
    now: i64,
) -> ServiceResult<()> {
    if db::products::delete_unless_reserved(pool, product_id, rules.reservation_cutoff(now)).await? {
        tracing::info!(product_id, "Product deleted");
        return Ok(());
    }
    match db::products::find(pool, product_id).await? {
        None => Err(AppError::new(ErrorCode::ProductNotFound).into()),
        Some(_) => Err(AppError::new(ErrorCode::ProductHasReservations).into()),
    }
}
