//! Storefront reads; each one sweeps expired orders first

use axum::Json;
use axum::extract::{Path, Query, State};
use shared::models::{Product, ProductPage, ProductQuery};
use shared::util::now_millis;

use super::ApiResult;
use crate::services::catalog;
use crate::state::AppState;

/// GET /api/products?q=&category=&sort=&page=&page_size=
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<ProductPage> {
    let page = catalog::list_storefront(&state.pool, &state.rules(), &query, now_millis()).await?;
    Ok(Json(page))
}

/// GET /api/categories
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    Ok(Json(catalog::list_categories(&state.pool).await?))
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Product> {
    let product =
        catalog::get_storefront(&state.pool, &state.rules(), &product_id, now_millis()).await?;
    Ok(Json(product))
}
