//! Admin endpoints, mounted under `/api/admin` behind the admin gate

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use shared::error::{ApiResponse, AppError};
use shared::models::{Card, Order, OrderStatus, Product, ProductUpsert};
use shared::util::now_millis;

use super::ApiResult;
use crate::auth::AdminIdentity;
use crate::db;
use crate::error::ServiceError;
use crate::services::catalog::{self, MoveDirection};
use crate::services::sweeper::{self, SweepFilter, SweepReport};
use crate::services::{ledger, lifecycle};
use crate::state::AppState;

// ========== Products ==========

/// GET /api/admin/products
pub async fn list_products(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    Ok(Json(catalog::list_all(&state.pool).await?))
}

/// POST /api/admin/products
pub async fn upsert_product(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Json(payload): Json<ProductUpsert>,
) -> ApiResult<Product> {
    let product =
        catalog::upsert_product(&state.pool, &state.rules(), &payload, now_millis()).await?;
    tracing::info!(admin = %admin.username, product_id = %product.id, "Admin saved product");
    Ok(Json(product))
}

/// DELETE /api/admin/products/{id}
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    catalog::delete_product(&state.pool, &state.rules(), &product_id, now_millis()).await?;
    Ok(Json(ApiResponse::ok()))
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub is_active: bool,
}

/// POST /api/admin/products/{id}/active
pub async fn set_active(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(req): Json<ActiveRequest>,
) -> ApiResult<ApiResponse<()>> {
    catalog::set_active(&state.pool, &product_id, req.is_active).await?;
    Ok(Json(ApiResponse::ok()))
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub direction: MoveDirection,
}

/// POST /api/admin/products/{id}/move
pub async fn move_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<ApiResponse<()>> {
    catalog::move_product(&state.pool, &product_id, req.direction).await?;
    Ok(Json(ApiResponse::ok()))
}

// ========== Cards ==========

/// GET /api/admin/products/{id}/cards
pub async fn list_cards(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Vec<Card>> {
    Ok(Json(ledger::list_cards(&state.pool, &product_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AddCardsRequest {
    /// Newline-delimited card keys
    pub cards: String,
}

#[derive(Debug, Serialize)]
pub struct AddCardsResponse {
    pub inserted: u64,
}

/// POST /api/admin/products/{id}/cards
pub async fn add_cards(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(product_id): Path<String>,
    Json(req): Json<AddCardsRequest>,
) -> ApiResult<AddCardsResponse> {
    let inserted =
        ledger::add_cards(&state.pool, &state.rules(), &product_id, &req.cards, now_millis())
            .await?;
    tracing::info!(admin = %admin.username, product_id = %product_id, inserted, "Admin added cards");
    Ok(Json(AddCardsResponse { inserted }))
}

/// DELETE /api/admin/cards/{id}
pub async fn delete_card(
    State(state): State<AppState>,
    Path(card_id): Path<i64>,
) -> ApiResult<ApiResponse<()>> {
    ledger::delete_card(&state.pool, &state.rules(), card_id, now_millis()).await?;
    Ok(Json(ApiResponse::ok()))
}

// ========== Orders ==========

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// GET /api/admin/orders
///
/// `?status=paid` lists oversold orders waiting for manual delivery.
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> ApiResult<Vec<Order>> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            OrderStatus::from_db(raw)
                .ok_or_else(|| AppError::validation(format!("Unknown order status: {raw}")))?,
        ),
        None => None,
    };
    let per_page = query.per_page.unwrap_or(50).clamp(1, 200);
    let page = query.page.unwrap_or(1).max(1);

    let orders = db::orders::list(&state.pool, status, per_page, (page - 1) * per_page)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(orders))
}

/// POST /api/admin/orders/{id}/refund
///
/// Bookkeeping only; the refund itself is issued on the gateway side.
pub async fn refund_order(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(order_id): Path<String>,
) -> ApiResult<Order> {
    let order = lifecycle::refund(&state.pool, &state.rules(), &order_id, now_millis()).await?;
    tracing::info!(admin = %admin.username, order_id = %order_id, "Admin confirmed refund");
    Ok(Json(order))
}

/// POST /api/admin/orders/{id}/fulfill
pub async fn fulfill_order(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(order_id): Path<String>,
) -> ApiResult<Order> {
    let order = lifecycle::fulfill(&state.pool, &state.rules(), &order_id, now_millis()).await?;
    tracing::info!(admin = %admin.username, order_id = %order_id, "Admin fulfilled order");
    Ok(Json(order))
}

/// POST /api/admin/sweep
pub async fn sweep_now(State(state): State<AppState>) -> ApiResult<SweepReport> {
    let report = sweeper::sweep(&state.pool, &state.rules(), SweepFilter::all(), now_millis())
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(report))
}
