//! HTTP routes for the card shop

pub mod admin;
pub mod buy;
pub mod callback;
pub mod health;
pub mod notifications;
pub mod notify;
pub mod orders;
pub mod storefront;

use axum::routing::{delete, get, post};
use axum::{Router, middleware};
use shared::error::AppError;
use tower_http::trace::TraceLayer;

use crate::auth::admin_middleware;
use crate::state::AppState;

pub type ApiResult<T> = Result<axum::Json<T>, AppError>;

/// Cookie remembering the buyer's latest checkout
pub const PENDING_ORDER_COOKIE: &str = "pending_order";

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Admin management (session + ADMIN_USERS)
    let admin = Router::new()
        .route(
            "/products",
            get(admin::list_products).post(admin::upsert_product),
        )
        .route("/products/{id}", delete(admin::delete_product))
        .route("/products/{id}/active", post(admin::set_active))
        .route("/products/{id}/move", post(admin::move_product))
        .route(
            "/products/{id}/cards",
            get(admin::list_cards).post(admin::add_cards),
        )
        .route("/cards/{id}", delete(admin::delete_card))
        .route("/orders", get(admin::list_orders))
        .route("/orders/{id}/refund", post(admin::refund_order))
        .route("/orders/{id}/fulfill", post(admin::fulfill_order))
        .route("/sweep", post(admin::sweep_now))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_middleware,
        ));

    // Storefront and checkout
    let shop = Router::new()
        .route("/api/products", get(storefront::list_products))
        .route("/api/products/{id}", get(storefront::get_product))
        .route("/api/categories", get(storefront::list_categories))
        .route("/buy", post(buy::create_order))
        .route("/api/orders", get(orders::list_my_orders))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/{id}/read", post(notifications::mark_read));

    // Gateway callbacks (signature-verified notify, buyer return)
    let gateway = Router::new()
        .route(
            "/notify",
            get(notify::handle_notify).post(notify::handle_notify),
        )
        .route("/return", get(callback::handle_return))
        .route("/callback", get(callback::handle_return))
        .route("/callback/{id}", get(callback::handle_return_with_id));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(shop)
        .merge(gateway)
        .nest("/api/admin", admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
