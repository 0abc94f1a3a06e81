//! card-shop: virtual goods storefront
//!
//! Sells redeemable card secrets through an EPay gateway:
//! - Card ledger with time-bounded reservations
//! - Order lifecycle from checkout through payment, delivery and refund
//! - Expiry sweeper returning abandoned reservations to the pool
//! - Storefront, buyer and admin HTTP API

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod epay;
pub mod error;
pub mod logger;
pub mod services;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use state::AppState;
