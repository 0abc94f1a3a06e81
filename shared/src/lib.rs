//! Shared types for the card shop
//!
//! Error codes and the API envelope, catalog/ledger/order models and
//! small utilities used by the service and its tests.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
