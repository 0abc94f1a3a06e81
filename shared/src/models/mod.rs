//! Data models
//!
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! Timestamps are epoch milliseconds.

pub mod card;
pub mod notification;
pub mod order;
pub mod product;

// Re-exports
pub use card::*;
pub use notification::*;
pub use order::*;
pub use product::*;
