//! Product Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Stock reported for a shared product while it still has an unused card.
pub const UNLIMITED_STOCK: i64 = 999_999;

/// Product entity
///
/// `stock_count`, `locked_count` and `sold_count` are caches maintained by
/// the aggregate recalculator; never write them from request handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Decimal string with two fractional digits
    pub price: String,
    pub category: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    /// One reusable secret sold to every buyer
    pub is_shared: bool,
    pub sort_order: i64,
    /// Max paid/delivered orders per buyer identity
    pub purchase_limit: Option<i64>,
    pub stock_count: i64,
    pub locked_count: i64,
    pub sold_count: i64,
    pub created_at: i64,
}

/// Create or replace product payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductUpsert {
    /// Defaults to `prod_{millis}` when absent
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price: String,
    pub category: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
    pub is_shared: Option<bool>,
    pub sort_order: Option<i64>,
    pub purchase_limit: Option<i64>,
}

/// Derived per-product counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAggregates {
    pub stock: i64,
    pub locked: i64,
    pub sold: i64,
}

/// Storefront page size when the caller gives none
pub const DEFAULT_PAGE_SIZE: i64 = 24;
/// Largest storefront page a caller may ask for
pub const MAX_PAGE_SIZE: i64 = 60;

/// Storefront listing order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductSort {
    /// `sort_order`, then oldest first
    #[default]
    Default,
    PriceAsc,
    PriceDesc,
    /// Free plus held cards, most first
    StockDesc,
    SoldDesc,
}

impl ProductSort {
    /// Unknown values fall back to [`ProductSort::Default`]
    pub fn from_param(raw: &str) -> Self {
        match raw.trim() {
            "priceAsc" => Self::PriceAsc,
            "priceDesc" => Self::PriceDesc,
            "stockDesc" => Self::StockDesc,
            "soldDesc" => Self::SoldDesc,
            _ => Self::Default,
        }
    }
}

/// Storefront search parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductQuery {
    /// Matched against name and description
    pub q: Option<String>,
    /// Exact category; blank or `all` means any
    pub category: Option<String>,
    /// `priceAsc`, `priceDesc`, `stockDesc` or `soldDesc`
    pub sort: Option<String>,
    /// 1-based
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ProductQuery {
    pub fn search_term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    pub fn category_filter(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != "all")
    }

    pub fn sort(&self) -> ProductSort {
        self.sort.as_deref().map(ProductSort::from_param).unwrap_or_default()
    }

    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.page_size())
    }
}

/// One page of storefront results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPage {
    pub items: Vec<Product>,
    /// Matches across all pages
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Parse a price and render it with exactly two fractional digits.
///
/// Rejects negatives and anything finer than cents.
pub fn normalize_price(raw: &str) -> Option<String> {
    let value = Decimal::from_str(raw.trim()).ok()?;
    if value.is_sign_negative() || value.scale() > 2 {
        return None;
    }
    Some(format!("{:.2}", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_price() {
        assert_eq!(normalize_price("10").as_deref(), Some("10.00"));
        assert_eq!(normalize_price(" 9.9 ").as_deref(), Some("9.90"));
        assert_eq!(normalize_price("0.01").as_deref(), Some("0.01"));
        assert_eq!(normalize_price("0").as_deref(), Some("0.00"));
    }

    #[test]
    fn test_normalize_price_rejects() {
        assert!(normalize_price("-1").is_none());
        assert!(normalize_price("1.001").is_none());
        assert!(normalize_price("abc").is_none());
        assert!(normalize_price("").is_none());
    }

    #[test]
    fn test_product_query_defaults_and_caps() {
        let query = ProductQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);
        assert_eq!(query.sort(), ProductSort::Default);
        assert_eq!(query.search_term(), None);

        let query = ProductQuery {
            q: Some("  ".into()),
            category: Some("all".into()),
            sort: Some("hot".into()),
            page: Some(3),
            page_size: Some(500),
        };
        assert_eq!(query.search_term(), None);
        assert_eq!(query.category_filter(), None);
        assert_eq!(query.sort(), ProductSort::Default);
        assert_eq!(query.page_size(), MAX_PAGE_SIZE);
        assert_eq!(query.offset(), 2 * MAX_PAGE_SIZE);

        let query = ProductQuery {
            q: Some(" steam ".into()),
            category: Some(" games ".into()),
            sort: Some("priceDesc".into()),
            page: Some(0),
            page_size: Some(-5),
        };
        assert_eq!(query.search_term(), Some("steam"));
        assert_eq!(query.category_filter(), Some("games"));
        assert_eq!(query.sort(), ProductSort::PriceDesc);
        assert_eq!(query.page(), 1);
        assert_eq!(query.page_size(), DEFAULT_PAGE_SIZE);
    }
}
