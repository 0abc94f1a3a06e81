//! Card (stock ledger entry) Model

use serde::{Deserialize, Serialize};

/// One redeemable secret belonging to a product
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Card {
    pub id: i64,
    pub product_id: String,
    pub card_key: String,
    pub is_used: bool,
    pub reserved_order_id: Option<String>,
    pub reserved_at: Option<i64>,
    pub used_at: Option<i64>,
    pub created_at: i64,
}

/// Logical state of a card at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    Free,
    Reserved,
    Consumed,
}

impl Card {
    /// A reservation older than `reservation_window_ms` counts as free even
    /// though the row still names the order until it is swept.
    pub fn state(&self, now: i64, reservation_window_ms: i64) -> CardState {
        if self.is_used {
            return CardState::Consumed;
        }
        match (&self.reserved_order_id, self.reserved_at) {
            (Some(_), Some(at)) if at >= now - reservation_window_ms => CardState::Reserved,
            _ => CardState::Free,
        }
    }
}

/// Split a bulk paste into card keys: one per line, trimmed, blanks dropped.
pub fn parse_card_keys(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
