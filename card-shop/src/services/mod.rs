//! Inventory and order services
//!
//! - [`ledger`]: card counts and admin card operations
//! - [`aggregates`]: cached stock/locked/sold counters
//! - [`reservation`]: binding cards to pending orders
//! - [`lifecycle`]: order creation, payment settlement, refunds
//! - [`sweeper`]: cancelling stale pending orders
//! - [`catalog`]: product admin and storefront reads
//! - [`notify`]: buyer notifications
//!
//! Every time-dependent operation takes `now` (epoch ms) explicitly.

pub mod aggregates;
pub mod catalog;
pub mod ledger;
pub mod lifecycle;
pub mod notify;
pub mod reservation;
pub mod sweeper;

/// Reservation and payment windows plus guest policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopRules {
    /// A reservation older than this no longer blocks the card
    pub reservation_window_ms: i64,
    /// A pending order older than this is cancelled by the sweeper
    pub payment_timeout_ms: i64,
    pub allow_guest_checkout: bool,
}

impl ShopRules {
    /// Reservations stamped before this instant are lapsed
    pub fn reservation_cutoff(&self, now: i64) -> i64 {
        now.saturating_sub(self.reservation_window_ms)
    }

    /// Pending orders created before this instant are expired
    pub fn payment_cutoff(&self, now: i64) -> i64 {
        now.saturating_sub(self.payment_timeout_ms)
    }
}

impl Default for ShopRules {
    fn default() -> Self {
        Self {
            reservation_window_ms: 60_000,
            payment_timeout_ms: 300_000,
            allow_guest_checkout: true,
        }
    }
}
