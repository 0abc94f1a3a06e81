//! Order Model

use serde::{Deserialize, Serialize};

/// Order lifecycle status
///
/// `pending → {delivered, paid, cancelled}`, `paid → {delivered, refunded}`,
/// `delivered → refunded`. A cancelled order still accepts a late payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum OrderStatus {
    /// Created, card reserved, waiting for the gateway
    Pending,
    /// Money captured but no card was available (oversell)
    Paid,
    /// Money captured and card delivered
    Delivered,
    /// Payment timeout elapsed
    Cancelled,
    /// Refund confirmed by an admin
    Refunded,
}

impl OrderStatus {
    /// Parse from database string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Whether a verified payment notice may still settle this order
    pub fn accepts_payment(&self) -> bool {
        matches!(self, Self::Pending | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Delivered | Paid | Cancelled)
                | (Cancelled, Delivered | Paid)
                | (Paid, Delivered | Refunded)
                | (Delivered, Refunded)
        )
    }
}

/// Order entity
///
/// `card_key` is set only once the order reached `delivered`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    pub order_id: String,
    pub product_id: String,
    /// Snapshot at purchase time
    pub product_name: String,
    /// Price snapshot, decimal string
    pub amount: String,
    pub email: Option<String>,
    pub status: OrderStatus,
    /// Gateway transaction id
    pub trade_no: Option<String>,
    pub card_key: Option<String>,
    pub paid_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub quantity: i64,
    pub points_used: i64,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_db_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert_eq!(OrderStatus::from_db(status.as_db()), Some(status));
        }
        assert_eq!(OrderStatus::from_db("PENDING"), None);
    }

    #[test]
    fn test_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Delivered));
        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Cancelled.can_transition_to(Delivered));
        assert!(Paid.can_transition_to(Delivered));
        assert!(Paid.can_transition_to(Refunded));
        assert!(Delivered.can_transition_to(Refunded));

        assert!(!Delivered.can_transition_to(Paid));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Refunded));
        assert!(!Refunded.can_transition_to(Delivered));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn test_accepts_payment() {
        assert!(OrderStatus::Pending.accepts_payment());
        assert!(OrderStatus::Cancelled.accepts_payment());
        assert!(!OrderStatus::Delivered.accepts_payment());
        assert!(!OrderStatus::Paid.accepts_payment());
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&OrderStatus::Delivered).unwrap();
        assert_eq!(json, "\"delivered\"");
    }
}
