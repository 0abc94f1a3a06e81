//! User Notification Model

use serde::{Deserialize, Serialize};

/// Notification kinds raised by order transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderDelivered,
    /// Paid but no card was available; an admin will deliver manually
    OrderPaidPending,
    OrderRefunded,
}

impl NotificationKind {
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::OrderDelivered => "order_delivered",
            Self::OrderPaidPending => "order_paid_pending",
            Self::OrderRefunded => "order_refunded",
        }
    }

    /// i18n keys for title and body, rendered by the frontend
    pub fn message_keys(&self) -> (&'static str, &'static str) {
        match self {
            Self::OrderDelivered => (
                "notification.order_delivered.title",
                "notification.order_delivered.content",
            ),
            Self::OrderPaidPending => (
                "notification.order_paid_pending.title",
                "notification.order_paid_pending.content",
            ),
            Self::OrderRefunded => (
                "notification.order_refunded.title",
                "notification.order_refunded.content",
            ),
        }
    }
}

/// Stored notification row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub kind: String,
    pub title_key: String,
    pub content_key: String,
    /// JSON payload (e.g. `{"order_id": ...}`)
    pub data: Option<String>,
    pub is_read: bool,
    pub created_at: i64,
}
