//! Numeric error codes shared by every shop endpoint
//!
//! The leading digit is the [`ErrorCategory`](super::ErrorCategory): 0 general,
//! 1 auth, 2 permission, 4 order, 6 product and card, 9 system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so the storefront frontend
/// can switch on them without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Required field missing
    RequiredField = 7,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Session has expired
    SessionExpired = 1005,
    /// CSRF token does not match the session
    CsrfMismatch = 1008,

    // ==================== 2xxx: Permission ====================
    /// Admin role required
    AdminRequired = 2003,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order is not in a refundable state
    OrderNotRefundable = 4008,
    /// Order is not waiting for manual fulfilment
    OrderNotFulfillable = 4009,
    /// Purchase limit reached for this buyer
    PurchaseLimitReached = 4010,

    // ==================== 6xxx: Product ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Product has invalid price
    ProductInvalidPrice = 6002,
    /// Product is out of stock
    ProductOutOfStock = 6003,
    /// Product is not on sale
    ProductInactive = 6004,
    /// Remaining stock is reserved by other buyers
    StockLocked = 6005,
    /// Product still has reserved cards
    ProductHasReservations = 6006,

    // ==================== 67xx: Cards ====================
    /// Card not found
    CardNotFound = 6701,
    /// Card is reserved by a pending order
    CardReserved = 6702,
    /// Card has already been delivered
    CardAlreadyUsed = 6703,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::RequiredField => "Required field is missing",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::SessionExpired => "Session has expired",
            ErrorCode::CsrfMismatch => "CSRF token mismatch",

            // Permission
            ErrorCode::AdminRequired => "Administrator role is required",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderNotRefundable => "Order cannot be refunded in its current state",
            ErrorCode::OrderNotFulfillable => "Order is not waiting for delivery",
            ErrorCode::PurchaseLimitReached => "Purchase limit reached",

            // Product
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::ProductInvalidPrice => "Product has invalid price",
            ErrorCode::ProductOutOfStock => "Product is out of stock",
            ErrorCode::ProductInactive => "Product is not on sale",
            ErrorCode::StockLocked => "Remaining stock is reserved, try again later",
            ErrorCode::ProductHasReservations => "Product has reserved cards, try again later",

            // Cards
            ErrorCode::CardNotFound => "Card not found",
            ErrorCode::CardReserved => "Card is reserved, try again later",
            ErrorCode::CardAlreadyUsed => "Card has already been delivered",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            7 => Ok(ErrorCode::RequiredField),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1005 => Ok(ErrorCode::SessionExpired),
            1008 => Ok(ErrorCode::CsrfMismatch),

            // Permission
            2003 => Ok(ErrorCode::AdminRequired),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4008 => Ok(ErrorCode::OrderNotRefundable),
            4009 => Ok(ErrorCode::OrderNotFulfillable),
            4010 => Ok(ErrorCode::PurchaseLimitReached),

            // Product
            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::ProductInvalidPrice),
            6003 => Ok(ErrorCode::ProductOutOfStock),
            6004 => Ok(ErrorCode::ProductInactive),
            6005 => Ok(ErrorCode::StockLocked),
            6006 => Ok(ErrorCode::ProductHasReservations),

            // Cards
            6701 => Ok(ErrorCode::CardNotFound),
            6702 => Ok(ErrorCode::CardReserved),
            6703 => Ok(ErrorCode::CardAlreadyUsed),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
