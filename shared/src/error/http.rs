//! HTTP status for each error code

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            Self::NotFound | Self::OrderNotFound | Self::ProductNotFound | Self::CardNotFound => {
                StatusCode::NOT_FOUND
            }

            // Retry later or pick something else
            Self::OrderNotRefundable
            | Self::OrderNotFulfillable
            | Self::StockLocked
            | Self::ProductHasReservations
            | Self::CardReserved
            | Self::CardAlreadyUsed => StatusCode::CONFLICT,

            Self::NotAuthenticated | Self::SessionExpired => StatusCode::UNAUTHORIZED,

            Self::AdminRequired | Self::CsrfMismatch => StatusCode::FORBIDDEN,

            Self::InternalError | Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,

            Self::ValidationFailed
            | Self::RequiredField
            | Self::PurchaseLimitReached
            | Self::ProductInvalidPrice
            | Self::ProductOutOfStock
            | Self::ProductInactive => StatusCode::BAD_REQUEST,
        }
    }
}
