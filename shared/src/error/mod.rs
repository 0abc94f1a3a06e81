//! Error codes, `AppError` and the JSON error envelope
//!
//! ```
//! use shared::error::{ApiResponse, AppError, ErrorCode};
//!
//! let err = AppError::new(ErrorCode::OrderNotRefundable).with_detail("status", "pending");
//! let body = ApiResponse::<()>::error(&err);
//! assert_eq!(body.code, Some(4008));
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError};
