//! Unified error system
//!
//! - [`ErrorCode`]: Standardized error codes
//! - [`ErrorCategory`]: Classification of errors by code range
//! - [`AppError`]: Error with code, message and details
//! - [`ApiResponse`]: Unified API response format
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::new(ErrorCode::OrderNotFound).with_detail("order_id", 17);
//! let response = ApiResponse::<()>::error(&err);
//! assert_eq!(response.code, Some(4001));
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
