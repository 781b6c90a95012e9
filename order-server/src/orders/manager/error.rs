use super::super::storage::StorageError;
use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::order::OrderStatus;
use thiserror::Error;

/// Workflow errors
///
/// Every variant belongs to one class of the failure taxonomy: validation,
/// not-found, forbidden (who may call), conflict (what state permits) or
/// internal inconsistency.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // ===== Validation =====
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Driver phone or driver credential is required")]
    DriverRequired,

    // ===== Not found =====
    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Region not found: {0}")]
    RegionNotFound(i64),

    #[error("Vehicle not found: {0}")]
    VehicleNotFound(i64),

    // ===== Forbidden =====
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Master {master_id} has declined order {order_id}")]
    MasterDeclined { order_id: i64, master_id: i64 },

    #[error("Order {order_id} belongs to another region")]
    ForeignRegion { order_id: i64 },

    // ===== Conflict =====
    #[error("Order {order_id} is {status}, operation requires {expected}")]
    StatusConflict {
        order_id: i64,
        status: OrderStatus,
        expected: String,
    },

    #[error("Order {order_id} is already {status}")]
    Terminal { order_id: i64, status: OrderStatus },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("Order {0} has no master")]
    NoMaster(i64),

    // ===== Internal =====
    #[error("Internal inconsistency: {0}")]
    Inconsistency(String),

    #[error("Credential error: {0}")]
    Credential(String),
}

pub type OrderResult<T> = Result<T, OrderError>;

impl OrderError {
    /// Stable error code of this failure
    pub fn code(&self) -> ErrorCode {
        match self {
            OrderError::Storage(_) => ErrorCode::DatabaseError,
            OrderError::Validation(_) => ErrorCode::ValidationFailed,
            OrderError::DriverRequired => ErrorCode::DriverRequired,
            OrderError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            OrderError::UserNotFound(_) => ErrorCode::UserNotFound,
            OrderError::RegionNotFound(_) => ErrorCode::RegionNotFound,
            OrderError::VehicleNotFound(_) => ErrorCode::VehicleNotFound,
            OrderError::Forbidden(_) => ErrorCode::PermissionDenied,
            OrderError::MasterDeclined { .. } => ErrorCode::MasterDeclined,
            OrderError::ForeignRegion { .. } => ErrorCode::ForeignRegion,
            OrderError::StatusConflict { .. } => ErrorCode::OrderStatusConflict,
            OrderError::Terminal { .. } => ErrorCode::OrderTerminal,
            OrderError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            OrderError::NoMaster(_) => ErrorCode::OrderHasNoMaster,
            OrderError::Inconsistency(_) => ErrorCode::InternalInconsistency,
            OrderError::Credential(_) => ErrorCode::InternalError,
        }
    }

    pub fn is_forbidden(&self) -> bool {
        self.code().http_status() == http::StatusCode::FORBIDDEN
    }

    pub fn is_conflict(&self) -> bool {
        self.code().http_status() == http::StatusCode::CONFLICT
    }
}

/// redb 错误分类：数据损坏与其他存储错误区分开
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    match e {
        StorageError::Serialization(_) => ErrorCode::InternalInconsistency,
        _ => {
            let err_str = e.to_string().to_lowercase();
            if err_str.contains("corrupt") || err_str.contains("invalid database") {
                ErrorCode::InternalInconsistency
            } else {
                ErrorCode::DatabaseError
            }
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Storage(e) => {
                let code = classify_storage_error(&e);
                tracing::error!(error = %e, error_code = %code, "Storage error occurred");
                AppError::with_message(code, e.to_string())
            }
            OrderError::StatusConflict {
                order_id,
                status,
                ref expected,
            } => AppError::with_message(ErrorCode::OrderStatusConflict, err.to_string())
                .with_detail("order_id", order_id)
                .with_detail("status", status.as_str())
                .with_detail("expected", expected.clone()),
            OrderError::InsufficientBalance {
                required,
                available,
            } => AppError::with_message(ErrorCode::InsufficientBalance, err.to_string())
                .with_detail("required", required.to_string())
                .with_detail("available", available.to_string()),
            OrderError::MasterDeclined { order_id, .. }
            | OrderError::ForeignRegion { order_id }
            | OrderError::Terminal { order_id, .. } => {
                AppError::with_message(err.code(), err.to_string()).with_detail("order_id", order_id)
            }
            other => AppError::with_message(other.code(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_taxonomy_maps_to_distinct_statuses() {
        let cases = [
            (OrderError::DriverRequired, StatusCode::BAD_REQUEST),
            (OrderError::OrderNotFound(1), StatusCode::NOT_FOUND),
            (OrderError::RegionNotFound(5), StatusCode::NOT_FOUND),
            (OrderError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (
                OrderError::MasterDeclined {
                    order_id: 1,
                    master_id: 2,
                },
                StatusCode::FORBIDDEN,
            ),
            (
                OrderError::StatusConflict {
                    order_id: 1,
                    status: OrderStatus::Calculating,
                    expected: "CREATED".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                OrderError::InsufficientBalance {
                    required: Decimal::new(2000, 0),
                    available: Decimal::ZERO,
                },
                StatusCode::CONFLICT,
            ),
            (
                OrderError::Inconsistency("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            let app: AppError = err.into();
            assert_eq!(app.http_status(), status, "{}", app.message);
        }
    }

    #[test]
    fn test_conflict_details() {
        let app: AppError = OrderError::StatusConflict {
            order_id: 9,
            status: OrderStatus::Reviewing,
            expected: "CALCULATING".into(),
        }
        .into();
        let details = app.details.unwrap();
        assert_eq!(details["order_id"], 9);
        assert_eq!(details["status"], "REVIEWING");
    }

    #[test]
    fn test_predicates() {
        assert!(OrderError::ForeignRegion { order_id: 1 }.is_forbidden());
        assert!(OrderError::NoMaster(1).is_conflict());
        assert!(!OrderError::OrderNotFound(1).is_conflict());
    }
}
