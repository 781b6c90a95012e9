//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::OrderNotFound
            | Self::UserNotFound
            | Self::RegionNotFound
            | Self::VehicleNotFound
            | Self::AddressNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::OrderStatusConflict
            | Self::OrderAlreadyTaken
            | Self::OrderTerminal
            | Self::InsufficientBalance
            | Self::OrderHasNoMaster => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            Self::PermissionDenied
            | Self::RoleRequired
            | Self::AdminRequired
            | Self::MasterDeclined
            | Self::ForeignRegion
            | Self::NotOrderParticipant => StatusCode::FORBIDDEN,

            // 500 Internal Server Error
            Self::Unknown
            | Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError
            | Self::InternalInconsistency => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request
            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::RequiredField
            | Self::DriverRequired => StatusCode::BAD_REQUEST,
        }
    }
}
