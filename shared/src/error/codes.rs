//! Unified error codes
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order workflow errors
//! - 5xxx: Directory errors (users, regions, vehicles)
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Required field missing
    RequiredField = 7,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Specific role required
    RoleRequired = 2002,
    /// Admin role required
    AdminRequired = 2003,
    /// Master has declined this order before
    MasterDeclined = 2101,
    /// Order belongs to another region
    ForeignRegion = 2102,
    /// Caller is not attached to the order
    NotOrderParticipant = 2103,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order status does not permit the operation
    OrderStatusConflict = 4002,
    /// Order already has a master
    OrderAlreadyTaken = 4003,
    /// Order is completed or cancelled
    OrderTerminal = 4004,
    /// Master balance is below the reservation fee
    InsufficientBalance = 4005,
    /// Order has no master attached
    OrderHasNoMaster = 4006,
    /// No driver identity could be derived
    DriverRequired = 4007,

    // ==================== 5xxx: Directory ====================
    /// User not found
    UserNotFound = 5001,
    /// Region not found
    RegionNotFound = 5002,
    /// Vehicle not found
    VehicleNotFound = 5003,
    /// Address not found
    AddressNotFound = 5004,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9003,
    /// A stored invariant was found violated
    InternalInconsistency = 9004,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::RequiredField => "Required field is missing",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoleRequired => "Specific role is required",
            ErrorCode::AdminRequired => "Administrator role is required",
            ErrorCode::MasterDeclined => "Master has already declined this order",
            ErrorCode::ForeignRegion => "Order belongs to another region",
            ErrorCode::NotOrderParticipant => "Caller is not a participant of this order",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderStatusConflict => "Order status does not permit this operation",
            ErrorCode::OrderAlreadyTaken => "Order is already taken by a master",
            ErrorCode::OrderTerminal => "Order is already completed or cancelled",
            ErrorCode::InsufficientBalance => "Insufficient balance",
            ErrorCode::OrderHasNoMaster => "Order has no master",
            ErrorCode::DriverRequired => "Driver phone or driver credential is required",

            // Directory
            ErrorCode::UserNotFound => "User not found",
            ErrorCode::RegionNotFound => "Region not found",
            ErrorCode::VehicleNotFound => "Vehicle not found",
            ErrorCode::AddressNotFound => "Address not found",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::InternalInconsistency => "Internal data inconsistency",
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
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            7 => Ok(ErrorCode::RequiredField),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::RoleRequired),
            2003 => Ok(ErrorCode::AdminRequired),
            2101 => Ok(ErrorCode::MasterDeclined),
            2102 => Ok(ErrorCode::ForeignRegion),
            2103 => Ok(ErrorCode::NotOrderParticipant),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderStatusConflict),
            4003 => Ok(ErrorCode::OrderAlreadyTaken),
            4004 => Ok(ErrorCode::OrderTerminal),
            4005 => Ok(ErrorCode::InsufficientBalance),
            4006 => Ok(ErrorCode::OrderHasNoMaster),
            4007 => Ok(ErrorCode::DriverRequired),

            // Directory
            5001 => Ok(ErrorCode::UserNotFound),
            5002 => Ok(ErrorCode::RegionNotFound),
            5003 => Ok(ErrorCode::VehicleNotFound),
            5004 => Ok(ErrorCode::AddressNotFound),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::ConfigError),
            9004 => Ok(ErrorCode::InternalInconsistency),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
