//! Shared types for the repair order marketplace
//!
//! Domain models, API payloads and the unified error system used by the
//! order server and its clients.

pub mod error;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use models::{Actor, Address, Region, User, UserRole, Vehicle, VehicleType};
pub use order::{Order, OrderStatus, OrderStatusChange};
