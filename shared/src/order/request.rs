//! Order API payloads

use super::types::OrderStatus;
use crate::models::VehicleType;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Vehicle reference in a create request: an existing id, or data for a new record
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct VehicleInput {
    pub id: Option<i64>,
    #[serde(default)]
    pub vehicle_type: VehicleType,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(max = 100))]
    pub model: Option<String>,
    #[validate(length(max = 32))]
    pub vin: Option<String>,
    #[validate(length(max = 20))]
    pub number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 128))]
    pub guarantee_uuid: String,
    #[validate(length(max = 200))]
    pub driver_name: Option<String>,
    #[validate(length(min = 5, max = 32))]
    pub driver_phone: Option<String>,
    #[validate(email)]
    pub driver_email: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub vehicles: Vec<VehicleInput>,
    pub region_id: i64,
    pub city: Option<String>,
    pub street: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub urgency: Option<String>,
    #[serde(default)]
    pub need_evacuator: bool,
    #[serde(default)]
    pub need_mobile_team: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateOrderResponse {
    pub order_id: i64,
    pub driver_id: i64,
    /// One-time access credential for an anonymous driver
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_token: Option<String>,
}

/// Decline / cancel reason
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderCommentRequest {
    pub comment: Option<String>,
}

/// List filter. Only admins may use the party/region filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetOrdersRequest {
    pub statuses: Option<Vec<OrderStatus>>,
    pub master_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub vehicle_id: Option<i64>,
    pub region_ids: Option<Vec<i64>>,
    /// Orders where this user is master, customer or driver
    pub user_id: Option<i64>,
    pub limit: Option<usize>,
}

/// Correction of a vehicle attached to an order
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateOrderVehicleRequest {
    pub order_id: i64,
    pub vehicle_id: i64,
    pub vehicle_type: Option<VehicleType>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(max = 100))]
    pub model: Option<String>,
    #[validate(length(max = 32))]
    pub vin: Option<String>,
    #[validate(length(max = 20))]
    pub number: Option<String>,
}
