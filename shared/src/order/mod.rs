//! Order domain types shared between the server and its clients

pub mod request;
pub mod types;

pub use request::{
    CreateOrderRequest, CreateOrderResponse, GetOrdersRequest, OrderCommentRequest,
    UpdateOrderVehicleRequest, VehicleInput,
};
pub use types::{Order, OrderStatus, OrderStatusChange};
