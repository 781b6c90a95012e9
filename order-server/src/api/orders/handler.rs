//! Order API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::models::Vehicle;
use shared::order::{
    CreateOrderRequest, CreateOrderResponse, GetOrdersRequest, Order, OrderCommentRequest,
    OrderStatusChange, UpdateOrderVehicleRequest,
};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult};

type Reply<T> = AppResult<Json<ApiResponse<T>>>;

fn ok<T>(data: T) -> Reply<T> {
    Ok(Json(ApiResponse::success(data)))
}

/// Create an order; anonymous callers receive a driver credential
pub async fn create(
    State(state): State<ServerState>,
    user: Option<CurrentUser>,
    Json(payload): Json<CreateOrderRequest>,
) -> Reply<CreateOrderResponse> {
    let caller = user.map(|u| u.actor());
    ok(state.orders.create_order(caller.as_ref(), payload)?)
}

pub async fn start_calculation(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Reply<Order> {
    ok(state.orders.start_calculation(&user.actor(), id)?)
}

pub async fn decline(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<OrderCommentRequest>,
) -> Reply<Order> {
    ok(state
        .orders
        .decline_order_master(&user.actor(), id, payload.comment)?)
}

pub async fn send_for_confirmation(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Reply<Order> {
    ok(state.orders.send_for_confirmation(&user.actor(), id)?)
}

pub async fn accept_by_customer(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Reply<Order> {
    ok(state.orders.accept_by_customer(&user.actor(), id)?)
}

pub async fn complete(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Reply<Order> {
    ok(state.orders.complete_order(&user.actor(), id)?)
}

pub async fn cancel(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<OrderCommentRequest>,
) -> Reply<Order> {
    ok(state.orders.cancel_order(&user.actor(), id, payload.comment)?)
}

/// List orders visible to the caller
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<GetOrdersRequest>,
) -> Reply<Vec<Order>> {
    ok(state.orders.get_orders(&user.actor(), &payload)?)
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Reply<Order> {
    ok(state.orders.get_order(&user.actor(), id)?)
}

pub async fn status_changes(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Reply<Vec<OrderStatusChange>> {
    ok(state.orders.get_status_changes(&user.actor(), id)?)
}

pub async fn update_vehicle(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<UpdateOrderVehicleRequest>,
) -> Reply<Vehicle> {
    ok(state.orders.update_order_vehicle(&user.actor(), payload)?)
}

/// Orders that reference a vehicle
pub async fn vehicle_orders(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Reply<Vec<Order>> {
    ok(state.orders.get_vehicle_orders(&user.actor(), id)?)
}
